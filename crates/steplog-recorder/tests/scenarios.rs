//! End-to-end narration scenarios against the public recorder API.

use std::io;
use std::sync::{Arc, Mutex};

use proptest::prelude::*;
use serde_json::json;

use steplog_core::{parse_error, DataEntry, ErrorLike, LogicKind, SequenceEvent, DEFAULT_PALETTE};
use steplog_recorder::{
    CollectingRenderer, Misuse, NullRenderer, Recorder, RecorderConfig, RecorderError,
    TracingRenderer,
};

fn recorder(namespace: &str) -> Recorder<CollectingRenderer> {
    Recorder::with_renderer(
        namespace,
        RecorderConfig::default().with_seed(7),
        CollectingRenderer::default(),
    )
}

#[test]
fn create_playbook_with_data_then_error() {
    let mut rec = recorder("PlaybookService");
    rec.add_method("create", "create a playbook")
        .add_step("validate")
        .add_data(("user", json!({"username": "mitchell"})))
        .unwrap()
        .add_error(&ErrorLike::new("Error", "not found"), None);

    assert_eq!(rec.methods().len(), 1);
    let method = &rec.methods()[0];
    assert_eq!(method.steps.len(), 1);

    let sequence = &method.steps[0].sequence;
    assert_eq!(sequence.len(), 2);
    assert_eq!(sequence[0].kind(), "data");
    assert_eq!(sequence[1].kind(), "error");
    assert_eq!(sequence[1].error_record().unwrap().message, "not found");
}

#[test]
fn parses_unicorn_stack() {
    let error = ErrorLike::new("Error", "Missing unicorn").with_stack(
        "Error: Missing unicorn\n at Object.<anonymous> (/Users/x/unicorn.js:2:15)\n at Module._compile (module.js:409:26)",
    );
    let record = parse_error(&error);
    let frames = record.frames();

    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].function_name, "<anonymous>");
    assert_eq!(frames[0].file_path, "/Users/x/unicorn.js");
    assert_eq!(frames[0].file_line, "2");
    assert_eq!(frames[0].file_char, "15");
    assert_eq!(frames[0].depth, 0);
    assert_eq!(frames[1].function_name, "_compile");
    assert_eq!(frames[1].file_path, "module.js");
    assert_eq!(frames[1].file_line, "409");
    assert_eq!(frames[1].file_char, "26");
    assert_eq!(frames[1].depth, 1);
}

#[test]
fn double_end_if_is_safe() {
    let mut rec = recorder("UserService");
    rec.add_method("find", "find a user")
        .add_step("lookup")
        .add_if("user exists", None)
        .add_end_if()
        .add_end_if();

    let block = rec.current_logic_block().unwrap();
    assert_eq!(block.kind, LogicKind::If);
    assert!(!block.is_open);
    assert_eq!(
        rec.diagnostics(),
        [Misuse::NoOpenBlock {
            operation: "add_end_if",
            kind: LogicKind::If
        }]
    );
}

#[test]
fn end_if_before_any_block_is_reported() {
    let mut rec = recorder("UserService");
    rec.add_method("find", "find").add_step("lookup").add_end_if();

    assert!(rec.current_logic_block().is_none());
    assert_eq!(rec.diagnostics().len(), 1);
}

#[test]
fn palette_phase_colors_are_distinct_and_ordered() {
    let mut rec = recorder("PlaybookService");
    for name in ["list", "get", "create", "update", "delete", "archive"] {
        rec.add_method(name, name);
    }

    let colors: Vec<_> = rec.methods().iter().map(|m| m.color).collect();
    assert_eq!(&colors[..DEFAULT_PALETTE.len()], &DEFAULT_PALETTE[..]);
    assert_eq!(colors.len(), 6);
}

#[test]
fn data_shapes_are_enforced() {
    let mut rec = recorder("PlaybookService");
    rec.add_method("create", "create").add_step("validate");

    let err = rec.add_json(json!(42), Some(json!("x")), None).err();
    assert!(matches!(err, Some(RecorderError::InvalidArgument { .. })));

    rec.add_json(json!("k"), Some(json!("v")), None).unwrap();
    rec.add_json(json!({"k": "v"}), None, None).unwrap();

    let data = &rec.current_step().unwrap().data;
    let expected = DataEntry {
        key: "k".into(),
        val: json!("v"),
    };
    assert_eq!(data, &[expected.clone(), expected]);
}

#[test]
fn narration_without_method_or_step_never_fails() {
    let mut rec = Recorder::with_renderer("Anon", RecorderConfig::default(), NullRenderer);
    rec.add_mongo("probe", None)
        .add_if("x", None)
        .add_else("y", None)
        .add_end_loop()
        .add_throws(&ErrorLike::new("Boom", "boom"), None);

    assert!(rec.methods().is_empty());
    assert_eq!(rec.unattributed_steps().len(), 1);
    assert!(rec.unattributed_steps()[0].implicit);
    assert_eq!(rec.unattributed_steps()[0].sequence.len(), 4);

    let reported: Vec<String> = rec.diagnostics().iter().map(ToString::to_string).collect();
    assert_eq!(reported.len(), 4, "{reported:?}");
}

#[test]
fn tracing_renderer_emits_without_panicking() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();

    let mut rec = Recorder::with_renderer("Billing", RecorderConfig::default(), TracingRenderer);
    rec.add_method("charge", "charge a card")
        .add_step("authorize")
        .add_fetch("POST", "https://api.example.com/charges", None, None)
        .add_throws(
            &ErrorLike::new("CardError", "declined")
                .with_stack("CardError: declined\n    at authorize (/srv/billing.js:40:11)"),
            None,
        );

    let step = rec.current_step().unwrap();
    assert_eq!(step.sequence.len(), 2);
    assert!(matches!(step.sequence[1], SequenceEvent::Throws { .. }));
}

#[derive(Clone, Default)]
struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

impl CapturedLogs {
    fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[test]
fn missing_stack_warns_once() {
    let logs = CapturedLogs::default();
    let writer = logs.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(move || writer.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::WARN)
        .finish();

    let mut rec = Recorder::with_renderer("Billing", RecorderConfig::default(), NullRenderer);
    tracing::subscriber::with_default(subscriber, || {
        rec.add_method("charge", "charge a card")
            .add_step("authorize")
            .add_error(&ErrorLike::new("CardError", "declined"), None);
    });

    let output = logs.contents();
    let warnings: Vec<&str> = output.lines().filter(|line| line.contains("WARN")).collect();
    assert_eq!(warnings.len(), 1, "{output}");
    assert!(warnings[0].contains("no stack"));
    assert_eq!(
        rec.diagnostics(),
        [Misuse::MissingStack {
            name: "CardError".into()
        }]
    );
}

proptest! {
    #[test]
    fn sequence_preserves_call_order(ops in proptest::collection::vec(0u8..6, 0..40)) {
        let mut rec = Recorder::with_renderer("Prop", RecorderConfig::default().with_seed(3), NullRenderer);
        rec.add_method("m", "m").add_step("s");

        let mut expected = Vec::new();
        for (i, op) in ops.iter().enumerate() {
            let label = format!("e{i}");
            let kind = match op {
                0 => {
                    rec.add_data((label.as_str(), json!(i))).unwrap();
                    "data"
                }
                1 => {
                    rec.add_mongo(label, None);
                    "mongo"
                }
                2 => {
                    rec.add_dispatch(label, None, None);
                    "dispatch"
                }
                3 => {
                    rec.add_fetch("GET", label, None, None);
                    "fetch"
                }
                4 => {
                    rec.add_fire_event(label, json!(null), None);
                    "event"
                }
                _ => {
                    rec.add_check(label, None);
                    "check"
                }
            };
            expected.push(kind);
        }

        let step = rec.current_step().unwrap();
        let kinds: Vec<&str> = step.sequence.iter().map(SequenceEvent::kind).collect();
        prop_assert_eq!(kinds, expected);
    }
}
