//! Renderer boundary.
//!
//! The recorder makes exactly one [`Renderer::render`] call per recorded
//! entity (namespace change, method, step, sequence event) and one per block
//! close or [`Misuse`] diagnostic. Renderers are side-effect only; the
//! recorder does not inspect their outcome.
//!
//! [`describe`] turns an event into a [`RenderedLine`] shared by the shipped
//! renderers so console and `tracing` output read the same.

use std::borrow::Cow;

use serde_json::Value;
use steplog_core::{ColorToken, DataFlag, LogicBlock, Method, SequenceEvent, Step, StepCategory};

use crate::diagnostics::Misuse;

/// Ambient state at the time of a render call.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext<'a> {
    pub namespace: &'a str,
    /// Name of the method the line is attributed to, if any.
    pub method_name: Option<&'a str>,
    pub color: Option<ColorToken>,
    pub use_emoticons: bool,
}

/// A fully populated entity handed to the renderer.
#[derive(Debug, Clone, Copy)]
pub enum RenderEvent<'a> {
    Namespace(&'a str),
    Method(&'a Method),
    Step(&'a Step),
    Event {
        step: &'a Step,
        event: &'a SequenceEvent,
    },
    BlockClosed(&'a LogicBlock),
    Diagnostic(&'a Misuse),
}

/// Receives recorded entities.
pub trait Renderer {
    fn render(&mut self, ctx: &RenderContext<'_>, event: &RenderEvent<'_>);
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn render(&mut self, _ctx: &RenderContext<'_>, _event: &RenderEvent<'_>) {}
}

/// Keeps every described line in memory.
#[derive(Debug, Clone, Default)]
pub struct CollectingRenderer {
    pub lines: Vec<RenderedLine>,
}

impl CollectingRenderer {
    /// Lines rendered as plain text, without styling.
    pub fn texts(&self) -> Vec<String> {
        self.lines.iter().map(RenderedLine::plain).collect()
    }
}

impl Renderer for CollectingRenderer {
    fn render(&mut self, ctx: &RenderContext<'_>, event: &RenderEvent<'_>) {
        self.lines.push(describe(ctx, event));
    }
}

/// Emits each line as a `tracing` event under the `steplog` target.
///
/// Errors, throws and diagnostics are emitted at `WARN`, everything else at
/// `INFO`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingRenderer;

impl Renderer for TracingRenderer {
    fn render(&mut self, ctx: &RenderContext<'_>, event: &RenderEvent<'_>) {
        let line = describe(ctx, event);
        let detail = line.detail.as_deref().unwrap_or("");
        match line.style {
            LineStyle::Error | LineStyle::Diagnostic => tracing::warn!(
                target: "steplog",
                detail,
                "{}{}{} {}",
                line.prefix,
                line.indent(),
                line.tag,
                line.text
            ),
            _ => tracing::info!(
                target: "steplog",
                detail,
                "{}{}{} {}",
                line.prefix,
                line.indent(),
                line.tag,
                line.text
            ),
        }
    }
}

/// Visual role of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineStyle {
    Namespace,
    Method,
    Step,
    Plain,
    Error,
    /// Control-flow annotations: goto, if, loop, check, try/then/catch.
    Muted,
    Diagnostic,
}

/// Renderer-neutral description of one output line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedLine {
    /// `[namespace.method]`, or empty for namespace lines.
    pub prefix: String,
    pub depth: usize,
    pub tag: Cow<'static, str>,
    pub text: String,
    /// Compact JSON of the payload, if any.
    pub detail: Option<String>,
    pub style: LineStyle,
    pub color: Option<ColorToken>,
}

impl RenderedLine {
    pub fn indent(&self) -> String {
        " ".repeat(2 + self.depth * 3)
    }

    /// The line without styling, as a console would print it.
    pub fn plain(&self) -> String {
        let mut out = format!("{}{}{} {}", self.prefix, self.indent(), self.tag, self.text);
        if let Some(detail) = &self.detail {
            out.push(' ');
            out.push_str(detail);
        }
        out
    }
}

fn label(emoticons: bool, emoji: &'static str, text: &'static str) -> Cow<'static, str> {
    Cow::Borrowed(if emoticons { emoji } else { text })
}

fn compact(value: &Value) -> String {
    value.to_string()
}

fn detail_of(value: Option<&Value>) -> Option<String> {
    value.filter(|v| !v.is_null()).map(compact)
}

fn keyed(key: &str, val: &Value) -> Option<String> {
    Some(compact(&serde_json::json!({ key: val })))
}

/// Describes an event as a single line.
pub fn describe(ctx: &RenderContext<'_>, event: &RenderEvent<'_>) -> RenderedLine {
    let emo = ctx.use_emoticons;
    let prefix_for = |method: &str| format!("[{}.{}]", ctx.namespace, method);
    let current_prefix = ctx.method_name.map(prefix_for).unwrap_or_default();

    match event {
        RenderEvent::Namespace(name) => RenderedLine {
            prefix: String::new(),
            depth: 0,
            tag: Cow::Borrowed("namespace:"),
            text: name.to_string(),
            detail: None,
            style: LineStyle::Namespace,
            color: None,
        },
        RenderEvent::Method(method) => RenderedLine {
            prefix: prefix_for(&method.name),
            depth: 0,
            tag: label(emo, "📦", "@method"),
            text: method.description.clone().unwrap_or_default(),
            detail: method.args_description.clone(),
            style: LineStyle::Method,
            color: Some(method.color),
        },
        RenderEvent::Step(step) => {
            let tag = match (step.category, emo) {
                (StepCategory::Block, true) => Cow::Borrowed("•🦄"),
                (category, true) => Cow::Owned(format!("•🦄 [@{category}]")),
                (category, false) => Cow::Owned(format!("• [@{category}]")),
            };
            RenderedLine {
                prefix: prefix_for(&step.owner_method_name),
                depth: 1,
                tag,
                text: step.description.clone(),
                detail: None,
                style: LineStyle::Step,
                color: Some(step.owner_color),
            }
        }
        RenderEvent::Event { step, event } => {
            let (tag, text, detail, style) = describe_sequence_event(emo, event);
            RenderedLine {
                prefix: prefix_for(&step.owner_method_name),
                depth: 2,
                tag,
                text,
                detail,
                style,
                color: Some(step.owner_color),
            }
        }
        RenderEvent::BlockClosed(block) => RenderedLine {
            prefix: current_prefix,
            depth: 2,
            tag: Cow::Owned(format!("[@end{}]", block.kind)),
            text: block.description.clone(),
            detail: None,
            style: LineStyle::Muted,
            color: ctx.color,
        },
        RenderEvent::Diagnostic(misuse) => RenderedLine {
            prefix: current_prefix,
            depth: 0,
            tag: label(emo, "⚠️", "@misuse"),
            text: misuse.to_string(),
            detail: None,
            style: LineStyle::Diagnostic,
            color: ctx.color,
        },
    }
}

fn describe_sequence_event(
    emo: bool,
    event: &SequenceEvent,
) -> (Cow<'static, str>, String, Option<String>, LineStyle) {
    match event {
        SequenceEvent::Data { key, val, flag } => {
            let tag = match flag {
                None => label(emo, "•[🗂]", "•[@data]"),
                Some(DataFlag::Success) => label(emo, "•[✅]", "•[@success]"),
                Some(DataFlag::Failed) => label(emo, "•[❌]", "•[@fail]"),
            };
            (tag, key.clone(), keyed(key, val), LineStyle::Plain)
        }
        SequenceEvent::Returns { key, val } => (
            label(emo, "•[🔙]", "•[@returns]"),
            key.clone(),
            keyed(key, val),
            LineStyle::Plain,
        ),
        SequenceEvent::Done { key, val } => (
            label(emo, "•[🏁]", "•[@done]"),
            key.clone(),
            keyed(key, val),
            LineStyle::Plain,
        ),
        SequenceEvent::Error { error, description } => (
            label(emo, "•[💩]", "•[@error]"),
            description.clone(),
            serde_json::to_string(error).ok(),
            LineStyle::Error,
        ),
        SequenceEvent::Throws { error, description } => (
            label(emo, "•[💣]", "•[@throws]"),
            format!("---> {}", if error.name.is_empty() { description } else { &error.name }),
            None,
            LineStyle::Error,
        ),
        SequenceEvent::Mongo {
            description,
            debug_data,
        } => (
            label(emo, "•[🌳]", "•[@mongo]"),
            description.clone(),
            detail_of(debug_data.as_ref()),
            LineStyle::Plain,
        ),
        SequenceEvent::Dispatch {
            action,
            payload,
            lifecycle,
        } => {
            let mut debug = serde_json::Map::new();
            if let Some(payload) = payload {
                debug.insert("payload".into(), payload.clone());
            }
            if let Some(lifecycle) = lifecycle {
                debug.insert("lifecycle".into(), Value::String(lifecycle.to_string()));
            }
            let detail = (!debug.is_empty()).then(|| compact(&Value::Object(debug)));
            (
                label(emo, "•[⚡️]", "•[@dispatch]"),
                action.clone(),
                detail,
                LineStyle::Plain,
            )
        }
        SequenceEvent::Fetch {
            method,
            url,
            body,
            headers,
        } => {
            let detail = serde_json::json!({ "body": body, "headers": headers });
            let has_payload = body.is_some() || headers.is_some();
            (
                label(emo, "•[☁️]", "•[@fetch]"),
                format!("{method} {url}"),
                has_payload.then(|| compact(&detail)),
                LineStyle::Plain,
            )
        }
        SequenceEvent::Event { key, val, channel } => {
            let detail = serde_json::json!({ "payload": { key: val }, "channel": channel });
            (
                label(emo, "•[💥]", "•[@event]"),
                key.clone(),
                Some(compact(&detail)),
                LineStyle::Plain,
            )
        }
        SequenceEvent::Goto {
            namespace,
            method,
            is_return,
        } => {
            let arrow = match (*is_return, emo) {
                (true, true) => "👈...",
                (false, true) => "👉...",
                (true, false) => "<-...",
                (false, false) => "->...",
            };
            let target = if namespace.is_empty() {
                method.clone()
            } else {
                format!("{namespace}.{method}")
            };
            (
                Cow::Borrowed("•[@goto]"),
                format!("{arrow} {target}"),
                None,
                LineStyle::Muted,
            )
        }
        SequenceEvent::If { description, val } => (
            label(emo, "•🔷 [@if]", "• [@if]"),
            description.clone(),
            detail_of(val.as_ref()),
            LineStyle::Muted,
        ),
        SequenceEvent::ElseIf { description, val } => (
            label(emo, "•🔷 [@elseif]", "• [@elseif]"),
            description.clone(),
            detail_of(val.as_ref()),
            LineStyle::Muted,
        ),
        SequenceEvent::Else { description, val } => (
            label(emo, "•🔷 [@else]", "• [@else]"),
            description.clone(),
            detail_of(val.as_ref()),
            LineStyle::Muted,
        ),
        SequenceEvent::Loop {
            description,
            debug_data,
            kind,
        } => {
            let tag = if emo {
                Cow::Borrowed("•[🔁]")
            } else {
                Cow::Owned(format!("•[@{kind}]"))
            };
            (tag, description.clone(), detail_of(debug_data.as_ref()), LineStyle::Muted)
        }
        SequenceEvent::Check {
            description,
            debug_data,
        } => (
            label(emo, "•🖐[@check]", "•[@check]"),
            description.clone(),
            detail_of(debug_data.as_ref()),
            LineStyle::Muted,
        ),
        SequenceEvent::Try { description } => (
            label(emo, "•⏳[@try]", "•[@try]"),
            description.clone(),
            None,
            LineStyle::Muted,
        ),
        SequenceEvent::Then {
            description,
            payload,
        } => (
            label(emo, "•🤽[@then]", "•[@then]"),
            description.clone(),
            detail_of(payload.as_ref()),
            LineStyle::Muted,
        ),
        SequenceEvent::Catch {
            description,
            payload,
        } => (
            label(emo, "•🥅[@catch]", "•[@catch]"),
            description.clone(),
            detail_of(payload.as_ref()),
            LineStyle::Error,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx(emoticons: bool) -> RenderContext<'static> {
        RenderContext {
            namespace: "PlaybookService",
            method_name: Some("create"),
            color: Some(ColorToken::rgb(0, 136, 255)),
            use_emoticons: emoticons,
        }
    }

    fn step() -> Step {
        Step::new("step 0", "validate the DTO", StepCategory::Block, "create", ColorToken::rgb(0, 136, 255))
    }

    #[test]
    fn data_line_carries_key_and_payload() {
        let s = step();
        let event = SequenceEvent::Data {
            key: "user".into(),
            val: json!({"username": "mitchell"}),
            flag: Some(DataFlag::Success),
        };
        let line = describe(&ctx(false), &RenderEvent::Event { step: &s, event: &event });
        assert_eq!(line.prefix, "[PlaybookService.create]");
        assert_eq!(line.tag, "•[@success]");
        assert_eq!(line.text, "user");
        assert_eq!(line.detail.as_deref(), Some(r#"{"user":{"username":"mitchell"}}"#));
        assert_eq!(line.style, LineStyle::Plain);
    }

    #[test]
    fn goto_line_shows_direction_and_target() {
        let s = step();
        let event = SequenceEvent::Goto {
            namespace: "UserService".into(),
            method: "find".into(),
            is_return: true,
        };
        let line = describe(&ctx(false), &RenderEvent::Event { step: &s, event: &event });
        assert_eq!(line.text, "<-... UserService.find");
    }

    #[test]
    fn event_payload_survives_a_channel_named_key() {
        let s = step();
        let event = SequenceEvent::Event {
            key: "channel".into(),
            val: json!("payload"),
            channel: Some("rabbit".into()),
        };
        let line = describe(&ctx(false), &RenderEvent::Event { step: &s, event: &event });
        let detail: Value = serde_json::from_str(line.detail.as_deref().unwrap()).unwrap();
        assert_eq!(detail, json!({"payload": {"channel": "payload"}, "channel": "rabbit"}));
        assert_eq!(line.tag, "•[@event]");
    }

    #[test]
    fn step_line_names_non_block_categories() {
        let mut s = step();
        s.category = StepCategory::If;
        let line = describe(&ctx(false), &RenderEvent::Step(&s));
        assert_eq!(line.tag, "• [@if]");
        assert_eq!(line.depth, 1);
    }

    #[test]
    fn diagnostics_use_the_current_method_prefix() {
        let misuse = Misuse::ElseWithoutIf {
            operation: "add_else",
        };
        let line = describe(&ctx(true), &RenderEvent::Diagnostic(&misuse));
        assert_eq!(line.prefix, "[PlaybookService.create]");
        assert_eq!(line.style, LineStyle::Diagnostic);
    }

    #[test]
    fn collecting_renderer_keeps_plain_lines() {
        let mut renderer = CollectingRenderer::default();
        renderer.render(&ctx(false), &RenderEvent::Namespace("Billing"));
        renderer.render(&ctx(false), &RenderEvent::Step(&step()));
        assert_eq!(
            renderer.texts(),
            [
                "  namespace: Billing".to_string(),
                "[PlaybookService.create]     • [@step] validate the DTO".to_string(),
            ]
        );
    }
}
