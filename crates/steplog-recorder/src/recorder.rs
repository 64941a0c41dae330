//! The recorder: a fluent builder that narrates a method's execution.
//!
//! [`Recorder`] holds four cursors (namespace, current method, current step,
//! and a stack of open logic blocks) and appends every builder call to the
//! trace model in call order. Each recorded entity is handed to the
//! [`Renderer`] exactly once.
//!
//! Two failure classes are kept apart:
//! - a malformed argument shape (`add_data`, `add_returns`, `add_done`) is a
//!   caller bug and returns [`RecorderError::InvalidArgument`] before anything
//!   is recorded;
//! - a gap in the narrated state (no method, no step, no open block) is
//!   reported as a [`Misuse`] and recorded best-effort. Tracing must never take
//!   down the program it narrates.
//!
//! Logic blocks form an explicit stack: `add_if`/`add_loop` push,
//! `add_end_if`/`add_end_loop` pop, and `add_else_if`/`add_else` apply to the
//! top of the stack.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use steplog_core::{
    parse_error, ColorAllocator, ColorToken, DataEntry, DataFlag, DispatchLifecycle, ErrorLike,
    LogicBlock, LogicKind, LoopKind, Method, SequenceEvent, Step, StepCategory, StepOwner, StepRef,
};

use crate::args::DataArg;
use crate::config::RecorderConfig;
use crate::console::ConsoleRenderer;
use crate::diagnostics::Misuse;
use crate::error::RecorderError;
use crate::render::{RenderContext, RenderEvent, Renderer};

/// Owner name given to steps recorded while no method is current.
pub const UNATTRIBUTED_METHOD: &str = "<no method>";

/// Description of steps synthesized for events that arrived with no step.
const IMPLICIT_STEP: &str = "implicit step";

/// A serializable snapshot of everything recorded so far.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub namespace: String,
    pub methods: Vec<Method>,
    pub unattributed_steps: Vec<Step>,
    pub logic_blocks: Vec<LogicBlock>,
}

/// Fluent trace builder.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use steplog_core::ErrorLike;
/// use steplog_recorder::{NullRenderer, Recorder, RecorderConfig};
///
/// let mut rec = Recorder::with_renderer("PlaybookService", RecorderConfig::default(), NullRenderer);
/// rec.add_method("create", "create a playbook")
///     .add_step("validate")
///     .add_data(("user", json!({"username": "mitchell"})))?
///     .add_error(&ErrorLike::new("Error", "not found"), None);
///
/// assert_eq!(rec.methods()[0].steps[0].sequence.len(), 2);
/// # Ok::<(), steplog_recorder::RecorderError>(())
/// ```
pub struct Recorder<R: Renderer = ConsoleRenderer> {
    namespace: String,
    /// Append-only.
    methods: Vec<Method>,
    unattributed: Vec<Step>,
    current_method: Option<usize>,
    current_step: Option<StepRef>,
    /// Every block ever opened, in opening order.
    blocks: Vec<LogicBlock>,
    /// Indices into `blocks`; last element is the innermost open block.
    open_blocks: Vec<usize>,
    last_closed: Option<usize>,
    colors: ColorAllocator,
    config: RecorderConfig,
    diagnostics: Vec<Misuse>,
    renderer: R,
}

impl Recorder<ConsoleRenderer> {
    /// Creates a recorder printing to stdout, configured from `STEPLOG_*`
    /// environment variables. An invalid variable is logged and the defaults
    /// are used instead.
    pub fn new(namespace: impl Into<String>) -> Self {
        let config = RecorderConfig::from_env().unwrap_or_else(|err| {
            tracing::warn!(%err, "ignoring steplog environment configuration");
            RecorderConfig::default()
        });
        Recorder::with_renderer(namespace, config, ConsoleRenderer::stdout())
    }
}

impl<R: Renderer> Recorder<R> {
    pub fn with_renderer(namespace: impl Into<String>, config: RecorderConfig, renderer: R) -> Self {
        Recorder {
            namespace: namespace.into(),
            methods: Vec::new(),
            unattributed: Vec::new(),
            current_method: None,
            current_step: None,
            blocks: Vec::new(),
            open_blocks: Vec::new(),
            last_closed: None,
            colors: config.allocator(),
            config,
            diagnostics: Vec::new(),
            renderer,
        }
    }

    // ------------------------------------------------------------------
    // Namespace, methods, steps
    // ------------------------------------------------------------------

    /// Renames the namespace for everything recorded from now on.
    pub fn set_namespace(&mut self, namespace: impl Into<String>) -> &mut Self {
        self.namespace = namespace.into();
        tracing::debug!(namespace = %self.namespace, "namespace set");

        let method = self.current_method.and_then(|i| self.methods.get(i));
        let ctx = render_context(&self.namespace, method, self.config.use_emoticons);
        self.renderer.render(&ctx, &RenderEvent::Namespace(&self.namespace));
        self
    }

    /// Registers a method and makes it current.
    pub fn add_method(&mut self, name: impl Into<String>, description: impl Into<String>) -> &mut Self {
        self.add_method_with(name, Some(description.into()), None)
    }

    /// Registers a method with optional description and argument summary.
    ///
    /// The current step and open blocks are left untouched; narrate a new
    /// step before attaching events to the new method.
    pub fn add_method_with(
        &mut self,
        name: impl Into<String>,
        description: Option<String>,
        args_description: Option<String>,
    ) -> &mut Self {
        let color = self.colors.next_color();
        let method = Method::new(name, description, args_description, color);
        tracing::debug!(method = %method.name, %color, "method added");

        self.methods.push(method);
        self.current_method = Some(self.methods.len() - 1);

        if let Some(method) = self.methods.last() {
            let ctx = render_context(&self.namespace, Some(method), self.config.use_emoticons);
            self.renderer.render(&ctx, &RenderEvent::Method(method));
        }
        self
    }

    /// Adds a `block` step named `step {n}` to the current method.
    pub fn add_step(&mut self, description: impl Into<String>) -> &mut Self {
        self.add_step_with(description, None, None, None)
    }

    /// Adds a step with explicit name, category and owner attribution.
    ///
    /// `owner_override` replaces the method name the step is attributed to;
    /// the color stays that of the current method.
    pub fn add_step_with(
        &mut self,
        description: impl Into<String>,
        name: Option<String>,
        category: Option<StepCategory>,
        owner_override: Option<String>,
    ) -> &mut Self {
        self.create_step(
            description.into(),
            name,
            category.unwrap_or_default(),
            owner_override,
            false,
        );
        self
    }

    // ------------------------------------------------------------------
    // Key/value events
    // ------------------------------------------------------------------

    /// Attaches a data snapshot to the current step.
    pub fn add_data(&mut self, arg: impl Into<DataArg>) -> Result<&mut Self, RecorderError> {
        self.add_data_flagged(arg, None)
    }

    /// Attaches a data snapshot with a `success`/`failed` presentation tag.
    pub fn add_data_flagged(
        &mut self,
        arg: impl Into<DataArg>,
        flag: Option<DataFlag>,
    ) -> Result<&mut Self, RecorderError> {
        let DataEntry { key, val } = arg.into().into_entry("add_data")?;
        self.push_event("add_data", SequenceEvent::Data { key, val, flag });
        Ok(self)
    }

    /// Dynamically shaped `add_data`: `key_or_record` must be a string key or
    /// a single-entry object.
    pub fn add_json(
        &mut self,
        key_or_record: Value,
        value: Option<Value>,
        flag: Option<DataFlag>,
    ) -> Result<&mut Self, RecorderError> {
        let arg = DataArg::from_json("add_data", key_or_record, value)?;
        self.add_data_flagged(arg, flag)
    }

    /// Records a value returned by the narrated method.
    pub fn add_returns(&mut self, arg: impl Into<DataArg>) -> Result<&mut Self, RecorderError> {
        let DataEntry { key, val } = arg.into().into_entry("add_returns")?;
        self.push_event("add_returns", SequenceEvent::Returns { key, val });
        Ok(self)
    }

    pub fn add_returns_json(
        &mut self,
        key_or_record: Value,
        value: Option<Value>,
    ) -> Result<&mut Self, RecorderError> {
        let arg = DataArg::from_json("add_returns", key_or_record, value)?;
        self.add_returns(arg)
    }

    /// Records completion of the narrated method.
    pub fn add_done(&mut self, arg: impl Into<DataArg>) -> Result<&mut Self, RecorderError> {
        let DataEntry { key, val } = arg.into().into_entry("add_done")?;
        self.push_event("add_done", SequenceEvent::Done { key, val });
        Ok(self)
    }

    pub fn add_done_json(
        &mut self,
        key_or_record: Value,
        value: Option<Value>,
    ) -> Result<&mut Self, RecorderError> {
        let arg = DataArg::from_json("add_done", key_or_record, value)?;
        self.add_done(arg)
    }

    // ------------------------------------------------------------------
    // Side-effect events
    // ------------------------------------------------------------------

    /// Records a datastore probe.
    pub fn add_mongo(&mut self, description: impl Into<String>, debug_data: Option<Value>) -> &mut Self {
        self.push_event(
            "add_mongo",
            SequenceEvent::Mongo {
                description: description.into(),
                debug_data,
            },
        );
        self
    }

    /// Records a dispatched action.
    pub fn add_dispatch(
        &mut self,
        action: impl Into<String>,
        payload: Option<Value>,
        lifecycle: Option<DispatchLifecycle>,
    ) -> &mut Self {
        self.push_event(
            "add_dispatch",
            SequenceEvent::Dispatch {
                action: action.into(),
                payload,
                lifecycle,
            },
        );
        self
    }

    /// Records an outgoing HTTP request.
    pub fn add_fetch(
        &mut self,
        method: impl Into<String>,
        url: impl Into<String>,
        body: Option<Value>,
        headers: Option<Value>,
    ) -> &mut Self {
        self.push_event(
            "add_fetch",
            SequenceEvent::Fetch {
                method: method.into(),
                url: url.into(),
                body,
                headers,
            },
        );
        self
    }

    /// Records a pub/sub fire on an optional channel (`rabbit`, `socket`, ...).
    pub fn add_fire_event(
        &mut self,
        key: impl Into<String>,
        val: impl Into<Value>,
        channel: Option<&str>,
    ) -> &mut Self {
        self.push_event(
            "add_fire_event",
            SequenceEvent::Event {
                key: key.into(),
                val: val.into(),
                channel: channel.map(str::to_string),
            },
        );
        self
    }

    // ------------------------------------------------------------------
    // Errors
    // ------------------------------------------------------------------

    /// Records an error observed and handled in place. The description
    /// defaults to the error message.
    pub fn add_error(&mut self, error: &ErrorLike, description: Option<&str>) -> &mut Self {
        let (error, description) = self.parse_for("add_error", error, description);
        self.push_event("add_error", SequenceEvent::Error { error, description });
        self
    }

    /// Records an error propagated to the caller. The description defaults to
    /// the error message.
    pub fn add_throws(&mut self, error: &ErrorLike, description: Option<&str>) -> &mut Self {
        let (error, description) = self.parse_for("add_throws", error, description);
        self.push_event("add_throws", SequenceEvent::Throws { error, description });
        self
    }

    fn parse_for(
        &mut self,
        operation: &'static str,
        error: &ErrorLike,
        description: Option<&str>,
    ) -> (steplog_core::ErrorRecord, String) {
        let record = parse_error(error);
        if !record.has_stack() {
            // parse_error has already logged the missing stack.
            tracing::debug!(operation, "error recorded without frames");
            self.record_misuse(Misuse::MissingStack {
                name: record.name.clone(),
            });
        }
        let description = description
            .map(str::to_string)
            .unwrap_or_else(|| record.message.clone());
        (record, description)
    }

    // ------------------------------------------------------------------
    // Control flow annotations
    // ------------------------------------------------------------------

    /// Records a transfer to another method. The namespace defaults to the
    /// current one. Purely descriptive.
    pub fn add_goto(
        &mut self,
        method: impl Into<String>,
        namespace: Option<&str>,
        is_return: bool,
    ) -> &mut Self {
        let namespace = namespace.map_or_else(|| self.namespace.clone(), str::to_string);
        self.push_event(
            "add_goto",
            SequenceEvent::Goto {
                namespace,
                method: method.into(),
                is_return,
            },
        );
        self
    }

    /// Records a decision point without opening a block.
    pub fn add_check(&mut self, description: impl Into<String>, debug_data: Option<Value>) -> &mut Self {
        self.push_event(
            "add_check",
            SequenceEvent::Check {
                description: description.into(),
                debug_data,
            },
        );
        self
    }

    pub fn add_try(&mut self, description: impl Into<String>) -> &mut Self {
        self.push_event(
            "add_try",
            SequenceEvent::Try {
                description: description.into(),
            },
        );
        self
    }

    pub fn add_then(&mut self, description: impl Into<String>, payload: Option<Value>) -> &mut Self {
        self.push_event(
            "add_then",
            SequenceEvent::Then {
                description: description.into(),
                payload,
            },
        );
        self
    }

    pub fn add_catch(&mut self, description: impl Into<String>, payload: Option<Value>) -> &mut Self {
        self.push_event(
            "add_catch",
            SequenceEvent::Catch {
                description: description.into(),
                payload,
            },
        );
        self
    }

    // ------------------------------------------------------------------
    // Logic blocks
    // ------------------------------------------------------------------

    /// Opens a conditional block.
    pub fn add_if(&mut self, description: impl Into<String>, val: Option<Value>) -> &mut Self {
        let description = description.into();
        let at = self.push_event(
            "add_if",
            SequenceEvent::If {
                description: description.clone(),
                val,
            },
        );
        self.open_block(LogicKind::If, description, at);
        self
    }

    /// Adds an `elseif` branch to the innermost open conditional.
    pub fn add_else_if(&mut self, description: impl Into<String>, val: Option<Value>) -> &mut Self {
        self.mark_branch("add_else_if");
        self.push_event(
            "add_else_if",
            SequenceEvent::ElseIf {
                description: description.into(),
                val,
            },
        );
        self
    }

    /// Adds an `else` branch to the innermost open conditional.
    pub fn add_else(&mut self, description: impl Into<String>, val: Option<Value>) -> &mut Self {
        self.mark_branch("add_else");
        self.push_event(
            "add_else",
            SequenceEvent::Else {
                description: description.into(),
                val,
            },
        );
        self
    }

    /// Closes the innermost open conditional. With none open this is reported
    /// and otherwise ignored.
    pub fn add_end_if(&mut self) -> &mut Self {
        self.close_block(LogicKind::If, "add_end_if");
        self
    }

    /// Opens a loop block. `kind` defaults to `for`.
    pub fn add_loop(
        &mut self,
        description: impl Into<String>,
        debug_data: Option<Value>,
        kind: Option<LoopKind>,
    ) -> &mut Self {
        let description = description.into();
        let at = self.push_event(
            "add_loop",
            SequenceEvent::Loop {
                description: description.clone(),
                debug_data,
                kind: kind.unwrap_or_default(),
            },
        );
        self.open_block(LogicKind::Loop, description, at);
        self
    }

    /// Closes the innermost open loop. With none open this is reported and
    /// otherwise ignored.
    pub fn add_end_loop(&mut self) -> &mut Self {
        self.close_block(LogicKind::Loop, "add_end_loop");
        self
    }

    fn open_block(&mut self, kind: LogicKind, description: String, at: StepRef) {
        self.blocks.push(LogicBlock::open(kind, description, at));
        self.open_blocks.push(self.blocks.len() - 1);
        tracing::debug!(%kind, depth = self.open_blocks.len(), "logic block opened");
    }

    fn mark_branch(&mut self, operation: &'static str) {
        let top = self
            .open_blocks
            .last()
            .copied()
            .filter(|&i| self.blocks.get(i).is_some_and(|b| b.kind == LogicKind::If));
        match top.and_then(|i| self.blocks.get_mut(i)) {
            Some(block) => block.branches += 1,
            None => self.report(Misuse::ElseWithoutIf { operation }),
        }
    }

    fn close_block(&mut self, kind: LogicKind, operation: &'static str) {
        let target = self
            .open_blocks
            .iter()
            .rposition(|&i| self.blocks.get(i).is_some_and(|b| b.kind == kind));
        let Some(position) = target else {
            self.report(Misuse::NoOpenBlock { operation, kind });
            return;
        };

        while self.open_blocks.len() > position + 1 {
            if let Some(inner) = self.open_blocks.pop() {
                let unclosed = self.blocks.get(inner).map(|block| Misuse::UnclosedBlock {
                    kind: block.kind,
                    description: block.description.clone(),
                    operation,
                });
                if let Some(misuse) = unclosed {
                    self.report(misuse);
                }
                self.finish_block(inner);
            }
        }
        if let Some(index) = self.open_blocks.pop() {
            self.finish_block(index);
        }
    }

    fn finish_block(&mut self, index: usize) {
        let Some(block) = self.blocks.get_mut(index) else {
            return;
        };
        block.is_open = false;
        self.last_closed = Some(index);
        tracing::debug!(kind = %block.kind, depth = self.open_blocks.len(), "logic block closed");

        let method = self.current_method.and_then(|i| self.methods.get(i));
        let ctx = render_context(&self.namespace, method, self.config.use_emoticons);
        if let Some(block) = self.blocks.get(index) {
            self.renderer.render(&ctx, &RenderEvent::BlockClosed(block));
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    /// Steps recorded while no method was current.
    pub fn unattributed_steps(&self) -> &[Step] {
        &self.unattributed
    }

    pub fn current_method(&self) -> Option<&Method> {
        self.current_method.and_then(|i| self.methods.get(i))
    }

    pub fn current_step(&self) -> Option<&Step> {
        self.current_step
            .and_then(|at| step_at(&self.methods, &self.unattributed, at))
    }

    /// The innermost open block, or the most recently closed one when none is
    /// open.
    pub fn current_logic_block(&self) -> Option<&LogicBlock> {
        self.open_blocks
            .last()
            .copied()
            .or(self.last_closed)
            .and_then(|i| self.blocks.get(i))
    }

    /// Open blocks, outermost first.
    pub fn open_blocks(&self) -> impl Iterator<Item = &LogicBlock> + '_ {
        self.open_blocks.iter().filter_map(|&i| self.blocks.get(i))
    }

    /// Every block ever opened, in opening order.
    pub fn logic_blocks(&self) -> &[LogicBlock] {
        &self.blocks
    }

    /// Misuse reported so far, in order.
    pub fn diagnostics(&self) -> &[Misuse] {
        &self.diagnostics
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    pub fn into_renderer(self) -> R {
        self.renderer
    }

    /// Snapshot of the whole trace.
    pub fn trace(&self) -> Trace {
        Trace {
            namespace: self.namespace.clone(),
            methods: self.methods.clone(),
            unattributed_steps: self.unattributed.clone(),
            logic_blocks: self.blocks.clone(),
        }
    }

    /// The trace as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, RecorderError> {
        Ok(serde_json::to_string_pretty(&self.trace())?)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn create_step(
        &mut self,
        description: String,
        name: Option<String>,
        category: StepCategory,
        owner_override: Option<String>,
        implicit: bool,
    ) -> StepRef {
        let owner = self.current_method.and_then(|i| self.methods.get(i).map(|m| (i, m)));
        let (owner, index, method_name, color) = match owner {
            Some((i, method)) => (
                StepOwner::Method(i),
                method.step_count(),
                method.name.clone(),
                method.color,
            ),
            None => (
                StepOwner::Unattributed,
                self.unattributed.len(),
                UNATTRIBUTED_METHOD.to_string(),
                ColorToken::UNATTRIBUTED,
            ),
        };
        let name = name.unwrap_or_else(|| format!("step {index}"));

        if owner == StepOwner::Unattributed {
            self.report(Misuse::NoCurrentMethod { step: name.clone() });
        }

        let mut step = Step::new(
            name,
            description,
            category,
            owner_override.unwrap_or(method_name),
            color,
        );
        step.implicit = implicit;
        tracing::debug!(step = %step.name, owner = %step.owner_method_name, implicit, "step added");

        match owner {
            StepOwner::Method(i) => {
                if let Some(method) = self.methods.get_mut(i) {
                    method.steps.push(step);
                }
            }
            StepOwner::Unattributed => self.unattributed.push(step),
        }

        let at = StepRef { owner, index };
        self.current_step = Some(at);

        if let Some(step) = step_at(&self.methods, &self.unattributed, at) {
            let method = self.current_method.and_then(|i| self.methods.get(i));
            let ctx = render_context(&self.namespace, method, self.config.use_emoticons);
            self.renderer.render(&ctx, &RenderEvent::Step(step));
        }
        at
    }

    /// Returns the current step, synthesizing an implicit one if there is
    /// none.
    fn ensure_step(&mut self, operation: &'static str) -> StepRef {
        if let Some(at) = self.current_step {
            if step_at(&self.methods, &self.unattributed, at).is_some() {
                return at;
            }
        }
        self.report(Misuse::NoCurrentStep { operation });
        self.create_step(IMPLICIT_STEP.to_string(), None, StepCategory::Block, None, true)
    }

    /// Appends `event` to the current step and renders it.
    fn push_event(&mut self, operation: &'static str, event: SequenceEvent) -> StepRef {
        let at = self.ensure_step(operation);
        if let Some(step) = step_at_mut(&mut self.methods, &mut self.unattributed, at) {
            step.push(event);
        }

        if let Some(step) = step_at(&self.methods, &self.unattributed, at) {
            if let Some(event) = step.last_event() {
                let method = self.current_method.and_then(|i| self.methods.get(i));
                let ctx = render_context(&self.namespace, method, self.config.use_emoticons);
                self.renderer.render(&ctx, &RenderEvent::Event { step, event });
            }
        }
        at
    }

    fn report(&mut self, misuse: Misuse) {
        tracing::warn!(namespace = %self.namespace, "{misuse}");
        self.record_misuse(misuse);
    }

    /// Renders and keeps `misuse` without logging it.
    fn record_misuse(&mut self, misuse: Misuse) {
        let method = self.current_method.and_then(|i| self.methods.get(i));
        let ctx = render_context(&self.namespace, method, self.config.use_emoticons);
        self.renderer.render(&ctx, &RenderEvent::Diagnostic(&misuse));
        self.diagnostics.push(misuse);
    }
}

fn render_context<'a>(
    namespace: &'a str,
    method: Option<&'a Method>,
    use_emoticons: bool,
) -> RenderContext<'a> {
    RenderContext {
        namespace,
        method_name: method.map(|m| m.name.as_str()),
        color: method.map(|m| m.color),
        use_emoticons,
    }
}

fn step_at<'a>(methods: &'a [Method], unattributed: &'a [Step], at: StepRef) -> Option<&'a Step> {
    match at.owner {
        StepOwner::Method(i) => methods.get(i)?.steps.get(at.index),
        StepOwner::Unattributed => unattributed.get(at.index),
    }
}

fn step_at_mut<'a>(
    methods: &'a mut [Method],
    unattributed: &'a mut [Step],
    at: StepRef,
) -> Option<&'a mut Step> {
    match at.owner {
        StepOwner::Method(i) => methods.get_mut(i)?.steps.get_mut(at.index),
        StepOwner::Unattributed => unattributed.get_mut(at.index),
    }
}
