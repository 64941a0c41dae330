//! Trace data model: methods, steps, sequence events and logic blocks.
//!
//! The model is pure data. All mutation ordering rules live in the recorder;
//! the only behavior here is [`Step::push`], which keeps a step's `data`
//! mirror in sync with its `sequence` timeline.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::color::ColorToken;
use crate::stack::ErrorRecord;

/// One traced operation within a namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Method {
    pub name: String,
    pub description: Option<String>,
    pub args_description: Option<String>,
    /// Assigned once at creation.
    pub color: ColorToken,
    pub steps: Vec<Step>,
}

impl Method {
    pub fn new(
        name: impl Into<String>,
        description: Option<String>,
        args_description: Option<String>,
        color: ColorToken,
    ) -> Self {
        Method {
            name: name.into(),
            description,
            args_description,
            color,
            steps: Vec::new(),
        }
    }

    pub fn step_count(&self) -> usize {
        self.steps.len()
    }
}

/// Kind of narrated phase a step represents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepCategory {
    #[default]
    Block,
    If,
    ElseIf,
    Else,
}

impl fmt::Display for StepCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepCategory::Block => write!(f, "step"),
            StepCategory::If => write!(f, "if"),
            StepCategory::ElseIf => write!(f, "elseif"),
            StepCategory::Else => write!(f, "else"),
        }
    }
}

/// One narrated phase within a method.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub name: String,
    pub description: String,
    pub category: StepCategory,
    /// Owner attribution captured at creation; later method changes do not
    /// propagate.
    pub owner_method_name: String,
    pub owner_color: ColorToken,
    pub data: Vec<DataEntry>,
    /// Authoritative, append-only timeline of the step.
    pub sequence: Vec<SequenceEvent>,
    /// `true` for placeholder steps synthesized when an event arrived with no
    /// current step.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub implicit: bool,
}

impl Step {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        category: StepCategory,
        owner_method_name: impl Into<String>,
        owner_color: ColorToken,
    ) -> Self {
        Step {
            name: name.into(),
            description: description.into(),
            category,
            owner_method_name: owner_method_name.into(),
            owner_color,
            data: Vec::new(),
            sequence: Vec::new(),
            implicit: false,
        }
    }

    /// Appends an event to the timeline. `data` events are mirrored into
    /// [`Step::data`].
    pub fn push(&mut self, event: SequenceEvent) {
        if let SequenceEvent::Data { key, val, .. } = &event {
            self.data.push(DataEntry {
                key: key.clone(),
                val: val.clone(),
            });
        }
        self.sequence.push(event);
    }

    pub fn last_event(&self) -> Option<&SequenceEvent> {
        self.sequence.last()
    }
}

/// A key/value snapshot attached to a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataEntry {
    pub key: String,
    pub val: Value,
}

/// Presentation tag for `data` events. Carries no structural meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataFlag {
    Success,
    Failed,
}

/// Lifecycle stage of a dispatched action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DispatchLifecycle {
    Pending,
    Success,
    Failed,
}

impl fmt::Display for DispatchLifecycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DispatchLifecycle::Pending => write!(f, "pending"),
            DispatchLifecycle::Success => write!(f, "success"),
            DispatchLifecycle::Failed => write!(f, "failed"),
        }
    }
}

/// Loop flavor. Selects presentation only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LoopKind {
    #[default]
    For,
    ForEach,
    Map,
}

impl fmt::Display for LoopKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopKind::For => write!(f, "for"),
            LoopKind::ForEach => write!(f, "forEach"),
            LoopKind::Map => write!(f, "map"),
        }
    }
}

/// One occurrence within a step, in call order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SequenceEvent {
    Data {
        key: String,
        val: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        flag: Option<DataFlag>,
    },
    Returns {
        key: String,
        val: Value,
    },
    Done {
        key: String,
        val: Value,
    },
    /// An error observed and handled in place.
    Error {
        error: ErrorRecord,
        description: String,
    },
    /// An error propagated to the caller.
    Throws {
        error: ErrorRecord,
        description: String,
    },
    /// A datastore probe.
    Mongo {
        description: String,
        debug_data: Option<Value>,
    },
    Dispatch {
        action: String,
        payload: Option<Value>,
        lifecycle: Option<DispatchLifecycle>,
    },
    Fetch {
        method: String,
        url: String,
        body: Option<Value>,
        headers: Option<Value>,
    },
    /// A pub/sub fire.
    Event {
        key: String,
        val: Value,
        channel: Option<String>,
    },
    Goto {
        namespace: String,
        method: String,
        is_return: bool,
    },
    If {
        description: String,
        val: Option<Value>,
    },
    #[serde(rename = "elseif")]
    ElseIf {
        description: String,
        val: Option<Value>,
    },
    Else {
        description: String,
        val: Option<Value>,
    },
    Loop {
        description: String,
        debug_data: Option<Value>,
        kind: LoopKind,
    },
    Check {
        description: String,
        debug_data: Option<Value>,
    },
    Try {
        description: String,
    },
    Then {
        description: String,
        payload: Option<Value>,
    },
    Catch {
        description: String,
        payload: Option<Value>,
    },
}

impl SequenceEvent {
    /// The serialized `type` tag of this event.
    pub fn kind(&self) -> &'static str {
        match self {
            SequenceEvent::Data { .. } => "data",
            SequenceEvent::Returns { .. } => "returns",
            SequenceEvent::Done { .. } => "done",
            SequenceEvent::Error { .. } => "error",
            SequenceEvent::Throws { .. } => "throws",
            SequenceEvent::Mongo { .. } => "mongo",
            SequenceEvent::Dispatch { .. } => "dispatch",
            SequenceEvent::Fetch { .. } => "fetch",
            SequenceEvent::Event { .. } => "event",
            SequenceEvent::Goto { .. } => "goto",
            SequenceEvent::If { .. } => "if",
            SequenceEvent::ElseIf { .. } => "elseif",
            SequenceEvent::Else { .. } => "else",
            SequenceEvent::Loop { .. } => "loop",
            SequenceEvent::Check { .. } => "check",
            SequenceEvent::Try { .. } => "try",
            SequenceEvent::Then { .. } => "then",
            SequenceEvent::Catch { .. } => "catch",
        }
    }

    /// The error record carried by `error` and `throws` events.
    pub fn error_record(&self) -> Option<&ErrorRecord> {
        match self {
            SequenceEvent::Error { error, .. } | SequenceEvent::Throws { error, .. } => {
                Some(error)
            }
            _ => None,
        }
    }
}

/// Which owner a step hangs off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StepOwner {
    /// Index into the recorder's method list.
    Method(usize),
    /// Recorded while no method was current.
    Unattributed,
}

/// Stable address of a step inside a trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StepRef {
    pub owner: StepOwner,
    pub index: usize,
}

/// Kind of narrated region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicKind {
    If,
    Loop,
}

impl fmt::Display for LogicKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogicKind::If => write!(f, "if"),
            LogicKind::Loop => write!(f, "loop"),
        }
    }
}

/// A narrated conditional or loop region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogicBlock {
    pub kind: LogicKind,
    pub description: String,
    pub parent_step: StepRef,
    pub is_open: bool,
    /// Number of `elseif`/`else` markers applied while open.
    pub branches: usize,
}

impl LogicBlock {
    pub fn open(kind: LogicKind, description: impl Into<String>, parent_step: StepRef) -> Self {
        LogicBlock {
            kind,
            description: description.into(),
            parent_step,
            is_open: true,
            branches: 0,
        }
    }
}
