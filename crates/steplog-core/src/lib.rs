pub mod color;
pub mod error;
pub mod model;
pub mod stack;

// Re-export commonly used types
pub use color::{ColorAllocator, ColorToken, DEFAULT_PALETTE};
pub use error::CoreError;
pub use model::{
    DataEntry, DataFlag, DispatchLifecycle, LogicBlock, LogicKind, LoopKind, Method,
    SequenceEvent, Step, StepCategory, StepOwner, StepRef,
};
pub use stack::{parse_error, parse_stack, ErrorLike, ErrorRecord, StackFrame};
