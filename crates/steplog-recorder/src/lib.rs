pub mod args;
pub mod config;
pub mod console;
pub mod diagnostics;
pub mod error;
pub mod recorder;
pub mod render;

// Re-export commonly used types
pub use args::DataArg;
pub use config::RecorderConfig;
pub use console::ConsoleRenderer;
pub use diagnostics::Misuse;
pub use error::RecorderError;
pub use recorder::{Recorder, Trace};
pub use render::{
    describe, CollectingRenderer, LineStyle, NullRenderer, RenderContext, RenderEvent, RenderedLine,
    Renderer, TracingRenderer,
};
