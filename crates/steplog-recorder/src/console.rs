//! ANSI console renderer.
//!
//! Prints one line per render call. The `[namespace.method]` prefix is drawn
//! on the method's color; errors are red, control-flow annotations dimmed
//! italic, and payload JSON follows the text.

use std::io::{self, Write};

use crossterm::style::{Attribute, Color, StyledContent, Stylize};
use steplog_core::ColorToken;

use crate::render::{describe, LineStyle, RenderContext, RenderEvent, Renderer};

/// Writes styled lines to a writer (stdout by default).
pub struct ConsoleRenderer<W: Write = io::Stdout> {
    out: W,
    styled: bool,
}

impl ConsoleRenderer<io::Stdout> {
    pub fn stdout() -> Self {
        ConsoleRenderer {
            out: io::stdout(),
            styled: true,
        }
    }
}

impl Default for ConsoleRenderer<io::Stdout> {
    fn default() -> Self {
        ConsoleRenderer::stdout()
    }
}

impl<W: Write> ConsoleRenderer<W> {
    pub fn new(out: W) -> Self {
        ConsoleRenderer { out, styled: true }
    }

    /// Disables ANSI styling (for pipes and log files).
    pub fn plain(mut self) -> Self {
        self.styled = false;
        self
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_line(&mut self, ctx: &RenderContext<'_>, event: &RenderEvent<'_>) -> io::Result<()> {
        let line = describe(ctx, event);
        if !self.styled {
            return writeln!(self.out, "{}", line.plain());
        }

        if !line.prefix.is_empty() {
            let prefix = match line.color {
                Some(color) => badge(&line.prefix, color),
                None => line.prefix.as_str().bold(),
            };
            write!(self.out, "{prefix}")?;
        }
        write!(self.out, "{}", line.indent())?;

        let body = format!("{} {}", line.tag, line.text);
        let body = match line.style {
            LineStyle::Namespace | LineStyle::Method => body.bold(),
            LineStyle::Step => match line.color {
                Some(color) => body.with(to_color(color)).bold(),
                None => body.bold(),
            },
            LineStyle::Plain => body.stylize(),
            LineStyle::Error => body.red(),
            LineStyle::Muted => body.dark_grey().attribute(Attribute::Italic),
            LineStyle::Diagnostic => body.yellow(),
        };
        write!(self.out, "{body}")?;

        if let Some(detail) = &line.detail {
            write!(self.out, " {}", detail.as_str().dark_grey())?;
        }
        writeln!(self.out)
    }
}

impl<W: Write> Renderer for ConsoleRenderer<W> {
    fn render(&mut self, ctx: &RenderContext<'_>, event: &RenderEvent<'_>) {
        if let Err(err) = self.write_line(ctx, event) {
            tracing::debug!(error = %err, "console renderer failed to write line");
        }
    }
}

fn to_color(color: ColorToken) -> Color {
    Color::Rgb {
        r: color.r,
        g: color.g,
        b: color.b,
    }
}

fn badge(text: &str, color: ColorToken) -> StyledContent<&str> {
    text.on(to_color(color)).with(Color::White)
}
