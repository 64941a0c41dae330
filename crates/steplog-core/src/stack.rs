//! Stack trace parsing into structured frame records.
//!
//! [`parse_error`] turns an [`ErrorLike`] (name, message and an optional
//! free-form backtrace) into an [`ErrorRecord`]. Parsing is lenient: a line
//! that cannot be understood becomes a degraded frame with
//! [`is_error`](StackFrame::is_error) set, and the rest of the trace is kept.
//!
//! Two location shapes are recognized:
//!
//! ```text
//!     at Object.<anonymous> (/Users/x/unicorn.js:2:15)
//!     at https://cdpn.io/cp/internal/pen.js?key=pen.js-4f22:22:27
//! ```

use serde::{Deserialize, Serialize};

/// Marker that identifies a frame line.
const FRAME_MARKER: &str = "at ";

/// An error-like input: anything exposing a name, a message and optionally a
/// textual backtrace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorLike {
    pub name: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ErrorLike {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        ErrorLike {
            name: name.into(),
            message: message.into(),
            stack: None,
        }
    }

    pub fn with_stack(mut self, stack: impl Into<String>) -> Self {
        self.stack = Some(stack.into());
        self
    }

    /// Wraps a Rust error. The name is `"Error"` and no backtrace is attached.
    pub fn from_error(err: &dyn std::error::Error) -> Self {
        ErrorLike::new("Error", err.to_string())
    }
}

/// A parsed error: stable contract for renderers and log shippers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub name: String,
    pub message: String,
    /// `None` when the input carried no backtrace at all.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frames: Option<Vec<StackFrame>>,
}

impl ErrorRecord {
    /// Returns the frames, or an empty slice when there was no backtrace.
    pub fn frames(&self) -> &[StackFrame] {
        self.frames.as_deref().unwrap_or(&[])
    }

    /// Returns `true` if the input carried a backtrace.
    pub fn has_stack(&self) -> bool {
        self.frames.is_some()
    }
}

/// One call site from a backtrace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StackFrame {
    pub function_name: String,
    pub function_path: String,
    pub file_path: String,
    pub file_line: String,
    pub file_char: String,
    /// Zero-based position from the top of the stack (0 = innermost call).
    pub depth: usize,
    /// Set when the line could not be parsed.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
    /// The raw location text of a degraded frame.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path_all: Option<String>,
}

impl StackFrame {
    fn degraded(function_path: &str, location: &str, depth: usize) -> Self {
        StackFrame {
            function_name: String::new(),
            function_path: function_path.to_string(),
            file_path: String::new(),
            file_line: String::new(),
            file_char: String::new(),
            depth,
            is_error: true,
            file_path_all: Some(location.to_string()),
        }
    }

    pub fn is_error(&self) -> bool {
        self.is_error
    }

    /// The line number as an integer, if it is numeric.
    pub fn line_number(&self) -> Option<u32> {
        self.file_line.parse().ok()
    }

    /// The column as an integer, if it is numeric.
    pub fn column_number(&self) -> Option<u32> {
        self.file_char.parse().ok()
    }
}

/// Parses an error-like input into an [`ErrorRecord`].
///
/// A missing backtrace is not a failure: the record is returned without
/// frames and a warning is logged.
pub fn parse_error(error: &ErrorLike) -> ErrorRecord {
    let frames = match &error.stack {
        Some(stack) => Some(parse_stack(stack)),
        None => {
            tracing::warn!(
                name = %error.name,
                message = %error.message,
                "error has no stack; recording name and message only"
            );
            None
        }
    };

    ErrorRecord {
        name: error.name.clone(),
        message: error.message.clone(),
        frames,
    }
}

/// Parses free-form backtrace text into frames, innermost first.
pub fn parse_stack(stack: &str) -> Vec<StackFrame> {
    stack
        .lines()
        .filter_map(|line| {
            line.find(FRAME_MARKER)
                .map(|at| line[at + FRAME_MARKER.len()..].trim())
        })
        .filter(|frame| !frame.is_empty())
        .enumerate()
        .map(|(depth, frame)| parse_frame(frame, depth))
        .collect()
}

fn parse_frame(frame: &str, depth: usize) -> StackFrame {
    let (function_path, location) = match frame.split_once(" (") {
        Some((function_path, location)) => (function_path, location),
        None => ("", frame),
    };
    let location = location.strip_suffix(')').unwrap_or(location);

    if location.starts_with("http") {
        parse_url_location(function_path, location, depth)
    } else {
        parse_local_location(function_path, location, depth)
    }
}

/// URL locations may carry their own colons (scheme, port, query string), so
/// only the last two segments are taken as line and column.
fn parse_url_location(function_path: &str, location: &str, depth: usize) -> StackFrame {
    let segments: Vec<&str> = location.split(':').collect();
    if segments.len() < 3 {
        return StackFrame::degraded(function_path, location, depth);
    }

    let (path, position) = segments.split_at(segments.len() - 2);
    StackFrame {
        function_name: function_path.to_string(),
        function_path: function_path.to_string(),
        file_path: path.join(":"),
        file_line: position[0].to_string(),
        file_char: position[1].to_string(),
        depth,
        is_error: false,
        file_path_all: None,
    }
}

fn parse_local_location(function_path: &str, location: &str, depth: usize) -> StackFrame {
    let mut parts = location.rsplitn(3, ':');
    let (Some(file_char), Some(file_line), Some(file_path)) =
        (parts.next(), parts.next(), parts.next())
    else {
        return StackFrame::degraded(function_path, location, depth);
    };

    let numeric = |s: &str| !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit());
    if file_path.is_empty() || !numeric(file_line) || !numeric(file_char) {
        return StackFrame::degraded(function_path, location, depth);
    }

    let function_name = function_path.rsplit('.').next().unwrap_or_default();
    StackFrame {
        function_name: function_name.to_string(),
        function_path: function_path.to_string(),
        file_path: file_path.to_string(),
        file_line: file_line.to_string(),
        file_char: file_char.to_string(),
        depth,
        is_error: false,
        file_path_all: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const UNICORN: &str = "Error: Missing unicorn\n at Object.<anonymous> (/Users/x/unicorn.js:2:15)\n at Module._compile (module.js:409:26)";

    #[test]
    fn parses_node_style_frames() {
        let record = parse_error(&ErrorLike::new("Error", "Missing unicorn").with_stack(UNICORN));
        let frames = record.frames();
        assert_eq!(frames.len(), 2);

        assert_eq!(frames[0].function_name, "<anonymous>");
        assert_eq!(frames[0].function_path, "Object.<anonymous>");
        assert_eq!(frames[0].file_path, "/Users/x/unicorn.js");
        assert_eq!(frames[0].file_line, "2");
        assert_eq!(frames[0].file_char, "15");
        assert_eq!(frames[0].depth, 0);

        assert_eq!(frames[1].function_name, "_compile");
        assert_eq!(frames[1].file_path, "module.js");
        assert_eq!(frames[1].file_line, "409");
        assert_eq!(frames[1].file_char, "26");
        assert_eq!(frames[1].depth, 1);
        assert_eq!(frames[1].line_number(), Some(409));
        assert_eq!(frames[1].column_number(), Some(26));
    }

    #[test]
    fn parses_url_frames_with_embedded_colons() {
        let frames = parse_stack(
            "TypeError: boom\n    at https://cdpn.io/cp/internal/boomboom/pen.js?key=pen.js-4f22c602:22:27",
        );
        assert_eq!(frames.len(), 1);
        assert!(!frames[0].is_error());
        assert_eq!(frames[0].function_name, "");
        assert_eq!(
            frames[0].file_path,
            "https://cdpn.io/cp/internal/boomboom/pen.js?key=pen.js-4f22c602"
        );
        assert_eq!(frames[0].file_line, "22");
        assert_eq!(frames[0].file_char, "27");
    }

    #[test]
    fn url_frame_keeps_port_in_path() {
        let frames = parse_stack("    at render (http://localhost:8080/app.js:10:5)");
        assert_eq!(frames[0].function_name, "render");
        assert_eq!(frames[0].file_path, "http://localhost:8080/app.js");
        assert_eq!(frames[0].file_line, "10");
        assert_eq!(frames[0].file_char, "5");
    }

    #[test]
    fn anonymous_local_frame_has_empty_function() {
        let frames = parse_stack("    at /srv/app/index.js:7:3");
        assert_eq!(frames[0].function_name, "");
        assert_eq!(frames[0].function_path, "");
        assert_eq!(frames[0].file_path, "/srv/app/index.js");
    }

    #[test]
    fn malformed_line_degrades_without_dropping_others() {
        let stack = "Error: x\n    at a (/a.js:1:1)\n    at b (/b.js:2:2)\n    at Array.map (native)\n    at c (/c.js:3:3)\n    at d (/d.js:4:4)";
        let frames = parse_stack(stack);
        assert_eq!(frames.len(), 5);
        assert_eq!(frames.iter().filter(|f| f.is_error()).count(), 1);

        let bad = &frames[2];
        assert!(bad.is_error());
        assert_eq!(bad.depth, 2);
        assert_eq!(bad.function_path, "Array.map");
        assert_eq!(bad.file_path_all.as_deref(), Some("native"));

        let names: Vec<&str> = frames
            .iter()
            .filter(|f| !f.is_error())
            .map(|f| f.function_name.as_str())
            .collect();
        assert_eq!(names, ["a", "b", "c", "d"]);
    }

    #[test]
    fn missing_stack_yields_no_frames() {
        let record = parse_error(&ErrorLike::new("NotFoundError", "not found"));
        assert_eq!(record.name, "NotFoundError");
        assert_eq!(record.message, "not found");
        assert!(!record.has_stack());
        assert!(record.frames().is_empty());
    }

    #[test]
    fn header_only_stack_yields_empty_frames() {
        let record = parse_error(&ErrorLike::new("Error", "x").with_stack("Error: x"));
        assert!(record.has_stack());
        assert!(record.frames().is_empty());
    }

    #[test]
    fn windows_paths_keep_drive_letter() {
        let frames = parse_stack("    at main (C:\\app\\main.js:12:8)");
        assert!(!frames[0].is_error());
        assert_eq!(frames[0].file_path, "C:\\app\\main.js");
        assert_eq!(frames[0].file_line, "12");
    }

    #[test]
    fn from_error_has_no_stack() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing file");
        let like = ErrorLike::from_error(&io);
        assert_eq!(like.message, "missing file");
        assert!(like.stack.is_none());
    }

    #[test]
    fn serialized_record_uses_camel_case_fields() {
        let record = parse_error(&ErrorLike::new("Error", "Missing unicorn").with_stack(UNICORN));
        insta::assert_json_snapshot!(record, @r###"
        {
          "name": "Error",
          "message": "Missing unicorn",
          "frames": [
            {
              "functionName": "<anonymous>",
              "functionPath": "Object.<anonymous>",
              "filePath": "/Users/x/unicorn.js",
              "fileLine": "2",
              "fileChar": "15",
              "depth": 0
            },
            {
              "functionName": "_compile",
              "functionPath": "Module._compile",
              "filePath": "module.js",
              "fileLine": "409",
              "fileChar": "26",
              "depth": 1
            }
          ]
        }
        "###);
    }

    proptest! {
        #[test]
        fn parsing_is_idempotent(lines in proptest::collection::vec("[ -~]{0,40}", 0..8)) {
            let error = ErrorLike::new("Error", "x").with_stack(lines.join("\n"));
            prop_assert_eq!(parse_error(&error), parse_error(&error));
        }

        #[test]
        fn depth_matches_position(count in 0usize..12) {
            let stack: Vec<String> = (0..count)
                .map(|i| format!("    at f{i} (/src/f{i}.js:{i}:1)"))
                .collect();
            let frames = parse_stack(&stack.join("\n"));
            prop_assert_eq!(frames.len(), count);
            for (i, frame) in frames.iter().enumerate() {
                prop_assert_eq!(frame.depth, i);
                prop_assert!(!frame.is_error());
            }
        }
    }
}
