//! Source locations for diagnostics.
//!
//! The front end concatenates included files before handing the tree over,
//! so a position in the input is really a stack of positions: the line in
//! the innermost file, then the line of each `#include` that pulled it in.
//! [`SourceLocation`] is that stack; [`LineMarkers`] rebuilds it from the
//! line markers a preprocessor leaves in its output.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One `(file, line)` position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceFrame {
    pub file: String,
    pub line: u32,
}

/// A stack of source positions, innermost first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceLocation {
    frames: Vec<SourceFrame>,
}

impl SourceLocation {
    /// A location in a single file with no enclosing inclusion.
    pub fn new(file: impl Into<String>, line: u32) -> Self {
        SourceLocation {
            frames: vec![SourceFrame {
                file: file.into(),
                line,
            }],
        }
    }

    /// Record that this location was reached through an `#include` at
    /// `file:line`.
    pub fn included_from(mut self, file: impl Into<String>, line: u32) -> Self {
        self.frames.push(SourceFrame {
            file: file.into(),
            line,
        });
        self
    }

    pub fn frames(&self) -> &[SourceFrame] {
        &self.frames
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, frame) in self.frames.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "\tat {}:{}", frame.file, frame.line)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone)]
struct Marker {
    output_line: u32,
    file: String,
    line: u32,
}

/// Tracks preprocessor line markers while the front end reads the
/// concatenated input, and maps input lines back to [`SourceLocation`]s.
///
/// A marker entered at output line `M` for `file:L` means output line
/// `M + 1` is line `L` of `file`.
#[derive(Debug, Clone, Default)]
pub struct LineMarkers {
    stack: Vec<Marker>,
}

impl LineMarkers {
    pub fn new() -> Self {
        Self::default()
    }

    /// A marker opening `file` (the top-level file or an inclusion).
    pub fn enter(&mut self, output_line: u32, file: impl Into<String>, line: u32) {
        self.stack.push(Marker {
            output_line,
            file: file.into(),
            line,
        });
    }

    /// A marker returning to the including file, which resumes at
    /// `resume_line` after output line `output_line`.
    pub fn leave(&mut self, output_line: u32, resume_line: u32) {
        self.stack.pop();
        if let Some(top) = self.stack.last_mut() {
            top.output_line = output_line;
            top.line = resume_line;
        }
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// The location of `output_line` in the concatenated input.
    pub fn location(&self, output_line: u32) -> SourceLocation {
        let mut frames = Vec::with_capacity(self.stack.len());
        let mut current = output_line;
        for marker in self.stack.iter().rev() {
            let offset = current.saturating_sub(marker.output_line + 1);
            frames.push(SourceFrame {
                file: marker.file.clone(),
                line: marker.line + offset,
            });
            current = marker.output_line;
        }
        SourceLocation { frames }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_frame_display() {
        let loc = SourceLocation::new("main.logic", 12);
        assert_eq!(loc.to_string(), "\tat main.logic:12");
    }

    #[test]
    fn nested_frames_display_innermost_first() {
        let loc = SourceLocation::new("lib.logic", 3).included_from("main.logic", 7);
        assert_eq!(loc.to_string(), "\tat lib.logic:3\n\tat main.logic:7");
        assert_eq!(loc.frames().len(), 2);
    }

    #[test]
    fn markers_map_top_level_lines() {
        let mut markers = LineMarkers::new();
        markers.enter(0, "main.logic", 1);
        assert_eq!(markers.location(1), SourceLocation::new("main.logic", 1));
        assert_eq!(markers.location(4), SourceLocation::new("main.logic", 4));
    }

    #[test]
    fn markers_track_inclusion_and_return() {
        let mut markers = LineMarkers::new();
        markers.enter(0, "main.logic", 1);
        // line 5 of main.logic includes lib.logic
        markers.enter(5, "lib.logic", 1);
        assert_eq!(
            markers.location(7),
            SourceLocation::new("lib.logic", 2).included_from("main.logic", 5)
        );

        // lib.logic ended after output line 9; main.logic resumes at line 6
        markers.leave(9, 6);
        assert_eq!(markers.depth(), 1);
        assert_eq!(markers.location(10), SourceLocation::new("main.logic", 6));
        assert_eq!(markers.location(12), SourceLocation::new("main.logic", 8));
    }

    #[test]
    fn empty_stack_gives_empty_location() {
        let markers = LineMarkers::new();
        assert!(markers.location(3).is_empty());
    }
}
