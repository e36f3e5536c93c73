//! On-disk script format and the in-memory script model.
//!
//! A `.sams` file is one line of back-to-back commands: the upper-case
//! separator `N` closes every command except the last, which keeps the
//! lower-case wire terminator `n`. The double duty of the final terminator
//! (end-of-line and end-of-script) is part of the format and preserved
//! exactly.

use crate::core::command::{Command, DecodeError, COMMAND_TERMINATOR};
use std::path::Path;

/// Separator written between commands, all but the last
pub const LINE_SEPARATOR: char = 'N';

/// Conventional file extension for scripts
pub const SCRIPT_EXTENSION: &str = "sams";

/// Script store errors
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// Input held no commands at all
    #[error("script is empty")]
    EmptyScript,

    /// A fragment failed to decode as a command
    #[error("invalid command at line {index}")]
    InvalidLine {
        /// Zero-based position of the offending fragment
        index: usize,
        /// The codec rejection
        #[source]
        source: DecodeError,
    },

    /// Script file could not be read or written
    #[error("script file error: {0}")]
    Io(#[from] std::io::Error),
}

/// One command plus the exact text it was read as.
///
/// Keeping the original text makes `parse` and `serialize` a lossless pair
/// even for non-canonical spellings such as zero-padded magnitudes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptLine {
    /// Decoded command
    pub command: Command,
    /// Wire-form text, always ending in the lower-case terminator
    pub text: String,
}

impl ScriptLine {
    /// Build a line from a command using its canonical rendering.
    pub fn from_command(command: Command) -> Self {
        Self {
            text: command.encode(),
            command,
        }
    }
}

/// Ordered, non-empty sequence of script lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    lines: Vec<ScriptLine>,
}

impl Script {
    /// Parse the single-line `.sams` form.
    ///
    /// Splits on the upper-case separator; every fragment but the final one
    /// gets the wire terminator re-appended (when not already present)
    /// before decoding. Trailing whitespace is tolerated, leading content is
    /// not.
    pub fn parse(text: &str) -> Result<Self, ParseError> {
        let trimmed = text.trim_end();
        if trimmed.is_empty() {
            return Err(ParseError::EmptyScript);
        }

        let fragments: Vec<&str> = trimmed.split(LINE_SEPARATOR).collect();
        let last = fragments.len() - 1;
        let mut lines = Vec::with_capacity(fragments.len());
        for (index, fragment) in fragments.into_iter().enumerate() {
            let text = if index < last && !fragment.ends_with(COMMAND_TERMINATOR) {
                format!("{}{}", fragment, COMMAND_TERMINATOR)
            } else {
                fragment.to_string()
            };
            let command =
                Command::decode(&text).map_err(|source| ParseError::InvalidLine { index, source })?;
            lines.push(ScriptLine { command, text });
        }

        Ok(Self { lines })
    }

    /// Render the `.sams` form: each line's trailing terminator becomes the
    /// separator, except on the final line.
    pub fn serialize(&self) -> String {
        let mut out = String::new();
        let last = self.lines.len() - 1;
        for (index, line) in self.lines.iter().enumerate() {
            if index < last {
                out.push_str(line.text.strip_suffix(COMMAND_TERMINATOR).unwrap_or(&line.text));
                out.push(LINE_SEPARATOR);
            } else {
                out.push_str(&line.text);
            }
        }
        out
    }

    /// Build a script from decoded commands, canonical text per line.
    pub fn from_commands<I>(commands: I) -> Result<Self, ParseError>
    where
        I: IntoIterator<Item = Command>,
    {
        let lines: Vec<ScriptLine> = commands.into_iter().map(ScriptLine::from_command).collect();
        if lines.is_empty() {
            return Err(ParseError::EmptyScript);
        }
        Ok(Self { lines })
    }

    /// Read and parse a script file.
    pub fn load(path: &Path) -> Result<Self, ParseError> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Serialize and write a script file.
    pub fn save(&self, path: &Path) -> Result<(), ParseError> {
        std::fs::write(path, self.serialize())?;
        Ok(())
    }

    /// Number of commands in the script
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Always false; scripts cannot be constructed empty
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Borrow the lines in order
    pub fn lines(&self) -> &[ScriptLine] {
        &self.lines
    }

    /// Consume the script into its lines
    pub fn into_lines(self) -> Vec<ScriptLine> {
        self.lines
    }
}
