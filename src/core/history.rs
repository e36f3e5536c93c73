//! Session history of sent commands.

use crate::core::command::Command;
use crate::core::script::{ParseError, Script};
use chrono::{DateTime, Local};

/// One sent command with its local send time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    /// When the command was written to the link
    pub at: DateTime<Local>,
    /// The command that was sent
    pub command: Command,
}

impl HistoryEntry {
    /// Wire rendering of the entry's command
    pub fn wire(&self) -> String {
        self.command.encode()
    }
}

/// Append-only record of commands issued during a session.
///
/// Grows monotonically; dropped with the owning session. A subset can be
/// exported as a [`Script`] for replay.
#[derive(Debug, Clone, Default)]
pub struct History {
    entries: Vec<HistoryEntry>,
}

impl History {
    /// Empty history
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a command, stamped with the current local time.
    pub fn push(&mut self, command: Command) {
        self.entries.push(HistoryEntry {
            at: Local::now(),
            command,
        });
    }

    /// Number of recorded commands
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing has been sent yet
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Borrow the entries in send order
    pub fn entries(&self) -> &[HistoryEntry] {
        &self.entries
    }

    /// Export entries as a script.
    ///
    /// A selection of zero or one indices exports the entire history in
    /// original order; anything larger exports exactly the selected entries
    /// in the order supplied. Out-of-range indices are skipped. The
    /// whole-history fallback on a single selected row is kept for
    /// compatibility with the historical save behavior.
    pub fn export_selection(&self, selected: &[usize]) -> Result<Script, ParseError> {
        if self.entries.is_empty() {
            return Err(ParseError::EmptyScript);
        }
        let commands: Vec<Command> = if selected.len() <= 1 {
            self.entries.iter().map(|entry| entry.command).collect()
        } else {
            selected
                .iter()
                .filter_map(|&index| self.entries.get(index))
                .map(|entry| entry.command)
                .collect()
        };
        Script::from_commands(commands)
    }
}
