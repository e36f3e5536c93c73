//! CLI Exit Codes
//!
//! Standard exit codes for CLI operations and automation.

use crate::core::command::DecodeError;
use crate::core::connection::ConnectionError;
use crate::core::dispatcher::DispatchError;
use crate::core::script::ParseError;
use std::process::ExitCode;

/// Exit code constants
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitCodes;

impl ExitCodes {
    /// Success
    pub const SUCCESS: u8 = 0;

    /// General error
    pub const ERROR: u8 = 1;

    /// Invalid arguments
    pub const INVALID_ARGS: u8 = 2;

    /// Connection failed
    pub const CONNECTION_FAILED: u8 = 3;

    /// Operation timed out
    pub const TIMEOUT: u8 = 4;

    /// File not found
    pub const FILE_NOT_FOUND: u8 = 5;

    /// Permission denied
    pub const PERMISSION_DENIED: u8 = 6;

    /// Configuration error
    pub const CONFIG_ERROR: u8 = 7;

    /// Malformed wire command
    pub const MALFORMED_COMMAND: u8 = 8;

    /// Script parse or store error
    pub const SCRIPT_ERROR: u8 = 9;

    /// Playback failed partway
    pub const PLAYBACK_FAILED: u8 = 10;

    /// User cancelled
    pub const CANCELLED: u8 = 11;

    /// Device not found
    pub const DEVICE_NOT_FOUND: u8 = 12;

    /// Device busy
    pub const DEVICE_BUSY: u8 = 13;

    /// Internal error
    pub const INTERNAL_ERROR: u8 = 127;
}

/// CLI operation result
#[derive(Debug)]
pub enum CliResult {
    /// Success with optional message
    Success(Option<String>),

    /// Error with code and message
    Error(u8, String),
}

impl CliResult {
    pub fn success() -> Self {
        Self::Success(None)
    }

    pub fn success_with_message(msg: impl Into<String>) -> Self {
        Self::Success(Some(msg.into()))
    }

    pub fn error(code: u8, msg: impl Into<String>) -> Self {
        Self::Error(code, msg.into())
    }

    pub fn connection_failed(msg: impl Into<String>) -> Self {
        Self::Error(ExitCodes::CONNECTION_FAILED, msg.into())
    }

    pub fn file_not_found(path: &str) -> Self {
        Self::Error(ExitCodes::FILE_NOT_FOUND, format!("File not found: {}", path))
    }

    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Error(ExitCodes::CANCELLED, msg.into())
    }

    pub fn playback_failed(msg: impl Into<String>) -> Self {
        Self::Error(ExitCodes::PLAYBACK_FAILED, msg.into())
    }

    /// Get exit code
    pub fn code(&self) -> u8 {
        match self {
            Self::Success(_) => ExitCodes::SUCCESS,
            Self::Error(code, _) => *code,
        }
    }

    /// Get message
    pub fn message(&self) -> Option<&str> {
        match self {
            Self::Success(Some(msg)) => Some(msg),
            Self::Error(_, msg) => Some(msg),
            _ => None,
        }
    }

    /// Convert to ExitCode
    pub fn to_exit_code(&self) -> ExitCode {
        ExitCode::from(self.code())
    }

    /// Is success?
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

impl From<std::io::Error> for CliResult {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind;

        let code = match err.kind() {
            ErrorKind::NotFound => ExitCodes::FILE_NOT_FOUND,
            ErrorKind::PermissionDenied => ExitCodes::PERMISSION_DENIED,
            ErrorKind::ConnectionRefused => ExitCodes::CONNECTION_FAILED,
            ErrorKind::TimedOut => ExitCodes::TIMEOUT,
            _ => ExitCodes::ERROR,
        };

        Self::Error(code, err.to_string())
    }
}

impl From<ConnectionError> for CliResult {
    fn from(err: ConnectionError) -> Self {
        let code = match err {
            ConnectionError::NoDeviceFound => ExitCodes::DEVICE_NOT_FOUND,
            ConnectionError::AlreadyOpen => ExitCodes::DEVICE_BUSY,
        };
        Self::Error(code, err.to_string())
    }
}

impl From<DispatchError> for CliResult {
    fn from(err: DispatchError) -> Self {
        let code = match &err {
            DispatchError::NotConnected => ExitCodes::CONNECTION_FAILED,
            DispatchError::Engine(_) => ExitCodes::DEVICE_BUSY,
            DispatchError::Transport(_) => ExitCodes::CONNECTION_FAILED,
        };
        Self::Error(code, err.to_string())
    }
}

impl From<DecodeError> for CliResult {
    fn from(err: DecodeError) -> Self {
        Self::Error(ExitCodes::MALFORMED_COMMAND, err.to_string())
    }
}

impl From<ParseError> for CliResult {
    fn from(err: ParseError) -> Self {
        match err {
            ParseError::Io(io) => Self::from(io),
            ParseError::InvalidLine { index, source } => Self::Error(
                ExitCodes::SCRIPT_ERROR,
                format!("invalid command at line {}: {}", index, source),
            ),
            other => Self::Error(ExitCodes::SCRIPT_ERROR, other.to_string()),
        }
    }
}

/// Exit code description
pub fn exit_code_description(code: u8) -> &'static str {
    match code {
        0 => "Success",
        1 => "General error",
        2 => "Invalid arguments",
        3 => "Connection failed",
        4 => "Operation timed out",
        5 => "File not found",
        6 => "Permission denied",
        7 => "Configuration error",
        8 => "Malformed command",
        9 => "Script error",
        10 => "Playback failed",
        11 => "Operation cancelled",
        12 => "Device not found",
        13 => "Device busy",
        127 => "Internal error",
        _ => "Unknown error",
    }
}

/// Print exit code table
pub fn print_exit_codes() {
    println!("Exit Codes:");
    for code in [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 127] {
        println!("  {:>3}  {}", code, exit_code_description(code));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::playback::EngineError;

    #[test]
    fn test_cli_result() {
        let success = CliResult::success();
        assert!(success.is_success());
        assert_eq!(success.code(), 0);

        let error = CliResult::error(3, "Connection failed");
        assert!(!error.is_success());
        assert_eq!(error.code(), 3);
        assert_eq!(error.message(), Some("Connection failed"));
    }

    #[test]
    fn test_from_io_error() {
        let err = std::io::Error::new(std::io::ErrorKind::NotFound, "file missing");
        let result = CliResult::from(err);
        assert_eq!(result.code(), ExitCodes::FILE_NOT_FOUND);
    }

    #[test]
    fn test_from_dispatch_error() {
        let busy = CliResult::from(DispatchError::Engine(EngineError::AlreadyPlaying));
        assert_eq!(busy.code(), ExitCodes::DEVICE_BUSY);

        let offline = CliResult::from(DispatchError::NotConnected);
        assert_eq!(offline.code(), ExitCodes::CONNECTION_FAILED);
    }

    #[test]
    fn test_from_connection_error() {
        let result = CliResult::from(ConnectionError::NoDeviceFound);
        assert_eq!(result.code(), ExitCodes::DEVICE_NOT_FOUND);
    }
}
