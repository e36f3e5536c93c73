//! # Samctl Core Library
//!
//! Control library for the SAM robotic arm over a half-duplex serial link:
//! - Wire command grammar (stepped joints, absolute wrist angles, claw, reset)
//! - Bluetooth and USB serial transports plus a synthetic debug link
//! - Ordered transport probing with an explicit connection state
//! - Scripted playback paced by the controller's ready byte
//! - `.sams` script files and a session history exportable as a script
//!
//! ## Example
//!
//! ```rust,no_run
//! use samctl_core::{AppConfig, Dispatcher, Script};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AppConfig::default();
//!     let dispatcher = Dispatcher::new(
//!         config.connection.baud_rate,
//!         config.playback.playback_config(),
//!     );
//!     dispatcher.open(&config.connection.candidates).await?;
//!
//!     let script = Script::load(Path::new("wave.sams"))?;
//!     let handle = dispatcher.start_playback(script)?;
//!     let report = handle.wait().await;
//!     println!("{}", report.status);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod cli;
pub mod config;
pub mod core;

// Re-exports for convenience
pub use crate::cli::{CliResult, ExitCodes};
pub use crate::config::AppConfig;
pub use crate::core::command::{Actuator, Command, DecodeError, Direction};
pub use crate::core::connection::{ConnectionError, ConnectionManager, ConnectionState};
pub use crate::core::dispatcher::{DispatchError, Dispatcher};
pub use crate::core::event::ControllerEvent;
pub use crate::core::history::{History, HistoryEntry};
pub use crate::core::playback::{
    EngineError, PlaybackConfig, PlaybackReport, PlaybackState, PlaybackStatus, SessionHandle,
};
pub use crate::core::script::{ParseError, Script, ScriptLine};
pub use crate::core::transport::{Transport, TransportError, TransportKind};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
