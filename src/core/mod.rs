//! Core module containing the main functionality of Samctl
//!
//! This module provides:
//! - Wire command grammar (encode/decode) for the arm controller
//! - Transport layer for the supported link types (Bluetooth, USB, debug)
//! - Ordered-probe connection management with an explicit state
//! - Scripted playback with ready-byte flow control and cancellation
//! - `.sams` script parsing, serialization and file storage
//! - Session history with script export
//! - A dispatch facade tying the pieces to one event stream

pub mod command;
pub mod connection;
pub mod dispatcher;
pub mod event;
pub mod history;
pub mod playback;
pub mod script;
pub mod transport;
