//! Scripted playback example
//!
//! This example plays a `.sams` script through the built-in debug link, which
//! acknowledges every frame without hardware attached.
//!
//! Usage:
//!   cargo run --example play_debug -- demos/wave.sams

use samctl_core::{ControllerEvent, Dispatcher, PlaybackConfig, Script};
use std::path::Path;
use tokio::sync::broadcast::error::RecvError;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();

    let path = match args.len() {
        2 => args[1].clone(),
        _ => {
            println!("Usage: play_debug <script.sams>");
            println!("\nA demo script ships at demos/wave.sams");
            return Ok(());
        }
    };

    let script = Script::load(Path::new(&path))?;
    println!("Loaded {} ({} lines)", path, script.len());

    let dispatcher = Dispatcher::new(9600, PlaybackConfig::default());
    let kind = dispatcher.open_debug().await;
    println!("Connected via {} transport\n", kind);

    // Subscribe to events
    let mut rx = dispatcher.subscribe();

    // Spawn printer task
    let printer = tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(ControllerEvent::PlaybackProgress(fraction)) => {
                    println!("  {:>5.1}%", fraction * 100.0);
                }
                Ok(ControllerEvent::PlaybackFinished(_)) | Err(RecvError::Closed) => break,
                Ok(ControllerEvent::Error { kind, message }) => {
                    eprintln!("  [{}] {}", kind, message);
                }
                Ok(_) => {}
                // Skip over any dropped events and keep reading.
                Err(RecvError::Lagged(_)) => {}
            }
        }
    });

    let handle = dispatcher.start_playback(script)?;
    let report = handle.wait().await;
    let _ = printer.await;

    println!(
        "\nPlayback {}: {} of {} lines sent",
        report.status, report.lines_sent, report.total_lines
    );
    Ok(())
}
