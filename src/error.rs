use std::io;

/// Setup and resource errors surfaced to the embedding application.
///
/// Frame-path failures are never propagated through this type; the
/// orchestrator coerces them to a skipped frame plus a log line.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to create blink timer: {0}")]
    BlinkTimer(#[source] io::Error),

    #[error("failed to spawn render worker: {0}")]
    WorkerSpawn(#[source] io::Error),

    #[error("no pixel buffer available for {width}x{height}")]
    BufferUnavailable { width: i32, height: i32 },

    #[error("failed to read configuration: {0}")]
    ConfigIo(#[source] io::Error),

    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[source] serde_json::Error),
}
