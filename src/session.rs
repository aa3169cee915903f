use std::path::{Path, PathBuf};

use crate::protocol::{ProtocolError, WireMessage};

/// Caller-side view of a run's event stream.
///
/// Tracks the most recent snapshot, which is always the authoritative result:
/// if the run is hard-stopped (see `RunHandle::abort`) whatever was received
/// last is what the caller keeps. Protocol errors are logged and counted but
/// never end the session.
#[derive(Debug, Default)]
pub struct Session {
    latest_svg: Option<String>,
    snapshots: u64,
    protocol_errors: u64,
    done: bool,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    /// feed one raw wire message
    pub fn receive(&mut self, raw: &str) -> Result<(), ProtocolError> {
        match WireMessage::from_json(raw) {
            Ok(message) => {
                self.apply(message);
                Ok(())
            }
            Err(e) => {
                log::warn!("ignoring message from engine: {e}");
                self.protocol_errors += 1;
                Err(e)
            }
        }
    }

    pub fn apply(&mut self, message: WireMessage) {
        match message {
            WireMessage::Svg(markup) => {
                if self.done {
                    log::warn!("snapshot received after DONE; ignored");
                    return;
                }
                self.latest_svg = Some(markup);
                self.snapshots += 1;
            }
            WireMessage::Done => {
                if self.done {
                    log::warn!("duplicate DONE received");
                }
                self.done = true;
            }
        }
    }

    pub fn latest_svg(&self) -> Option<&str> {
        self.latest_svg.as_deref()
    }

    pub fn snapshot_count(&self) -> u64 {
        self.snapshots
    }

    pub fn protocol_errors(&self) -> u64 {
        self.protocol_errors
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn export_file_name(timestamp_ms: i64) -> String {
        format!("svg-painting-{timestamp_ms}.svg")
    }

    /// write the latest snapshot byte-for-byte into `dir`, named with the
    /// current time. Ok(None) if nothing has been received yet.
    pub fn export_to(&self, dir: impl AsRef<Path>) -> std::io::Result<Option<PathBuf>> {
        self.export_at(dir, chrono::Utc::now().timestamp_millis())
    }

    /// same as `export_to` with an explicit timestamp (milliseconds since the epoch)
    pub fn export_at(&self, dir: impl AsRef<Path>, timestamp_ms: i64) -> std::io::Result<Option<PathBuf>> {
        let Some(svg) = &self.latest_svg else {
            return Ok(None);
        };
        let path = dir.as_ref().join(Self::export_file_name(timestamp_ms));
        std::fs::write(&path, svg.as_bytes())?;
        log::info!("exported {}", path.display());
        Ok(Some(path))
    }
}
