//! NDJSON replay facet source
//!
//! Replays recorded discovery streams from disk. Each entity maps to
//! `<dir>/<entity>.ndjson`; every non-blank line is one streaming envelope
//! (`{"result": {...}}`, `{"error": {...}}` or a bare payload). An optional
//! interval spaces out consecutive payloads to mimic a live stream.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_stream::stream;
use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use super::backend::{FacetSource, FacetStream};
use super::error::DiscoveryError;
use crate::data::types::{EntityId, WireEnvelope};

/// File-backed facet source
#[derive(Debug, Clone)]
pub struct NdjsonFacetSource {
    dir: PathBuf,
    interval: Duration,
}

impl NdjsonFacetSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            interval: Duration::ZERO,
        }
    }

    /// Delay between consecutive payloads
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, entity_id: &EntityId) -> PathBuf {
        self.dir.join(format!("{}.ndjson", entity_id))
    }
}

#[async_trait]
impl FacetSource for NdjsonFacetSource {
    async fn open(
        &self,
        entity_id: &EntityId,
        follow_updates: bool,
        cancel: CancellationToken,
    ) -> Result<FacetStream, DiscoveryError> {
        let path = self.path_for(entity_id);
        let file = match File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(DiscoveryError::NotFound(path.display().to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        tracing::debug!(path = %path.display(), follow_updates, "Replaying facet stream");

        let interval = self.interval;
        let mut lines = BufReader::new(file).lines();

        let stream = stream! {
            let mut line_no = 0usize;
            let mut emitted = 0usize;
            loop {
                let line = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    line = lines.next_line() => line,
                };
                let line = match line {
                    Ok(Some(line)) => line,
                    Ok(None) => break,
                    Err(e) => {
                        yield Err(DiscoveryError::Io(e));
                        break;
                    }
                };
                line_no += 1;

                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }

                match serde_json::from_str::<WireEnvelope>(trimmed) {
                    Ok(WireEnvelope::Result { result: payload }) | Ok(WireEnvelope::Bare(payload)) => {
                        if emitted > 0 && !interval.is_zero() {
                            tokio::select! {
                                biased;
                                _ = cancel.cancelled() => break,
                                _ = tokio::time::sleep(interval) => {}
                            }
                        }
                        emitted += 1;
                        yield Ok(payload);
                        if !follow_updates {
                            break;
                        }
                    }
                    Ok(WireEnvelope::Error { error }) => {
                        yield Err(DiscoveryError::Server(error.to_string()));
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(line = line_no, error = %e, "Undecodable facet line");
                        yield Err(DiscoveryError::Decode(e));
                        break;
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }

    fn source_name(&self) -> &'static str {
        "ndjson"
    }
}
