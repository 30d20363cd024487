use thiserror::Error;
use tracing::warn;

use crate::{
    github::{PublishError, StatusSink},
    status::compose::{StatusComposer, StatusMessage},
    wakatime::{ActivitySource, FetchError},
};

#[derive(Debug, Error)]
pub enum CycleError {
    #[error("activity fetch failed: {0}")]
    Fetch(#[from] FetchError),
    #[error("status publish failed: {0}")]
    Publish(#[from] PublishError),
}

/// Outcome of a single pass. The status was published either way;
/// `fetch_error` marks cycles that fell back to the unavailable message.
#[derive(Debug)]
pub struct CycleReport {
    pub status: StatusMessage,
    pub fetch_error: Option<FetchError>,
}

impl CycleReport {
    pub fn is_fresh(&self) -> bool {
        self.fetch_error.is_none()
    }
}

/// One fetch → compose → publish pass over boxed endpoints, shared by the
/// periodic loop and the HTTP trigger.
pub struct UpdateCycle {
    source: Box<dyn ActivitySource>,
    sink: Box<dyn StatusSink>,
    composer: StatusComposer,
}

impl UpdateCycle {
    pub fn new(
        source: Box<dyn ActivitySource>,
        sink: Box<dyn StatusSink>,
        composer: StatusComposer,
    ) -> Self {
        Self {
            source,
            sink,
            composer,
        }
    }

    /// Runs one update pass. A fetch failure still publishes the fallback
    /// status; only a failed publish is an error.
    pub async fn run_once(&mut self) -> Result<CycleReport, PublishError> {
        let (status, fetch_error) = match self.source.fetch().await {
            Ok(snapshot) => (self.composer.compose(&snapshot), None),
            Err(error) => {
                warn!("Falling back to unavailable status {error:?}");
                (self.composer.unavailable(), Some(error))
            }
        };
        self.sink.publish(&status).await?;
        Ok(CycleReport {
            status,
            fetch_error,
        })
    }
}
