use tokio::sync::mpsc::Receiver;
use tracing::{info, warn};

use crate::status::compose::StatusMessage;

use super::cycle::CycleError;

/// Discrete observability events emitted by the update loop.
#[derive(Debug)]
pub enum UpdaterEvent {
    Started,
    Stopped,
    CycleSucceeded(StatusMessage),
    CycleFailed(CycleError),
}

/// Drains updater events into tracing records. Runs until every sender is
/// dropped.
pub struct EventLogger {
    receiver: Receiver<UpdaterEvent>,
}

impl EventLogger {
    pub fn new(receiver: Receiver<UpdaterEvent>) -> Self {
        Self { receiver }
    }

    pub async fn run(mut self) {
        while let Some(event) = self.receiver.recv().await {
            match event {
                UpdaterEvent::Started => info!("Updater started"),
                UpdaterEvent::Stopped => info!("Updater stopped"),
                UpdaterEvent::CycleSucceeded(status) => {
                    info!("Published status {} {}", status.emoji, status.text)
                }
                UpdaterEvent::CycleFailed(error) => warn!("Update cycle failed {error:?}"),
            }
        }
    }
}
