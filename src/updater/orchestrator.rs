use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::error;

use crate::utils::clock::Clock;

use super::{
    cycle::{CycleError, UpdateCycle},
    events::UpdaterEvent,
};

/// Drives update cycles on a timer until cancelled.
pub struct StatusUpdater {
    cycle: UpdateCycle,
    events: mpsc::Sender<UpdaterEvent>,
    shutdown: CancellationToken,
    update_interval: Duration,
    clock: Box<dyn Clock>,
}

impl StatusUpdater {
    pub fn new(
        cycle: UpdateCycle,
        events: mpsc::Sender<UpdaterEvent>,
        shutdown: CancellationToken,
        update_interval: Duration,
        clock: Box<dyn Clock>,
    ) -> Self {
        Self {
            cycle,
            events,
            shutdown,
            update_interval,
            clock,
        }
    }

    /// Observability must never stall or kill the loop, so a full or closed
    /// channel only drops the event.
    fn emit(&self, event: UpdaterEvent) {
        if let Err(event) = self.events.try_send(event) {
            error!("Dropping updater event {event:?}");
        }
    }

    async fn run_cycle(&mut self) {
        match self.cycle.run_once().await {
            Ok(report) => match report.fetch_error {
                None => self.emit(UpdaterEvent::CycleSucceeded(report.status)),
                Some(error) => self.emit(UpdaterEvent::CycleFailed(CycleError::Fetch(error))),
            },
            Err(error) => {
                error!("Failed to publish status {error:?}");
                self.emit(UpdaterEvent::CycleFailed(CycleError::Publish(error)));
            }
        }
    }

    /// Executes the update event loop. The first cycle runs immediately,
    /// later ones on a fixed cadence. A cycle that overruns its deadline
    /// skips the missed ticks instead of bursting.
    pub async fn run(mut self) -> Result<()> {
        self.emit(UpdaterEvent::Started);
        let mut next_cycle = self.clock.instant();
        loop {
            self.run_cycle().await;

            let now = self.clock.instant();
            next_cycle += self.update_interval;
            if next_cycle < now {
                next_cycle = now + self.update_interval;
            }

            tokio::select! {
                // Cancellation is only observed between cycles, so an
                // in-flight publish always finishes and no further cycle
                // starts.
                _ = self.shutdown.cancelled() => {
                    self.emit(UpdaterEvent::Stopped);
                    return Ok(())
                }
                _ = self.clock.sleep_until(next_cycle) => ()
            }
        }
    }
}
