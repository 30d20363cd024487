use anyhow::{bail, Result};
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::{
    config::Settings,
    github::GithubStatusClient,
    status::compose::StatusComposer,
    utils::clock::{Clock, SystemClock},
    wakatime::{activity::ActivityWindow, WakaTimeClient},
};

use self::{
    cycle::UpdateCycle,
    events::{EventLogger, UpdaterEvent},
    orchestrator::StatusUpdater,
};

pub mod cycle;
pub mod events;
pub mod orchestrator;

const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Lifecycle of the update loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdaterState {
    Idle,
    Running,
    Stopped,
}

/// Owns the update loop task. `start` moves Idle→Running; `stop` is
/// idempotent and never interrupts a cycle already in flight.
pub struct StatusService {
    state: UpdaterState,
    shutdown: CancellationToken,
    updater: Option<StatusUpdater>,
    worker: Option<JoinHandle<Result<()>>>,
}

impl StatusService {
    pub fn new(updater: StatusUpdater, shutdown: CancellationToken) -> Self {
        Self {
            state: UpdaterState::Idle,
            shutdown,
            updater: Some(updater),
            worker: None,
        }
    }

    pub fn state(&self) -> UpdaterState {
        self.state
    }

    pub fn start(&mut self) -> Result<()> {
        if self.state != UpdaterState::Idle {
            bail!("updater can only be started from the idle state");
        }
        let updater = match self.updater.take() {
            Some(updater) => updater,
            None => bail!("update loop was already consumed"),
        };
        self.worker = Some(tokio::spawn(updater.run()));
        self.state = UpdaterState::Running;
        Ok(())
    }

    pub fn stop(&mut self) {
        if self.state == UpdaterState::Running {
            self.shutdown.cancel();
            self.state = UpdaterState::Stopped;
        }
    }

    /// Waits for the loop to wind down after `stop`.
    pub async fn join(mut self) -> Result<()> {
        match self.worker.take() {
            Some(worker) => worker.await?,
            None => Ok(()),
        }
    }
}

/// Wires the production endpoints into a single update pass.
pub fn build_cycle(settings: &Settings, clock: Box<dyn Clock>) -> UpdateCycle {
    let source = WakaTimeClient::new(
        &settings.wakatime_base_url,
        &settings.credentials.wakatime_api_key,
        settings.retry_attempts,
        ActivityWindow::from_seconds(settings.activity_window_seconds),
        clock,
    );
    let sink = GithubStatusClient::new(
        &settings.github_status_url,
        &settings.credentials.github_token,
    );
    UpdateCycle::new(
        Box::new(source),
        Box::new(sink),
        StatusComposer::new(settings.render.clone()),
    )
}

fn build_service(settings: &Settings, events: mpsc::Sender<UpdaterEvent>) -> StatusService {
    let shutdown = CancellationToken::new();
    let updater = StatusUpdater::new(
        build_cycle(settings, Box::new(SystemClock)),
        events,
        shutdown.clone(),
        settings.update_interval,
        Box::new(SystemClock),
    );
    StatusService::new(updater, shutdown)
}

/// Entry point for `wakastatus run`. Drives the loop until interrupted.
pub async fn start_updater(settings: Settings) -> Result<()> {
    let (events, receiver) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let logger = tokio::spawn(EventLogger::new(receiver).run());

    let mut service = build_service(&settings, events);
    service.start()?;

    tokio::signal::ctrl_c().await?;
    info!("Shutting down after interrupt");
    service.stop();
    service.join().await?;
    logger.await?;
    Ok(())
}
