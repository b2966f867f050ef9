//! Single-owner controller: applies commands, store results, change-feed
//! rows and timer ticks to `AppState` one at a time on its own task.

use std::{sync::Arc, time::Duration};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use futures::StreamExt;
use occupancy::{SeatCollection, SeatLayout};
use shared::{
    domain::{SeatLabel, Zone},
    protocol::SeatRow,
};
use storage::{SeatChange, SeatChangeStream, SeatStore, StoreError};
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    scheduler::Scheduler,
    state::{AppState, Command, Effect, LoadPhase},
    view::SeatView,
};

const INPUT_QUEUE_CAPACITY: usize = 256;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    pub poll_interval: Duration,
    pub clock_interval: Duration,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(2),
            clock_interval: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    Push,
    Poll,
}

enum Input {
    Command(Command),
    ClockTick,
    PollTick,
    Snapshot {
        phase: LoadPhase,
        result: Result<SeatCollection, StoreError>,
    },
    RemoteChange(SeatRow),
    Resync,
    FeedClosed,
    Shutdown,
}

pub struct SeatController {
    store: Arc<dyn SeatStore>,
    clock: Arc<dyn Clock>,
    settings: SyncSettings,
    state: AppState,
    mode: SyncMode,
    inputs_tx: mpsc::Sender<Input>,
    inputs_rx: mpsc::Receiver<Input>,
    view_tx: watch::Sender<SeatView>,
    scheduler: Scheduler,
}

impl SeatController {
    /// Loads the initial collection, picks push or poll sync depending on
    /// what the store offers, starts the display clock and hands back a
    /// handle for issuing commands.
    pub async fn start(
        store: Arc<dyn SeatStore>,
        clock: Arc<dyn Clock>,
        layout: SeatLayout,
        settings: SyncSettings,
    ) -> ControllerHandle {
        let state = AppState::new(layout, clock.now());
        let (view_tx, view_rx) = watch::channel(SeatView::build(&state));
        let (inputs_tx, inputs_rx) = mpsc::channel(INPUT_QUEUE_CAPACITY);

        let mut controller = Self {
            store,
            clock,
            settings,
            state,
            mode: SyncMode::Poll,
            inputs_tx: inputs_tx.clone(),
            inputs_rx,
            view_tx,
            scheduler: Scheduler::default(),
        };

        let initial = controller.store.load_all().await;
        let effects = controller
            .state
            .handle_snapshot(LoadPhase::Startup, initial);
        controller.run_effects(effects);

        controller.mode = match controller.store.subscribe_changes().await {
            Ok(Some(changes)) => {
                controller.follow_changes(changes);
                SyncMode::Push
            }
            Ok(None) => {
                controller.start_polling();
                SyncMode::Poll
            }
            Err(error) => {
                warn!(%error, "change feed unavailable; falling back to polling");
                controller.start_polling();
                SyncMode::Poll
            }
        };
        info!(
            backend = controller.store.backend_name(),
            mode = ?controller.mode,
            seats = controller.state.seats().len(),
            "seat controller started"
        );

        controller.scheduler.every(
            "clock",
            controller.settings.clock_interval,
            inputs_tx.clone(),
            || Input::ClockTick,
        );

        let mode = controller.mode;
        let task = tokio::spawn(controller.run());
        ControllerHandle {
            inputs: inputs_tx,
            view: view_rx,
            mode,
            task,
        }
    }

    fn follow_changes(&mut self, mut changes: SeatChangeStream) {
        let tx = self.inputs_tx.clone();
        self.scheduler.spawn("change-feed", async move {
            while let Some(change) = changes.next().await {
                let input = match change {
                    SeatChange::Row(row) => Input::RemoteChange(row),
                    SeatChange::Resync => Input::Resync,
                };
                if tx.send(input).await.is_err() {
                    return;
                }
            }
            let _ = tx.send(Input::FeedClosed).await;
        });
    }

    fn start_polling(&mut self) {
        if self.scheduler.is_running("poll") {
            return;
        }
        self.scheduler.every(
            "poll",
            self.settings.poll_interval,
            self.inputs_tx.clone(),
            || Input::PollTick,
        );
    }

    async fn run(mut self) {
        while let Some(input) = self.inputs_rx.recv().await {
            let effects = match input {
                Input::Command(command) => {
                    let now = self.clock.now();
                    self.state.handle_command(command, now)
                }
                Input::ClockTick => {
                    let now = self.clock.now();
                    self.state.handle_clock_tick(now)
                }
                Input::PollTick => self.state.handle_poll_tick(),
                Input::Snapshot { phase, result } => self.state.handle_snapshot(phase, result),
                Input::RemoteChange(row) => self.state.handle_remote_change(row),
                Input::Resync => self.state.handle_resync(),
                Input::FeedClosed => {
                    warn!("seat change feed closed; switching to polling");
                    self.mode = SyncMode::Poll;
                    self.start_polling();
                    Vec::new()
                }
                Input::Shutdown => break,
            };
            self.run_effects(effects);
        }
        self.scheduler.shutdown();
        debug!("seat controller stopped");
    }

    fn run_effects(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Render => {
                    self.view_tx.send_replace(SeatView::build(&self.state));
                }
                Effect::Persist { label, seat } => {
                    // not awaited: the next command may run before this save settles
                    let store = Arc::clone(&self.store);
                    tokio::spawn(async move {
                        if let Err(error) = store.save_one(&label, &seat).await {
                            warn!(%label, %error, "seat save failed; keeping in-memory state");
                        }
                    });
                }
                Effect::Seed(seats) => {
                    let store = Arc::clone(&self.store);
                    tokio::spawn(async move {
                        match store.save_all(&seats).await {
                            Ok(()) => info!(seats = seats.len(), "seeded seat store"),
                            Err(error) => warn!(%error, "seeding seat store failed"),
                        }
                    });
                }
                Effect::Load(phase) => {
                    let store = Arc::clone(&self.store);
                    let tx = self.inputs_tx.clone();
                    tokio::spawn(async move {
                        let result = store.load_all().await;
                        let _ = tx.send(Input::Snapshot { phase, result }).await;
                    });
                }
            }
        }
    }
}

pub struct ControllerHandle {
    inputs: mpsc::Sender<Input>,
    view: watch::Receiver<SeatView>,
    mode: SyncMode,
    task: JoinHandle<()>,
}

impl ControllerHandle {
    pub async fn send(&self, command: Command) -> Result<()> {
        self.inputs
            .send(Input::Command(command))
            .await
            .map_err(|_| anyhow!("seat controller is not running"))
    }

    pub async fn toggle(&self, label: SeatLabel) -> Result<()> {
        self.send(Command::Toggle(label)).await
    }

    pub async fn reset(&self, label: SeatLabel) -> Result<()> {
        self.send(Command::Reset(label)).await
    }

    pub async fn switch_zone(&self, zone: Zone) -> Result<()> {
        self.send(Command::SwitchZone(zone)).await
    }

    pub async fn refresh(&self) -> Result<()> {
        self.send(Command::Refresh).await
    }

    pub fn view(&self) -> SeatView {
        self.view.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SeatView> {
        self.view.clone()
    }

    /// Mode chosen at startup. A push controller whose feed closes keeps
    /// running in poll mode.
    pub fn sync_mode(&self) -> SyncMode {
        self.mode
    }

    pub async fn shutdown(self) -> Result<()> {
        let _ = self.inputs.send(Input::Shutdown).await;
        self.task.await.context("seat controller task failed")?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/controller_tests.rs"]
mod tests;
