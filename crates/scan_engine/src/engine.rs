use std::io;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::Utc;
use scan_core::{Effect, HistoryFilter, Msg, TrackerSettings};
use scan_logging::{scan_debug, scan_info};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::client::{HistoryStore, ScanExecutor};

/// Feeds messages into the session's queue from any thread.
pub type MsgSender = mpsc::UnboundedSender<Msg>;

enum EngineCommand {
    Run(Effect),
    StartTicks(TickIntervals),
}

#[derive(Debug, Clone, Copy)]
struct TickIntervals {
    progress: Duration,
    finish: Duration,
    poll: Duration,
}

/// Runs effects on a background tokio runtime and feeds the outcomes back
/// as [`Msg`]s. Timers for progress, finish animation and polling are
/// driven from the same runtime.
pub struct EngineHandle {
    cmd_tx: std::sync::mpsc::Sender<EngineCommand>,
    msg_tx: mpsc::UnboundedSender<Msg>,
    msg_rx: mpsc::UnboundedReceiver<Msg>,
    shutdown: CancellationToken,
}

impl EngineHandle {
    pub fn new(
        executor: Arc<dyn ScanExecutor>,
        history: Arc<dyn HistoryStore>,
    ) -> io::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("scan-engine")
            .enable_all()
            .build()?;
        let (cmd_tx, cmd_rx) = std::sync::mpsc::channel::<EngineCommand>();
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        let shutdown = CancellationToken::new();

        let event_tx = msg_tx.clone();
        let token = shutdown.clone();
        thread::Builder::new()
            .name("scan-engine-commands".to_string())
            .spawn(move || {
                while let Ok(command) = cmd_rx.recv() {
                    match command {
                        EngineCommand::Run(effect) => {
                            let executor = executor.clone();
                            let history = history.clone();
                            let event_tx = event_tx.clone();
                            runtime.spawn(async move {
                                let msg = run_effect(executor.as_ref(), history.as_ref(), effect).await;
                                let _ = event_tx.send(msg);
                            });
                        }
                        EngineCommand::StartTicks(intervals) => {
                            spawn_ticks(&runtime, intervals, event_tx.clone(), token.clone());
                        }
                    }
                }
                token.cancel();
                runtime.shutdown_background();
                scan_debug!("Engine command loop stopped");
            })?;

        Ok(Self {
            cmd_tx,
            msg_tx,
            msg_rx,
            shutdown,
        })
    }

    pub fn enqueue(&self, effects: Vec<Effect>) {
        for effect in effects {
            scan_debug!("Running effect {:?}", effect);
            let _ = self.cmd_tx.send(EngineCommand::Run(effect));
        }
    }

    /// Starts the periodic `ProgressTick`, `FinishTick` and `PollTick` feeds.
    pub fn start_ticks(&self, settings: &TrackerSettings) {
        let intervals = TickIntervals {
            progress: settings.progress_tick(),
            finish: settings.finish_tick(),
            poll: settings.poll_interval(),
        };
        scan_info!(
            "Starting ticks: progress {:?}, finish {:?}, poll {:?}",
            intervals.progress,
            intervals.finish,
            intervals.poll
        );
        let _ = self.cmd_tx.send(EngineCommand::StartTicks(intervals));
    }

    /// Sender for messages that originate outside the engine (user input).
    pub fn sender(&self) -> MsgSender {
        self.msg_tx.clone()
    }

    pub fn try_recv(&mut self) -> Option<Msg> {
        self.msg_rx.try_recv().ok()
    }

    pub async fn recv(&mut self) -> Option<Msg> {
        self.msg_rx.recv().await
    }

    /// Blocks the calling thread; must not be called from async code.
    pub fn blocking_recv(&mut self) -> Option<Msg> {
        self.msg_rx.blocking_recv()
    }

    pub fn stop(&self) {
        self.shutdown.cancel();
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn run_effect(executor: &dyn ScanExecutor, history: &dyn HistoryStore, effect: Effect) -> Msg {
    match effect {
        Effect::QueryActiveHistory { kind, .. } => {
            Msg::ActiveHistoryLoaded(history.history(HistoryFilter::InProgress, kind).await)
        }
        Effect::QueryCompletedHistory => {
            Msg::CompletedHistoryLoaded(history.history(HistoryFilter::Complete, None).await)
        }
        Effect::Submit(request) => {
            let result = executor.submit(&request).await;
            Msg::SubmitFinished {
                job_id: request.job_id,
                result,
                now: Utc::now(),
            }
        }
        Effect::FetchStatus { job_id, kind } => {
            let result = executor.status(&job_id, kind).await;
            Msg::StatusReported {
                job_id,
                result,
                now: Utc::now(),
            }
        }
        Effect::Cancel { job_id } => {
            let result = executor.cancel(&job_id).await;
            Msg::CancelFinished {
                job_id,
                result,
                now: Utc::now(),
            }
        }
    }
}

fn spawn_ticks(
    runtime: &tokio::runtime::Runtime,
    intervals: TickIntervals,
    event_tx: mpsc::UnboundedSender<Msg>,
    token: CancellationToken,
) {
    let feeds: [(Duration, fn() -> Msg); 3] = [
        (intervals.progress, || Msg::ProgressTick { now: Utc::now() }),
        (intervals.finish, || Msg::FinishTick),
        (intervals.poll, || Msg::PollTick),
    ];
    for (period, make_msg) in feeds {
        let event_tx = event_tx.clone();
        let token = token.clone();
        runtime.spawn(async move {
            let mut interval = tokio::time::interval(period.max(Duration::from_millis(1)));
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // The first tick fires immediately; skip it.
            interval.tick().await;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        if event_tx.send(make_msg()).is_err() {
                            break;
                        }
                    }
                }
            }
        });
    }
}
