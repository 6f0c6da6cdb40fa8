use std::time::Duration;

use scan_core::{update, Msg, TrackerState, TrackerViewModel};
use scan_logging::scan_trace;

use crate::engine::{EngineHandle, MsgSender};

/// Single owner of the tracker state. Every message, whether from the
/// engine or from user input, goes through [`ScanSession::dispatch`].
pub struct ScanSession {
    state: TrackerState,
    engine: EngineHandle,
    started: bool,
}

impl ScanSession {
    pub fn new(state: TrackerState, engine: EngineHandle) -> Self {
        Self {
            state,
            engine,
            started: false,
        }
    }

    /// Sends `SessionStarted` and starts the tick feeds. Later calls do nothing.
    pub fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        self.engine.start_ticks(self.state.settings());
        self.dispatch(Msg::SessionStarted);
    }

    /// Applies one message and hands the resulting effects to the engine.
    /// Returns the new view when the state changed.
    pub fn dispatch(&mut self, msg: Msg) -> Option<TrackerViewModel> {
        scan_trace!("Dispatching {:?}", msg);
        let state = std::mem::take(&mut self.state);
        let (mut state, effects) = update(state, msg);
        self.engine.enqueue(effects);
        let was_dirty = state.consume_dirty();
        let view = was_dirty.then(|| state.view());
        self.state = state;
        view
    }

    /// Dispatches everything already queued without waiting.
    pub fn process_pending(&mut self) -> Option<TrackerViewModel> {
        let mut latest = None;
        while let Some(msg) = self.engine.try_recv() {
            if let Some(view) = self.dispatch(msg) {
                latest = Some(view);
            }
        }
        latest
    }

    /// Waits for the next message and dispatches it. `None` once the
    /// engine is gone.
    pub async fn process_next(&mut self) -> Option<Option<TrackerViewModel>> {
        let msg = self.engine.recv().await?;
        Some(self.dispatch(msg))
    }

    /// Blocking variant of [`ScanSession::process_next`] for non-async callers.
    pub fn blocking_process_next(&mut self) -> Option<Option<TrackerViewModel>> {
        let msg = self.engine.blocking_recv()?;
        Some(self.dispatch(msg))
    }

    /// Processes messages until `done` holds or `timeout` elapses.
    pub async fn run_until(
        &mut self,
        timeout: Duration,
        mut done: impl FnMut(&TrackerState) -> bool,
    ) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while !done(&self.state) {
            match tokio::time::timeout_at(deadline, self.process_next()).await {
                Ok(Some(_)) => {}
                Ok(None) | Err(_) => return done(&self.state),
            }
        }
        true
    }

    pub fn sender(&self) -> MsgSender {
        self.engine.sender()
    }

    pub fn state(&self) -> &TrackerState {
        &self.state
    }

    pub fn view(&self) -> TrackerViewModel {
        self.state.view()
    }

    pub fn shutdown(&self) {
        self.engine.stop();
    }
}
