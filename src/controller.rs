use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use crate::engine::{Engine, RunState, StepOutcome};
use crate::error::EngineError;
use crate::fitness::{ErrorScore, MetricsSnapshot};
use crate::protocol::StartRun;
use crate::raster::RasterBuffer;
use crate::settings::{PainterSettings, RunLimits};
use crate::svg;

/// one streamed reconstruction
#[derive(Clone, Debug)]
pub struct Snapshot {
    pub svg: String,
    pub score: ErrorScore,
    pub iteration: u64,
    pub primitives: usize,
    pub metrics: MetricsSnapshot,
}

/// summary sent with the terminal signal
#[derive(Clone, Debug)]
pub struct RunReport {
    /// Converged or BudgetExhausted
    pub reason: RunState,
    pub iterations: u64,
    pub accepted: u64,
    pub primitives: usize,
    pub score: ErrorScore,
    pub metrics: MetricsSnapshot,
    pub elapsed: Duration,
}

#[derive(Clone, Debug)]
pub enum EngineEvent {
    Snapshot(Snapshot),
    /// exactly once per run that was not cancelled, after the final snapshot
    Done(RunReport),
}

/// Throttles snapshots during a run to reduce serialization overhead.
/// Counts accepted iterations and fires every N of them.
struct SnapshotThrottle {
    counter: u64,
    interval: u64,
}

impl SnapshotThrottle {
    fn new(interval: u64) -> Self {
        Self { counter: 0, interval: interval.max(1) }
    }

    #[inline]
    fn should_emit(&mut self) -> bool {
        self.counter += 1;
        self.counter % self.interval == 0
    }
}

fn snapshot_of(engine: &Engine, antialias: bool) -> Snapshot {
    profiling::scope!("snapshot_of");
    let composition = engine.composition();
    Snapshot {
        svg: svg::encode(composition, engine.width(), engine.height(), antialias),
        score: engine.current_score(),
        iteration: engine.iteration(),
        primitives: composition.len(),
        metrics: engine.metrics(),
    }
}

/// lifecycle state shared between the worker and its handle
type SharedState = Arc<Mutex<RunState>>;

fn transition(state: &Mutex<RunState>, to: RunState) {
    let mut current = state.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    log::debug!("run state {:?} -> {:?}", *current, to);
    *current = to;
}

/// worker body wrapper: whatever way the run ends, its lifecycle ends in Completed
fn run_worker(
    engine: Engine,
    limits: RunLimits,
    cancel: Arc<AtomicBool>,
    state: SharedState,
    tx: mpsc::Sender<EngineEvent>,
) -> Option<RunReport> {
    let report = drive(engine, limits, &cancel, &state, tx);
    if report.is_none() {
        transition(&state, RunState::Cancelled);
    }
    transition(&state, RunState::Completed);
    report
}

/// the search loop. returns None if the run was cancelled (or the receiver
/// went away) and nothing more was emitted.
fn drive(
    mut engine: Engine,
    limits: RunLimits,
    cancel: &AtomicBool,
    state: &Mutex<RunState>,
    tx: mpsc::Sender<EngineEvent>,
) -> Option<RunReport> {
    profiling::scope!("drive");
    let started = Instant::now();
    let antialias = engine.config().antialias;
    let mut throttle = SnapshotThrottle::new(limits.snapshot_interval);

    let reason = loop {
        profiling::scope!("engine_thread_loop");
        // iteration boundary: the only place the flag is observed
        if cancel.load(Ordering::Acquire) {
            log::debug!("run cancelled after {} iterations", engine.iteration());
            return None;
        }
        if let Some(stop) = engine.check_termination(&limits, started.elapsed()) {
            break stop;
        }

        if engine.step() == StepOutcome::Accepted && throttle.should_emit() {
            // a dropped receiver is a hard stop
            if tx.send(EngineEvent::Snapshot(snapshot_of(&engine, antialias))).is_err() {
                return None;
            }
        }
    };

    if cancel.load(Ordering::Acquire) {
        return None;
    }
    transition(state, reason);

    let report = RunReport {
        reason,
        iterations: engine.iteration(),
        accepted: engine.accepted(),
        primitives: engine.composition().len(),
        score: engine.current_score(),
        metrics: engine.metrics(),
        elapsed: started.elapsed(),
    };
    log::info!(
        "run finished ({:?}): {} iterations, {} accepted, {} primitives, rmse {:.4}, psnr {:.2} dB in {:.2?}",
        report.reason,
        report.iterations,
        report.accepted,
        report.primitives,
        report.metrics.rmse,
        report.metrics.psnr,
        report.elapsed,
    );

    tx.send(EngineEvent::Snapshot(snapshot_of(&engine, antialias))).ok()?;
    tx.send(EngineEvent::Done(report.clone())).ok()?;
    Some(report)
}

/// starts runs on a dedicated worker thread
pub struct RunController;

impl RunController {
    /// Validate the request and settings, then start a worker thread that owns a
    /// copy of the pixels. On error no thread is started and nothing is emitted.
    pub fn spawn(request: StartRun, settings: &PainterSettings) -> Result<RunHandle, EngineError> {
        profiling::scope!("RunController::spawn");
        settings.validate()?;
        let StartRun { pixels, width, height } = request;
        let target = RasterBuffer::new(pixels, width, height)?;

        let cfg = settings.to_mutate_config();
        let limits = settings.run_limits();
        log::info!(
            "starting run: {}x{}, kinds {:?}, up to {} primitives, seed {}",
            width,
            height,
            cfg.shape_kinds,
            cfg.max_primitives,
            limits.seed,
        );

        let cancel = Arc::new(AtomicBool::new(false));
        let state = Arc::new(Mutex::new(RunState::Running));
        let (tx, rx) = mpsc::channel();
        let worker_cancel = cancel.clone();
        let worker_state = state.clone();
        let handle = thread::Builder::new()
            .name("engine".to_owned())
            .spawn(move || {
                let engine = Engine::new(target, cfg, limits.seed);
                run_worker(engine, limits, worker_cancel, worker_state, tx)
            })
            .map_err(EngineError::Spawn)?;

        Ok(RunHandle { cancel, state, events: rx, thread: Some(handle) })
    }
}

/// caller's side of one run: the event stream plus cancellation.
/// dropping the handle cancels the run.
pub struct RunHandle {
    cancel: Arc<AtomicBool>,
    state: SharedState,
    events: mpsc::Receiver<EngineEvent>,
    thread: Option<thread::JoinHandle<Option<RunReport>>>,
}

impl RunHandle {
    /// cooperative stop: observed at the next iteration boundary, after which
    /// the worker emits nothing further
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.load(Ordering::Acquire)
    }

    /// Running until the worker decides to stop, then Converged / BudgetExhausted
    /// (or Cancelled), and Completed once the worker has emitted its last event
    pub fn state(&self) -> RunState {
        *self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// events in emission order
    pub fn events(&self) -> &mpsc::Receiver<EngineEvent> {
        &self.events
    }

    /// wait for the worker to exit. None if the run was cancelled or the worker panicked.
    pub fn join(mut self) -> Option<RunReport> {
        let handle = self.thread.take()?;
        match handle.join() {
            Ok(report) => report,
            Err(_) => {
                log::warn!("engine thread panicked");
                None
            }
        }
    }

    /// Hard stop: cancel, drop the event stream and detach the worker without
    /// waiting. Anything the worker had not yet delivered is lost; the last
    /// snapshot the caller already received stays authoritative.
    pub fn abort(mut self) {
        self.cancel();
        // detach
        self.thread.take();
    }
}

impl Drop for RunHandle {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// one engine instance: at most one run is active at a time
pub struct Painter {
    settings: PainterSettings,
    active: Option<RunHandle>,
}

impl Painter {
    pub fn new(settings: PainterSettings) -> Result<Self, EngineError> {
        settings.validate()?;
        Ok(Self { settings, active: None })
    }

    pub fn settings(&self) -> &PainterSettings {
        &self.settings
    }

    /// Start a new run. Any previous run is cancelled and joined first, so its
    /// events can never interleave with the new run's.
    pub fn start(&mut self, request: StartRun) -> Result<&RunHandle, EngineError> {
        if let Some(previous) = self.active.take() {
            previous.cancel();
            let _ = previous.join();
        }
        let handle = RunController::spawn(request, &self.settings)?;
        Ok(self.active.insert(handle))
    }

    pub fn active(&self) -> Option<&RunHandle> {
        self.active.as_ref()
    }

    /// cancel the active run, if any
    pub fn cancel(&self) {
        if let Some(handle) = &self.active {
            handle.cancel();
        }
    }

    /// hand the active run over to the caller
    pub fn take(&mut self) -> Option<RunHandle> {
        self.active.take()
    }
}
