use std::{io, sync::Arc, thread::JoinHandle, time::Duration};

use crossbeam_channel::{bounded, unbounded, Receiver, SendTimeoutError, Sender, TrySendError};
use parking_lot::Mutex;
use rand::Rng as _;
use rand_xoshiro::Xoshiro256StarStar;
use thiserror::Error;
use tracing::{debug, error, trace};

use crate::{
    action::{Action, SampleRate},
    forwarder::MetricSink,
    telemetry::Telemetry,
    writer::PayloadWriter,
};

const WORKER_THREAD_NAME: &str = "metrics-statsd-client-dispatcher";
const HALT_RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// Errors that could occur while starting or stopping the dispatcher.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Failed to spawn the background worker thread.
    #[error("failed to spawn dispatcher thread: {0}")]
    Spawn(#[source] io::Error),

    /// The background worker panicked, taking the receiving side of the queue with it.
    #[error("dispatcher worker was lost")]
    WorkerLost,
}

/// Item carried by the queue.
enum Message {
    Action(Action),

    // Sent by `Dispatcher::stop`, tagged with the generation of the worker it is meant for. A worker ignores halts
    // left over from an earlier generation.
    Halt(u64),
}

/// Everything owned by the background worker: the receiving end of the queue and the means to send.
struct Worker {
    rx: Receiver<Message>,
    generation: u64,
    sink: Box<dyn MetricSink>,
    writer: PayloadWriter,
    rng: Xoshiro256StarStar,
    telemetry: Arc<Telemetry>,
}

impl Worker {
    /// Processes actions in order until a `Stop` action or a halt for this generation is received, or every sender
    /// is gone.
    fn run(mut self) -> Self {
        debug!(generation = self.generation, "Dispatcher started.");

        while let Ok(message) = self.rx.recv() {
            match message {
                Message::Action(Action::Stop) => break,
                Message::Action(action) => self.process(action),
                Message::Halt(generation) if generation == self.generation => break,
                Message::Halt(generation) => trace!(generation, "Ignoring stale halt."),
            }
        }

        debug!(generation = self.generation, "Dispatcher stopped.");
        self
    }

    /// Processes whatever is left in the queue on the current thread, skipping stop markers.
    fn flush(&mut self) {
        while let Ok(message) = self.rx.try_recv() {
            if let Message::Action(action) = message {
                self.process(action);
            }
        }
    }

    fn process(&mut self, action: Action) {
        if let Some(sample_rate) = action.sample_rate() {
            if !self.should_send(sample_rate) {
                self.telemetry.track_sampled_out();
                return;
            }
        }

        let encoded = match &action {
            Action::Delta { stat, value, sample_rate, gauge: false } => {
                self.writer.write_counter(stat, *value, *sample_rate)
            }
            Action::Delta { stat, value, sample_rate, gauge: true } => {
                self.writer.write_gauge_delta(stat, *value, *sample_rate)
            }
            Action::GaugeSet { stat, value, sample_rate } => {
                self.writer.write_gauge(stat, *value, *sample_rate)
            }
            Action::Distinct { stat, member, sample_rate } => {
                self.writer.write_set(stat, member, *sample_rate)
            }
            Action::Timing { stat, millis, sample_rate } => {
                self.writer.write_timing(stat, *millis, *sample_rate)
            }
            Action::Stop => return,
        };

        if !encoded {
            error!(metric_name = action.stat(), "Failed to encode metric with non-finite value.");
            self.telemetry.track_encode_failed();
            return;
        }

        let payload = self.writer.payload();
        match self.sink.send(payload) {
            Ok(_) => {
                trace!(len = payload.len(), "Sent payload.");
                self.telemetry.track_packet_send_succeeded(payload.len());
            }
            Err(e) => {
                error!(error = %e, metric_name = action.stat(), "Failed to send payload.");
                self.telemetry.track_packet_send_failed(payload.len());
            }
        }
    }

    /// Decides whether a metric at the given sample rate should be sent.
    fn should_send(&mut self, sample_rate: SampleRate) -> bool {
        if !sample_rate.is_sampled() {
            return true;
        }

        let draw: f64 = self.rng.random();
        draw <= sample_rate.value()
    }
}

enum WorkerState {
    // Worker is parked, waiting for `run`.
    Idle(Worker),

    // Worker is running on its background thread, with the given generation.
    Running(JoinHandle<Worker>, u64),

    // Worker panicked, or its thread could not be spawned.
    Lost,
}

/// Queue of metric actions drained by a single background worker.
///
/// Producers only ever push to the queue, which never blocks: when a bounded queue is full, the action is dropped.
/// The worker owns the sink, so no I/O ever happens on a producer's thread.
pub(crate) struct Dispatcher {
    tx: Sender<Message>,
    worker: Mutex<WorkerState>,
    telemetry: Arc<Telemetry>,
}

impl Dispatcher {
    /// Creates a new `Dispatcher`.
    ///
    /// The worker is not started until [`Dispatcher::run`] is called. When `queue_capacity` is `None`, the queue is
    /// unbounded. A capacity of zero is raised to one.
    pub fn new(
        sink: Box<dyn MetricSink>,
        prefix: Option<String>,
        queue_capacity: Option<usize>,
        rng: Xoshiro256StarStar,
    ) -> Self {
        let (tx, rx) = match queue_capacity {
            None => unbounded(),
            Some(size) => bounded(size.max(1)),
        };

        let telemetry = Arc::new(Telemetry::default());
        let worker = Worker {
            rx,
            generation: 0,
            sink,
            writer: PayloadWriter::new(prefix),
            rng,
            telemetry: Arc::clone(&telemetry),
        };

        Dispatcher { tx, worker: Mutex::new(WorkerState::Idle(worker)), telemetry }
    }

    /// Returns the dispatcher telemetry.
    pub fn telemetry(&self) -> &Telemetry {
        &self.telemetry
    }

    /// Returns `true` if the background worker is currently running.
    pub fn is_running(&self) -> bool {
        matches!(&*self.worker.lock(), WorkerState::Running(handle, _) if !handle.is_finished())
    }

    /// Pushes an action to the back of the queue.
    ///
    /// Returns `false` if the action was dropped because the queue is full, or because the worker was lost.
    pub fn enqueue(&self, action: Action) -> bool {
        match self.tx.try_send(Message::Action(action)) {
            Ok(()) => {
                self.telemetry.track_enqueued();
                true
            }
            Err(TrySendError::Full(_)) => {
                trace!("Queue full, dropping action.");
                self.telemetry.track_queue_full();
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Starts the background worker.
    ///
    /// Calling this while the worker is already running does nothing. If the worker exited on its own after
    /// processing a `Stop` action, it is started again.
    ///
    /// # Errors
    ///
    /// If the worker thread cannot be spawned, or if a previous worker panicked, an error is returned.
    pub fn run(&self) -> Result<(), DispatchError> {
        let mut state = self.worker.lock();

        let mut worker = match std::mem::replace(&mut *state, WorkerState::Lost) {
            WorkerState::Idle(worker) => worker,
            WorkerState::Running(handle, generation) if !handle.is_finished() => {
                *state = WorkerState::Running(handle, generation);
                return Ok(());
            }
            WorkerState::Running(handle, _) => handle.join().map_err(|_| DispatchError::WorkerLost)?,
            WorkerState::Lost => return Err(DispatchError::WorkerLost),
        };

        worker.generation = worker.generation.wrapping_add(1);
        let generation = worker.generation;

        // The worker is handed back through the join handle when the thread exits, so it can be restarted later on.
        let handle = std::thread::Builder::new()
            .name(WORKER_THREAD_NAME.to_string())
            .spawn(move || worker.run())
            .map_err(DispatchError::Spawn)?;

        *state = WorkerState::Running(handle, generation);
        Ok(())
    }

    /// Stops the background worker, after every action enqueued so far has been processed.
    ///
    /// Actions enqueued after this call stay in the queue until the worker is started again, or until the dispatcher is
    /// dropped. Calling this while the worker is not running does nothing.
    ///
    /// # Errors
    ///
    /// If the worker panicked, an error is returned.
    pub fn stop(&self) -> Result<(), DispatchError> {
        let mut state = self.worker.lock();

        match std::mem::replace(&mut *state, WorkerState::Lost) {
            WorkerState::Idle(worker) => {
                *state = WorkerState::Idle(worker);
                Ok(())
            }
            WorkerState::Running(handle, generation) => {
                self.send_halt(&handle, generation);

                let worker = handle.join().map_err(|_| DispatchError::WorkerLost)?;
                *state = WorkerState::Idle(worker);
                Ok(())
            }
            WorkerState::Lost => Err(DispatchError::WorkerLost),
        }
    }

    // Blocks until the halt is queued, unless the worker exits first, in which case nothing is queued. A worker that
    // exited on its own leaves a full bounded queue behind, so the send cannot simply block.
    fn send_halt(&self, handle: &JoinHandle<Worker>, generation: u64) {
        let mut message = Message::Halt(generation);
        while !handle.is_finished() {
            match self.tx.send_timeout(message, HALT_RETRY_INTERVAL) {
                Ok(()) | Err(SendTimeoutError::Disconnected(_)) => return,
                Err(SendTimeoutError::Timeout(returned)) => message = returned,
            }
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        if let Err(e) = self.stop() {
            debug!(error = %e, "Dispatcher did not shut down cleanly.");
            return;
        }

        // Actions enqueued after an explicit stop are still pending, so send them from the dropping thread.
        if let WorkerState::Idle(worker) = self.worker.get_mut() {
            worker.flush();
        }
    }
}
