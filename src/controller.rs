//! Run orchestration: owns the sample buffer, starts workers for a transform
//! mode, fans their reports back in and publishes one spectrum per run.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::Receiver;

use crate::audio::buffer::{DataSink, ReadLock};
use crate::audio::format::AudioFormat;
use crate::config::EngineConfig;
use crate::error::{Result, TransformError};
use crate::transform::spectrum::normalize;
use crate::transform::{Band, CancelToken, SpectrumPoint, SpectrumResult};
use crate::worker::{
    self, DirectDft, DistributedDft, DistributedFft, Fft, FftExchange, ShardReport, SharedPeak,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransformMode {
    /// Direct DFT on one worker
    Dft,
    /// Direct DFT sharded by frequency bin
    DistributedDft,
    /// Radix-2 FFT on one worker
    Fft,
    /// Radix-2 FFT sharded by sample block
    DistributedFft,
}

impl TransformMode {
    pub const ALL: [TransformMode; 4] = [
        TransformMode::Dft,
        TransformMode::DistributedDft,
        TransformMode::Fft,
        TransformMode::DistributedFft,
    ];

    pub fn is_sharded(&self) -> bool {
        matches!(self, TransformMode::DistributedDft | TransformMode::DistributedFft)
    }

    pub fn worker_count(&self, config: &EngineConfig) -> usize {
        match self {
            TransformMode::Dft | TransformMode::Fft => 1,
            TransformMode::DistributedDft => config.dft_workers,
            TransformMode::DistributedFft => config.fft_workers,
        }
    }
}

impl fmt::Display for TransformMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TransformMode::Dft => "single-threaded DFT",
            TransformMode::DistributedDft => "distributed DFT",
            TransformMode::Fft => "single-threaded FFT",
            TransformMode::DistributedFft => "distributed FFT",
        };
        f.write_str(name)
    }
}

/// Reduction state shared by the shards of one run.
#[derive(Debug)]
pub struct RunState {
    pub peak: SharedPeak,
    reported: AtomicUsize,
    started: Instant,
}

impl RunState {
    fn new(started: Instant) -> Self {
        Self {
            peak: SharedPeak::new(),
            reported: AtomicUsize::new(0),
            started,
        }
    }

    /// Count one shard report; returns the number reported so far.
    fn record_report(&self) -> usize {
        self.reported.fetch_add(1, Ordering::AcqRel) + 1
    }

    pub fn reported(&self) -> usize {
        self.reported.load(Ordering::Acquire)
    }

    fn reset(&self) {
        self.peak.reset();
        self.reported.store(0, Ordering::Release);
    }
}

type ResultListener = Arc<dyn Fn(SpectrumResult) + Send + Sync>;
type FailureListener = Arc<dyn Fn(TransformError) + Send + Sync>;

#[derive(Clone, Default)]
struct Listeners {
    result: Option<ResultListener>,
    failure: Option<FailureListener>,
}

impl Listeners {
    fn publish(&self, result: SpectrumResult) {
        if let Some(listener) = &self.result {
            listener(result);
        }
    }

    fn fail(&self, error: TransformError) {
        if let Some(listener) = &self.failure {
            listener(error);
        }
    }
}

struct ActiveRun {
    mode: TransformMode,
    cancel: CancelToken,
    workers: Vec<JoinHandle<()>>,
    collector: Option<JoinHandle<()>>,
}

impl ActiveRun {
    fn is_running(&self) -> bool {
        self.workers.iter().any(|h| !h.is_finished())
            || self.collector.as_ref().is_some_and(|h| !h.is_finished())
    }

    fn join(mut self) {
        for handle in self.workers.drain(..).chain(self.collector.take()) {
            let name = handle.thread().name().unwrap_or("worker").to_string();
            if handle.join().is_err() {
                log::warn!("{} thread panicked during {}", name, self.mode);
            }
        }
    }
}

/// Drives transform runs over a shared sample buffer.
///
/// Runs are started with one of the `start_*` methods, complete in the
/// background and are delivered to the [`on_result`](Self::on_result)
/// listener. `clear()` cancels an in-flight run and empties the buffer.
pub struct Controller {
    config: EngineConfig,
    sink: DataSink,
    listeners: Listeners,
    active: Option<ActiveRun>,
}

impl Controller {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            sink: DataSink::new(),
            listeners: Listeners::default(),
            active: None,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Handle the decoder appends PCM bytes to.
    pub fn data_sink(&self) -> DataSink {
        self.sink.clone()
    }

    /// Called once per completed, non-cancelled run.
    pub fn on_result(&mut self, listener: impl Fn(SpectrumResult) + Send + Sync + 'static) {
        self.listeners.result = Some(Arc::new(listener));
    }

    /// Called when a run ends without a result for any reason other than cancellation.
    pub fn on_failure(&mut self, listener: impl Fn(TransformError) + Send + Sync + 'static) {
        self.listeners.failure = Some(Arc::new(listener));
    }

    pub fn is_running(&self) -> bool {
        self.active.as_ref().is_some_and(ActiveRun::is_running)
    }

    pub fn start_direct_dft(&mut self, format: AudioFormat) -> Result<()> {
        self.start(TransformMode::Dft, format)
    }

    pub fn start_distributed_dft(&mut self, format: AudioFormat) -> Result<()> {
        self.start(TransformMode::DistributedDft, format)
    }

    pub fn start_fft(&mut self, format: AudioFormat) -> Result<()> {
        self.start(TransformMode::Fft, format)
    }

    pub fn start_distributed_fft(&mut self, format: AudioFormat) -> Result<()> {
        self.start(TransformMode::DistributedFft, format)
    }

    /// Start one run in the background. Fails with `Busy` while a previous
    /// run is still in flight.
    pub fn start(&mut self, mode: TransformMode, format: AudioFormat) -> Result<()> {
        if self.is_running() {
            return Err(TransformError::Busy);
        }
        if let Some(finished) = self.active.take() {
            finished.join();
        }
        format.validate()?;

        let started = Instant::now();
        let (read_lock, bytes) = self.sink.begin_read()?;
        let samples: Arc<[f64]> = format.decode_mono(&bytes)?.into();

        let band = self.config.band();
        let shards = mode.worker_count(&self.config);
        let exchange = match mode {
            TransformMode::DistributedFft => Some(Arc::new(FftExchange::new(samples.len(), shards)?)),
            _ => None,
        };

        log::info!(
            "Starting {} over {} samples ({}) with {} worker(s)",
            mode,
            samples.len(),
            format,
            shards
        );

        let cancel = CancelToken::new();
        let state = Arc::new(RunState::new(started));
        let (tx, rx) = crossbeam_channel::unbounded();

        let mut workers = Vec::with_capacity(shards);
        for shard in 0..shards {
            let samples = samples.clone();
            let token = cancel.clone();
            let reports = tx.clone();
            let spawned = match mode {
                TransformMode::Dft => worker::spawn(
                    "dft-worker".into(),
                    shard,
                    DirectDft::new(format, band),
                    samples,
                    token,
                    reports,
                ),
                TransformMode::Fft => worker::spawn(
                    "fft-worker".into(),
                    shard,
                    Fft::new(format, band),
                    samples,
                    token,
                    reports,
                ),
                TransformMode::DistributedDft => worker::spawn(
                    format!("dft-shard-{shard}"),
                    shard,
                    DistributedDft::new(format, band, shard, shards, state.peak.clone()),
                    samples,
                    token,
                    reports,
                ),
                TransformMode::DistributedFft => match &exchange {
                    Some(exchange) => worker::spawn(
                        format!("fft-shard-{shard}"),
                        shard,
                        DistributedFft::new(format, band, shard, exchange.clone(), state.peak.clone()),
                        samples,
                        token,
                        reports,
                    ),
                    None => Err(std::io::Error::other("missing FFT exchange")),
                },
            };

            match spawned {
                Ok(handle) => workers.push(handle),
                Err(e) => {
                    cancel.cancel();
                    if let Some(exchange) = &exchange {
                        exchange.abandon();
                    }
                    drop(tx);
                    ActiveRun {
                        mode,
                        cancel,
                        workers,
                        collector: None,
                    }
                    .join();
                    return Err(TransformError::ShardFailed {
                        shard,
                        reason: format!("failed to spawn worker thread: {e}"),
                    });
                }
            }
        }
        // Only workers hold senders now, so a dead worker shows up as a disconnect.
        drop(tx);

        let fan_in = FanIn {
            mode,
            band,
            shards,
            state,
            cancel: cancel.clone(),
            listeners: self.listeners.clone(),
            _read_lock: read_lock,
        };
        let collector = thread::Builder::new()
            .name("spectra-collector".into())
            .spawn(move || fan_in.run(rx));

        let collector = match collector {
            Ok(handle) => Some(handle),
            Err(e) => {
                cancel.cancel();
                ActiveRun {
                    mode,
                    cancel,
                    workers,
                    collector: None,
                }
                .join();
                return Err(TransformError::ShardFailed {
                    shard: 0,
                    reason: format!("failed to spawn collector thread: {e}"),
                });
            }
        };

        self.active = Some(ActiveRun {
            mode,
            cancel,
            workers,
            collector,
        });
        Ok(())
    }

    /// Block until the current run, if any, has finished.
    pub fn wait(&mut self) {
        if let Some(run) = self.active.take() {
            run.join();
        }
    }

    /// Cancel any in-flight run, wait for its workers and empty the buffer.
    pub fn clear(&mut self) {
        if let Some(run) = self.active.take() {
            if run.is_running() {
                log::debug!("Cancelling {}", run.mode);
            }
            run.cancel.cancel();
            run.join();
        }
        if let Err(e) = self.sink.truncate() {
            log::warn!("Could not reset sample buffer: {}", e);
        }
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        if let Some(run) = self.active.take() {
            run.cancel.cancel();
            run.join();
        }
    }
}

/// Collects exactly one report per worker and finalizes the run.
struct FanIn {
    mode: TransformMode,
    band: Band,
    shards: usize,
    state: Arc<RunState>,
    cancel: CancelToken,
    listeners: Listeners,
    _read_lock: ReadLock,
}

impl FanIn {
    fn run(self, reports: Receiver<ShardReport>) {
        // Combined storage indexed by `hz - band.min_hz`; shards fill disjoint slots.
        let mut combined: Vec<Option<f64>> = vec![None; self.band.span()];
        let mut single: Option<Vec<SpectrumPoint>> = None;
        let mut cancelled = false;
        let mut failure: Option<TransformError> = None;

        while self.state.reported() < self.shards {
            let report = match reports.recv() {
                Ok(report) => report,
                Err(_) => {
                    self.cancel.cancel();
                    failure.get_or_insert(TransformError::ShardFailed {
                        shard: self.state.reported(),
                        reason: "worker exited without reporting".into(),
                    });
                    break;
                }
            };
            self.state.record_report();

            match report.outcome {
                Ok(points) if self.mode.is_sharded() => {
                    for point in points {
                        if let Some(slot) = self.band.offset(point.frequency_hz as u32) {
                            combined[slot] = Some(point.amplitude);
                        }
                    }
                }
                Ok(points) => single = Some(points),
                Err(TransformError::Cancelled) => cancelled = true,
                Err(e) => {
                    log::debug!("Shard {} of {} failed: {}", report.shard, self.mode, e);
                    if failure.is_none() {
                        // No result is possible now; stop the remaining shards.
                        self.cancel.cancel();
                        failure = Some(e);
                    }
                }
            }
        }
        drop(reports);

        if let Some(error) = failure {
            log::warn!("{} aborted: {}", self.mode, error);
            self.listeners.fail(error);
            return;
        }
        if cancelled || self.cancel.is_cancelled() {
            log::debug!("{} cancelled, discarding partial results", self.mode);
            return;
        }

        let points = if self.mode.is_sharded() {
            let mut points: Vec<SpectrumPoint> = combined
                .iter()
                .enumerate()
                .filter_map(|(i, amplitude)| {
                    amplitude.map(|a| SpectrumPoint::new((self.band.min_hz as usize + i) as f64, a))
                })
                .collect();
            normalize(&mut points, self.state.peak.get());
            points
        } else {
            single.unwrap_or_default()
        };

        let result = SpectrumResult {
            points,
            elapsed_seconds: self.state.started.elapsed().as_secs_f64(),
        };
        self.state.reset();

        log::info!(
            "{} finished in {:.4}s ({} points)",
            self.mode,
            result.elapsed_seconds,
            result.points.len()
        );
        self.listeners.publish(result);
    }
}
