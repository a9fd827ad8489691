//! Transform workers. Each worker instance runs on its own thread for the
//! duration of one run and reports exactly once.

pub mod dft;
pub mod distributed_dft;
pub mod distributed_fft;
pub mod fft;
pub mod shard;

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::Sender;

use crate::error::Result;
use crate::transform::{CancelToken, SpectrumPoint};

pub use dft::DirectDft;
pub use distributed_dft::DistributedDft;
pub use distributed_fft::{DistributedFft, FftExchange};
pub use fft::Fft;
pub use shard::{ShardAssignment, SharedPeak};

/// One unit of transform work over the run's decoded samples.
pub trait SpectrumWorker: Send + 'static {
    /// Compute this worker's points in ascending frequency order.
    ///
    /// Single workers return normalized amplitudes; shards return raw
    /// magnitudes and publish their peak through a [`SharedPeak`].
    fn compute(&self, samples: &[f64], cancel: &CancelToken) -> Result<Vec<SpectrumPoint>>;
}

/// What a worker sends back to the controller when it exits.
#[derive(Debug)]
pub struct ShardReport {
    pub shard: usize,
    pub outcome: Result<Vec<SpectrumPoint>>,
}

/// Start `worker` on a dedicated named thread.
pub fn spawn<W: SpectrumWorker>(
    name: String,
    shard: usize,
    worker: W,
    samples: Arc<[f64]>,
    cancel: CancelToken,
    reports: Sender<ShardReport>,
) -> std::io::Result<JoinHandle<()>> {
    thread::Builder::new().name(name).spawn(move || {
        let outcome = worker.compute(&samples, &cancel);
        // The collector only goes away after every report arrived or the run was torn down.
        let _ = reports.send(ShardReport { shard, outcome });
    })
}
