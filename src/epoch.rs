//! Cluster epoch and the epoch-gated retry policy.
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

/// クラスタ構成のバージョン番号。
///
/// メンバ構成が変わるたびに単調増加する。
pub type Epoch = u32;

/// Decides whether a stalled exchange issued at a given epoch is still
/// worth retrying.
pub trait EpochOracle: Send + Sync + 'static {
    /// Returns `true` while the cluster view of `epoch` justifies retrying a
    /// transient timeout.
    fn needs_retry(&self, epoch: Epoch) -> bool;
}

/// The epoch of the local node's current cluster view.
///
/// Retrying is allowed while the epoch of a request is still the current one
/// and the node is not shutting down.
#[derive(Debug, Clone)]
pub struct ClusterEpoch {
    current: Arc<AtomicU32>,
    shutdown: Arc<AtomicBool>,
}
impl ClusterEpoch {
    /// 新しい`ClusterEpoch`インスタンスを生成する。
    pub fn new(epoch: Epoch) -> Self {
        ClusterEpoch {
            current: Arc::new(AtomicU32::new(epoch)),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// 現在のエポックを返す。
    pub fn current(&self) -> Epoch {
        self.current.load(Ordering::SeqCst)
    }

    /// Moves to the next epoch and returns it.
    ///
    /// The epoch wraps around to zero after `Epoch::max_value()`.
    pub fn increment(&self) -> Epoch {
        self.current.fetch_add(1, Ordering::SeqCst).wrapping_add(1)
    }

    /// Marks the local node as shutting down; no further retries are allowed.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}
impl EpochOracle for ClusterEpoch {
    fn needs_retry(&self, epoch: Epoch) -> bool {
        !self.shutdown.load(Ordering::SeqCst) && self.current() == epoch
    }
}

/// Retry policy handed to the transport primitives and the wait loop.
#[derive(Clone)]
pub struct RetryPolicy {
    epoch: Epoch,
    max_retries: usize,
    oracle: Arc<dyn EpochOracle>,
}
impl RetryPolicy {
    /// 新しい`RetryPolicy`インスタンスを生成する。
    pub fn new(epoch: Epoch, max_retries: usize, oracle: Arc<dyn EpochOracle>) -> Self {
        RetryPolicy {
            epoch,
            max_retries,
            oracle,
        }
    }

    /// Returns the epoch the request was issued at.
    pub fn epoch(&self) -> Epoch {
        self.epoch
    }

    /// Returns the retry budget.
    pub fn max_retries(&self) -> usize {
        self.max_retries
    }

    /// Returns `true` if a transient timeout may be retried for now.
    pub fn needs_retry(&self) -> bool {
        self.oracle.needs_retry(self.epoch)
    }
}
impl fmt::Debug for RetryPolicy {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "RetryPolicy {{ epoch: {}, max_retries: {}, .. }}",
            self.epoch, self.max_retries
        )
    }
}
