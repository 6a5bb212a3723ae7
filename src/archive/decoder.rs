//! Concurrent walk over an archive tree.
//!
//! The walk is a fan-out over a shared frontier of [`Accessor`]s:
//!
//! - every push onto the frontier increments a join counter
//! - a decode task pushes the children it discovers *before* it completes
//! - completing a task decrements the counter; when it reaches zero the
//!   frontier is closed, which ends the dispatch loop
//!
//! A semaphore bounds the number of decode tasks in flight. Failures are
//! isolated per node: a node that fails to decode is reported in
//! [`WalkReport::failures`] and its siblings keep going.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::error::{DecodeError, Result};

use super::decompress::{BlockDecompressor, ZlibDecompressor};
use super::parser::ListingParser;
use super::{Accessor, DirectoryEntry, Listing};

/// Decides which entries of a decoded listing are nested listings.
pub trait NestedListing: Send + Sync + fmt::Debug {
    /// Accessor for `entry` when it holds a nested listing, `None` otherwise.
    fn child(&self, parent: &Accessor, entry: &DirectoryEntry) -> Option<Result<Accessor>>;
}

/// Treats every entry whose name starts with a prefix as a nested listing
/// stored in the parent's payload.
#[derive(Debug, Clone)]
pub struct NamePrefix(pub String);

impl NestedListing for NamePrefix {
    fn child(&self, parent: &Accessor, entry: &DirectoryEntry) -> Option<Result<Accessor>> {
        entry
            .name
            .starts_with(&self.0)
            .then(|| Ok(parent.derive_child(entry.clone())))
    }
}

/// Shared cancellation signal for a walk.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }

    /// Fail with [`DecodeError::Cancelled`] once cancelled.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(DecodeError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Walk configuration
#[derive(Debug, Clone)]
pub struct DecoderConfig {
    /// Maximum number of decode tasks in flight
    pub concurrency: usize,
    /// Nested listing discovery, disabled when `None`
    pub nested: Option<Arc<dyn NestedListing>>,
    pub cancel: CancelFlag,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        let concurrency = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        Self {
            concurrency,
            nested: None,
            cancel: CancelFlag::default(),
        }
    }
}

/// A node that failed to decode
#[derive(Debug)]
pub struct ListingFailure {
    /// Name of the node's self entry
    pub name: String,
    pub level: u32,
    pub error: DecodeError,
}

impl fmt::Display for ListingFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (level {}): {}", self.name, self.level, self.error)
    }
}

/// Outcome of a full walk
#[derive(Debug, Default)]
pub struct WalkReport {
    /// Decoded listings, in completion order
    pub listings: Vec<Listing>,
    pub failures: Vec<ListingFailure>,
    /// Highest number of decode tasks observed running at once
    pub peak_in_flight: usize,
}

impl WalkReport {
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Decodes an accessor tree into listings.
#[derive(Debug, Clone)]
pub struct ListingDecoder {
    config: DecoderConfig,
    decompressor: Arc<dyn BlockDecompressor>,
}

impl ListingDecoder {
    pub fn new(config: DecoderConfig) -> Self {
        Self {
            config,
            decompressor: Arc::new(ZlibDecompressor),
        }
    }

    /// Replace the block decompressor used by every decode task.
    pub fn with_decompressor(mut self, decompressor: Arc<dyn BlockDecompressor>) -> Self {
        self.decompressor = decompressor;
        self
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    /// Decode `root` and every nested listing discovered beneath it.
    pub async fn decode(&self, root: Accessor) -> WalkReport {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let frontier = Arc::new(Frontier {
            sender: Mutex::new(Some(sender)),
            pending: AtomicUsize::new(0),
        });
        let results = Arc::new(Results::default());
        let live = Arc::new(LiveTasks::default());
        let permits = self.config.concurrency.clamp(1, Semaphore::MAX_PERMITS);
        let semaphore = Arc::new(Semaphore::new(permits));

        frontier.push(root);

        let mut tasks = JoinSet::new();

        while let Some(accessor) = receiver.recv().await {
            if self.config.cancel.is_cancelled() {
                results.fail(&accessor, DecodeError::Cancelled);
                frontier.complete();
                continue;
            }

            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                break;
            };

            let task = DecodeTask {
                accessor,
                decompressor: self.decompressor.clone(),
                nested: self.config.nested.clone(),
                cancel: self.config.cancel.clone(),
                frontier: frontier.clone(),
                results: results.clone(),
                live: live.clone(),
            };

            tasks.spawn_blocking(move || {
                let _permit = permit;
                task.run();
            });
        }

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                error!("decode task did not finish: {e}");
            }
        }

        let report = WalkReport {
            listings: take(&results.listings),
            failures: take(&results.failures),
            peak_in_flight: live.peak.load(Ordering::Acquire),
        };
        info!(
            listings = report.listings.len(),
            failures = report.failures.len(),
            peak_in_flight = report.peak_in_flight,
            "archive walk finished"
        );
        report
    }
}

fn take<T>(items: &Mutex<Vec<T>>) -> Vec<T> {
    std::mem::take(&mut *items.lock().unwrap_or_else(PoisonError::into_inner))
}

/// Accessors waiting to be decoded, plus the join counter
#[derive(Debug)]
struct Frontier {
    sender: Mutex<Option<mpsc::UnboundedSender<Accessor>>>,
    /// Accessors pushed but not yet completed
    pending: AtomicUsize,
}

impl Frontier {
    fn push(&self, accessor: Accessor) {
        let sender = self.sender.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(sender) = sender.as_ref() {
            self.pending.fetch_add(1, Ordering::AcqRel);
            if sender.send(accessor).is_err() {
                self.pending.fetch_sub(1, Ordering::AcqRel);
            }
        }
    }

    fn complete(&self) {
        if self.pending.fetch_sub(1, Ordering::AcqRel) == 1 {
            // last outstanding accessor: nothing can push any more
            self.sender
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
        }
    }
}

/// Marks a task's accessor complete even if the task unwinds
struct Completion(Arc<Frontier>);

impl Drop for Completion {
    fn drop(&mut self) {
        self.0.complete();
    }
}

#[derive(Debug, Default)]
struct Results {
    listings: Mutex<Vec<Listing>>,
    failures: Mutex<Vec<ListingFailure>>,
}

impl Results {
    fn publish(&self, listing: Listing) {
        self.listings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(listing);
    }

    fn fail(&self, accessor: &Accessor, error: DecodeError) {
        let entry = accessor.entry();
        warn!(name = %entry.name, level = accessor.level(), "listing decode failed: {error}");
        self.push_failure(ListingFailure {
            name: entry.name.clone(),
            level: accessor.level(),
            error,
        });
    }

    fn push_failure(&self, failure: ListingFailure) {
        self.failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(failure);
    }
}

#[derive(Debug, Default)]
struct LiveTasks {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl LiveTasks {
    fn enter(self: &Arc<Self>) -> LiveGuard {
        let now = self.current.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak.fetch_max(now, Ordering::AcqRel);
        LiveGuard(self.clone())
    }
}

struct LiveGuard(Arc<LiveTasks>);

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.current.fetch_sub(1, Ordering::AcqRel);
    }
}

struct DecodeTask {
    accessor: Accessor,
    decompressor: Arc<dyn BlockDecompressor>,
    nested: Option<Arc<dyn NestedListing>>,
    cancel: CancelFlag,
    frontier: Arc<Frontier>,
    results: Arc<Results>,
    live: Arc<LiveTasks>,
}

impl DecodeTask {
    fn run(self) {
        let _done = Completion(self.frontier.clone());
        let _live = self.live.enter();

        let name = self.accessor.entry().name.clone();
        let level = self.accessor.level();
        debug!(%name, level, "decoding listing");

        if let Err(panic) = catch_unwind(AssertUnwindSafe(|| self.decode())) {
            let reason = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "panic".to_string());
            error!(%name, level, "decode task panicked: {reason}");
            self.results.push_failure(ListingFailure {
                name,
                level,
                error: DecodeError::TaskFailed(reason),
            });
        }
    }

    fn decode(&self) {
        let parser = ListingParser::new(self.decompressor.as_ref(), &self.cancel);
        let listing = match parser.parse(&self.accessor) {
            Ok(listing) => listing,
            Err(e) => {
                self.results.fail(&self.accessor, e);
                return;
            }
        };

        if let Some(nested) = &self.nested {
            for entry in &listing.entries {
                match nested.child(&self.accessor, entry) {
                    Some(Ok(child)) => self.frontier.push(child),
                    Some(Err(e)) => self.results.push_failure(ListingFailure {
                        name: entry.name.clone(),
                        level: self.accessor.level() + 1,
                        error: e,
                    }),
                    None => {}
                }
            }
        }

        self.results.publish(listing);
    }
}
