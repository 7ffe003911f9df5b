use crate::background::{BackgroundWorker, RebuildJob};
use crate::config::SearchConfig;
use crate::encoder::{encode_with_timeout, TextEncoder};
use crate::error::QueryError;
use crate::resolver::TitleResolver;
use crate::retriever::{validate_description, Retriever, ScoredEntity};
use cinex_core::{EntityRecord, VectorComposer};
use cinex_storage::{ArtifactHeader, BuildError, CorpusSnapshot, EntitySource, IndexStore};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] cinex_core::Error),

    #[error("Index unavailable: {0}")]
    Build(#[from] BuildError),

    #[error("Failed to start background worker: {0}")]
    Worker(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum RebuildError {
    #[error(transparent)]
    Build(#[from] BuildError),

    #[error("Rebuild worker stopped before reporting a result")]
    WorkerGone,
}

/// Outcome of a completed rebuild
#[derive(Debug, Clone)]
pub struct RebuildReport {
    pub header: ArtifactHeader,
    pub elapsed: Duration,
    /// False when the new snapshot is served but could not be written to disk
    pub persisted: bool,
}

/// Handle on a rebuild running on the background worker
#[derive(Debug)]
pub struct RebuildTicket {
    receiver: mpsc::Receiver<Result<RebuildReport, BuildError>>,
}

impl RebuildTicket {
    /// Block until the rebuild finishes
    pub fn wait(self) -> Result<RebuildReport, RebuildError> {
        match self.receiver.recv() {
            Ok(result) => result.map_err(RebuildError::from),
            Err(_) => Err(RebuildError::WorkerGone),
        }
    }

    /// `None` while the rebuild is still running after `timeout`
    pub fn wait_timeout(&self, timeout: Duration) -> Option<Result<RebuildReport, RebuildError>> {
        match self.receiver.recv_timeout(timeout) {
            Ok(result) => Some(result.map_err(RebuildError::from)),
            Err(RecvTimeoutError::Timeout) => None,
            Err(RecvTimeoutError::Disconnected) => Some(Err(RebuildError::WorkerGone)),
        }
    }
}

/// Everything a query needs, constructed once at startup and shared by callers.
///
/// Queries clone the current snapshot `Arc` under a short read lock and run
/// against it; a rebuild swaps in a new snapshot without disturbing them.
pub struct SearchState {
    snapshot: RwLock<Arc<CorpusSnapshot>>,
    store: IndexStore,
    encoder: Arc<dyn TextEncoder>,
    config: SearchConfig,
    resolver: TitleResolver,
    rebuilding: Arc<AtomicBool>,
    worker: BackgroundWorker,
}

impl SearchState {
    /// Load the persisted corpus, rebuilding it from `source` when needed
    pub fn open(
        config: SearchConfig,
        source: &dyn EntitySource,
        encoder: Arc<dyn TextEncoder>,
    ) -> Result<Self, StartupError> {
        config.validate()?;
        let composer = Arc::new(VectorComposer::new(config.composer.clone())?);
        let store = IndexStore::new(config.artifact_paths(), composer);
        let snapshot = store.load_or_build(source)?;
        Self::with_snapshot(config, store, snapshot, encoder)
    }

    pub fn with_snapshot(
        config: SearchConfig,
        store: IndexStore,
        snapshot: CorpusSnapshot,
        encoder: Arc<dyn TextEncoder>,
    ) -> Result<Self, StartupError> {
        let worker = BackgroundWorker::spawn("cinex-rebuild")?;
        info!(
            "Serving {} entities (build {})",
            snapshot.len(),
            snapshot.header().build_id
        );
        Ok(Self {
            snapshot: RwLock::new(Arc::new(snapshot)),
            store,
            encoder,
            resolver: TitleResolver::new(config.title_cutoff),
            config,
            rebuilding: Arc::new(AtomicBool::new(false)),
            worker,
        })
    }

    #[inline]
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    #[inline]
    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    /// The snapshot current at the time of the call
    pub fn snapshot(&self) -> Arc<CorpusSnapshot> {
        self.snapshot.read().clone()
    }

    /// Replace the served snapshot, returning the previous one
    pub fn swap(&self, snapshot: CorpusSnapshot) -> Arc<CorpusSnapshot> {
        let next = Arc::new(snapshot);
        let previous = std::mem::replace(&mut *self.snapshot.write(), next);
        debug!("Swapped out build {}", previous.header().build_id);
        previous
    }

    /// Build, persist and swap on the calling thread
    pub fn rebuild(&self, source: &dyn EntitySource) -> Result<RebuildReport, BuildError> {
        let start = Instant::now();
        let snapshot = self.store.build(source)?;

        let persisted = match self.store.persist(&snapshot) {
            Ok(()) => true,
            Err(e) => {
                warn!("Rebuilt index could not be persisted: {}", e);
                false
            }
        };

        let header = snapshot.header().clone();
        self.swap(snapshot);
        let report = RebuildReport {
            header,
            elapsed: start.elapsed(),
            persisted,
        };
        info!(
            "Rebuilt index with {} entities (build {})",
            report.header.rows, report.header.build_id
        );
        Ok(report)
    }

    /// Queue a rebuild on the background worker.
    ///
    /// Returns `None` when a rebuild is already in progress.
    pub fn rebuild_in_background(self: &Arc<Self>, source: Arc<dyn EntitySource>) -> Option<RebuildTicket> {
        if self
            .rebuilding
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Rebuild already in progress");
            return None;
        }

        let (tx, rx) = mpsc::channel();
        let job = RebuildJob::new(self.clone(), source, tx, self.rebuilding.clone());
        if !self.worker.submit(Box::new(job)) {
            warn!("Background worker is shut down, rebuild not queued");
            return None;
        }
        Some(RebuildTicket { receiver: rx })
    }

    pub fn is_rebuilding(&self) -> bool {
        self.rebuilding.load(Ordering::Acquire)
    }

    pub fn find_by_similarity(&self, entity_id: u64, k: usize) -> Result<Vec<ScoredEntity>, QueryError> {
        let snapshot = self.snapshot();
        Retriever::new(&snapshot).find_by_similarity(entity_id, k)
    }

    pub fn find_by_id(&self, entity_id: u64) -> Result<Arc<EntityRecord>, QueryError> {
        let snapshot = self.snapshot();
        Retriever::new(&snapshot).find_by_id(entity_id)
    }

    /// Rank entities by how well their summary matches free text.
    ///
    /// The encoder call is bounded by the configured timeout.
    pub fn find_by_description(&self, text: &str, k: usize) -> Result<Vec<ScoredEntity>, QueryError> {
        let text = validate_description(text)?;
        let snapshot = self.snapshot();
        let retriever = Retriever::new(&snapshot);
        retriever.ensure_summaries()?;

        let query = encode_with_timeout(self.encoder.clone(), text, self.config.encoder_timeout())?;
        retriever.find_by_summary_embedding(&query, k)
    }

    /// Resolve a title with the configured cutoff
    pub fn resolve_title(&self, title: &str) -> Result<u64, QueryError> {
        let snapshot = self.snapshot();
        self.resolver.resolve(snapshot.metadata(), title)
    }

    pub fn resolve_title_with_cutoff(&self, title: &str, cutoff: u8) -> Result<u64, QueryError> {
        let snapshot = self.snapshot();
        TitleResolver::new(cutoff).resolve(snapshot.metadata(), title)
    }
}
