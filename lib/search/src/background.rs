// Background job worker in the style of Redis BIO: a FIFO queue drained by a
// dedicated thread, so CPU-bound work like an index rebuild never runs on a
// query thread.

use crate::state::{RebuildReport, SearchState};
use cinex_storage::{BuildError, EntitySource};
use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use tracing::{debug, error, info};

/// A unit of work for the background thread
pub trait BackgroundJob: Send + 'static {
    fn execute(self: Box<Self>);

    fn name(&self) -> &'static str;
}

struct JobQueue {
    jobs: Mutex<VecDeque<Box<dyn BackgroundJob>>>,
    condvar: Condvar,
    running: AtomicBool,
}

/// One worker thread with its job queue.
///
/// Dropping the worker stops it once the queue is drained; the thread is not joined.
pub struct BackgroundWorker {
    queue: Arc<JobQueue>,
    processed: Arc<AtomicU64>,
}

impl BackgroundWorker {
    pub fn spawn(name: &str) -> std::io::Result<Self> {
        let queue = Arc::new(JobQueue {
            jobs: Mutex::new(VecDeque::new()),
            condvar: Condvar::new(),
            running: AtomicBool::new(true),
        });
        let processed = Arc::new(AtomicU64::new(0));

        let thread_queue = queue.clone();
        let thread_processed = processed.clone();
        thread::Builder::new()
            .name(name.to_string())
            .spawn(move || run(thread_queue, thread_processed))?;

        Ok(Self { queue, processed })
    }

    /// Queue a job. Returns false, dropping the job, once the worker is shut down.
    pub fn submit(&self, job: Box<dyn BackgroundJob>) -> bool {
        let mut jobs = self.queue.jobs.lock();
        if !self.queue.running.load(Ordering::Acquire) {
            return false;
        }
        debug!("Queued background job {}", job.name());
        jobs.push_back(job);
        self.queue.condvar.notify_one();
        true
    }

    pub fn pending_jobs(&self) -> usize {
        self.queue.jobs.lock().len()
    }

    pub fn jobs_processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn shutdown(&self) {
        let _jobs = self.queue.jobs.lock();
        self.queue.running.store(false, Ordering::Release);
        self.queue.condvar.notify_all();
    }
}

impl Drop for BackgroundWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run(queue: Arc<JobQueue>, processed: Arc<AtomicU64>) {
    loop {
        let mut jobs = queue.jobs.lock();
        while jobs.is_empty() && queue.running.load(Ordering::Acquire) {
            queue.condvar.wait(&mut jobs);
        }

        // Remaining jobs still run after shutdown
        let Some(job) = jobs.pop_front() else {
            break;
        };
        drop(jobs);

        let name = job.name();
        if panic::catch_unwind(AssertUnwindSafe(|| job.execute())).is_err() {
            error!("Background job {} panicked", name);
        }
        processed.fetch_add(1, Ordering::Relaxed);
    }
    debug!("Background worker stopped");
}

// Clears the "rebuild in progress" flag however the job ends.
struct RebuildFlag(Arc<AtomicBool>);

impl Drop for RebuildFlag {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

/// Build a fresh snapshot from the source, persist it and swap it in
pub struct RebuildJob {
    state: Arc<SearchState>,
    source: Arc<dyn EntitySource>,
    reply: mpsc::Sender<Result<RebuildReport, BuildError>>,
    _flag: RebuildFlag,
}

impl RebuildJob {
    pub(crate) fn new(
        state: Arc<SearchState>,
        source: Arc<dyn EntitySource>,
        reply: mpsc::Sender<Result<RebuildReport, BuildError>>,
        rebuilding: Arc<AtomicBool>,
    ) -> Self {
        Self {
            state,
            source,
            reply,
            _flag: RebuildFlag(rebuilding),
        }
    }
}

impl BackgroundJob for RebuildJob {
    fn execute(self: Box<Self>) {
        let RebuildJob {
            state,
            source,
            reply,
            _flag: flag,
        } = *self;

        let result = state.rebuild(source.as_ref());
        // Cleared before replying so a waiter never sees a stale flag
        drop(flag);

        match &result {
            Ok(report) => info!(
                "Background rebuild finished: {} entities in {:?}",
                report.header.rows, report.elapsed
            ),
            Err(e) => error!("Background rebuild failed: {}", e),
        }
        // The caller may have dropped its ticket
        let _ = reply.send(result);
    }

    fn name(&self) -> &'static str {
        "index-rebuild"
    }
}
