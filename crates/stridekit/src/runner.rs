//! Task execution: the capability the engine uses to run partitions concurrently.
//!
//! Purpose
//! - Decouple the engine from any particular concurrency primitive. The engine
//!   only needs "submit these jobs, then await each of them".
//!
//! Contract
//! - `run_all` begins every job without blocking on any single one, then awaits
//!   all of them and returns one status per job in submission order.
//! - `run_all` never returns or unwinds while a job is still running. Jobs may
//!   therefore borrow caller-owned buffers for `'env`.
//! - A failed job never undoes its own side effects or those of its siblings.
//!
//! Implementations
//! - `WorkerPool`: fixed number of persistent threads (default).
//! - `ScopedThreads`: one scoped OS thread per job.
//! - `Inline`: runs jobs on the calling thread, in order.

use std::panic::{self, AssertUnwindSafe};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::Mutex;
use tracing::{debug, trace, warn};

use crate::cfg::EngineCfg;
pub use crate::error::TaskError;

/// Outcome of one job.
pub type TaskStatus = std::result::Result<(), TaskError>;

/// A unit of work that may borrow from the caller for `'env`.
pub type Job<'env> = Box<dyn FnOnce() -> TaskStatus + Send + 'env>;

type StaticJob = Job<'static>;

/// Something that can run a batch of jobs concurrently and await them.
pub trait TaskRunner: Send + Sync {
    /// Number of execution contexts (threads) available.
    fn worker_count(&self) -> usize;

    /// Submit every job, then await each one. Returns statuses in submission
    /// order, and only after all jobs have finished or been dropped unrun.
    fn run_all<'env>(&self, jobs: Vec<Job<'env>>) -> Vec<TaskStatus>;
}

fn run_guarded(job: Job<'_>) -> TaskStatus {
    match panic::catch_unwind(AssertUnwindSafe(job)) {
        Ok(status) => status,
        Err(payload) => Err(TaskError::from_panic(payload)),
    }
}

/// Runs jobs synchronously on the calling thread.
#[derive(Clone, Copy, Debug, Default)]
pub struct Inline;

impl TaskRunner for Inline {
    fn worker_count(&self) -> usize {
        1
    }

    fn run_all<'env>(&self, jobs: Vec<Job<'env>>) -> Vec<TaskStatus> {
        jobs.into_iter().map(run_guarded).collect()
    }
}

/// Spawns one scoped OS thread per job and joins them all.
#[derive(Clone, Copy, Debug, Default)]
pub struct ScopedThreads;

impl TaskRunner for ScopedThreads {
    fn worker_count(&self) -> usize {
        thread::available_parallelism().map_or(1, |n| n.get())
    }

    fn run_all<'env>(&self, jobs: Vec<Job<'env>>) -> Vec<TaskStatus> {
        thread::scope(|s| {
            let handles: Vec<_> = jobs
                .into_iter()
                .map(|job| thread::Builder::new().spawn_scoped(s, move || run_guarded(job)))
                .collect();
            handles
                .into_iter()
                .map(|h| match h {
                    Ok(h) => h.join().unwrap_or_else(|p| Err(TaskError::from_panic(p))),
                    Err(e) => Err(TaskError::Spawn(e.to_string())),
                })
                .collect()
        })
    }
}

struct Envelope {
    job: StaticJob,
    reply: mpsc::Sender<TaskStatus>,
}

struct PoolThreads {
    sender: mpsc::Sender<Envelope>,
    workers: Vec<JoinHandle<()>>,
}

impl PoolThreads {
    fn spawn(size: usize) -> std::io::Result<Self> {
        let (sender, receiver) = mpsc::channel::<Envelope>();
        let receiver = Arc::new(Mutex::new(receiver));
        let mut workers = Vec::with_capacity(size);
        for id in 0..size {
            let rx = Arc::clone(&receiver);
            let handle = thread::Builder::new()
                .name(format!("stridekit-worker-{id}"))
                .spawn(move || worker_loop(id, &rx))?;
            workers.push(handle);
        }
        debug!(workers = size, "worker pool started");
        Ok(Self { sender, workers })
    }
}

fn worker_loop(id: usize, rx: &Mutex<mpsc::Receiver<Envelope>>) {
    loop {
        // Lock only while taking the next envelope.
        let next = rx.lock().recv();
        let Ok(Envelope { job, reply }) = next else {
            trace!(worker = id, "worker exiting");
            return;
        };
        let status = run_guarded(job);
        let _ = reply.send(status);
    }
}

/// Handle to one submitted job.
struct TaskHandle {
    reply: mpsc::Receiver<TaskStatus>,
}

impl TaskHandle {
    /// Block until the job reports. Past `timeout` a warning is logged and the
    /// wait continues; what happens to a job that never finishes is
    /// implementation-defined, so callers must not rely on timeout-triggered
    /// cancellation.
    fn wait(&self, index: usize, timeout: Duration) -> TaskStatus {
        match self.reply.recv_timeout(timeout) {
            Ok(status) => status,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                warn!(task = index, ?timeout, "join timeout exceeded; still waiting");
                self.reply.recv().unwrap_or(Err(TaskError::Lost))
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(TaskError::Lost),
        }
    }
}

/// Fixed-size pool of persistent worker threads.
///
/// Threads are started on first use and joined when the pool is dropped.
/// Ownership replaces process-wide registration: whoever owns the pool (an
/// [`Engine`](crate::Engine), usually) decides its lifetime.
pub struct WorkerPool {
    size: usize,
    join_timeout: Duration,
    threads: Mutex<Option<PoolThreads>>,
}

impl WorkerPool {
    pub fn new(size: usize, join_timeout: Duration) -> Self {
        Self {
            size: size.max(1),
            join_timeout,
            threads: Mutex::new(None),
        }
    }

    pub fn from_cfg(cfg: &EngineCfg) -> Self {
        Self::new(cfg.tasks, cfg.join_timeout)
    }

    /// Whether worker threads have been started.
    pub fn is_started(&self) -> bool {
        self.threads.lock().is_some()
    }

    fn sender(&self) -> Result<mpsc::Sender<Envelope>, TaskError> {
        let mut guard = self.threads.lock();
        if guard.is_none() {
            let threads = PoolThreads::spawn(self.size).map_err(|e| TaskError::Spawn(e.to_string()))?;
            *guard = Some(threads);
        }
        match guard.as_ref() {
            Some(t) => Ok(t.sender.clone()),
            None => Err(TaskError::Lost),
        }
    }

    fn submit(sender: &mpsc::Sender<Envelope>, job: StaticJob) -> Result<TaskHandle, TaskError> {
        let (reply, rx) = mpsc::channel();
        sender
            .send(Envelope { job, reply })
            .map_err(|_| TaskError::Lost)?;
        Ok(TaskHandle { reply: rx })
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("size", &self.size)
            .field("join_timeout", &self.join_timeout)
            .field("started", &self.is_started())
            .finish()
    }
}

impl TaskRunner for WorkerPool {
    fn worker_count(&self) -> usize {
        self.size
    }

    fn run_all<'env>(&self, jobs: Vec<Job<'env>>) -> Vec<TaskStatus> {
        let sender = match self.sender() {
            Ok(s) => s,
            Err(e) => return jobs.iter().map(|_| Err(e.clone())).collect(),
        };
        let mut pending = Pending {
            handles: Vec::with_capacity(jobs.len()),
            joined: 0,
        };
        for job in jobs {
            // SAFETY: only the lifetime is erased. The handle is owned by
            // `pending`, which waits for every unjoined job on drop, so
            // neither a return nor an unwind leaves `run_all` while a job
            // still holds an `'env` borrow.
            let job: StaticJob = unsafe { std::mem::transmute::<Job<'env>, StaticJob>(job) };
            pending.handles.push(Self::submit(&sender, job));
        }
        let mut statuses = Vec::with_capacity(pending.handles.len());
        while pending.joined < pending.handles.len() {
            let i = pending.joined;
            let status = match &pending.handles[i] {
                Ok(h) => h.wait(i, self.join_timeout),
                Err(e) => Err(e.clone()),
            };
            pending.joined += 1;
            statuses.push(status);
        }
        drop(pending);
        for (i, status) in statuses.iter().enumerate() {
            trace!(task = i, ok = status.is_ok(), "task joined");
        }
        statuses
    }
}

/// Submitted jobs of one `run_all` call. Dropping it blocks until every job
/// not yet joined has reported.
struct Pending {
    handles: Vec<Result<TaskHandle, TaskError>>,
    joined: usize,
}

impl Drop for Pending {
    fn drop(&mut self) {
        for h in self.handles[self.joined..].iter().flatten() {
            // Returns once the job has reported or its envelope was dropped.
            let _ = h.reply.recv();
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        if let Some(PoolThreads { sender, workers }) = self.threads.get_mut().take() {
            drop(sender);
            for w in workers {
                let _ = w.join();
            }
            debug!(workers = self.size, "worker pool stopped");
        }
    }
}
