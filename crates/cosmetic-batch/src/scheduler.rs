//! Bounded worker pool and the batch control loop.
//!
//! # Architecture
//!
//! ```text
//!             control thread                      worker threads
//!   ┌──────────────────────────────┐     job     ┌────────────────┐
//!   │ queue ─► open ─► waiting ────┼────────────►│ slot 0  (rayon)│
//!   │                              │     job     ├────────────────┤
//!   │ finalize ◄── Finished slots ◄┼─────────────│ slot 1  (rayon)│
//!   │   (write output)             │  completion └────────────────┘
//!   └──────────────────────────────┘
//! ```
//!
//! Each worker owns a nested rayon pool for the row-parallel filters and
//! receives tasks over its own channel. Completions come back over one
//! shared channel. All file I/O happens on the control thread.
//!
//! # Cancellation
//!
//! Once the [`CancelToken`] is set, no file is opened and no task starts.
//! Running tasks stop at their next row check, waiting tasks are dropped
//! and nothing finished after that point is written. Targets left
//! unfinished are reported as canceled.

use crate::config::BatchConfig;
use crate::output::OutputNaming;
use crate::reference;
use crate::report::{BatchEvent, BatchObserver, BatchReport};
use crate::task::{Task, TaskContext, load_tasks, write_task};
use crate::{BatchError, BatchResult};
use cosmetic_io::{ImageCodec, IoResult, codec_for_path};
use cosmetic_ops::{CancelToken, OpsError};
use std::collections::VecDeque;
use std::path::Path;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Longest wait for a completion before the loop re-checks cancellation.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Worker slots and rayon threads per slot for `items` targets.
///
/// The pool never exceeds the item count; threads left over are shared
/// out as nested parallelism.
///
/// ```rust
/// use cosmetic_batch::scheduler::pool_budget;
///
/// assert_eq!(pool_budget(3, 8), (3, 2));
/// assert_eq!(pool_budget(100, 8), (8, 1));
/// assert_eq!(pool_budget(1, 8), (1, 8));
/// ```
pub fn pool_budget(items: usize, threads: usize) -> (usize, usize) {
    let threads = threads.max(1);
    let pool = items.min(threads).max(1);
    (pool, 1 + (threads - pool) / pool)
}

struct Job {
    item: usize,
    task: Task,
}

struct Completion {
    slot: usize,
    item: usize,
    task: Task,
    result: BatchResult<usize>,
}

enum Slot {
    Free,
    Running,
    Finished(Box<Completion>),
}

struct Worker {
    jobs: Option<Sender<Job>>,
    handle: Option<JoinHandle<()>>,
}

struct WorkerPool {
    workers: Vec<Worker>,
    done: Receiver<Completion>,
}

impl WorkerPool {
    fn spawn(size: usize, nested: usize, ctx: Arc<TaskContext>, cancel: &CancelToken) -> BatchResult<Self> {
        let (done_tx, done_rx) = mpsc::channel();
        let mut workers = Vec::with_capacity(size);
        for slot in 0..size {
            let (job_tx, job_rx) = mpsc::channel();
            let done = done_tx.clone();
            let ctx = Arc::clone(&ctx);
            let cancel = cancel.clone();
            let handle = thread::Builder::new()
                .name(format!("cosmetic-worker-{}", slot))
                .spawn(move || worker_loop(slot, nested, job_rx, done, &ctx, &cancel))
                .map_err(|e| BatchError::Fatal(format!("cannot start worker thread: {}", e)))?;
            workers.push(Worker {
                jobs: Some(job_tx),
                handle: Some(handle),
            });
        }
        Ok(Self {
            workers,
            done: done_rx,
        })
    }

    fn submit(&self, slot: usize, job: Job) -> BatchResult<()> {
        self.workers[slot]
            .jobs
            .as_ref()
            .and_then(|tx| tx.send(job).ok())
            .ok_or_else(|| BatchError::Fatal(format!("worker {} stopped", slot)))
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        for worker in &mut self.workers {
            worker.jobs.take();
        }
        for worker in &mut self.workers {
            if let Some(handle) = worker.handle.take() {
                if handle.join().is_err() {
                    warn!("Worker thread panicked");
                }
            }
        }
    }
}

fn worker_loop(
    slot: usize,
    nested: usize,
    jobs: Receiver<Job>,
    done: Sender<Completion>,
    ctx: &TaskContext,
    cancel: &CancelToken,
) {
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(nested)
        .thread_name(move |i| format!("cosmetic-{}-{}", slot, i))
        .build();
    let pool = match pool {
        Ok(p) => Some(p),
        Err(e) => {
            warn!(slot, error = %e, "Nested thread pool unavailable, using the global pool");
            None
        }
    };

    while let Ok(Job { item, mut task }) = jobs.recv() {
        let result = if cancel.is_canceled() {
            Err(BatchError::Ops(OpsError::Aborted))
        } else {
            match &pool {
                Some(p) => p.install(|| ctx.execute(&mut task, cancel)),
                None => ctx.execute(&mut task, cancel),
            }
        };
        let completion = Completion {
            slot,
            item,
            task,
            result,
        };
        if done.send(completion).is_err() {
            break;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ItemState {
    Queued,
    Active { pending: usize, failed: bool, canceled: bool },
    Succeeded,
    Skipped,
    Canceled,
}

struct RunState {
    items: Vec<ItemState>,
    queue: VecDeque<usize>,
    waiting: VecDeque<(usize, Task)>,
    slots: Vec<Slot>,
    aborting: bool,
    report: BatchReport,
}

impl RunState {
    fn running(&self) -> usize {
        self.slots.iter().filter(|s| !matches!(s, Slot::Free)).count()
    }

    fn free_slot(&self) -> Option<usize> {
        self.slots.iter().position(|s| matches!(s, Slot::Free))
    }

    fn skip(&mut self, item: usize) {
        self.items[item] = ItemState::Skipped;
        self.report.skipped += 1;
    }

    // One task of `item` is done; resolves the item after its last task.
    fn settle(&mut self, item: usize, failed_now: bool, canceled_now: bool) {
        let ItemState::Active { pending, failed, canceled } = self.items[item] else {
            return;
        };
        let (failed, canceled) = (failed || failed_now, canceled || canceled_now);
        let pending = pending.saturating_sub(1);
        self.items[item] = if pending > 0 {
            ItemState::Active { pending, failed, canceled }
        } else if failed {
            self.report.skipped += 1;
            ItemState::Skipped
        } else if canceled {
            self.report.canceled += 1;
            ItemState::Canceled
        } else {
            self.report.succeeded += 1;
            ItemState::Succeeded
        };
    }
}

/// Runs a [`BatchConfig`].
///
/// ```rust
/// use cosmetic_batch::{BatchConfig, BatchRunner, ImageItem};
/// use cosmetic_core::Image;
/// use cosmetic_io::MemoryCodec;
/// use cosmetic_ops::DefectItem;
/// use std::sync::Arc;
///
/// let codec = MemoryCodec::new();
/// codec.insert_image("lights/a.tif", Image::filled(16, 16, 1, 0.2).unwrap());
///
/// let mut config = BatchConfig::default();
/// config.targets.push(ImageItem::new("lights/a.tif"));
/// config.defect_list.enabled = true;
/// config.defect_list.defects.push(DefectItem::column(3));
///
/// let report = BatchRunner::new(config)
///     .with_codec(Arc::new(codec.clone()))
///     .run()
///     .unwrap();
/// assert_eq!(report.succeeded, 1);
/// assert!(codec.get("lights/a_cc.tif".as_ref()).is_some());
/// ```
pub struct BatchRunner {
    config: BatchConfig,
    codec: Option<Arc<dyn ImageCodec>>,
    cancel: CancelToken,
}

impl BatchRunner {
    /// Runner that picks codecs by file extension.
    pub fn new(config: BatchConfig) -> Self {
        Self {
            config,
            codec: None,
            cancel: CancelToken::new(),
        }
    }

    /// Uses `codec` for every read and write.
    pub fn with_codec(mut self, codec: Arc<dyn ImageCodec>) -> Self {
        self.codec = Some(codec);
        self
    }

    /// The configuration being run.
    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Token that aborts the run when canceled.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    fn codec_for(&self, path: &Path) -> IoResult<Arc<dyn ImageCodec>> {
        match &self.codec {
            Some(codec) => Ok(Arc::clone(codec)),
            None => Ok(Arc::from(codec_for_path(path)?)),
        }
    }

    /// Runs the batch without progress reporting.
    pub fn run(&self) -> BatchResult<BatchReport> {
        self.run_with(&mut |_: &BatchEvent| {})
    }

    /// Runs the batch, reporting progress to `observer`.
    ///
    /// Fails only on an invalid configuration or an unusable calibration
    /// frame. Everything else is counted in the report.
    pub fn run_with(&self, observer: &mut dyn BatchObserver) -> BatchResult<BatchReport> {
        self.config.validate()?;

        let reference = if self.config.reference_active() {
            let path = self.config.reference.path.clone().unwrap_or_default();
            let codec = self
                .codec_for(&path)
                .map_err(|e| BatchError::Fatal(format!("{}: {}", path.display(), e)))?;
            reference::prepare(&self.config, codec.as_ref())?
        } else {
            None
        };

        let ctx = Arc::new(TaskContext {
            layout: self.config.layout(),
            amount: self.config.amount as f32,
            reference,
            auto: self.config.auto_detect(),
            defects: self.config.active_defects(),
        });

        let count = self.config.targets.len();
        let (pool_size, nested) = pool_budget(count, self.config.thread_count());
        info!(items = count, pool_size, nested, "Starting cosmetic correction");
        let pool = WorkerPool::spawn(pool_size, nested, Arc::clone(&ctx), &self.cancel)?;
        observer.on_event(&BatchEvent::Started {
            items: count,
            pool_size,
            nested_threads: nested,
        });

        let mut state = RunState {
            items: vec![ItemState::Queued; count],
            queue: (0..count).collect(),
            waiting: VecDeque::new(),
            slots: (0..pool_size).map(|_| Slot::Free).collect(),
            aborting: false,
            report: BatchReport {
                pool_size,
                ..Default::default()
            },
        };

        let naming = OutputNaming::from_config(&self.config);
        loop {
            if !state.aborting && self.cancel.is_canceled() {
                self.begin_abort(&mut state, observer);
            }
            let mut progressed = false;

            if !state.aborting && state.waiting.is_empty() {
                if let Some(item) = state.queue.pop_front() {
                    self.open_item(item, &ctx, &mut state, observer);
                    progressed = true;
                }
            }

            while let Ok(c) = pool.done.try_recv() {
                let slot = c.slot;
                state.slots[slot] = Slot::Finished(Box::new(c));
            }
            for slot in 0..state.slots.len() {
                if !matches!(state.slots[slot], Slot::Finished(_)) {
                    continue;
                }
                if let Slot::Finished(c) = std::mem::replace(&mut state.slots[slot], Slot::Free) {
                    self.finalize(*c, &naming, &mut state, observer);
                    progressed = true;
                }
            }

            while !state.aborting && !self.cancel.is_canceled() {
                let Some(slot) = state.free_slot() else { break };
                let Some((item, task)) = state.waiting.pop_front() else { break };
                let (path, index) = (task.source.clone(), task.index);
                pool.submit(slot, Job { item, task })?;
                state.slots[slot] = Slot::Running;
                let running = state.running();
                state.report.peak_running = state.report.peak_running.max(running);
                debug!(path = %path.display(), index, slot, running, "Task started");
                observer.on_event(&BatchEvent::TaskStarted {
                    path,
                    index,
                    slot,
                    running,
                });
                progressed = true;
            }

            let idle = state.running() == 0 && state.waiting.is_empty();
            if idle && (state.queue.is_empty() || state.aborting) {
                break;
            }

            if !progressed {
                match pool.done.recv_timeout(POLL_INTERVAL) {
                    Ok(c) => {
                        let slot = c.slot;
                        state.slots[slot] = Slot::Finished(Box::new(c));
                    }
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => {
                        return Err(BatchError::Fatal("worker pool stopped unexpectedly".into()));
                    }
                }
            }
        }
        drop(pool);

        let mut report = state.report;
        for item in &state.items {
            if matches!(item, ItemState::Queued | ItemState::Active { .. }) {
                report.canceled += 1;
            }
        }
        if report.is_complete() {
            info!(succeeded = report.succeeded, corrected = report.corrected_pixels, "{}", report);
        } else {
            warn!(
                succeeded = report.succeeded,
                skipped = report.skipped,
                canceled = report.canceled,
                corrected = report.corrected_pixels,
                "{}",
                report
            );
        }
        Ok(report)
    }

    fn begin_abort(&self, state: &mut RunState, observer: &mut dyn BatchObserver) {
        state.aborting = true;
        let running = state.running();
        warn!(running, "Canceled, waiting for running tasks to terminate");
        observer.on_event(&BatchEvent::Aborting { running });
        while let Some((item, _)) = state.waiting.pop_front() {
            state.settle(item, false, true);
        }
    }

    fn skip(&self, item: usize, reason: String, state: &mut RunState, observer: &mut dyn BatchObserver) {
        let path = self.config.targets[item].path.clone();
        warn!(path = %path.display(), %reason, "Skipping target");
        state.skip(item);
        observer.on_event(&BatchEvent::Skipped { path, reason });
    }

    fn open_item(&self, item: usize, ctx: &TaskContext, state: &mut RunState, observer: &mut dyn BatchObserver) {
        let target = &self.config.targets[item];
        if !target.enabled {
            self.skip(item, "disabled target".into(), state, observer);
            return;
        }
        info!(
            path = %target.path.display(),
            file = item + 1,
            of = self.config.targets.len(),
            "Opening target"
        );

        let loaded = self
            .codec_for(&target.path)
            .map_err(|e| BatchError::item(&target.path, e.to_string()))
            .and_then(|codec| load_tasks(codec.as_ref(), &target.path));
        let tasks = match loaded {
            Ok(tasks) => tasks,
            Err(BatchError::Item { reason, .. }) => return self.skip(item, reason, state, observer),
            Err(e) => return self.skip(item, e.to_string(), state, observer),
        };

        if let Some(maps) = &ctx.reference {
            if let Some(task) = tasks.iter().find(|t| !maps.matches(&t.image)) {
                let reason = format!(
                    "image {} does not match calibration frame {}",
                    task.image.bounds(),
                    maps.geometry()
                );
                return self.skip(item, reason, state, observer);
            }
        }

        observer.on_event(&BatchEvent::Opened {
            path: target.path.clone(),
            images: tasks.len(),
        });
        state.items[item] = ItemState::Active {
            pending: tasks.len(),
            failed: false,
            canceled: false,
        };
        state.waiting.extend(tasks.into_iter().map(|t| (item, t)));
    }

    fn finalize(&self, done: Completion, naming: &OutputNaming, state: &mut RunState, observer: &mut dyn BatchObserver) {
        let Completion { item, task, result, .. } = done;
        let (path, index) = (task.source.clone(), task.index);
        if !state.aborting && self.cancel.is_canceled() {
            self.begin_abort(state, observer);
        }

        let corrected = match result {
            Ok(n) if !state.aborting => n,
            Ok(_) | Err(BatchError::Ops(OpsError::Aborted)) => {
                debug!(path = %path.display(), index, "Task canceled, output discarded");
                return state.settle(item, false, true);
            }
            Err(e) => {
                let reason = e.to_string();
                warn!(path = %path.display(), index, %reason, "Task failed");
                observer.on_event(&BatchEvent::TaskFailed { path, index, reason });
                return state.settle(item, true, false);
            }
        };

        match self.write_output(&task, corrected, naming) {
            Ok(output) => {
                state.report.corrected_pixels += corrected as u64;
                state.report.outputs.push(output.clone());
                observer.on_event(&BatchEvent::Written {
                    path,
                    index,
                    output,
                    corrected,
                });
                state.settle(item, false, false);
            }
            Err(e) => {
                let reason = e.to_string();
                warn!(path = %path.display(), index, %reason, "Cannot write output");
                observer.on_event(&BatchEvent::TaskFailed { path, index, reason });
                state.settle(item, true, false);
            }
        }
    }

    fn write_output(&self, task: &Task, corrected: usize, naming: &OutputNaming) -> BatchResult<std::path::PathBuf> {
        let candidate = naming.path_for(&task.source, task.index)?;
        let codec = self.codec_for(&candidate)?;
        let output = naming.resolve(&task.source, task.index, |p| codec.exists(p))?;
        write_task(codec.as_ref(), &output, task, corrected)?;
        Ok(output)
    }
}
