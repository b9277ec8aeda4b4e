// Static-partition batch driver: one scoped thread per contiguous range of items

use anyhow::{Result, anyhow};
use crossbeam_channel::Sender;
use log::error;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::thread;

use crate::event::BatchEvent;

pub const DEFAULT_WORKERS: usize = 4;

/// Splits `len` items into contiguous ranges, one per worker. Every range holds
/// `len / workers` items and the last one also takes the remainder.
pub fn partition(len: usize, workers: usize) -> Vec<Range<usize>> {
    if len == 0 {
        return Vec::new();
    }

    let workers = match workers {
        0 => DEFAULT_WORKERS,
        w => w,
    }
    .min(len);
    let chunk = len / workers;

    (0..workers)
        .map(|i| {
            let start = i * chunk;
            let end = if i + 1 == workers { len } else { start + chunk };
            start..end
        })
        .collect()
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Process every item and report each failure.
    #[default]
    CollectAll,
    /// Stop handing out items once any item has failed.
    FailFast,
}

#[derive(Debug)]
pub enum ItemOutcome<R> {
    Done(R),
    Failed(anyhow::Error),
    Cancelled,
}

impl<R> ItemOutcome<R> {
    pub fn is_done(&self) -> bool {
        matches!(self, ItemOutcome::Done(_))
    }
}

pub struct BatchRunner {
    workers: usize,
    policy: FailurePolicy,
    events: Option<Sender<BatchEvent>>,
}

impl BatchRunner {
    pub fn new(workers: usize) -> Self {
        Self {
            workers,
            policy: FailurePolicy::default(),
            events: None,
        }
    }

    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_events(mut self, tx: Sender<BatchEvent>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Runs `work` over every item and returns one outcome per item, in input order.
    ///
    /// Each worker calls `open` once for the handle it passes to every `work` call of
    /// its range. If `open` fails, all items of that range fail.
    pub fn run<T, H, R, L, O, W>(&self, items: &[T], label: L, open: O, work: W) -> Vec<ItemOutcome<R>>
    where
        T: Sync,
        R: Send,
        L: Fn(&T) -> String + Sync,
        O: Fn() -> Result<H> + Sync,
        W: Fn(&mut H, &T) -> Result<R> + Sync,
    {
        let ranges = partition(items.len(), self.workers);
        let cancel = AtomicBool::new(false);
        let done = AtomicUsize::new(0);

        let ctx = WorkerCtx {
            items,
            label: &label,
            open: &open,
            work: &work,
            policy: self.policy,
            events: self.events.as_ref(),
            cancel: &cancel,
            done: &done,
        };
        let ctx = &ctx;

        thread::scope(|s| {
            let handles: Vec<_> = ranges
                .into_iter()
                .map(|range| {
                    let fallback = range.clone();
                    (s.spawn(move || ctx.run_range::<H, R>(range)), fallback)
                })
                .collect();

            handles
                .into_iter()
                .flat_map(|(handle, range)| {
                    handle.join().unwrap_or_else(|_| {
                        range
                            .map(|_| ItemOutcome::Failed(anyhow!("worker thread panicked")))
                            .collect()
                    })
                })
                .collect()
        })
    }
}

/// Runs a batch without progress events.
pub fn run_batch<T, H, R, L, O, W>(
    items: &[T],
    workers: usize,
    policy: FailurePolicy,
    label: L,
    open: O,
    work: W,
) -> Vec<ItemOutcome<R>>
where
    T: Sync,
    R: Send,
    L: Fn(&T) -> String + Sync,
    O: Fn() -> Result<H> + Sync,
    W: Fn(&mut H, &T) -> Result<R> + Sync,
{
    BatchRunner::new(workers)
        .with_policy(policy)
        .run(items, label, open, work)
}

struct WorkerCtx<'a, T, L, O, W> {
    items: &'a [T],
    label: &'a L,
    open: &'a O,
    work: &'a W,
    policy: FailurePolicy,
    events: Option<&'a Sender<BatchEvent>>,
    cancel: &'a AtomicBool,
    done: &'a AtomicUsize,
}

impl<T, L, O, W> WorkerCtx<'_, T, L, O, W> {
    fn send(&self, event: BatchEvent) {
        if let Some(tx) = self.events {
            let _ = tx.send(event);
        }
    }

    fn finish_item(&self) {
        let done = self.done.fetch_add(1, Ordering::SeqCst) + 1;
        self.send(BatchEvent::Progress(done, self.items.len()));
    }

    fn fail(&self, name: String, err: &anyhow::Error) {
        error!("{}: {:#}", name, err);
        self.send(BatchEvent::ItemFailed(name, format!("{:#}", err)));
        if self.policy == FailurePolicy::FailFast {
            self.cancel.store(true, Ordering::SeqCst);
        }
    }

    fn run_range<H, R>(&self, range: Range<usize>) -> Vec<ItemOutcome<R>>
    where
        L: Fn(&T) -> String,
        O: Fn() -> Result<H>,
        W: Fn(&mut H, &T) -> Result<R>,
    {
        let mut outcomes = Vec::with_capacity(range.len());

        let mut handle = match (self.open)() {
            Ok(handle) => handle,
            Err(e) => {
                for item in &self.items[range] {
                    let err = anyhow!("can't open worker input: {:#}", e);
                    self.fail((self.label)(item), &err);
                    outcomes.push(ItemOutcome::Failed(err));
                    self.finish_item();
                }
                return outcomes;
            }
        };

        for item in &self.items[range] {
            let name = (self.label)(item);

            if self.cancel.load(Ordering::SeqCst) {
                self.send(BatchEvent::ItemCancelled(name));
                outcomes.push(ItemOutcome::Cancelled);
                self.finish_item();
                continue;
            }

            self.send(BatchEvent::ItemStarted(name.clone()));
            let outcome = match (self.work)(&mut handle, item) {
                Ok(result) => {
                    self.send(BatchEvent::ItemCompleted(name));
                    ItemOutcome::Done(result)
                }
                Err(e) => {
                    self.fail(name, &e);
                    ItemOutcome::Failed(e)
                }
            };
            outcomes.push(outcome);
            self.finish_item();
        }

        outcomes
    }
}
