//! Multi-priority command queue.
//!
//! Four FIFO queues, highest priority first:
//!
//! - queue 0: atomic operations that must run before any refresh
//!   (volume bounce, AM frequency step calculation)
//! - queue 1: ordinary device commands
//! - queue 2: zone refresh commands
//! - queue 3: delayed basic queries and internal state updates
//!
//! A single executor task drains the queues through a caller-registered
//! execution callback. Higher-priority items enqueued during execution run
//! first on the next iteration; the item being executed is never pre-empted.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

use crate::error::Error;
use crate::types::Zone;

pub const NUM_QUEUES: usize = 4;

/// Queued command. Commands starting with `_` are local to the client and
/// are never written to the wire.
#[derive(Debug, Clone)]
pub struct CommandItem {
    pub command: String,
    pub args: Vec<Value>,
    pub zone: Zone,
    pub ignore_error: bool,
    pub rate_limit: bool,
    pub skip_if_starting: bool,
    pub skip_if_refreshing: bool,
    pub skip_if_queued: bool,
    pub queue_id: usize,
    pub insert_at: i64,
}

impl CommandItem {
    pub fn new(command: impl Into<String>) -> Self {
        CommandItem {
            command: command.into(),
            args: Vec::new(),
            zone: Zone::Z1,
            ignore_error: false,
            rate_limit: true,
            skip_if_starting: false,
            skip_if_refreshing: false,
            skip_if_queued: true,
            queue_id: 1,
            insert_at: -1,
        }
    }

    pub fn arg(mut self, arg: impl Into<Value>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn zone(mut self, zone: Zone) -> Self {
        self.zone = zone;
        self
    }

    pub fn queue(mut self, queue_id: usize) -> Self {
        self.queue_id = queue_id;
        self
    }

    pub fn insert_at(mut self, insert_at: i64) -> Self {
        self.insert_at = insert_at;
        self
    }

    pub fn ignore_error(mut self, ignore_error: bool) -> Self {
        self.ignore_error = ignore_error;
        self
    }

    pub fn skip_if_starting(mut self, skip: bool) -> Self {
        self.skip_if_starting = skip;
        self
    }

    pub fn skip_if_refreshing(mut self, skip: bool) -> Self {
        self.skip_if_refreshing = skip;
        self
    }

    pub fn skip_if_queued(mut self, skip: bool) -> Self {
        self.skip_if_queued = skip;
        self
    }
}

/// Queue-membership equality. The relation is intentionally non-symmetric:
/// the queued item is always the left-hand side, the enqueue candidate the
/// right-hand side. `Vec::contains` compares elements on the left, which is
/// exactly the orientation required; `sanity_check_membership_order` verifies
/// this at first queue construction.
impl PartialEq for CommandItem {
    fn eq(&self, other: &Self) -> bool {
        // idempotent placeholder: one delayed basic query is as good as another
        if self.command == "_delayed_query_basic" {
            return other.command == self.command;
        }
        // a queued full refresh subsumes any zone refresh
        if self.command == "_full_refresh"
            && matches!(other.command.as_str(), "_refresh_zone" | "_delayed_refresh_zone")
        {
            return true;
        }
        self.command == other.command && self.args == other.args
    }
}

type CommandFuture = Pin<Box<dyn Future<Output = Result<(), Error>> + Send>>;
pub type ExecuteCallback = Arc<dyn Fn(CommandItem) -> CommandFuture + Send + Sync>;

struct QueueState {
    queues: Vec<Vec<CommandItem>>,
    zones_pending_refresh: std::collections::HashSet<Zone>,
    exceptions: Vec<Error>,
}

struct QueueRuntime {
    task: Option<JoinHandle<()>>,
    cancel: Option<CancellationToken>,
    callback: Option<ExecuteCallback>,
}

/// The command scheduler. Cheap to clone; clones share state.
#[derive(Clone)]
pub struct CommandQueue {
    state: Arc<Mutex<QueueState>>,
    runtime: Arc<Mutex<QueueRuntime>>,
    execute_lock: Arc<AsyncMutex<()>>,
    startup_lock: Arc<AsyncMutex<()>>,
    cancelled: Arc<AtomicBool>,
    debug: bool,
}

static MEMBERSHIP_ORDER_CHECK: std::sync::Once = std::sync::Once::new();

fn sanity_check_membership_order() {
    let queued = vec![CommandItem::new("_full_refresh")];
    if !queued.contains(&CommandItem::new("_refresh_zone").arg("1")) {
        warn!("unexpected list membership comparison order detected");
    }
}

impl CommandQueue {
    pub fn new(debug: bool) -> Self {
        MEMBERSHIP_ORDER_CHECK.call_once(sanity_check_membership_order);
        CommandQueue {
            state: Arc::new(Mutex::new(QueueState {
                queues: (0..NUM_QUEUES).map(|_| Vec::new()).collect(),
                zones_pending_refresh: std::collections::HashSet::new(),
                exceptions: Vec::new(),
            })),
            runtime: Arc::new(Mutex::new(QueueRuntime { task: None, cancel: None, callback: None })),
            execute_lock: Arc::new(AsyncMutex::new(())),
            startup_lock: Arc::new(AsyncMutex::new(())),
            cancelled: Arc::new(AtomicBool::new(false)),
            debug,
        }
    }

    /// Register the callback the executor invokes for each queued item.
    pub fn register_execute_callback(&self, callback: ExecuteCallback) {
        self.runtime.lock().callback = Some(callback);
    }

    /// Latch held while the client is starting up; items flagged
    /// `skip_if_starting` are dropped while it is held.
    pub fn startup_lock(&self) -> Arc<AsyncMutex<()>> {
        self.startup_lock.clone()
    }

    pub fn is_starting(&self) -> bool {
        self.startup_lock.try_lock().is_err()
    }

    pub fn is_executing(&self) -> bool {
        self.execute_lock.try_lock().is_err()
    }

    pub fn is_refreshing(&self, zone: Zone) -> bool {
        let state = self.state.lock();
        if zone == Zone::All {
            !state.zones_pending_refresh.is_empty()
        } else {
            state.zones_pending_refresh.contains(&zone)
        }
    }

    pub fn set_refreshing(&self, zone: Zone, refreshing: bool) {
        let mut state = self.state.lock();
        if refreshing {
            state.zones_pending_refresh.insert(zone);
        } else {
            state.zones_pending_refresh.remove(&zone);
        }
    }

    /// Commands currently queued, highest priority first.
    pub fn commands(&self) -> Vec<String> {
        let state = self.state.lock();
        state.queues.iter().flatten().map(|item| item.command.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.state.lock().queues.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clear all queues and the refreshing-zones set.
    pub fn purge(&self) {
        let mut state = self.state.lock();
        for queue in &mut state.queues {
            queue.clear();
        }
        state.zones_pending_refresh.clear();
    }

    /// Enqueue `item`, evaluating its skip rules, then schedule the executor
    /// unless `start_executing` is false.
    pub fn enqueue(&self, item: CommandItem, start_executing: bool) {
        if item.skip_if_starting && self.is_starting() {
            if self.debug {
                debug!("not queuing {}: client is starting", item.command);
            }
            return;
        }
        if item.skip_if_refreshing && self.is_refreshing(item.zone) {
            if self.debug {
                debug!("not queuing {}: zone is refreshing", item.command);
            }
            return;
        }
        let executing = self.is_executing();
        {
            let mut state = self.state.lock();
            let queue_id = item.queue_id.min(NUM_QUEUES - 1);
            let queue_len = state.queues[queue_id].len() as i64;
            let mut insert_at = if item.insert_at < 0 {
                queue_len + 1 + item.insert_at
            } else if executing && Some(queue_id) == active_queue(&state) {
                // do not pre-empt the item currently at the front
                item.insert_at + 1
            } else {
                item.insert_at
            };
            insert_at = insert_at.clamp(0, queue_len);
            if item.skip_if_queued && state.queues.iter().flatten().any(|queued| queued == &item) {
                if self.debug {
                    debug!("not queuing {}: already queued", item.command);
                }
                return;
            }
            debug!("queuing {} at pos {insert_at} in queue #{queue_id}", item.command);
            state.queues[queue_id].insert(insert_at as usize, item);
        }
        if start_executing {
            self.schedule();
        }
    }

    /// Enqueue a batch, then schedule once.
    pub fn extend(&self, items: Vec<CommandItem>) {
        for item in items {
            self.enqueue(item, false);
        }
        self.schedule();
    }

    /// Index of the highest non-empty queue.
    pub fn active_queue(&self) -> Option<usize> {
        active_queue(&self.state.lock())
    }

    /// First item of the given queue, or of the active queue.
    pub fn peek(&self, queue_id: Option<usize>) -> Option<(usize, CommandItem)> {
        let state = self.state.lock();
        let queue_id = queue_id.or_else(|| active_queue(&state))?;
        state.queues.get(queue_id)?.first().cloned().map(|item| (queue_id, item))
    }

    /// Pop from the given queue, or from the highest non-empty queue.
    pub fn pop(&self, queue_id: Option<usize>) -> Option<CommandItem> {
        let mut state = self.state.lock();
        let queue_id = queue_id.or_else(|| active_queue(&state))?;
        let queue = state.queues.get_mut(queue_id)?;
        if queue.is_empty() {
            return None;
        }
        let item = queue.remove(0);
        if self.debug {
            debug!("popping {} from queue #{queue_id}", item.command);
        }
        Some(item)
    }

    /// Items snapshot for tests and diagnostics.
    pub fn queue_items(&self, queue_id: usize) -> Vec<CommandItem> {
        self.state.lock().queues.get(queue_id).cloned().unwrap_or_default()
    }

    /// Start the executor task if the queue is non-empty and no executor is
    /// currently running.
    pub fn schedule(&self) {
        if self.peek(None).is_none() {
            return;
        }
        let mut runtime = self.runtime.lock();
        if let Some(task) = &runtime.task {
            if !task.is_finished() {
                return;
            }
            runtime.task = None;
        }
        let Some(callback) = runtime.callback.clone() else {
            warn!("command queue scheduled without execute callback");
            return;
        };
        if self.debug {
            debug!("creating command queue task");
        }
        self.state.lock().exceptions.clear();
        self.cancelled.store(false, Ordering::SeqCst);
        let cancel = CancellationToken::new();
        runtime.cancel = Some(cancel.clone());
        let queue = self.clone();
        runtime.task = Some(tokio::spawn(queue.run_executor(callback, cancel)));
    }

    async fn run_executor(self, callback: ExecuteCallback, cancel: CancellationToken) {
        let _guard = self.execute_lock.lock().await;
        debug!(">> command queue started");
        while let Some((queue_id, item)) = self.peek(None) {
            if self.debug {
                debug!("command queue executing {}", item.command);
            }
            let fut = callback(item.clone());
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!(">> command queue task cancelled");
                    return;
                }
                result = fut => match result {
                    Ok(()) => {}
                    Err(Error::Unavailable) => {
                        debug!(">> command queue detected AVR unavailable");
                        break;
                    }
                    Err(err) => {
                        error!("exception executing command {}: {err}", item.command);
                        self.state.lock().exceptions.push(err);
                    }
                },
            }
            // pop from the queue the item came from: higher-priority items
            // enqueued during execution must run first on the next iteration
            self.pop(Some(queue_id));
        }
        debug!(">> command queue completed");
    }

    /// Cancel the executor and purge all queues.
    pub async fn cancel(&self) {
        let (task, cancel) = {
            let mut runtime = self.runtime.lock();
            (runtime.task.take(), runtime.cancel.take())
        };
        if let Some(cancel) = cancel {
            cancel.cancel();
        }
        if let Some(task) = task {
            self.cancelled.store(true, Ordering::SeqCst);
            let _ = task.await;
        }
        self.purge();
    }

    /// Wait for the current executor to drain, then re-raise the first
    /// exception observed during execution.
    pub async fn wait(&self) -> Result<(), Error> {
        tokio::task::yield_now().await;
        let task = self.runtime.lock().task.take();
        if let Some(task) = task {
            if self.debug {
                debug!("waiting for command queue to be flushed");
            }
            if let Err(err) = task.await {
                error!("command queue task exception: {err}");
                return Ok(());
            }
            if self.cancelled.load(Ordering::SeqCst) {
                return Err(Error::Unavailable);
            }
        }
        let mut exceptions: Vec<Error> = std::mem::take(&mut self.state.lock().exceptions);
        if exceptions.is_empty() {
            return Ok(());
        }
        if self.debug {
            debug!("command queue exceptions: {exceptions:?}");
        }
        for extra in exceptions.drain(1..) {
            error!("command queue exception: {extra}");
        }
        Err(exceptions.remove(0))
    }
}

fn active_queue(state: &QueueState) -> Option<usize> {
    state.queues.iter().position(|queue| !queue.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn noop_callback(log: Arc<Mutex<Vec<String>>>) -> ExecuteCallback {
        Arc::new(move |item| {
            let log = log.clone();
            Box::pin(async move {
                log.lock().push(item.command.clone());
                Ok(())
            })
        })
    }

    #[test]
    fn equality_is_queued_item_oriented() {
        let queued = vec![CommandItem::new("_full_refresh")];
        assert!(queued.contains(&CommandItem::new("_refresh_zone").arg("2")));
        // the reverse orientation must not hold
        let queued = vec![CommandItem::new("_refresh_zone").arg("2")];
        assert!(!queued.contains(&CommandItem::new("_full_refresh")));
    }

    #[test]
    fn delayed_basic_query_is_idempotent_placeholder() {
        let queued = vec![CommandItem::new("_delayed_query_basic").arg(2.5)];
        assert!(queued.contains(&CommandItem::new("_delayed_query_basic").arg(4.5)));
    }

    #[tokio::test]
    async fn skip_if_queued_leaves_queue_unchanged() {
        let queue = CommandQueue::new(false);
        queue.enqueue(CommandItem::new("volume_up").queue(0).skip_if_queued(false), false);
        queue.enqueue(CommandItem::new("volume_up").queue(0), false);
        assert_eq!(queue.len(), 1);
        queue.enqueue(CommandItem::new("volume_up").queue(0).skip_if_queued(false), false);
        assert_eq!(queue.len(), 2);
    }

    #[tokio::test]
    async fn skip_if_refreshing_drops_item() {
        let queue = CommandQueue::new(false);
        queue.set_refreshing(Zone::Z2, true);
        queue.enqueue(
            CommandItem::new("query_power").zone(Zone::Z2).skip_if_refreshing(true),
            false,
        );
        assert_eq!(queue.len(), 0);
        // Zone::All matches when any zone is refreshing
        queue.enqueue(
            CommandItem::new("query_power").zone(Zone::All).skip_if_refreshing(true),
            false,
        );
        assert_eq!(queue.len(), 0);
        queue.enqueue(CommandItem::new("query_power").zone(Zone::Z3).skip_if_refreshing(true), false);
        assert_eq!(queue.len(), 1);
    }

    #[tokio::test]
    async fn pop_drains_highest_priority_first() {
        let queue = CommandQueue::new(false);
        queue.enqueue(CommandItem::new("low").queue(3), false);
        queue.enqueue(CommandItem::new("high").queue(0), false);
        queue.enqueue(CommandItem::new("mid").queue(1), false);
        assert_eq!(queue.pop(None).unwrap().command, "high");
        assert_eq!(queue.pop(None).unwrap().command, "mid");
        assert_eq!(queue.pop(None).unwrap().command, "low");
    }

    #[tokio::test]
    async fn negative_insert_appends() {
        let queue = CommandQueue::new(false);
        queue.enqueue(CommandItem::new("first"), false);
        queue.enqueue(CommandItem::new("second"), false);
        queue.enqueue(CommandItem::new("jumped").insert_at(0), false);
        let commands = queue.commands();
        assert_eq!(commands, vec!["jumped", "first", "second"]);
    }

    #[tokio::test]
    async fn executor_runs_items_in_order() {
        let queue = CommandQueue::new(false);
        let log = Arc::new(Mutex::new(Vec::new()));
        queue.register_execute_callback(noop_callback(log.clone()));
        queue.extend(vec![
            CommandItem::new("query_power"),
            CommandItem::new("query_volume"),
            CommandItem::new("volume_up").queue(0).skip_if_queued(false),
        ]);
        queue.wait().await.unwrap();
        assert_eq!(*log.lock(), vec!["volume_up", "query_power", "query_volume"]);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn executor_stops_on_unavailable() {
        let queue = CommandQueue::new(false);
        let calls = Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        queue.register_execute_callback(Arc::new(move |_item| {
            let calls = calls2.clone();
            Box::pin(async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Error::Unavailable)
            })
        }));
        queue.extend(vec![CommandItem::new("query_power"), CommandItem::new("query_volume")]);
        queue.wait().await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        // first item stays queued, second was never attempted
        assert_eq!(queue.len(), 2);
    }

    #[tokio::test]
    async fn executor_records_item_failures() {
        let queue = CommandQueue::new(false);
        queue.register_execute_callback(Arc::new(|item| {
            Box::pin(async move {
                if item.command == "bad" {
                    Err(Error::local("bad", "boom"))
                } else {
                    Ok(())
                }
            })
        }));
        queue.extend(vec![CommandItem::new("bad"), CommandItem::new("good")]);
        let err = queue.wait().await.unwrap_err();
        assert!(matches!(err, Error::LocalCommand { .. }));
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn cancel_purges_queues() {
        let queue = CommandQueue::new(false);
        queue.enqueue(CommandItem::new("query_power"), false);
        queue.set_refreshing(Zone::Z1, true);
        queue.cancel().await;
        assert!(queue.is_empty());
        assert!(!queue.is_refreshing(Zone::All));
    }
}
