//! Task primitives every stage is built on. A panic inside a spawned unit of work is caught at
//! the spawn boundary and reported through `tracing`, it never reaches the caller or the
//! sibling tasks, and it never leaves a [`RoutineGroup`] waiting forever.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{error, trace};

/// Polls `task` to completion and converts a panic into `Err(message)`. The panic is logged
/// here so callers only have to decide what the failure means for them.
pub(crate) async fn catch_panic<F>(task: F) -> Result<F::Output, String>
where
    F: Future,
{
    AssertUnwindSafe(task).catch_unwind().await.map_err(|payload| {
        let message = panic_message(payload.as_ref());
        error!(panic = %message, "Contained a panic in a spawned task");
        message
    })
}

/// Spawns `task` on the runtime with its panics contained. The returned handle always resolves
/// to `Ok(())` unless the task is aborted.
pub fn spawn_safe<F>(task: F) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        let _ = catch_panic(task).await;
    })
}

/// Best effort extraction of the message carried by a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// RoutineGroup runs tasks concurrently and lets the owner wait for all of them. Every task is
/// run with its panics contained, so [`RoutineGroup::wait`] returns once each task has either
/// finished or panicked.
///
/// Dropping the group without waiting aborts the tasks that are still running.
#[derive(Default)]
pub struct RoutineGroup {
    tasks: JoinSet<()>,
}

impl RoutineGroup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts `task` in the group.
    pub fn run<F>(&mut self, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        self.tasks.spawn(async move {
            let _ = catch_panic(task).await;
        });
    }

    /// Number of tasks that have not been joined yet.
    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Waits until every task in the group has completed.
    pub async fn wait(mut self) {
        while let Some(joined) = self.tasks.join_next().await {
            if let Err(e) = joined {
                // panics are already caught inside the task, only a cancelled task lands here
                error!(?e, "Routine group task did not run to completion");
            }
        }
    }
}

/// Runs all the given tasks concurrently and waits for every one of them.
pub async fn parallel<I, F>(tasks: I)
where
    I: IntoIterator<Item = F>,
    F: Future<Output = ()> + Send + 'static,
{
    let mut group = RoutineGroup::new();
    for task in tasks {
        group.run(task);
    }
    group.wait().await;
}

/// Consumes and discards everything left in `rx` until its producer closes it.
pub(crate) async fn drain<T>(mut rx: mpsc::Receiver<T>) {
    let mut discarded = 0usize;
    while rx.recv().await.is_some() {
        discarded += 1;
    }
    trace!(discarded, "Drained abandoned channel");
}

/// Drains `rx` on a background task so its producer can run to completion even though nobody
/// is interested in the items anymore.
pub(crate) fn drain_in_background<T>(rx: mpsc::Receiver<T>)
where
    T: Send + 'static,
{
    tokio::spawn(drain(rx));
}

/// Forwards `source` into a new channel meant for caller code. If the caller drops the returned
/// receiver before `source` is exhausted, the forwarder drains the remainder instead.
pub(crate) fn hand_off<T>(source: mpsc::Receiver<T>, capacity: usize) -> mpsc::Receiver<T>
where
    T: Send + 'static,
{
    let (tx, rx) = mpsc::channel(capacity);
    let mut source = source;

    spawn_safe(async move {
        while let Some(item) = source.recv().await {
            if tx.send(item).await.is_err() {
                // the caller lost interest
                drain(source).await;
                return;
            }
        }
    });

    rx
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use tokio::sync::oneshot;

    use super::*;

    async fn explode() -> u32 {
        panic!("mapper exploded")
    }

    async fn boom() {
        panic!("boom")
    }

    #[tokio::test]
    async fn spawn_safe_contains_panic() {
        let handle = spawn_safe(boom());
        // the handle resolves normally, the panic never escapes the task
        assert!(handle.await.is_ok());
    }

    #[tokio::test]
    async fn catch_panic_reports_message() {
        let result = catch_panic(explode()).await;
        assert_eq!(result, Err("mapper exploded".to_string()));

        let result = catch_panic(async { 7 }).await;
        assert_eq!(result, Ok(7));
    }

    #[test]
    fn panic_message_handles_owned_and_static_payloads() {
        let owned: Box<dyn Any + Send> = Box::new(format!("index {}", 3));
        assert_eq!(panic_message(owned.as_ref()), "index 3");

        let borrowed: Box<dyn Any + Send> = Box::new("static");
        assert_eq!(panic_message(borrowed.as_ref()), "static");

        let other: Box<dyn Any + Send> = Box::new(42u32);
        assert_eq!(panic_message(other.as_ref()), "unknown panic payload");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn routine_group_waits_for_all_tasks() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut group = RoutineGroup::new();
        for i in 0..10 {
            let counter = Arc::clone(&counter);
            group.run(async move {
                tokio::time::sleep(Duration::from_millis(5 * (i % 3))).await;
                counter.fetch_add(1, Ordering::SeqCst);
            });
        }
        assert_eq!(group.len(), 10);

        group.wait().await;
        assert_eq!(counter.load(Ordering::SeqCst), 10);
    }

    #[tokio::test]
    async fn routine_group_survives_panicking_task() {
        let counter = Arc::new(AtomicUsize::new(0));
        let mut group = RoutineGroup::new();

        let c = Arc::clone(&counter);
        group.run(async move {
            c.fetch_add(1, Ordering::SeqCst);
        });
        group.run(boom());
        let c = Arc::clone(&counter);
        group.run(async move {
            c.fetch_add(1, Ordering::SeqCst);
        });

        tokio::time::timeout(Duration::from_secs(1), group.wait())
            .await
            .expect("group should not hang on a panicked task");
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn parallel_runs_every_task() {
        let counter = Arc::new(AtomicUsize::new(0));
        let tasks = (0..5).map(|_| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });
        parallel(tasks).await;
        assert_eq!(counter.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn drain_unblocks_producer() {
        let (tx, rx) = mpsc::channel(1);
        let (done_tx, done_rx) = oneshot::channel();
        tokio::spawn(async move {
            for i in 0..100 {
                tx.send(i).await.expect("receiver is draining");
            }
            done_tx.send(()).expect("test is waiting");
        });

        drain_in_background(rx);
        tokio::time::timeout(Duration::from_secs(1), done_rx)
            .await
            .expect("producer should finish")
            .expect("producer should signal");
    }

    #[tokio::test]
    async fn hand_off_drains_after_receiver_is_dropped() {
        let (tx, rx) = mpsc::channel(1);
        let (done_tx, done_rx) = oneshot::channel();
        tokio::spawn(async move {
            for i in 0..100 {
                tx.send(i).await.expect("hand off keeps reading");
            }
            done_tx.send(()).expect("test is waiting");
        });

        let mut handed = hand_off(rx, 1);
        assert_eq!(handed.recv().await, Some(0));
        assert_eq!(handed.recv().await, Some(1));
        drop(handed);

        tokio::time::timeout(Duration::from_secs(1), done_rx)
            .await
            .expect("producer should finish")
            .expect("producer should signal");
    }
}
