//! Terminal operations, they consume a [`Stream`] and produce a value. The ones that may stop
//! before the upstream is exhausted (`first`, the match family, `for_all`) leave a drain task
//! behind.

use std::cmp::Ordering;
use std::future::Future;

use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use super::Stream;
use crate::Result;
use crate::config::{PIPE_CAPACITY, WalkOptions};
use crate::shared::task::{drain, drain_in_background, hand_off};

impl<T> Stream<T>
where
    T: Send + 'static,
{
    /// Returns true if every item matches `predicate`. Stops at the first mismatch.
    pub async fn all_match<F>(self, mut predicate: F) -> bool
    where
        F: FnMut(&T) -> bool,
    {
        let mut source = self.source;
        while let Some(item) = source.recv().await {
            if !predicate(&item) {
                drain_in_background(source);
                return false;
            }
        }
        true
    }

    /// Returns true if any item matches `predicate`. Stops at the first match.
    pub async fn any_match<F>(self, mut predicate: F) -> bool
    where
        F: FnMut(&T) -> bool,
    {
        let mut source = self.source;
        while let Some(item) = source.recv().await {
            if predicate(&item) {
                drain_in_background(source);
                return true;
            }
        }
        false
    }

    /// Returns true if no item matches `predicate`. Stops at the first match.
    pub async fn none_match<F>(self, mut predicate: F) -> bool
    where
        F: FnMut(&T) -> bool,
    {
        let mut source = self.source;
        while let Some(item) = source.recv().await {
            if predicate(&item) {
                drain_in_background(source);
                return false;
            }
        }
        true
    }

    pub async fn count(self) -> usize {
        let mut source = self.source;
        let mut count = 0;
        while source.recv().await.is_some() {
            count += 1;
        }
        count
    }

    /// Waits for the upstream to finish, discarding its items.
    pub async fn done(self) {
        drain(self.source).await;
    }

    /// Returns the first item and drains the rest in the background.
    pub async fn first(self) -> Option<T> {
        let mut source = self.source;
        let item = source.recv().await;
        if item.is_some() {
            drain_in_background(source);
        }
        item
    }

    pub async fn last(self) -> Option<T> {
        let mut source = self.source;
        let mut last = None;
        while let Some(item) = source.recv().await {
            last = Some(item);
        }
        last
    }

    /// Largest item according to `compare`; among equal items the earliest wins.
    pub async fn max<F>(self, mut compare: F) -> Option<T>
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        let mut source = self.source;
        let mut max = None;
        while let Some(item) = source.recv().await {
            max = match max {
                Some(current) if compare(&current, &item) != Ordering::Less => Some(current),
                _ => Some(item),
            };
        }
        max
    }

    /// Smallest item according to `compare`; among equal items the earliest wins.
    pub async fn min<F>(self, mut compare: F) -> Option<T>
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        let mut source = self.source;
        let mut min = None;
        while let Some(item) = source.recv().await {
            min = match min {
                Some(current) if compare(&item, &current) != Ordering::Less => Some(current),
                _ => Some(item),
            };
        }
        min
    }

    /// Calls `f` on every item, in arrival order, on the calling task.
    pub async fn for_each<F>(self, mut f: F)
    where
        F: FnMut(T),
    {
        let mut source = self.source;
        while let Some(item) = source.recv().await {
            f(item);
        }
    }

    /// Hands the items to `f` as a channel. `f` may stop reading whenever it wants; whatever it
    /// leaves behind is drained so the upstream can finish.
    pub async fn for_all<F, Fut>(self, f: F)
    where
        F: FnOnce(mpsc::Receiver<T>) -> Fut,
        Fut: Future<Output = ()>,
    {
        f(hand_off(self.source, PIPE_CAPACITY)).await;
    }

    /// Hands the whole upstream to `f` and returns whatever it reduces it to.
    pub async fn reduce<R, F, Fut>(self, f: F) -> Result<R>
    where
        F: FnOnce(mpsc::Receiver<T>) -> Fut,
        Fut: Future<Output = Result<R>>,
    {
        f(self.source).await
    }

    /// Collects every item into a `Vec`, in arrival order.
    pub async fn collect(self) -> Vec<T> {
        let mut source = self.source;
        let mut items = Vec::new();
        while let Some(item) = source.recv().await {
            items.push(item);
        }
        items
    }

    /// Runs `f` on every item concurrently with the default options and waits for all of them.
    pub async fn parallel<F>(self, f: F)
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        self.parallel_with(f, WalkOptions::default()).await
    }

    pub async fn parallel_with<F>(self, f: F, opts: WalkOptions)
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        self.walk_with(
            move |item, _pipe: mpsc::Sender<()>| {
                f(item);
                async {}
            },
            opts,
        )
        .done()
        .await
    }

    /// Exposes the stream to `futures`/`tokio-stream` combinators.
    pub fn into_receiver_stream(self) -> ReceiverStream<T> {
        ReceiverStream::new(self.source)
    }

    /// Gives back the underlying receiver.
    pub fn into_inner(self) -> mpsc::Receiver<T> {
        self.source
    }
}
