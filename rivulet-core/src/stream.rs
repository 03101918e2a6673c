//! A [`Stream`] is a lazy, single-consumer sequence of items backed by one tokio channel. Every
//! operator consumes the stream it is called on and returns a new one wrapping the channel of a
//! freshly spawned stage. The stage owns its downstream sender, so the downstream channel closes
//! exactly once: when the stage (and every task it fanned out to) is done with it.
//!
//! Operators fall in three groups:
//! - lazy stages (`walk`, `filter`, `map`, `distinct`, `head`, `skip`, `tail`, `split`,
//!   `buffer`, `concat`) are plain functions that spawn their stage and return immediately,
//! - materializing stages (`group`, `sort`, `reverse`, `merge`) are `async` because they have to
//!   see the whole upstream before the new stream exists,
//! - terminal operations (see [`terminal`]) consume the stream and produce a value.
//!
//! Any operator that stops reading before the upstream is exhausted hands the upstream to a
//! drain task, a producer blocked on a full channel would otherwise never finish.
//!
//! Everything that spawns has to be called from within a tokio runtime.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::hash::Hash;
use std::iter;
use std::sync::Arc;

use tokio::sync::{Semaphore, mpsc};
use tracing::error;

use crate::config::{PIPE_CAPACITY, WalkOptions};
use crate::shared::ring::Ring;
use crate::shared::task::{RoutineGroup, drain, spawn_safe};

pub mod terminal;

/// Lazy sequence of items flowing through a channel.
#[derive(Debug)]
pub struct Stream<T> {
    source: mpsc::Receiver<T>,
}

/// Channel connecting two stages.
fn pipe<T>() -> (mpsc::Sender<T>, mpsc::Receiver<T>) {
    mpsc::channel(PIPE_CAPACITY)
}

impl<T> From<mpsc::Receiver<T>> for Stream<T> {
    fn from(source: mpsc::Receiver<T>) -> Self {
        Stream { source }
    }
}

/// Concatenates `first` with `others`, see [`Stream::concat`].
pub fn concat<T, I>(first: Stream<T>, others: I) -> Stream<T>
where
    T: Send + 'static,
    I: IntoIterator<Item = Stream<T>>,
{
    first.concat(others)
}

impl<T> Stream<T>
where
    T: Send + 'static,
{
    /// Builds a stream out of a generator. The generator runs on its own task and writes items
    /// to the sender it is handed; the stream ends when the generator returns, or when it
    /// panics, since the sender is dropped either way.
    pub fn from_generator<F, Fut>(generate: F) -> Self
    where
        F: FnOnce(mpsc::Sender<T>) -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = pipe();
        spawn_safe(async move {
            generate(tx).await;
        });
        Self::range(rx)
    }

    /// Builds an already closed stream holding exactly `items`. Nothing is spawned, so this can
    /// be called outside of a runtime.
    pub fn just<I>(items: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        let items: Vec<T> = items.into_iter().collect();
        let (tx, rx) = mpsc::channel(items.len().max(PIPE_CAPACITY));
        for item in items {
            // the channel has a slot for every item and the receiver is alive
            let _ = tx.try_send(item);
        }
        Self::range(rx)
    }

    /// Wraps an existing receiver.
    pub fn range(source: mpsc::Receiver<T>) -> Self {
        Stream { source }
    }

    /// Applies `f` concurrently to every item with the default [`WalkOptions`].
    pub fn walk<U, F, Fut>(self, f: F) -> Stream<U>
    where
        U: Send + 'static,
        F: Fn(T, mpsc::Sender<U>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.walk_with(f, WalkOptions::default())
    }

    /// Applies `f` concurrently to every item. `f` receives the item and a sender for the
    /// downstream, and may write any number of items to it. At most `opts.workers()`
    /// invocations are in flight unless unlimited workers are requested. With a single worker
    /// the arrival order is preserved.
    ///
    /// A panicking invocation is contained and simply produces nothing.
    pub fn walk_with<U, F, Fut>(self, f: F, opts: WalkOptions) -> Stream<U>
    where
        U: Send + 'static,
        F: Fn(T, mpsc::Sender<U>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        if opts.is_unlimited() {
            self.walk_unlimited(f, opts)
        } else {
            self.walk_limited(f, opts)
        }
    }

    fn walk_limited<U, F, Fut>(self, f: F, opts: WalkOptions) -> Stream<U>
    where
        U: Send + 'static,
        F: Fn(T, mpsc::Sender<U>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(opts.workers());
        let pool = Arc::new(Semaphore::new(opts.workers()));
        let f = Arc::new(f);
        let mut source = self.source;

        spawn_safe(async move {
            while let Some(item) = source.recv().await {
                let permit = match Arc::clone(&pool).acquire_owned().await {
                    Ok(permit) => permit,
                    Err(e) => {
                        error!(?e, "Walk worker pool is closed, draining upstream");
                        drain(source).await;
                        return;
                    }
                };
                let f = Arc::clone(&f);
                let pipe = tx.clone();
                // the permit travels with the task and is released when the task ends, panics
                // included
                spawn_safe(async move {
                    let _permit = permit;
                    f(item, pipe).await;
                });
            }
            // the downstream closes once the last in-flight task drops its sender
        });

        Stream::range(rx)
    }

    fn walk_unlimited<U, F, Fut>(self, f: F, opts: WalkOptions) -> Stream<U>
    where
        U: Send + 'static,
        F: Fn(T, mpsc::Sender<U>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(opts.workers());
        let f = Arc::new(f);
        let mut source = self.source;

        spawn_safe(async move {
            while let Some(item) = source.recv().await {
                let f = Arc::clone(&f);
                let pipe = tx.clone();
                spawn_safe(async move {
                    f(item, pipe).await;
                });
            }
        });

        Stream::range(rx)
    }

    /// Keeps the items matching `predicate`.
    pub fn filter<F>(self, predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.filter_with(predicate, WalkOptions::default())
    }

    pub fn filter_with<F>(self, predicate: F, opts: WalkOptions) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.walk_with(
            move |item, pipe| {
                let keep = predicate(&item);
                async move {
                    if keep {
                        let _ = pipe.send(item).await;
                    }
                }
            },
            opts,
        )
    }

    /// Converts every item with `transform`.
    pub fn map<U, F>(self, transform: F) -> Stream<U>
    where
        U: Send + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        self.map_with(transform, WalkOptions::default())
    }

    pub fn map_with<U, F>(self, transform: F, opts: WalkOptions) -> Stream<U>
    where
        U: Send + 'static,
        F: Fn(T) -> U + Send + Sync + 'static,
    {
        self.walk_with(
            move |item, pipe| {
                let mapped = transform(item);
                async move {
                    let _ = pipe.send(mapped).await;
                }
            },
            opts,
        )
    }

    /// Drops every item whose key was already seen. The first item of each key wins and the
    /// survivors keep their arrival order.
    pub fn distinct<K, F>(self, key: F) -> Self
    where
        K: Eq + Hash + Send + 'static,
        F: Fn(&T) -> K + Send + 'static,
    {
        let (tx, rx) = pipe();
        let mut source = self.source;

        spawn_safe(async move {
            let mut seen = HashSet::new();
            while let Some(item) = source.recv().await {
                if seen.insert(key(&item)) {
                    let _ = tx.send(item).await;
                }
            }
        });

        Self::range(rx)
    }

    /// Collects the whole upstream into buckets sharing the same key and emits every bucket as
    /// one item. Bucket order is unspecified.
    pub async fn group<K, F>(self, mut key: F) -> Stream<Vec<T>>
    where
        K: Eq + Hash,
        F: FnMut(&T) -> K,
    {
        let mut groups: HashMap<K, Vec<T>> = HashMap::new();
        let mut source = self.source;
        while let Some(item) = source.recv().await {
            groups.entry(key(&item)).or_default().push(item);
        }
        Stream::just(groups.into_values())
    }

    /// Emits at most the first `n` items. Once `n` items went out the downstream is closed
    /// right away and the rest of the upstream is drained.
    ///
    /// # Panics
    /// Panics if `n` is 0.
    pub fn head(self, n: usize) -> Self {
        assert!(n > 0, "n must be greater than 0");

        let (tx, rx) = pipe();
        let mut source = self.source;

        spawn_safe(async move {
            let mut remaining = n;
            while remaining > 0 {
                let Some(item) = source.recv().await else {
                    break;
                };
                let _ = tx.send(item).await;
                remaining -= 1;
            }
            // let the next stage finish without waiting for the upstream to run dry
            drop(tx);
            drain(source).await;
        });

        Self::range(rx)
    }

    /// Discards the first `n` items and forwards the rest.
    pub fn skip(self, n: usize) -> Self {
        if n == 0 {
            return self;
        }

        let (tx, rx) = pipe();
        let mut source = self.source;

        spawn_safe(async move {
            let mut skipped = 0;
            while let Some(item) = source.recv().await {
                if skipped < n {
                    skipped += 1;
                    continue;
                }
                let _ = tx.send(item).await;
            }
        });

        Self::range(rx)
    }

    /// Emits the last `n` items in their original order once the upstream is exhausted.
    ///
    /// # Panics
    /// Panics if `n` is 0.
    pub fn tail(self, n: usize) -> Self {
        assert!(n > 0, "n should be greater than 0");

        let (tx, rx) = pipe();
        let mut source = self.source;

        spawn_safe(async move {
            let mut ring = Ring::new(n);
            while let Some(item) = source.recv().await {
                ring.add(item);
            }
            for item in ring.take() {
                if tx.send(item).await.is_err() {
                    break;
                }
            }
        });

        Self::range(rx)
    }

    /// Sorts the whole upstream with `compare`. The sort is stable.
    pub async fn sort<F>(self, compare: F) -> Self
    where
        F: FnMut(&T, &T) -> Ordering,
    {
        let mut items = self.collect().await;
        items.sort_by(compare);
        Self::just(items)
    }

    /// Emits the whole upstream in reverse order.
    pub async fn reverse(self) -> Self {
        let mut items = self.collect().await;
        items.reverse();
        Self::just(items)
    }

    /// Collects the whole upstream into a single `Vec` item.
    pub async fn merge(self) -> Stream<Vec<T>> {
        let items = self.collect().await;
        Stream::just(iter::once(items))
    }

    /// Chunks consecutive items into `Vec`s of `n` items; the last chunk may be shorter.
    ///
    /// # Panics
    /// Panics if `n` is 0.
    pub fn split(self, n: usize) -> Stream<Vec<T>> {
        assert!(n > 0, "n should be greater than 0");

        let (tx, rx) = pipe();
        let mut source = self.source;

        spawn_safe(async move {
            let mut chunk = Vec::with_capacity(n);
            while let Some(item) = source.recv().await {
                chunk.push(item);
                if chunk.len() == n {
                    let full = std::mem::replace(&mut chunk, Vec::with_capacity(n));
                    let _ = tx.send(full).await;
                }
            }
            if !chunk.is_empty() {
                let _ = tx.send(chunk).await;
            }
        });

        Stream::range(rx)
    }

    /// Puts a buffer of `n` items between the upstream and the next stage, so a bursty
    /// producer can run ahead of a slower consumer.
    pub fn buffer(self, n: usize) -> Self {
        let (tx, rx) = mpsc::channel(n.max(PIPE_CAPACITY));
        let mut source = self.source;

        spawn_safe(async move {
            while let Some(item) = source.recv().await {
                let _ = tx.send(item).await;
            }
        });

        Self::range(rx)
    }

    /// Interleaves this stream with `others`. Items of one source keep their relative order,
    /// the interleaving across sources is unspecified. The output closes once every source is
    /// exhausted.
    pub fn concat<I>(self, others: I) -> Self
    where
        I: IntoIterator<Item = Stream<T>>,
    {
        let (tx, rx) = pipe();
        let others: Vec<Stream<T>> = others.into_iter().collect();

        spawn_safe(async move {
            let mut group = RoutineGroup::new();
            for stream in iter::once(self).chain(others) {
                let tx = tx.clone();
                group.run(async move {
                    let mut source = stream.source;
                    while let Some(item) = source.recv().await {
                        let _ = tx.send(item).await;
                    }
                });
            }
            drop(tx);
            group.wait().await;
        });

        Self::range(rx)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
    use std::time::Duration;

    use tokio::sync::oneshot;
    use tokio::time::timeout;

    use super::*;

    /// Generator stream of `0..count` that reports on `done` once every item has been accepted
    /// by the channel, i.e. the producer was never left blocked.
    fn tracked_source(count: usize) -> (Stream<usize>, oneshot::Receiver<()>) {
        let (done_tx, done_rx) = oneshot::channel();
        let stream = Stream::from_generator(move |tx| async move {
            for i in 0..count {
                if tx.send(i).await.is_err() {
                    return;
                }
            }
            let _ = done_tx.send(());
        });
        (stream, done_rx)
    }

    async fn assert_producer_finishes(done: oneshot::Receiver<()>) {
        timeout(Duration::from_secs(2), done)
            .await
            .expect("producer was left blocked")
            .expect("producer should report completion");
    }

    fn sorted<T: Ord>(mut items: Vec<T>) -> Vec<T> {
        items.sort();
        items
    }

    #[tokio::test]
    async fn from_generator_emits_everything() {
        let items = Stream::from_generator(|tx| async move {
            for i in 0..10 {
                tx.send(i).await.unwrap();
            }
        })
        .collect()
        .await;
        assert_eq!(items, (0..10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn from_generator_closes_on_panic() {
        async fn failing_generator(tx: mpsc::Sender<i32>) {
            tx.send(1).await.unwrap();
            tx.send(2).await.unwrap();
            panic!("generator failed mid-way")
        }

        let stream = Stream::from_generator(failing_generator);
        let items = timeout(Duration::from_secs(1), stream.collect())
            .await
            .expect("stream should close after the generator panicked");
        assert_eq!(items, vec![1, 2]);
    }

    #[test]
    fn just_works_without_runtime() {
        let Stream { mut source } = Stream::just(vec!["a", "b"]);
        assert_eq!(source.try_recv().unwrap(), "a");
        assert_eq!(source.try_recv().unwrap(), "b");
        assert!(source.try_recv().is_err());
    }

    #[tokio::test]
    async fn just_count_matches_len() {
        for len in [0usize, 1, 7, 100] {
            let count = Stream::just(0..len).count().await;
            assert_eq!(count, len);
        }
    }

    #[tokio::test]
    async fn range_wraps_receiver() {
        let (tx, rx) = mpsc::channel(4);
        tokio::spawn(async move {
            for i in 0..3 {
                tx.send(i).await.unwrap();
            }
        });
        assert_eq!(Stream::range(rx).collect().await, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn filter_keeps_even_numbers() {
        let items = Stream::just(0..10)
            .filter(|item| item % 2 == 0)
            .collect()
            .await;
        assert_eq!(sorted(items), vec![0, 2, 4, 6, 8]);
    }

    #[tokio::test]
    async fn single_worker_preserves_order() {
        let opts = WalkOptions::default().with_workers(1);
        let items = Stream::just(0..50)
            .map_with(|item| item * 2, opts)
            .filter_with(|item| item % 3 != 0, opts)
            .collect()
            .await;
        let expected: Vec<_> = (0..50).map(|i| i * 2).filter(|i| i % 3 != 0).collect();
        assert_eq!(items, expected);
    }

    #[tokio::test]
    async fn zero_workers_behaves_like_one() {
        let opts = WalkOptions::default().with_workers(0);
        let items = Stream::just(0..20).map_with(|i| i + 1, opts).collect().await;
        assert_eq!(items, (1..21).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn walk_can_emit_many_or_none() {
        let items = Stream::just(vec!["aaa", "", "bb"])
            .walk(|item: &str, pipe| async move {
                for c in item.chars() {
                    let _ = pipe.send(c.to_ascii_uppercase()).await;
                }
            })
            .collect()
            .await;
        assert_eq!(sorted(items), vec!['A', 'A', 'A', 'B', 'B']);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn walk_respects_worker_limit() {
        let inflight = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let (i, p) = (Arc::clone(&inflight), Arc::clone(&peak));
        let count = Stream::just(0..40)
            .walk_with(
                move |item, pipe| {
                    let (inflight, peak) = (Arc::clone(&i), Arc::clone(&p));
                    async move {
                        let now = inflight.fetch_add(1, AtomicOrdering::SeqCst) + 1;
                        peak.fetch_max(now, AtomicOrdering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(2)).await;
                        inflight.fetch_sub(1, AtomicOrdering::SeqCst);
                        let _ = pipe.send(item).await;
                    }
                },
                WalkOptions::default().with_workers(3),
            )
            .count()
            .await;

        assert_eq!(count, 40);
        assert!(peak.load(AtomicOrdering::SeqCst) <= 3);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn unlimited_walk_processes_everything() {
        let items = Stream::just(0..200)
            .map_with(|i| i * 10, WalkOptions::default().unlimited_workers())
            .collect()
            .await;
        assert_eq!(sorted(items), (0..200).map(|i| i * 10).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn walk_contains_panicking_item() {
        let items = timeout(
            Duration::from_secs(1),
            Stream::just(1..=5)
                .map(|i| {
                    if i == 3 {
                        panic!("cannot map 3");
                    }
                    i
                })
                .collect(),
        )
        .await
        .expect("a panicking item must not stall the stage");
        assert_eq!(sorted(items), vec![1, 2, 4, 5]);
    }

    #[tokio::test]
    async fn distinct_keeps_first_arrival() {
        let items = Stream::just(vec![(1, 'a'), (2, 'b'), (1, 'c'), (3, 'd'), (2, 'e')])
            .distinct(|(key, _)| *key)
            .collect()
            .await;
        assert_eq!(items, vec![(1, 'a'), (2, 'b'), (3, 'd')]);
    }

    #[tokio::test]
    async fn group_buckets_by_key() {
        let words = vec!["golang", "google", "php", "python", "java", "c++"];
        let groups = Stream::just(words)
            .group(|word| word.chars().next().filter(|c| *c == 'g' || *c == 'p'))
            .await
            .collect()
            .await;

        let groups = sorted(groups);
        assert_eq!(
            groups,
            vec![
                vec!["golang", "google"],
                vec!["java", "c++"],
                vec!["php", "python"],
            ]
        );
    }

    #[tokio::test]
    async fn head_takes_min_of_n_and_len() {
        assert_eq!(Stream::just(0..10).head(3).collect().await, vec![0, 1, 2]);
        assert_eq!(Stream::just(0..2).head(5).collect().await, vec![0, 1]);
    }

    #[tokio::test]
    async fn head_drains_upstream() {
        let (stream, done) = tracked_source(1000);
        let items = stream.head(2).collect().await;
        assert_eq!(items, vec![0, 1]);
        assert_producer_finishes(done).await;
    }

    #[test]
    #[should_panic(expected = "n must be greater than 0")]
    fn head_zero_panics() {
        let _ = Stream::just(vec![1]).head(0);
    }

    #[tokio::test]
    async fn skip_discards_prefix() {
        assert_eq!(Stream::just(0..6).skip(4).collect().await, vec![4, 5]);
        assert_eq!(Stream::just(0..3).skip(0).collect().await, vec![0, 1, 2]);
        assert!(Stream::just(0..3).skip(10).collect().await.is_empty());
    }

    #[tokio::test]
    async fn tail_keeps_last_items() {
        assert_eq!(Stream::just(0..3).tail(5).collect().await, vec![0, 1, 2]);
        assert_eq!(Stream::just(0..10).tail(3).collect().await, vec![7, 8, 9]);
        assert_eq!(Stream::just(0..4).tail(4).collect().await, vec![0, 1, 2, 3]);
    }

    #[test]
    #[should_panic(expected = "n should be greater than 0")]
    fn tail_zero_panics() {
        let _ = Stream::just(vec![1]).tail(0);
    }

    #[tokio::test]
    async fn sort_is_stable() {
        let items = Stream::just(vec![(2, 'a'), (1, 'b'), (2, 'c'), (1, 'd')])
            .sort(|a, b| a.0.cmp(&b.0))
            .await
            .collect()
            .await;
        assert_eq!(items, vec![(1, 'b'), (1, 'd'), (2, 'a'), (2, 'c')]);
    }

    #[tokio::test]
    async fn sort_then_inverse_sort_reverses() {
        let input = vec![5, 3, 9, 1, 7];
        let ascending = Stream::just(input.clone())
            .sort(|a, b| a.cmp(b))
            .await
            .collect()
            .await;
        let descending = Stream::just(ascending.clone())
            .sort(|a, b| b.cmp(a))
            .await
            .collect()
            .await;
        let mut reversed = ascending;
        reversed.reverse();
        assert_eq!(descending, reversed);
    }

    #[tokio::test]
    async fn reverse_twice_restores_order() {
        let items = Stream::just(1..=5)
            .reverse()
            .await
            .reverse()
            .await
            .collect()
            .await;
        assert_eq!(items, vec![1, 2, 3, 4, 5]);

        let reversed = Stream::just(1..=5).reverse().await.collect().await;
        assert_eq!(reversed, vec![5, 4, 3, 2, 1]);
    }

    #[tokio::test]
    async fn merge_collects_into_one_item() {
        let merged = Stream::just(1..=4).merge().await.collect().await;
        assert_eq!(merged, vec![vec![1, 2, 3, 4]]);
    }

    #[tokio::test]
    async fn split_chunks_items() {
        let chunks = Stream::just(1..=10).split(4).collect().await;
        assert_eq!(chunks, vec![vec![1, 2, 3, 4], vec![5, 6, 7, 8], vec![9, 10]]);

        let exact = Stream::just(1..=4).split(2).collect().await;
        assert_eq!(exact, vec![vec![1, 2], vec![3, 4]]);
    }

    #[test]
    #[should_panic(expected = "n should be greater than 0")]
    fn split_zero_panics() {
        let _ = Stream::just(vec![1]).split(0);
    }

    #[tokio::test]
    async fn buffer_forwards_in_order() {
        let items = Stream::just(0..20).buffer(8).collect().await;
        assert_eq!(items, (0..20).collect::<Vec<_>>());
        let items = Stream::just(0..3).buffer(0).collect().await;
        assert_eq!(items, vec![0, 1, 2]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concat_keeps_per_source_order() {
        let merged = concat(
            Stream::just(vec![1, 2, 3]),
            vec![Stream::just(vec![10, 20]), Stream::just(vec![100])],
        )
        .collect()
        .await;

        assert_eq!(sorted(merged.clone()), vec![1, 2, 3, 10, 20, 100]);
        let small: Vec<_> = merged.iter().copied().filter(|i| *i < 10).collect();
        let tens: Vec<_> = merged
            .iter()
            .copied()
            .filter(|i| (10..100).contains(i))
            .collect();
        assert_eq!(small, vec![1, 2, 3]);
        assert_eq!(tens, vec![10, 20]);
    }

    #[tokio::test]
    async fn concat_of_nothing_is_identity() {
        let items = Stream::just(vec![1, 2]).concat(Vec::new()).collect().await;
        assert_eq!(items, vec![1, 2]);
    }

    #[tokio::test]
    async fn operators_chain() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        Stream::just(vec![5, 1, 5, 8, 2, 9, 1, 3])
            .distinct(|i| *i)
            .filter_with(|i| *i > 1, WalkOptions::default().with_workers(1))
            .skip(1)
            .head(3)
            .for_each(move |i| sink.lock().unwrap().push(i))
            .await;
        assert_eq!(*seen.lock().unwrap(), vec![8, 2, 9]);
    }
}
