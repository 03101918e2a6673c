//! Generate → Map → Reduce with first-error cancellation.
//!
//! A run wires three stages together:
//! - the generator writes items into the source channel and closes it by returning,
//! - a pool of at most `workers` concurrent mappers reads the source and writes results into the
//!   collector through a [`Writer`],
//! - the reducer reads the collector and writes at most one final value.
//!
//! Every stage gets a [`Canceller`]. The first `cancel(err)` stores its error in a set-once cell
//! and fires the run's cancellation token, which stops the mappers, makes pending writes a
//! no-op and releases the caller waiting on the output. A stored error always wins over a value
//! that raced with it. Nothing is shared across runs.
//!
//! A panicking mapper is contained and its item produces nothing. A panicking generator or
//! reducer cancels the run with [`Error::Panicked`], since the result could not be trusted.

use std::future::Future;
use std::sync::{Arc, OnceLock};

use tokio::sync::{Semaphore, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};
use tracing::{debug, error, trace, warn};

use crate::config::{MapReduceOptions, PIPE_CAPACITY};
use crate::error::{Error, Result};
use crate::shared::task::{catch_panic, drain, drain_in_background, hand_off, spawn_safe};

/// Writer hands items to the next stage of a run. Once the run is cancelled, writes are dropped
/// instead of blocking.
#[derive(Debug)]
pub struct Writer<T> {
    pipe: mpsc::Sender<T>,
    cancel_token: CancellationToken,
}

impl<T> Clone for Writer<T> {
    fn clone(&self) -> Self {
        Writer {
            pipe: self.pipe.clone(),
            cancel_token: self.cancel_token.clone(),
        }
    }
}

impl<T> Writer<T> {
    fn new(pipe: mpsc::Sender<T>, cancel_token: CancellationToken) -> Self {
        Writer { pipe, cancel_token }
    }

    /// Writes `item` to the next stage, or drops it if the run has been cancelled.
    pub async fn write(&self, item: T) {
        tokio::select! {
            biased;
            _ = self.cancel_token.cancelled() => {
                trace!("Run is cancelled, dropping write");
            }
            sent = self.pipe.send(item) => {
                if sent.is_err() {
                    trace!("Next stage is gone, dropping write");
                }
            }
        }
    }
}

struct CancelState {
    /// first error wins, later ones are ignored
    error: OnceLock<Error>,
    token: CancellationToken,
}

/// Canceller stops a run. It is handed to every mapper and to the reducer.
#[derive(Clone)]
pub struct Canceller {
    state: Arc<CancelState>,
}

impl Canceller {
    fn new(token: CancellationToken) -> Self {
        Canceller {
            state: Arc::new(CancelState {
                error: OnceLock::new(),
                token,
            }),
        }
    }

    /// Cancels the run. The first error recorded becomes the result of the run; `None` is
    /// recorded as [`Error::Cancelled`]. Calling it again is harmless.
    pub fn cancel(&self, err: Option<Error>) {
        let err = err.unwrap_or(Error::Cancelled);
        if let Err(ignored) = self.state.error.set(err) {
            trace!(?ignored, "Run already cancelled, keeping the first error");
        }
        self.finish();
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.token.is_cancelled()
    }

    /// Resolves once the run is cancelled or torn down.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.state.token.cancelled()
    }

    fn token(&self) -> CancellationToken {
        self.state.token.clone()
    }

    /// Tears the run down without recording an error.
    fn finish(&self) {
        self.state.token.cancel();
    }

    fn error(&self) -> Option<Error> {
        self.state.error.get().cloned()
    }
}

/// Runs `generate`, maps every generated item with `mapper` and reduces the mapped items with
/// `reducer`, using the default [`MapReduceOptions`].
pub async fn map_reduce<T, U, V, G, GFut, M, MFut, R, RFut>(
    generate: G,
    mapper: M,
    reducer: R,
) -> Result<V>
where
    T: Send + 'static,
    U: Send + 'static,
    V: Send + 'static,
    G: FnOnce(mpsc::Sender<T>) -> GFut + Send + 'static,
    GFut: Future<Output = ()> + Send + 'static,
    M: Fn(T, Writer<U>, Canceller) -> MFut + Send + Sync + 'static,
    MFut: Future<Output = ()> + Send + 'static,
    R: FnOnce(mpsc::Receiver<U>, Writer<V>, Canceller) -> RFut + Send + 'static,
    RFut: Future<Output = ()> + Send + 'static,
{
    map_reduce_with(generate, mapper, reducer, MapReduceOptions::default()).await
}

/// Same as [`map_reduce`] with explicit options.
pub async fn map_reduce_with<T, U, V, G, GFut, M, MFut, R, RFut>(
    generate: G,
    mapper: M,
    reducer: R,
    opts: MapReduceOptions,
) -> Result<V>
where
    T: Send + 'static,
    U: Send + 'static,
    V: Send + 'static,
    G: FnOnce(mpsc::Sender<T>) -> GFut + Send + 'static,
    GFut: Future<Output = ()> + Send + 'static,
    M: Fn(T, Writer<U>, Canceller) -> MFut + Send + Sync + 'static,
    MFut: Future<Output = ()> + Send + 'static,
    R: FnOnce(mpsc::Receiver<U>, Writer<V>, Canceller) -> RFut + Send + 'static,
    RFut: Future<Output = ()> + Send + 'static,
{
    let run = Run::new(opts);
    let (source_tx, source_rx) = mpsc::channel(PIPE_CAPACITY);

    let canceller = run.canceller.clone();
    tokio::spawn(async move {
        // keeps the source open until a panic has been recorded, so the mappers cannot finish
        // the run with a partial result first
        let guard = source_tx.clone();
        if let Err(message) = catch_panic(async move { generate(source_tx).await }).await {
            canceller.cancel(Some(Error::Panicked(format!("generator: {message}"))));
        }
        drop(guard);
    });

    run.execute(source_rx, mapper, reducer).await
}

/// Same as [`map_reduce`] but the items come from an existing channel instead of a generator.
pub async fn map_reduce_chan<T, U, V, M, MFut, R, RFut>(
    source: mpsc::Receiver<T>,
    mapper: M,
    reducer: R,
) -> Result<V>
where
    T: Send + 'static,
    U: Send + 'static,
    V: Send + 'static,
    M: Fn(T, Writer<U>, Canceller) -> MFut + Send + Sync + 'static,
    MFut: Future<Output = ()> + Send + 'static,
    R: FnOnce(mpsc::Receiver<U>, Writer<V>, Canceller) -> RFut + Send + 'static,
    RFut: Future<Output = ()> + Send + 'static,
{
    Run::new(MapReduceOptions::default())
        .execute(source, mapper, reducer)
        .await
}

/// Map-reduce where the reducer produces no value. Returns `Ok(())` unless the run was
/// cancelled with an error.
pub async fn map_reduce_void<T, U, G, GFut, M, MFut, R, RFut>(
    generate: G,
    mapper: M,
    reducer: R,
) -> Result<()>
where
    T: Send + 'static,
    U: Send + 'static,
    G: FnOnce(mpsc::Sender<T>) -> GFut + Send + 'static,
    GFut: Future<Output = ()> + Send + 'static,
    M: Fn(T, Writer<U>, Canceller) -> MFut + Send + Sync + 'static,
    MFut: Future<Output = ()> + Send + 'static,
    R: FnOnce(mpsc::Receiver<U>, Canceller) -> RFut + Send + 'static,
    RFut: Future<Output = ()> + Send + 'static,
{
    let result = map_reduce(
        generate,
        mapper,
        move |pipe, _writer: Writer<()>, cancel| reducer(pipe, cancel),
    )
    .await;

    match result {
        Ok(()) | Err(Error::NoOutput) => Ok(()),
        Err(e) => Err(e),
    }
}

/// Result of a `finish` task, `Err` carries the message of a contained panic.
type FinishOutcome = std::result::Result<Result<()>, String>;

/// Runs every task concurrently and returns the first error. Every task is started before the
/// run looks at any outcome, so a failure never keeps a sibling from running; it only stops the
/// run from waiting for the siblings still in flight.
pub async fn finish<I, F>(tasks: I) -> Result<()>
where
    I: IntoIterator<Item = F>,
    F: Future<Output = Result<()>> + Send + 'static,
{
    let started: Vec<JoinHandle<FinishOutcome>> = tasks
        .into_iter()
        .map(|task| tokio::spawn(catch_panic(task)))
        .collect();

    map_reduce_void(
        move |source: mpsc::Sender<JoinHandle<FinishOutcome>>| async move {
            for handle in started {
                if source.send(handle).await.is_err() {
                    return;
                }
            }
        },
        |handle: JoinHandle<FinishOutcome>, _writer: Writer<()>, cancel: Canceller| async move {
            match handle.await {
                Ok(Ok(Ok(()))) => {}
                Ok(Ok(Err(e))) => cancel.cancel(Some(e)),
                // already logged where it was caught, the task simply produced nothing
                Ok(Err(_)) => {}
                Err(e) => error!(?e, "Finish task did not run to completion"),
            }
        },
        |pipe, _cancel| drain(pipe),
    )
    .await
}

/// State of a single run.
struct Run {
    canceller: Canceller,
    parent: Option<CancellationToken>,
    workers: usize,
}

impl Run {
    fn new(opts: MapReduceOptions) -> Self {
        let token = match &opts.cancel_token {
            Some(parent) => parent.child_token(),
            None => CancellationToken::new(),
        };
        Run {
            canceller: Canceller::new(token),
            parent: opts.cancel_token,
            workers: opts.workers,
        }
    }

    async fn execute<T, U, V, M, MFut, R, RFut>(
        self,
        source: mpsc::Receiver<T>,
        mapper: M,
        reducer: R,
    ) -> Result<V>
    where
        T: Send + 'static,
        U: Send + 'static,
        V: Send + 'static,
        M: Fn(T, Writer<U>, Canceller) -> MFut + Send + Sync + 'static,
        MFut: Future<Output = ()> + Send + 'static,
        R: FnOnce(mpsc::Receiver<U>, Writer<V>, Canceller) -> RFut + Send + 'static,
        RFut: Future<Output = ()> + Send + 'static,
    {
        debug!(workers = self.workers, "Starting map-reduce run");
        let token = self.canceller.token();
        let (collector_tx, collector_rx) = mpsc::channel(self.workers);
        let (output_tx, mut output_rx) = mpsc::channel(PIPE_CAPACITY);

        // reducer
        let canceller = self.canceller.clone();
        let output = Writer::new(output_tx, token.clone());
        let reducer_input = hand_off(collector_rx, PIPE_CAPACITY);
        tokio::spawn(async move {
            // keeps the output open until the run is torn down, the caller must not see a
            // closed output before a reducer panic has been recorded
            let guard = output.clone();
            let cancel = canceller.clone();
            let reduced =
                catch_panic(async move { reducer(reducer_input, output, cancel).await }).await;
            if let Err(message) = reduced {
                canceller.cancel(Some(Error::Panicked(format!("reducer: {message}"))));
            }
            canceller.finish();
            drop(guard);
        });

        // mappers
        tokio::spawn(execute_mappers(
            source,
            Arc::new(mapper),
            Writer::new(collector_tx, token.clone()),
            self.canceller.clone(),
            self.workers,
        ));

        let value = tokio::select! {
            biased;
            value = output_rx.recv() => value,
            // the reducer may have written right before the run was torn down
            _ = token.cancelled() => output_rx.try_recv().ok(),
        };
        // the caller has its answer, stop whatever is still running
        self.canceller.finish();

        if let Some(err) = self.canceller.error() {
            warn!(?err, "Map-reduce run failed");
            return Err(err);
        }
        match value {
            Some(value) => Ok(value),
            None if self.parent.as_ref().is_some_and(|p| p.is_cancelled()) => {
                warn!("Map-reduce run cancelled by its parent");
                Err(Error::Cancelled)
            }
            None => Err(Error::NoOutput),
        }
    }
}

/// Feeds source items to at most `workers` concurrent mappers until the source is exhausted or
/// the run is cancelled. Whatever the generator still produces afterwards is drained. The
/// collector closes once the last in-flight mapper drops its writer.
async fn execute_mappers<T, U, M, MFut>(
    mut source: mpsc::Receiver<T>,
    mapper: Arc<M>,
    collector: Writer<U>,
    canceller: Canceller,
    workers: usize,
) where
    T: Send + 'static,
    U: Send + 'static,
    M: Fn(T, Writer<U>, Canceller) -> MFut + Send + Sync + 'static,
    MFut: Future<Output = ()> + Send + 'static,
{
    let pool = Arc::new(Semaphore::new(workers));

    loop {
        let permit = tokio::select! {
            biased;
            _ = canceller.cancelled() => break,
            permit = Arc::clone(&pool).acquire_owned() => match permit {
                Ok(permit) => permit,
                Err(e) => {
                    error!(?e, "Mapper pool is closed");
                    break;
                }
            },
        };

        let item = tokio::select! {
            biased;
            _ = canceller.cancelled() => break,
            item = source.recv() => match item {
                Some(item) => item,
                None => break,
            },
        };

        let mapper = Arc::clone(&mapper);
        let writer = collector.clone();
        let cancel = canceller.clone();
        spawn_safe(async move {
            let _permit = permit;
            mapper(item, writer, cancel).await;
        });
    }

    drain_in_background(source);
}
