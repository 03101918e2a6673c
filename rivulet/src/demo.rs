//! Small pipelines showing the library at work, one per subcommand.

use std::time::Duration;

use rivulet_core::config::{MapReduceOptions, WalkOptions};
use rivulet_core::mapreduce::{Canceller, Writer, finish, map_reduce_with};
use rivulet_core::stream::Stream;
use rivulet_core::{Error, Result};
use tokio::sync::mpsc;
use tracing::{debug, info};

const SAMPLE_LOGS: &[&str] = &[
    "INFO starting worker",
    "DEBUG polling source",
    "ERROR connection reset by peer",
    "INFO batch committed",
    "WARN slow consumer detected",
    "ERROR write timed out",
    "INFO batch committed",
    "malformed line",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct LogEntry {
    pub(crate) level: String,
    pub(crate) message: String,
}

fn parse_log(line: &str) -> Option<LogEntry> {
    let (level, message) = line.split_once(' ')?;
    if level.is_empty() || !level.chars().all(|c| c.is_ascii_uppercase()) {
        return None;
    }
    Some(LogEntry {
        level: level.to_string(),
        message: message.to_string(),
    })
}

/// Even numbers below `limit`, filtered concurrently and sorted afterwards.
pub(crate) async fn evens(limit: u32, workers: usize) -> Vec<u32> {
    Stream::from_generator(move |tx| async move {
        for i in 0..limit {
            if tx.send(i).await.is_err() {
                return;
            }
        }
    })
    .filter_with(|i| i % 2 == 0, WalkOptions::default().with_workers(workers))
    .sort(|a, b| a.cmp(b))
    .await
    .collect()
    .await
}

/// Parses log lines concurrently, drops the ones that do not parse and counts entries per
/// level. Levels come back sorted by name.
pub(crate) async fn log_levels(lines: &[&str], workers: usize) -> Vec<(String, usize)> {
    let lines: Vec<String> = lines.iter().map(|line| line.to_string()).collect();
    let mut counts: Vec<(String, usize)> = Stream::just(lines)
        .walk_with(
            |line: String, pipe: mpsc::Sender<LogEntry>| async move {
                match parse_log(&line) {
                    Some(entry) => {
                        debug!(level = %entry.level, message = %entry.message, "Parsed log line");
                        let _ = pipe.send(entry).await;
                    }
                    None => debug!(?line, "Skipping malformed log line"),
                }
            },
            WalkOptions::default().with_workers(workers),
        )
        .group(|entry| entry.level.clone())
        .await
        .map(|bucket| {
            let level = bucket
                .first()
                .map(|entry| entry.level.clone())
                .unwrap_or_default();
            (level, bucket.len())
        })
        .collect()
        .await;
    counts.sort();
    counts
}

/// Splits `1..=upto` into chunks of `size` and sums every chunk.
pub(crate) async fn chunk_sums(upto: u32, size: usize) -> Vec<u32> {
    Stream::just(1..=upto)
        .split(size)
        .map_with(
            |chunk: Vec<u32>| chunk.iter().sum::<u32>(),
            WalkOptions::default().with_workers(1),
        )
        .collect()
        .await
}

/// Adds one to every number in `1..=upto` with a MapReduce run and returns the sorted result.
pub(crate) async fn increments(upto: u32, workers: usize) -> Result<Vec<u32>> {
    let mut result = map_reduce_with(
        move |source: mpsc::Sender<u32>| async move {
            for i in 1..=upto {
                if source.send(i).await.is_err() {
                    return;
                }
            }
        },
        |item: u32, writer: Writer<u32>, _: Canceller| async move {
            writer.write(item + 1).await;
        },
        |mut pipe: mpsc::Receiver<u32>, writer: Writer<Vec<u32>>, _: Canceller| async move {
            let mut items = Vec::new();
            while let Some(item) = pipe.recv().await {
                items.push(item);
            }
            writer.write(items).await;
        },
        MapReduceOptions::default().with_workers(workers),
    )
    .await?;
    result.sort_unstable();
    Ok(result)
}

/// Runs `tasks` tasks, the one at `fail_at` (if any) fails.
pub(crate) async fn run_tasks(tasks: u32, fail_at: Option<u32>) -> Result<()> {
    finish((0..tasks).map(move |i| async move {
        tokio::time::sleep(Duration::from_millis(u64::from(i) * 5)).await;
        if fail_at == Some(i) {
            return Err(Error::task(format!("task {i} failed")));
        }
        debug!(task = i, "Task completed");
        Ok(())
    }))
    .await
}

pub(crate) async fn stream(pipeline: &str, workers: usize) {
    match pipeline {
        "logs" => {
            let levels = log_levels(SAMPLE_LOGS, workers).await;
            info!(?levels, "Counted log levels");
        }
        "split" => {
            let sums = chunk_sums(10, 3).await;
            info!(?sums, "Summed chunks of 3");
        }
        _ => {
            let evens = evens(20, workers).await;
            info!(?evens, "Filtered even numbers");
        }
    }
}
