use std::env;
use std::sync::OnceLock;

use rivulet_core::config::{DEFAULT_WORKERS, MIN_WORKERS};

const ENV_WORKERS: &str = "RIVULET_WORKERS";
static DEFAULT_WORKER_COUNT: OnceLock<Result<usize, String>> = OnceLock::new();

/// Worker count used when `--workers` is not given, read from `RIVULET_WORKERS` once.
pub(crate) fn default_workers() -> Result<usize, String> {
    DEFAULT_WORKER_COUNT
        .get_or_init(|| parse_workers(env::var(ENV_WORKERS).ok().as_deref()))
        .clone()
}

fn parse_workers(raw: Option<&str>) -> Result<usize, String> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_WORKERS);
    };
    raw.trim()
        .parse::<usize>()
        .map(|workers| workers.max(MIN_WORKERS))
        .map_err(|e| format!("Config Error - invalid {ENV_WORKERS} value {raw:?}: {e}"))
}
