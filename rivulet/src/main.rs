use std::error::Error;

use rivulet_core::config::MIN_WORKERS;
use tracing::{error, info};

mod cmdline;
mod config;
mod demo;
mod setup_tracing;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    setup_tracing::register();

    if let Err(e) = run().await {
        error!("{e:?}");
        return Err(e);
    }
    info!("Exiting...");

    Ok(())
}

async fn run() -> Result<(), Box<dyn Error>> {
    let matches = cmdline::root_cli().get_matches();

    // the flag wins over the environment
    let workers = match matches.get_one::<usize>("workers") {
        Some(workers) => (*workers).max(MIN_WORKERS),
        None => config::default_workers()?,
    };

    match matches.subcommand() {
        Some(("stream", args)) => {
            let pipeline = args
                .get_one::<String>("pipeline")
                .map(String::as_str)
                .unwrap_or("evens");
            info!(pipeline, workers, "Running stream pipeline");
            demo::stream(pipeline, workers).await;
        }
        Some(("mapreduce", args)) => {
            let upto = args.get_one::<u32>("upto").copied().unwrap_or(10);
            info!(upto, workers, "Running map reduce");
            let result = demo::increments(upto, workers)
                .await
                .map_err(|e| format!("Error running map reduce: {e}"))?;
            info!(?result, "Map reduce finished");
        }
        Some(("finish", args)) => {
            let tasks = args.get_one::<u32>("tasks").copied().unwrap_or(5);
            let fail_at = args.get_one::<u32>("fail-at").copied();
            info!(tasks, ?fail_at, "Running tasks");
            match demo::run_tasks(tasks, fail_at).await {
                Ok(()) => info!("All tasks succeeded"),
                Err(e) => error!(%e, "A task failed, the rest were cancelled"),
            }
        }
        Some((name, _)) => return Err(format!("unknown subcommand {name}").into()),
        None => return Err("a subcommand is required".into()),
    }

    Ok(())
}
