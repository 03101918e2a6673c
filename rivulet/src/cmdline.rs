use clap::{Arg, ArgAction, Command};

pub(super) fn root_cli() -> Command {
    Command::new("rivulet")
        .author("Rivulet Authors")
        .about("Concurrent lazy streams and MapReduce on tokio")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .arg(
            Arg::new("workers")
                .long("workers")
                .help("Number of concurrent workers, overrides RIVULET_WORKERS")
                .global(true)
                .action(ArgAction::Set)
                .value_parser(clap::value_parser!(usize)),
        )
        .subcommand(add_stream_subcommand())
        .subcommand(add_mapreduce_subcommand())
        .subcommand(add_finish_subcommand())
}

fn add_stream_subcommand() -> Command {
    Command::new("stream")
        .about("Runs one of the stream pipelines")
        .arg(
            Arg::new("pipeline")
                .long("pipeline")
                .help("Pipeline to run")
                .action(ArgAction::Set)
                .value_parser(["evens", "logs", "split"])
                .default_value("evens"),
        )
}

fn add_mapreduce_subcommand() -> Command {
    Command::new("mapreduce")
        .about("Increments 1..=upto with a MapReduce run and collects the results")
        .arg(
            Arg::new("upto")
                .long("upto")
                .help("Last number to generate")
                .action(ArgAction::Set)
                .value_parser(clap::value_parser!(u32))
                .default_value("10"),
        )
}

fn add_finish_subcommand() -> Command {
    Command::new("finish")
        .about("Runs a batch of tasks and reports the first failure")
        .arg(
            Arg::new("tasks")
                .long("tasks")
                .help("Number of tasks to run")
                .action(ArgAction::Set)
                .value_parser(clap::value_parser!(u32))
                .default_value("5"),
        )
        .arg(
            Arg::new("fail-at")
                .long("fail-at")
                .help("Index of the task that fails")
                .action(ArgAction::Set)
                .value_parser(clap::value_parser!(u32)),
        )
}
