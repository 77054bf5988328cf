#![warn(clippy::all, clippy::pedantic)]

mod batch;
mod dump;
mod obj;

use batch::{batch, Batch};
use dump::{dump, Dump};
use obj::{obj, Obj};

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[clap(version = "0.1.0")]
struct Opts {
    /// Log decoder progress
    #[clap(short, long)]
    verbose: bool,
    #[clap(subcommand)]
    subcommand: SubCommand,
}

#[derive(Parser)]
enum SubCommand {
    Dump(Dump),
    Obj(Obj),
    Batch(Batch),
}

fn main() -> anyhow::Result<()> {
    let opts = Opts::parse();

    let default_level = if opts.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    match opts.subcommand {
        SubCommand::Dump(opts) => dump(&opts),
        SubCommand::Obj(opts) => obj(&opts),
        SubCommand::Batch(opts) => batch(&opts),
    }
}
