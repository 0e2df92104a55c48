use clap::Parser;
use stratbot::cli::{run, Cli};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> std::process::ExitCode {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "stratbot=info".into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();

    run(Cli::parse())
}
