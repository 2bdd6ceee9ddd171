use clap::Parser;
use tracing_subscriber::EnvFilter;

mod app;
mod backfill;
mod browse;
mod catalog;
mod cli;
mod config;
mod dashboard;
mod semantic;
mod storage;
#[cfg(test)]
mod tests;

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> anyhow::Result<()> {
    let args = cli::Args::parse();
    init_logging();

    let data_dir = storage::DataDir::resolve()?;
    let mut app = app::App::open(data_dir)?;

    cli::handle_command(&mut app, args.command)
}
