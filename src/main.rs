// Entrypoint for the uploader.
// - Keeps `main` small: parse flags, set up logging, run the workflow.
// - Returns `anyhow::Result` so any failure is printed and exits with 1.

use clap::Parser;
use tracing_subscriber::EnvFilter;
use zenodo_upload::{cli::Args, ui::Console, workflow};

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // RUST_LOG wins over -v when set.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(args.log_level()));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut console = Console::new();
    workflow::run(
        &args.files,
        &args.metadata(),
        || args.service_config(),
        &mut console,
    )?;
    Ok(())
}
