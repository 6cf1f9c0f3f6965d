use clap::Parser;
use dirstat_exporter::Cli;
use dirstat_exporter::logging::init_tracing;
use dirstat_exporter::run_main;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug)?;
    run_main(cli).await
}
