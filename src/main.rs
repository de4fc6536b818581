use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use common::cli::{CommonArgs, CommonCommands, utils};
use workload_table::PrometheusRunner;
use workloads_tui::App;

/// Browse Kubernetes workloads backed by Prometheus and kube-state-metrics
#[derive(Parser, Debug)]
#[command(name = "kube-workloads")]
#[command(about = "Paged workload tables with on-demand per-row metrics")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: Option<CommonCommands>,
}

impl Cli {
    async fn run(self) -> Result<()> {
        let config = utils::load_config(self.common.config.as_ref())?;
        let command = self.command.unwrap_or_default();

        // The UI owns the terminal, so logs go to a file when one is configured.
        let log_file = match command {
            CommonCommands::Start => config.logging.file.as_deref(),
            _ => None,
        };
        utils::init_logging(&self.common, log_file)?;

        if utils::handle_common_command(&command, &config)? {
            return Ok(());
        }

        let runner =
            PrometheusRunner::from_config(&config).context("Failed to build query runner")?;
        tracing::info!(
            pattern = %config.datasources.pattern,
            namespace = %config.scope.namespace,
            "Starting workload browser"
        );

        let mut app = App::new(&config, Arc::new(runner))?;
        app.run().await
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = cli.run().await {
        eprintln!("Error: {e}");
        for cause in e.chain().skip(1) {
            eprintln!("  caused by: {cause}");
        }
        std::process::exit(1);
    }
}
