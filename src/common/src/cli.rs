use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Common CLI arguments shared by every entry point
#[derive(Parser, Debug, Clone)]
pub struct CommonArgs {
    #[arg(long, help = "Configuration file path")]
    pub config: Option<PathBuf>,

    #[arg(short, long, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(short, long, help = "Enable quiet mode (minimal output)")]
    pub quiet: bool,
}

/// Subcommands that never start the terminal UI
#[derive(Subcommand, Debug, Clone, Default)]
pub enum CommonCommands {
    /// Start the workload browser (default behavior)
    #[default]
    Start,
    /// Show current configuration and exit
    Config {
        #[arg(long, help = "Show configuration in JSON format")]
        json: bool,
    },
    /// Validate configuration and exit
    Validate,
    /// List datasources matching the configured pattern and exit
    Datasources,
    /// Show version information and exit
    Version,
}

/// Utility functions for CLI operations
pub mod utils {
    use super::*;
    use crate::config::Configuration;
    use anyhow::{Context, Result};
    use std::fs::OpenOptions;
    use std::sync::Mutex;
    use tracing_subscriber::EnvFilter;

    /// Level implied by the verbosity flags; `RUST_LOG` still wins when set.
    pub fn log_level(args: &CommonArgs) -> &'static str {
        if args.quiet {
            "warn"
        } else if args.verbose {
            "debug"
        } else {
            "info"
        }
    }

    /// Initialize logging based on CLI arguments.
    ///
    /// With a `log_file` the output is appended there without ANSI colors;
    /// the terminal UI owns stdout while it runs.
    pub fn init_logging(args: &CommonArgs, log_file: Option<&str>) -> Result<()> {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(log_level(args)));

        match log_file {
            Some(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .with_context(|| format!("Failed to open log file {path}"))?;
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .init();
            }
            None => {
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_writer(std::io::stderr)
                    .init();
            }
        }
        Ok(())
    }

    /// Load configuration with optional override from CLI
    pub fn load_config(config_path: Option<&PathBuf>) -> Result<Configuration> {
        match config_path {
            Some(path) => {
                tracing::info!("Loading configuration from: {}", path.display());
                Configuration::load_from_path(path).context("Failed to load configuration")
            }
            None => Configuration::load().context("Failed to load configuration"),
        }
    }

    /// Display configuration in human-readable or JSON format
    pub fn display_config(config: &Configuration, json: bool) -> Result<()> {
        if json {
            let json = serde_json::to_string_pretty(config)
                .context("Failed to serialize configuration to JSON")?;
            println!("{json}");
        } else {
            println!("kube-workloads configuration:");
            println!("=============================");
            println!("Datasource pattern: {}", config.datasources.pattern);
            for ds in &config.datasources.sources {
                println!("  {} -> {}", ds.name, ds.url);
            }
            println!("Query timeout: {:?}", config.query.timeout);
            println!("Query step: {:?}", config.query.step);
            println!("Time range lookback: {:?}", config.query.lookback);
            println!("Page size: {}", config.table.page_size);
            println!("Refresh interval: {:?}", config.table.refresh_interval);
            if config.scope.cluster.is_empty() {
                println!("Cluster: <unset>");
            } else {
                println!("Cluster: {}", config.scope.cluster);
            }
            println!("Namespace pattern: {}", config.scope.namespace);
            match &config.logging.file {
                Some(file) => println!("Log file: {file}"),
                None => println!("Log file: <stderr>"),
            }
        }
        Ok(())
    }

    /// Validate configuration and report any issues
    pub fn validate_config(config: &Configuration) -> Result<()> {
        tracing::info!("Validating configuration...");

        if config.datasources.sources.is_empty() {
            anyhow::bail!("At least one datasource must be configured");
        }

        if let Some(ds) = config.datasources.sources.iter().find(|ds| ds.url.is_empty()) {
            anyhow::bail!("Datasource '{}' has an empty URL", ds.name);
        }

        config
            .datasources
            .default_datasource()
            .context("Datasource pattern does not select a datasource")?;

        if config.table.page_size == 0 {
            anyhow::bail!("Page size must be greater than zero");
        }

        if config.query.step.is_zero() {
            anyhow::bail!("Query step must be greater than zero");
        }

        tracing::info!("Configuration validation passed");
        Ok(())
    }

    /// Print datasources matching the configured pattern
    pub fn display_datasources(config: &Configuration) -> Result<()> {
        let matching = config.datasources.matching()?;
        if matching.is_empty() {
            println!(
                "No datasource matches pattern '{}'",
                config.datasources.pattern
            );
        }
        for ds in matching {
            println!("{}\t{}", ds.name, ds.url);
        }
        Ok(())
    }

    /// Handle common CLI commands that don't require starting the UI.
    ///
    /// Returns `true` when the command was fully handled.
    pub fn handle_common_command(command: &CommonCommands, config: &Configuration) -> Result<bool> {
        match command {
            CommonCommands::Config { json } => {
                display_config(config, *json)?;
                Ok(true)
            }
            CommonCommands::Validate => {
                validate_config(config)?;
                println!("Configuration is valid");
                Ok(true)
            }
            CommonCommands::Datasources => {
                display_datasources(config)?;
                Ok(true)
            }
            CommonCommands::Version => {
                println!("{}", version_info());
                Ok(true)
            }
            CommonCommands::Start => Ok(false),
        }
    }

    /// Standard version information
    pub fn version_info() -> String {
        format!(
            "{} {} ({})",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            env!("CARGO_PKG_RUST_VERSION")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Configuration, DatasourceEntry};

    fn args(verbose: bool, quiet: bool) -> CommonArgs {
        CommonArgs {
            config: None,
            verbose,
            quiet,
        }
    }

    #[test]
    fn test_common_commands_default() {
        assert!(matches!(CommonCommands::default(), CommonCommands::Start));
    }

    #[test]
    fn test_version_info() {
        let version = utils::version_info();
        assert!(version.contains(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn test_log_level_from_flags() {
        assert_eq!(utils::log_level(&args(false, false)), "info");
        assert_eq!(utils::log_level(&args(true, false)), "debug");
        assert_eq!(utils::log_level(&args(true, true)), "warn");
    }

    #[test]
    fn test_validate_default_config() {
        assert!(utils::validate_config(&Configuration::default()).is_ok());
    }

    #[test]
    fn test_validate_rejects_unmatched_pattern() {
        let mut config = Configuration::default();
        config.datasources.pattern = "mimir".to_string();
        assert!(utils::validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_rejects_empty_url_and_page_size() {
        let mut config = Configuration::default();
        config.datasources.sources.push(DatasourceEntry {
            name: "broken".to_string(),
            url: String::new(),
        });
        assert!(utils::validate_config(&config).is_err());

        let mut config = Configuration::default();
        config.table.page_size = 0;
        assert!(utils::validate_config(&config).is_err());
    }

    #[test]
    fn test_start_is_not_handled() {
        let handled =
            utils::handle_common_command(&CommonCommands::Start, &Configuration::default())
                .unwrap();
        assert!(!handled);
    }
}
