//! CLI module for Toon Bridge
//!
//! With a schema argument the gateway is served; subcommands:
//! - `validate`: load a schema, report problems, print a summary

use clap::{Parser, Subcommand};

use crate::server::config::{AppConfig, ExecutorMode};

pub mod validate;

/// Schema-driven API gateway with live event streaming
#[derive(Parser, Debug)]
#[command(name = "toon-bridge")]
#[command(about = "Schema-driven API gateway with live event streaming")]
#[command(version)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Schema path or URL (agents.json or OpenAPI, JSON or YAML)
    pub schema: Option<String>,

    /// Schema path or URL (same as the positional argument)
    #[arg(short = 's', long = "schema", value_name = "SCHEMA")]
    pub schema_source: Option<String>,

    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Host to bind
    #[arg(short = 'H', long)]
    pub host: Option<String>,

    /// Disable CORS headers
    #[arg(long)]
    pub no_cors: bool,

    /// How actions are executed
    #[arg(long, value_enum)]
    pub executor: Option<ExecutorMode>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load and validate a schema, then print a summary
    Validate {
        /// Schema path or URL
        schema: String,
    },
}

impl Cli {
    /// Apply command-line flags on top of file/env configuration
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(source) = self.schema_source.as_ref().or(self.schema.as_ref()) {
            config.schema.source = Some(source.clone());
        }
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if self.no_cors {
            config.cors.enabled = false;
        }
        if let Some(mode) = self.executor {
            config.executor.mode = mode;
        }
    }
}

/// Run the CLI command
pub async fn run(cli: Cli) -> anyhow::Result<()> {
    match &cli.command {
        Some(Commands::Validate { schema }) => validate::run(schema).await,
        None => {
            let mut config = crate::server::load_config()?;
            cli.apply_overrides(&mut config);

            if config.schema.source.is_none() {
                let mut cmd = <Cli as clap::CommandFactory>::command();
                cmd.print_help()?;
                println!();
                return Ok(());
            }

            crate::server::run(config).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_positional_schema_and_flags() {
        let cli = Cli::try_parse_from([
            "toon-bridge",
            "./agents.json",
            "-p",
            "8080",
            "-H",
            "127.0.0.1",
            "--no-cors",
            "--executor",
            "http",
        ])
        .unwrap();

        let mut config = AppConfig::default();
        cli.apply_overrides(&mut config);

        assert_eq!(config.schema.source.as_deref(), Some("./agents.json"));
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "127.0.0.1");
        assert!(!config.cors.enabled);
        assert_eq!(config.executor.mode, ExecutorMode::Http);
    }

    #[test]
    fn test_schema_flag_wins_over_positional() {
        let cli = Cli::try_parse_from(["toon-bridge", "a.json", "-s", "b.yaml"]).unwrap();
        let mut config = AppConfig::default();
        cli.apply_overrides(&mut config);
        assert_eq!(config.schema.source.as_deref(), Some("b.yaml"));
    }

    #[test]
    fn test_no_flags_keep_config() {
        let cli = Cli::try_parse_from(["toon-bridge"]).unwrap();
        let mut config = AppConfig::default();
        config.schema.source = Some("from-config.json".to_string());
        cli.apply_overrides(&mut config);
        assert_eq!(config.schema.source.as_deref(), Some("from-config.json"));
        assert_eq!(config.server.port, 3000);
    }

    #[test]
    fn test_validate_subcommand() {
        let cli = Cli::try_parse_from(["toon-bridge", "validate", "openapi.yaml"]).unwrap();
        match cli.command {
            Some(Commands::Validate { schema }) => assert_eq!(schema, "openapi.yaml"),
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
