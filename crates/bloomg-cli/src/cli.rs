//! Command-line interface definition.

use bloomg::{ClientConfig, TransportKind};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Talk to a bloomg server from the shell.
#[derive(Parser, Debug)]
#[command(name = "bloomg")]
#[command(about = "Command line client for bloomg bloom filter servers")]
#[command(version)]
pub struct Cli {
    #[command(flatten)]
    pub connection: ConnectionArgs,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Where and how to reach the server.
#[derive(Args, Debug, Clone)]
pub struct ConnectionArgs {
    /// Load connection settings from a TOML or JSON file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Server base URL (http) or host:port (rpc).
    #[arg(long, global = true, env = "BLOOMG_SERVER")]
    pub server: Option<String>,

    /// Wire encoding: http or rpc.
    #[arg(long, global = true)]
    pub transport: Option<TransportKind>,

    /// Per-call timeout in seconds.
    #[arg(long, global = true)]
    pub timeout: Option<u64>,
}

impl ConnectionArgs {
    /// Merge flags over the config file (or defaults when there is none).
    pub fn resolve(&self) -> anyhow::Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::from_file(path)?,
            None => ClientConfig::http("http://127.0.0.1:8080"),
        };

        if let Some(server) = &self.server {
            config.server = server.clone();
        }
        if let Some(transport) = self.transport {
            config.transport = transport;
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }

        config.validate()?;
        Ok(config)
    }
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a filter.
    Create { filter: String },

    /// List filters known to the server.
    List,

    /// Add one key to a filter.
    Add { filter: String, key: String },

    /// Check one key.
    Has { filter: String, key: String },

    /// Add several keys in one call.
    Bulk {
        filter: String,
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Check several keys in one call.
    Multi {
        filter: String,
        #[arg(required = true)]
        keys: Vec<String>,
    },

    /// Delete a filter permanently.
    Drop { filter: String },

    /// Remove every key from a filter.
    Clear { filter: String },

    /// Unload a filter from server memory.
    Close { filter: String },

    /// Show filter properties.
    Info { filter: String },

    /// Run `bulk|multi FILTER KEY...` lines as one pipeline.
    Pipeline {
        /// Script file; reads stdin when omitted.
        file: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_multi() {
        let cli = Cli::try_parse_from(["bloomg", "--transport", "rpc", "--server", "127.0.0.1:9090", "multi", "F", "a", "b"])
            .unwrap();
        assert_eq!(cli.connection.transport, Some(TransportKind::Rpc));
        match cli.command {
            Command::Multi { filter, keys } => {
                assert_eq!(filter, "F");
                assert_eq!(keys, vec!["a", "b"]);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_resolve_applies_flags() {
        let cli = Cli::try_parse_from(["bloomg", "--server", "http://bloom:9000", "--timeout", "5", "list"]).unwrap();
        let config = cli.connection.resolve().unwrap();
        assert_eq!(config.server, "http://bloom:9000");
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.transport, TransportKind::Http);
    }

    #[test]
    fn test_bulk_requires_keys() {
        assert!(Cli::try_parse_from(["bloomg", "bulk", "F"]).is_err());
    }
}
