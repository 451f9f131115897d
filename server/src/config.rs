use clap::Parser;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Command-line flags. Only flags given explicitly take part in the merge,
/// so an unset flag never masks the TOML file or the environment.
#[derive(Parser, Serialize, Clone, Debug, Default)]
#[command(name = "trivia-server", version, about = "Live multi-player trivia server")]
pub struct Cli {
    /// Port to listen on
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Bind address
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bind_address: Option<String>,

    /// Path to TOML config file
    #[arg(long, env = "TRIVIA_CONFIG", default_value = "./trivia.toml")]
    #[serde(skip)]
    pub config: String,

    /// Enable structured JSON logging
    #[arg(long)]
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub json_logs: bool,

    /// Output a commented TOML config template and exit
    #[arg(long)]
    #[serde(skip)]
    pub generate_config: bool,

    /// Data directory for the game database and question snapshot
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,

    /// Seconds between full game snapshots
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_interval_secs: Option<u64>,

    /// Per-write deadline for WebSocket frames, in milliseconds
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub write_timeout_ms: Option<u64>,

    /// Frames buffered per connection before it counts as a slow peer
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outbound_queue: Option<usize>,
}

/// Resolved server configuration.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Config {
    pub port: u16,
    pub bind_address: String,
    pub json_logs: bool,
    pub data_dir: String,
    pub snapshot_interval_secs: u64,
    pub write_timeout_ms: u64,
    pub outbound_queue: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 8080,
            bind_address: "0.0.0.0".to_string(),
            json_logs: false,
            data_dir: "./data".to_string(),
            snapshot_interval_secs: 300,
            write_timeout_ms: 5000,
            outbound_queue: 64,
        }
    }
}

impl Config {
    /// Layered sources:
    /// built-in defaults < TOML file < env vars (TRIVIA_*) < CLI args
    pub fn figment(cli: &Cli) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&cli.config))
            .merge(Env::prefixed("TRIVIA_"))
            .merge(Serialized::defaults(cli))
    }

    pub fn load(cli: &Cli) -> Result<Self, figment::Error> {
        Self::figment(cli).extract()
    }
}

/// Generate a commented TOML config template
pub fn generate_config_template() -> String {
    r#"# Trivia Server Configuration
# Place this file at ./trivia.toml or specify with --config <path>
# All settings can be overridden via environment variables (TRIVIA_PORT, etc.)
# or CLI flags (--port, etc.)

# Server port (default: 8080)
# port = 8080

# Bind address (default: 0.0.0.0, all interfaces)
# bind_address = "0.0.0.0"

# Enable structured JSON logging
# json_logs = false

# Data directory for the SQLite game database and questions.json
# data_dir = "./data"

# Seconds between full snapshots of every game (default: 300)
# snapshot_interval_secs = 300

# A WebSocket write that takes longer than this closes the connection (default: 5000)
# write_timeout_ms = 5000

# Outbound frames buffered per connection; a full buffer evicts the peer (default: 64)
# outbound_queue = 64
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    fn cli(config: &str) -> Cli {
        Cli {
            config: config.to_string(),
            ..Cli::default()
        }
    }

    #[test]
    fn defaults_apply_without_sources() {
        Jail::expect_with(|_jail| {
            let config = Config::load(&cli("missing.toml"))?;
            assert_eq!(config, Config::default());
            Ok(())
        });
    }

    #[test]
    fn later_layers_override_earlier_ones() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "trivia.toml",
                "port = 9000\noutbound_queue = 16\ndata_dir = \"/srv/trivia\"",
            )?;
            jail.set_env("TRIVIA_OUTBOUND_QUEUE", "8");
            jail.set_env("TRIVIA_SNAPSHOT_INTERVAL_SECS", "60");

            let mut args = cli("trivia.toml");
            args.snapshot_interval_secs = Some(30);

            let config = Config::load(&args)?;
            assert_eq!(config.port, 9000);
            assert_eq!(config.data_dir, "/srv/trivia");
            assert_eq!(config.outbound_queue, 8);
            assert_eq!(config.snapshot_interval_secs, 30);
            assert_eq!(config.write_timeout_ms, 5000);
            Ok(())
        });
    }

    #[test]
    fn template_is_valid_toml() {
        Jail::expect_with(|jail| {
            jail.create_file("trivia.toml", &generate_config_template())?;
            assert_eq!(Config::load(&cli("trivia.toml"))?, Config::default());
            Ok(())
        });
    }
}
