//! CLI argument definitions for the Tanya application.
//!
//! Uses `clap` with derive macros for ergonomic argument parsing.
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use uuid::Uuid;

use tanya_core::config::TanyaConfig;

/// Tanya - a chat assistant that answers statistics questions with charts.
#[derive(Parser, Debug)]
#[command(name = "tanya", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// API server port.
    #[arg(short = 'p', long = "port", global = true)]
    pub port: Option<u16>,

    /// Data directory holding the SQLite database.
    #[arg(short = 'd', long = "data-dir", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Run the HTTP API (default).
    Serve,
    /// Manage users and their API tokens.
    User {
        #[command(subcommand)]
        action: UserCommand,
    },
    /// Manage the configuration file.
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum ConfigCommand {
    /// Write the effective configuration (file, env and flags merged) to the config path.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum UserCommand {
    /// Create a user and print its bearer token.
    Add {
        #[arg(long)]
        name: String,
        #[arg(long)]
        email: String,
    },
    /// List registered users.
    List,
    /// Delete a user and all of their conversations.
    Remove { id: Uuid },
}

impl CliArgs {
    /// The subcommand to run; `serve` when none is given.
    pub fn command(&self) -> &Command {
        self.command.as_ref().unwrap_or(&Command::Serve)
    }

    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > TANYA_CONFIG env var > platform default (~/.tanya/config.toml).
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("TANYA_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the API server port.
    ///
    /// Priority: --port flag > TANYA_PORT env var > config file value.
    pub fn resolve_port(&self, config_port: u16) -> u16 {
        if let Some(p) = self.port {
            return p;
        }
        if let Ok(val) = std::env::var("TANYA_PORT") {
            if let Ok(p) = val.parse::<u16>() {
                return p;
            }
        }
        config_port
    }

    /// Apply every command-line override to a loaded configuration.
    pub fn apply(&self, config: &mut TanyaConfig) {
        config.server.port = self.resolve_port(config.server.port);
        if let Some(ref dir) = self.data_dir {
            config.general.data_dir = dir.to_string_lossy().to_string();
        }
        if let Some(ref level) = self.log_level {
            config.general.log_level = level.clone();
        }
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".tanya").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".tanya").join("config.toml");
    }
    PathBuf::from("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_command_is_serve() {
        let args = CliArgs::try_parse_from(["tanya"]).unwrap();
        assert_eq!(args.command(), &Command::Serve);
    }

    #[test]
    fn test_user_add_parses() {
        let args =
            CliArgs::try_parse_from(["tanya", "user", "add", "--name", "Sari", "--email", "sari@example.com"])
                .unwrap();
        assert_eq!(
            args.command(),
            &Command::User {
                action: UserCommand::Add {
                    name: "Sari".to_string(),
                    email: "sari@example.com".to_string(),
                }
            }
        );
    }

    #[test]
    fn test_user_remove_requires_uuid() {
        assert!(CliArgs::try_parse_from(["tanya", "user", "remove", "nope"]).is_err());
        let id = Uuid::new_v4().to_string();
        assert!(CliArgs::try_parse_from(["tanya", "user", "remove", id.as_str()]).is_ok());
    }

    #[test]
    fn test_flags_override_config() {
        let args = CliArgs::try_parse_from([
            "tanya",
            "serve",
            "--port",
            "9999",
            "--data-dir",
            "/tmp/tanya",
            "--log-level",
            "debug",
        ])
        .unwrap();

        let mut config = TanyaConfig::default();
        args.apply(&mut config);
        assert_eq!(config.server.port, 9999);
        assert_eq!(config.general.data_dir, "/tmp/tanya");
        assert_eq!(config.general.log_level, "debug");
    }

    #[test]
    fn test_config_init_parses() {
        let args = CliArgs::try_parse_from(["tanya", "config", "init", "--force"]).unwrap();
        assert_eq!(
            args.command(),
            &Command::Config {
                action: ConfigCommand::Init { force: true }
            }
        );
    }

    #[test]
    fn test_config_flag_wins() {
        let args = CliArgs::try_parse_from(["tanya", "-c", "/etc/tanya.toml"]).unwrap();
        assert_eq!(args.resolve_config_path(), PathBuf::from("/etc/tanya.toml"));
    }
}
