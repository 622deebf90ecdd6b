//! CLI argument parsing using clap.

use clap::{Parser, Subcommand};

/// pg-reconcile - declarative PostgreSQL cluster object reconciler
#[derive(Parser, Debug)]
#[command(name = "pgreconcile")]
#[command(about = "Reconcile a PostgreSQL cluster against a JSON object definition", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Prefix for environment variables of the connection details
    #[arg(long, global = true, default_value = "PGO_")]
    pub env_prefix: String,

    /// Log level passed to the tracing subscriber (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Inspect the setup against the current cluster state
    Inspect {
        /// Definition in JSON
        definition: String,

        /// Do not load current state
        #[arg(long)]
        no_current_state: bool,
    },

    /// Apply the changes necessary to provision the requested setup
    Apply {
        /// Definition in JSON
        definition: String,

        /// Do not execute any queries, just log what would be done
        #[arg(long)]
        dry_run: bool,
    },

    /// Print a username, its password (generated if omitted), and its md5 hash
    Password {
        /// Role name the password is salted with
        username: String,

        /// Password to hash; a random one is generated if omitted
        #[arg(long)]
        password: Option<String>,

        /// Length of the generated password
        #[arg(long, default_value_t = 24)]
        length: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_defaults() {
        let cli = Cli::parse_from(["pgreconcile", "inspect", "{}"]);
        assert_eq!(cli.env_prefix, "PGO_");
        assert_eq!(cli.log_level, "info");
        assert!(matches!(cli.command, Command::Inspect { no_current_state: false, .. }));
    }

    #[test]
    fn test_parse_apply_dry_run() {
        let cli = Cli::parse_from(["pgreconcile", "--env-prefix", "MYAPP_", "apply", "{}", "--dry-run"]);
        assert_eq!(cli.env_prefix, "MYAPP_");
        assert!(matches!(cli.command, Command::Apply { dry_run: true, .. }));
    }

    #[test]
    fn test_parse_password_defaults_length() {
        let cli = Cli::parse_from(["pgreconcile", "password", "alice"]);
        match cli.command {
            Command::Password { username, password, length } => {
                assert_eq!(username, "alice");
                assert!(password.is_none());
                assert_eq!(length, 24);
            }
            _ => panic!("expected Password"),
        }
    }
}
