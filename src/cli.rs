use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::engine::store::ValidationMode;

/// Formloom - check, inspect and validate schema-driven form definitions
#[derive(Parser, Debug, Clone)]
#[command(name = "formloom", version, about, long_about = None)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, env = "FORMLOOM_CONFIG", default_value = "formloom.toml")]
    pub config: PathBuf,

    /// Validation mode (onChange, onBlur, onSubmit)
    #[arg(long, env = "FORMLOOM_MODE")]
    pub mode: Option<ValidationMode>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "FORMLOOM_LOG_LEVEL")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Normalize every definition file matching a glob and report schema errors
    Check {
        /// File or glob pattern (.json, .yaml, .yml)
        pattern: String,
    },

    /// Print the rendered outline of a form
    Inspect {
        /// Definition file
        schema: PathBuf,

        /// Values to render the form with
        #[arg(long)]
        values: Option<PathBuf>,
    },

    /// Run a full validation pass over a values file
    Validate {
        /// Definition file
        schema: PathBuf,

        /// Values file (JSON or YAML)
        values: PathBuf,
    },

    /// Manage saved form documents
    Docs {
        #[command(subcommand)]
        action: DocsCommand,
    },
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum DocsCommand {
    /// List saved documents, newest first
    List,

    /// Save a definition file as a document
    Save {
        /// Definition file
        schema: PathBuf,

        /// Document name (defaults to the file stem)
        #[arg(long)]
        name: Option<String>,

        /// Replace the document with this id instead of creating one
        #[arg(long)]
        id: Option<String>,
    },

    /// Print a saved document as JSON
    Show { id: String },

    /// Delete a saved document
    Remove { id: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        let cli = Cli::parse_from(["formloom", "check", "forms/*.yaml"]);
        assert_eq!(cli.config, PathBuf::from("formloom.toml"));
        assert!(cli.mode.is_none());
        assert!(cli.log_level.is_none());
        assert_eq!(
            cli.command,
            Command::Check {
                pattern: "forms/*.yaml".to_string()
            }
        );
    }

    #[test]
    fn test_cli_with_args() {
        let cli = Cli::parse_from([
            "formloom",
            "--config",
            "custom.toml",
            "--mode",
            "onBlur",
            "--log-level",
            "debug",
            "validate",
            "signup.json",
            "values.json",
        ]);

        assert_eq!(cli.config, PathBuf::from("custom.toml"));
        assert_eq!(cli.mode, Some(ValidationMode::OnBlur));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert_eq!(
            cli.command,
            Command::Validate {
                schema: PathBuf::from("signup.json"),
                values: PathBuf::from("values.json"),
            }
        );
    }

    #[test]
    fn test_inspect_with_values() {
        let cli = Cli::parse_from(["formloom", "inspect", "signup.yaml", "--values", "seed.json"]);
        assert_eq!(
            cli.command,
            Command::Inspect {
                schema: PathBuf::from("signup.yaml"),
                values: Some(PathBuf::from("seed.json")),
            }
        );
    }

    #[test]
    fn test_docs_subcommands() {
        let cli = Cli::parse_from(["formloom", "docs", "save", "signup.json", "--name", "Signup"]);
        assert_eq!(
            cli.command,
            Command::Docs {
                action: DocsCommand::Save {
                    schema: PathBuf::from("signup.json"),
                    name: Some("Signup".to_string()),
                    id: None,
                }
            }
        );

        let cli = Cli::parse_from(["formloom", "docs", "remove", "abc-123"]);
        assert_eq!(
            cli.command,
            Command::Docs {
                action: DocsCommand::Remove {
                    id: "abc-123".to_string()
                }
            }
        );
    }

    #[test]
    fn test_invalid_mode_is_rejected() {
        let result = Cli::try_parse_from(["formloom", "--mode", "sometimes", "check", "x.json"]);
        assert!(result.is_err());
    }
}
