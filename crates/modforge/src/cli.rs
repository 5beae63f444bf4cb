//! Command line interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use modforge::JobStatus;

/// Store game mod artifacts and transform them in the background.
#[derive(Debug, Parser)]
#[command(name = "modforge", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Path to a JSON config file. Built-in defaults are used otherwise.
    #[arg(long, short, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Upload an artifact and create a pending job.
    Submit {
        file: PathBuf,

        #[arg(long, default_value = "local")]
        owner: String,

        /// Artifact type tag. Detected from the file when omitted.
        #[arg(long = "type")]
        artifact_type: Option<String>,
    },

    /// Submit, trigger and wait until the job finishes.
    Process {
        file: PathBuf,

        #[arg(long)]
        directive: String,

        #[arg(long, default_value = "local")]
        owner: String,

        #[arg(long = "type")]
        artifact_type: Option<String>,
    },

    /// Start processing a pending job.
    Trigger {
        job_id: String,

        #[arg(long)]
        directive: String,

        /// Print the finished job instead of the receipt. The command
        /// always lets the run finish before exiting.
        #[arg(long, default_value_t = false)]
        wait: bool,
    },

    /// Show one job.
    Status { job_id: String },

    /// List an owner's jobs, newest first.
    List {
        #[arg(long, default_value = "local")]
        owner: String,

        #[arg(long)]
        status: Option<StatusArg>,

        #[arg(long, default_value_t = 1)]
        page: u32,

        #[arg(long, default_value_t = 20)]
        page_size: u32,
    },

    /// Print a time-limited download reference for a completed job.
    Download { job_id: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StatusArg {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl From<StatusArg> for JobStatus {
    fn from(arg: StatusArg) -> Self {
        match arg {
            StatusArg::Pending => JobStatus::Pending,
            StatusArg::Processing => JobStatus::Processing,
            StatusArg::Completed => JobStatus::Completed,
            StatusArg::Failed => JobStatus::Failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn cli_parses_process() {
        let cli = Cli::parse_from([
            "modforge",
            "--config",
            "/etc/modforge.json",
            "process",
            "mod.json",
            "--directive",
            "make it legendary",
            "--type",
            "minecraft",
        ]);
        assert_eq!(cli.config, Some(PathBuf::from("/etc/modforge.json")));
        match cli.command {
            Command::Process {
                file,
                directive,
                owner,
                artifact_type,
            } => {
                assert_eq!(file, PathBuf::from("mod.json"));
                assert_eq!(directive, "make it legendary");
                assert_eq!(owner, "local");
                assert_eq!(artifact_type.as_deref(), Some("minecraft"));
            }
            other => panic!("expected Process, got {:?}", other),
        }
    }

    #[test]
    fn cli_parses_list_filters() {
        let cli = Cli::parse_from([
            "modforge", "list", "--owner", "u1", "--status", "failed", "--page", "2",
        ]);
        match cli.command {
            Command::List {
                owner,
                status,
                page,
                page_size,
            } => {
                assert_eq!(owner, "u1");
                assert_eq!(status.map(JobStatus::from), Some(JobStatus::Failed));
                assert_eq!(page, 2);
                assert_eq!(page_size, 20);
            }
            other => panic!("expected List, got {:?}", other),
        }
    }

    #[test]
    fn cli_rejects_unknown_status() {
        assert!(Cli::try_parse_from(["modforge", "list", "--status", "queued"]).is_err());
    }
}
