mod cli;

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;

use cli::{Cli, Command};
use modforge::{
    load_config, telemetry, Config, ForgeError, Job, JobEngine, JobId, Submission,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    telemetry::init(&config.logging);

    match run(cli.command, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Command failed");
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn load(path: Option<&Path>) -> modforge::Result<Config> {
    let mut config = match path {
        Some(path) => load_config(path)?,
        None => Config::default(),
    };
    config.apply_env_overrides()?;
    Ok(config)
}

async fn run(command: Command, config: &Config) -> modforge::Result<()> {
    let engine = JobEngine::from_config(config)?;

    match command {
        Command::Submit {
            file,
            owner,
            artifact_type,
        } => {
            let job = submit(&engine, &file, owner, artifact_type).await?;
            print_json(&job)
        }
        Command::Process {
            file,
            directive,
            owner,
            artifact_type,
        } => {
            let job = submit(&engine, &file, owner, artifact_type).await?;
            engine.trigger(job.id(), directive)?;
            engine.wait_for(job.id()).await;
            print_json(&engine.status(job.id())?)
        }
        Command::Trigger {
            job_id,
            directive,
            wait,
        } => {
            let job_id = JobId::from(job_id);
            let receipt = engine.trigger(&job_id, directive)?;
            if wait {
                engine.wait_for(&job_id).await;
                print_json(&engine.status(&job_id)?)
            } else {
                // Runs are tasks on this runtime; returning now would cancel them.
                print_json(&receipt)?;
                let finished = engine.drain().await;
                tracing::debug!(finished, "background runs drained before exit");
                Ok(())
            }
        }
        Command::Status { job_id } => print_json(&engine.status(&JobId::from(job_id))?),
        Command::List {
            owner,
            status,
            page,
            page_size,
        } => {
            let page = engine.list_jobs(&owner, page, page_size, status.map(Into::into))?;
            print_json(&serde_json::json!({
                "total": page.total,
                "jobs": page.jobs,
            }))
        }
        Command::Download { job_id } => {
            print_json(&engine.download_reference(&JobId::from(job_id)).await?)
        }
    }
}

async fn submit(
    engine: &JobEngine,
    file: &Path,
    owner: String,
    artifact_type: Option<String>,
) -> modforge::Result<Job> {
    let content = tokio::fs::read(file)
        .await
        .map_err(|e| ForgeError::ReadArtifact {
            path: file.to_path_buf(),
            source: e,
        })?;
    let filename = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let job = match artifact_type {
        Some(tag) => {
            engine
                .submit(Submission::new(owner, filename, content, tag))
                .await?
        }
        None => engine.submit_detected(owner, filename, content).await?,
    };
    Ok(job)
}

fn print_json<T: Serialize>(value: &T) -> modforge::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
