#![forbid(unsafe_code)]
mod cli;

use clap::Parser;
use cli::Cli;
use color_eyre::eyre::{self, Report};
use humansize::{file_size_opts as options, FileSize};
use s3upload::model::session_state::SessionState;
use s3upload::model::snapshot::SessionSnapshot;
use s3upload::model::upload_file::UploadFile;
use s3upload::services::s3_transport::S3Transport;
use s3upload::services::upload_supervisor::UploadSupervisor;
use s3upload::settings::config::Settings;
use s3upload::settings::file_credentials::{load_credentials, pick_credential};
use s3upload::utils::{format_progress_bar, initialize_logging, initialize_panic_handler};
use std::io::Write;
use std::sync::Arc;
use tokio_stream::{wrappers::WatchStream, StreamExt};

const PROGRESS_BAR_WIDTH: usize = 30;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    initialize_logging()?;
    initialize_panic_handler()?;
    let args = Cli::parse();
    let settings = Settings::load()?;

    let creds_file = args.creds.clone().or_else(|| settings.creds_file.clone());
    let profile = args.profile.clone().or_else(|| settings.profile.clone());
    let credential = pick_credential(load_credentials(creds_file)?, profile.as_deref())
        .map_err(|e| {
            e.wrap_err("Problem reading credential files, add at least one credentials file into $S3UPLOAD_DATA/creds in your home directory.")
        })?;

    let bucket = args
        .bucket
        .clone()
        .or_else(|| settings.default_bucket.clone())
        .ok_or_else(|| {
            Report::msg("No bucket given, pass --bucket or set default_bucket in config.toml")
        })?;

    let mut files = Vec::with_capacity(args.files.len());
    for path in &args.files {
        let file = UploadFile::from_path(path)
            .await
            .map_err(|e| Report::msg(format!("{}: {}", path.display(), e)))?;
        files.push(file);
    }

    let transport = S3Transport::new(credential).with_settings(&settings);
    let (handle, supervisor) = UploadSupervisor::spawn(Arc::new(transport));
    handle.add_files(files)?;
    handle.start_upload(Some(bucket), None)?;

    let mut updates = WatchStream::new(handle.subscribe());
    let mut interrupted = false;
    let outcome = loop {
        tokio::select! {
            update = updates.next() => match update {
                Some(snapshot) => {
                    render(&snapshot, args.json)?;
                    if snapshot.state.is_terminal() {
                        break snapshot;
                    }
                }
                None => return Err(Report::msg("upload supervisor stopped unexpectedly")),
            },
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("exited per user request");
                interrupted = true;
                handle.cancel_upload()?;
                break handle.wait_for(|s| s.state != SessionState::Uploading).await?;
            }
        }
    };

    handle.shutdown()?;
    supervisor.await?;
    if !args.json {
        eprintln!();
    }

    if interrupted {
        return Err(Report::msg("upload cancelled"));
    }
    match outcome.state {
        SessionState::Uploaded => Ok(()),
        _ => {
            for (name, reason) in outcome.failures() {
                eprintln!("{}: {}", name, reason);
            }
            Err(Report::msg(format!(
                "{} of {} files failed to upload",
                outcome.failures().len(),
                outcome.items.len()
            )))
        }
    }
}

fn render(snapshot: &SessionSnapshot, json: bool) -> eyre::Result<()> {
    if json {
        println!("{}", serde_json::to_string(snapshot)?);
        return Ok(());
    }

    let progress = snapshot.progress.unwrap_or(0);
    let mut stderr = std::io::stderr();
    write!(
        stderr,
        "\r[{}] {:>3}% {} / {} {}",
        format_progress_bar(progress, PROGRESS_BAR_WIDTH),
        progress,
        human_size(snapshot.loaded),
        human_size(snapshot.total),
        snapshot.state
    )?;
    stderr.flush()?;
    Ok(())
}

fn human_size(bytes: u64) -> String {
    bytes
        .file_size(options::CONVENTIONAL)
        .unwrap_or_else(|_| "0 B".to_string())
}
