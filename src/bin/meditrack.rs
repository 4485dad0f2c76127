// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

use meditrack::{
    config::Config,
    path::default_config_path,
    record::SessionKind,
    remote::DirectoryRemote,
    store::{FileStore, LocalStore},
    BackupService,
};

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use inquire::Confirm;
use std::{path::PathBuf, process::exit};
use tokio::fs;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

type Service = BackupService<FileStore, DirectoryRemote>;

#[derive(Debug, Clone, Parser)]
#[command(
    about,
    override_usage = "meditrack [options] <command>",
    subcommand_help_heading = "Commands",
    version
)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, global = true, value_name = "path")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    async fn run(self) -> Result<()> {
        let config = load_config(self.config).await?;
        let service = open_service(&config).await?;

        match self.command {
            Command::Login => run_login(&service).await,
            Command::Logout => run_logout(&service).await,
            Command::Complete(opts) => run_complete(&service, opts).await,
            Command::Progress => run_progress(&service).await,
            Command::Export(opts) => run_export(&service, opts).await,
            Command::Backup => run_backup(&service).await,
            Command::List => run_list(&service).await,
            Command::Preview(opts) => run_preview(&service, opts).await,
            Command::Merge(opts) => run_merge(&service, opts).await,
            Command::Delete(opts) => run_delete(&service, opts).await,
        }
    }
}

#[derive(Debug, Clone, Subcommand)]
enum Command {
    /// Sign in to remote backup store.
    #[command(override_usage = "meditrack login [options]")]
    Login,

    /// Sign out of remote backup store.
    #[command(override_usage = "meditrack logout [options]")]
    Logout,

    /// Record completed meditation session.
    #[command(override_usage = "meditrack complete [options] <kind>")]
    Complete(CompleteOptions),

    /// Show streak statistics.
    #[command(override_usage = "meditrack progress [options]")]
    Progress,

    /// Export local data as snapshot without uploading it.
    #[command(override_usage = "meditrack export [options]")]
    Export(ExportOptions),

    /// Upload snapshot of local data to remote backup store.
    #[command(override_usage = "meditrack backup [options]")]
    Backup,

    /// List backups in remote backup store.
    #[command(override_usage = "meditrack list [options]")]
    List,

    /// Show what merging a backup would change.
    #[command(override_usage = "meditrack preview [options] <backup_id>")]
    Preview(PreviewOptions),

    /// Merge backup into local data.
    #[command(override_usage = "meditrack merge [options] <backup_id>")]
    Merge(MergeOptions),

    /// Delete backup from remote backup store.
    #[command(override_usage = "meditrack delete [options] <backup_id>...")]
    Delete(DeleteOptions),
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct CompleteOptions {
    /// Session kind, either "morning" or "evening".
    #[arg(required = true, value_name = "kind")]
    pub kind: SessionKind,

    /// Calendar date of session, defaults to today.
    #[arg(short, long, value_name = "yyyy-mm-dd")]
    pub date: Option<NaiveDate>,

    /// Length of session in minutes.
    #[arg(short = 'm', long, default_value_t = 10, value_name = "minutes")]
    pub duration: u32,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct ExportOptions {
    /// Write snapshot to file instead of standard output.
    #[arg(short, long, value_name = "path")]
    pub output: Option<PathBuf>,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct PreviewOptions {
    /// Id of backup to preview.
    #[arg(required = true, value_name = "backup_id")]
    pub backup_id: String,

    /// Print preview as JSON.
    #[arg(short, long)]
    pub json: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct MergeOptions {
    /// Id of backup to merge.
    #[arg(required = true, value_name = "backup_id")]
    pub backup_id: String,

    /// Skip confirmation prompt.
    #[arg(short, long)]
    pub yes: bool,
}

#[derive(Parser, Clone, Debug)]
#[command(author, about, long_about)]
struct DeleteOptions {
    /// Ids of backups to delete.
    #[arg(required = true, value_name = "backup_id")]
    pub backup_ids: Vec<String>,
}

#[tokio::main]
async fn main() {
    let layer = fmt::layer()
        .compact()
        .with_target(false)
        .with_timer(false)
        .without_time();
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap();
    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .init();

    if let Err(error) = run().await {
        error!("{error:?}");
        exit(1);
    }

    exit(0)
}

async fn run() -> Result<()> {
    Cli::parse().run().await
}

async fn load_config(path: Option<PathBuf>) -> Result<Config> {
    let path = match path {
        Some(path) => path,
        None => default_config_path()?,
    };

    if !fs::try_exists(&path).await? {
        return Ok(Config::try_default()?);
    }

    let data = fs::read_to_string(&path).await?;
    Ok(data.parse()?)
}

async fn open_service(config: &Config) -> Result<Service> {
    let store = FileStore::open(&config.storage.data_dir).await?;
    let remote = DirectoryRemote::new(&config.remote.backup_dir, config.remote_token_path());

    Ok(BackupService::new(store, remote).upload_safety_backup(config.remote.upload_safety_backup))
}

async fn run_login(service: &Service) -> Result<()> {
    service.authenticate().await?;
    Ok(())
}

async fn run_logout(service: &Service) -> Result<()> {
    service.sign_out().await?;
    Ok(())
}

async fn run_complete(service: &Service, opts: CompleteOptions) -> Result<()> {
    let now = Utc::now();
    let today = now.date_naive();
    let date = opts.date.unwrap_or(today);

    let store = service.executor().store();
    let mut state = store.load_all().await?;
    state.complete_session(date, opts.kind, opts.duration, now.timestamp_millis());
    state.refresh_progress(today);
    store.save_all(&state).await?;
    info!("completed {} session on {date}", opts.kind);

    Ok(())
}

async fn run_progress(service: &Service) -> Result<()> {
    let mut state = service.executor().store().load_all().await?;
    state.refresh_progress(Utc::now().date_naive());
    println!("{}", state.progress);

    Ok(())
}

async fn run_export(service: &Service, opts: ExportOptions) -> Result<()> {
    let snapshot = service.create_full_backup(Utc::now()).await?;
    let data = serde_json::to_string_pretty(&snapshot)?;

    match opts.output {
        Some(path) => {
            fs::write(&path, data).await?;
            info!("exported snapshot to {:?}", path.display());
        }
        None => println!("{data}"),
    }

    Ok(())
}

async fn run_backup(service: &Service) -> Result<()> {
    let info = service.upload_backup(Utc::now()).await?;
    println!("{}", info.id);

    Ok(())
}

async fn run_list(service: &Service) -> Result<()> {
    let backups = service.list_backups().await?;
    if backups.is_empty() {
        info!("no backups found");
        return Ok(());
    }

    for backup in backups {
        println!(
            "{}  {}  {} bytes",
            backup.id,
            backup.created_time.format("%Y-%m-%d %H:%M:%S"),
            backup.size
        );
    }

    Ok(())
}

async fn run_preview(service: &Service, opts: PreviewOptions) -> Result<()> {
    let preview = service.preview_backup(&opts.backup_id).await?;
    if opts.json {
        println!("{}", serde_json::to_string_pretty(&preview)?);
    } else {
        print!("{preview}");
    }

    Ok(())
}

async fn run_merge(service: &Service, opts: MergeOptions) -> Result<()> {
    if !opts.yes {
        let preview = service.preview_backup(&opts.backup_id).await?;
        print!("{preview}");

        let proceed = Confirm::new("Merge this backup into local data?")
            .with_default(false)
            .prompt()?;
        if !proceed {
            warn!("merge of {} cancelled", opts.backup_id);
            return Ok(());
        }
    }

    let outcome = service.merge_backup(&opts.backup_id, Utc::now()).await?;
    println!("{}", outcome.summary);

    Ok(())
}

async fn run_delete(service: &Service, opts: DeleteOptions) -> Result<()> {
    for backup_id in opts.backup_ids {
        service.delete_backup(&backup_id).await?;
    }

    Ok(())
}
