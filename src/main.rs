use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand};

use slotsite_lib::config::Settings;
use slotsite_lib::storage::database::{Database, SERVICE_URL_KEY};
use slotsite_lib::{
    logging, Asset, BuildManager, DeliveryMode, PositionChange, SubmissionOutcome,
    SubmissionState,
};

#[derive(Parser)]
#[command(name = "slotsite", version, about = "Bundle images into a generated puzzle site")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Submit images to the generation service
    Build(BuildArgs),
    /// Show recent submissions
    History {
        #[arg(long, default_value_t = 10)]
        limit: u32,
    },
    /// Store the generation service URL (empty to reset)
    SetServiceUrl { url: String },
}

#[derive(clap::Args)]
struct BuildArgs {
    /// Images in slot order
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// Number of slots (5-50); defaults to the number of images
    #[arg(long)]
    count: Option<usize>,

    /// Display positions in slot order, e.g. 2,1,3
    #[arg(long, value_delimiter = ',')]
    positions: Vec<u32>,

    /// Override a label: SLOT=TEXT, slots counted from 1
    #[arg(long = "label", value_parser = parse_label)]
    labels: Vec<(usize, String)>,

    #[arg(long)]
    title: Option<String>,

    #[arg(long)]
    fail_message: Option<String>,

    #[arg(long)]
    target_url: Option<String>,

    #[arg(long)]
    mode: Option<DeliveryMode>,

    /// Where to write the archive; defaults to the name the service suggests
    #[arg(long, short)]
    out: Option<PathBuf>,
}

fn parse_label(raw: &str) -> Result<(usize, String), String> {
    let (slot, text) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected SLOT=TEXT, got {}", raw))?;
    let slot: usize = slot
        .trim()
        .parse()
        .map_err(|_| format!("invalid slot number: {}", slot))?;
    if slot == 0 {
        return Err("slots are counted from 1".to_string());
    }
    Ok((slot - 1, text.to_string()))
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let settings = Settings::from_env();
    logging::init(Some(settings.data_dir.as_path()));

    let db = match Database::new(settings.data_dir.clone()) {
        Ok(db) => Some(Arc::new(db)),
        Err(e) => {
            log::warn!("Running without storage: {}", e);
            None
        }
    };

    let result = match cli.command {
        Command::Build(args) => build(&settings, db, args).await,
        Command::History { limit } => history(db, limit),
        Command::SetServiceUrl { url } => set_service_url(db, &url),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn build(settings: &Settings, db: Option<Arc<Database>>, args: BuildArgs) -> Result<()> {
    let manager = BuildManager::from_settings(settings, db);

    let assets = args
        .images
        .iter()
        .map(|path| Asset::from_path(path).with_context(|| format!("reading {}", path.display())))
        .collect::<Result<Vec<_>>>()?;

    let count = manager.resize(args.count.unwrap_or(assets.len()));
    if assets.len() > count {
        log::warn!("Only the first {} of {} images fit", count, assets.len());
    }

    manager.update_form(|form| -> Result<()> {
        form.batch_assign(assets);

        if !args.positions.is_empty() {
            if args.positions.len() != form.len() {
                bail!(
                    "--positions has {} values but the form has {} slots",
                    args.positions.len(),
                    form.len()
                );
            }
            for i in 0..form.len() {
                form.set_position(i, None)?;
            }
            for (i, value) in args.positions.iter().enumerate() {
                if let PositionChange::Rejected { held_by } = form.set_position(i, Some(*value))? {
                    bail!("position {} is given to both slot {} and slot {}", value, held_by + 1, i + 1);
                }
            }
        }

        for (slot, text) in &args.labels {
            form.set_label(*slot, text.clone())?;
        }

        let config = form.config_mut();
        if let Some(title) = &args.title {
            config.title = title.clone();
        }
        if let Some(message) = &args.fail_message {
            config.failure_message = message.clone();
        }
        if let Some(target) = &args.target_url {
            config.target_url = target.clone();
        }
        if let Some(mode) = args.mode {
            config.delivery_mode = mode;
        }
        Ok(())
    })?;

    match manager.build().await? {
        SubmissionState::Succeeded(SubmissionOutcome::Archive(artifact)) => {
            let path = args.out.unwrap_or_else(|| PathBuf::from(&artifact.file_name));
            artifact
                .save_to(&path)
                .with_context(|| format!("writing {}", path.display()))?;
            println!("Saved {} ({} bytes)", path.display(), artifact.len());
            Ok(())
        }
        SubmissionState::Succeeded(SubmissionOutcome::Deployed { url, admin_url }) => {
            println!("Deployed: {}", url);
            if let Some(admin) = admin_url {
                println!("Admin:    {}", admin);
            }
            Ok(())
        }
        SubmissionState::Failed(failure) => Err(anyhow!(failure)),
        other => Err(anyhow!("unexpected state: {}", other.label())),
    }
}

fn history(db: Option<Arc<Database>>, limit: u32) -> Result<()> {
    let db = db.ok_or_else(|| anyhow!("storage unavailable"))?;
    for record in db.recent_submissions(limit)? {
        let when = chrono::DateTime::from_timestamp_millis(record.created_at)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_default();
        println!(
            "{}  #{:<4} {:>2} slots  {:<8} {}",
            when, record.generation, record.slot_count, record.outcome, record.detail
        );
    }
    Ok(())
}

fn set_service_url(db: Option<Arc<Database>>, url: &str) -> Result<()> {
    let db = db.ok_or_else(|| anyhow!("storage unavailable"))?;
    db.set_setting(SERVICE_URL_KEY, url.trim())?;
    println!("Generation service URL saved");
    Ok(())
}
