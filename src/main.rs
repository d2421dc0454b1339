//! # VideoMixer Client - Main Entry Point
//!
//! Questo è il punto di ingresso principale dell'applicazione.
//!
//! ## Responsabilità:
//! - Parsing degli argomenti della command line con `clap`
//! - Inizializzazione del sistema di logging con `tracing`
//! - Caricamento della configurazione client e dispatch dei comandi
//!
//! ## Flusso tipico:
//! 1. `video-mixer upload ./videos` - carica i sorgenti per categoria
//! 2. `video-mixer submit --session <id> --mode standard --mode blur_center`
//! 3. `video-mixer watch <task_id>` - segue il progresso live
//! 4. `video-mixer download <task_id>` - scarica gli output
//!
//! ## Esempio di utilizzo:
//! ```bash
//! video-mixer --server http://192.168.1.20:8000 upload ~/Desktop/素材 --verbose
//! ```

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::info;

use video_mixer_cli::api::ApiClient;
use video_mixer_cli::cache::{CacheStore, UpdateMarker};
use video_mixer_cli::display::{format_size, ProgressDisplay};
use video_mixer_cli::launcher::{build_request, JobLauncher, OutputVariant};
use video_mixer_cli::progress::{JobState, JobStatus};
use video_mixer_cli::uploader::UploadCoordinator;
use video_mixer_cli::watch::{follow_stream, JobMonitor};
use video_mixer_cli::{ClientConfig, MixerError, UploadSession};

#[derive(Parser)]
#[command(name = "video-mixer")]
#[command(about = "Terminal client for the VideoMixer batch remix backend")]
struct Args {
    /// Backend base URL (overrides the config file)
    #[arg(short, long)]
    server: Option<String>,

    /// Client config file (default: ~/.video-mixer/config.json)
    #[arg(long)]
    client_config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Upload a folder of source videos, grouped by sub-folder category
    Upload {
        /// Directory containing the source videos
        directory: PathBuf,
    },

    /// Submit a remix task for an uploaded session
    Submit {
        /// Session token printed by `upload`
        #[arg(short, long)]
        session: String,

        /// Mixing mode for each output variant (repeatable)
        #[arg(short, long = "mode", default_values_t = vec!["standard".to_string()])]
        modes: Vec<String>,

        /// Anti-duplication strategy preset applied to every variant
        #[arg(short, long)]
        preset: Option<String>,

        /// Force one strategy for all categories (default: server auto-detect)
        #[arg(long)]
        strategy: Option<String>,

        /// Extra per-category parameters as a JSON object
        #[arg(long)]
        params: Option<String>,

        /// Follow progress after submitting
        #[arg(short, long)]
        watch: bool,
    },

    /// Follow a task's live progress
    Watch {
        task_id: String,
    },

    /// Request cooperative cancellation of a task
    Cancel {
        task_id: String,
    },

    /// List strategies, presets and mixing modes
    Strategies,

    /// Show the stock asset inventory
    Assets,

    /// Read or update the server configuration blob
    Config {
        /// Partial update as a JSON object (omit to print the current config)
        #[arg(long)]
        set: Option<String>,
    },

    /// Show (or clear) the task history
    History {
        #[arg(long)]
        clear: bool,
    },

    /// Show or update per-output engagement stats
    Stats {
        /// Record id to update
        #[arg(long)]
        update: Option<String>,

        /// Stats payload for --update, as a JSON object
        #[arg(long)]
        data: Option<String>,

        /// Register new records from a JSON array file
        #[arg(long)]
        batch: Option<PathBuf>,
    },

    /// Check ffmpeg/ffprobe/assets on the backend host
    EnvCheck,

    /// Stream the backend's dependency installer
    EnvInstall,

    /// Check the backend repository for updates
    CheckUpdate {
        /// Ignore the cached result
        #[arg(long)]
        force: bool,
    },

    /// Pull the latest backend version (streams git output)
    Update,

    /// Download task outputs
    Download {
        task_id: String,

        /// Download a single artifact instead of the whole archive
        #[arg(long, requires = "file")]
        folder: Option<String>,

        #[arg(long)]
        file: Option<String>,

        /// Destination directory
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    // Client config: file (se presente) + override da riga di comando
    let config_path = match &args.client_config {
        Some(path) => path.clone(),
        None => dirs::home_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find home directory"))?
            .join(".video-mixer")
            .join("config.json"),
    };
    let mut config = ClientConfig::from_file(&config_path).await?;
    if let Some(server) = args.server {
        config.server_url = server;
    }
    config.validate()?;

    let api = ApiClient::new(&config)?;

    match args.command {
        Command::Upload { directory } => cmd_upload(&api, &directory).await,
        Command::Submit {
            session,
            modes,
            preset,
            strategy,
            params,
            watch,
        } => cmd_submit(&api, &config, session, modes, preset, strategy, params, watch).await,
        Command::Watch { task_id } => cmd_watch(&config, &task_id, JobState::running(0)).await,
        Command::Cancel { task_id } => {
            api.cancel_task(&task_id).await?;
            println!("🛑 Cancellation requested for task {}", task_id);
            Ok(())
        }
        Command::Strategies => cmd_strategies(&api).await,
        Command::Assets => cmd_assets(&api).await,
        Command::Config { set } => cmd_config(&api, set).await,
        Command::History { clear } => cmd_history(&api, clear).await,
        Command::Stats {
            update,
            data,
            batch,
        } => cmd_stats(&api, update, data, batch).await,
        Command::EnvCheck => cmd_env_check(&api).await,
        Command::EnvInstall => cmd_stream(&config, "/ws/env-install", "installer").await,
        Command::CheckUpdate { force } => cmd_check_update(&api, &config, force).await,
        Command::Update => cmd_stream(&config, "/ws/git-pull", "update").await,
        Command::Download {
            task_id,
            folder,
            file,
            output,
        } => cmd_download(&api, &task_id, folder, file, &output).await,
    }
}

async fn cmd_upload(api: &ApiClient, directory: &PathBuf) -> Result<()> {
    if !directory.exists() {
        return Err(anyhow::anyhow!(
            "Input directory does not exist: {}",
            directory.display()
        ));
    }

    let session = UploadSession::new();
    info!("Upload session {}", session.id);

    let coordinator = UploadCoordinator::new(api.clone(), session.id.clone());
    let (report, scan) = coordinator.upload_directory(directory).await?;

    println!();
    if report.failed == 0 {
        println!("✅ Uploaded {} files", report.uploaded);
    } else {
        println!(
            "⚠️ Uploaded {} files, {} failed (see log)",
            report.uploaded, report.failed
        );
    }

    println!("\n📂 Server-side categories:");
    for category in &scan.categories {
        println!(
            "  {} - {} files (strategy: {})",
            category.folder,
            category.files.len(),
            category.strategy
        );
    }
    println!("\nSession: {}", session.id);
    println!("Next: video-mixer submit --session {} --watch", session.id);
    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn cmd_submit(
    api: &ApiClient,
    config: &ClientConfig,
    session: String,
    modes: Vec<String>,
    preset: Option<String>,
    strategy: Option<String>,
    params: Option<String>,
    watch: bool,
) -> Result<()> {
    // Valida modalità e preset contro il catalogo live del server
    let catalog = api.strategies().await?;
    for mode in &modes {
        if !catalog.mixing_modes.is_empty() && !catalog.mixing_modes.iter().any(|m| &m.id == mode) {
            return Err(anyhow::anyhow!(
                "Unknown mixing mode '{}' (server offers: {})",
                mode,
                catalog
                    .mixing_modes
                    .iter()
                    .map(|m| m.id.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            ));
        }
    }
    if let Some(preset) = &preset {
        if !catalog.strategy_presets.is_empty()
            && !catalog.strategy_presets.iter().any(|p| &p.id == preset)
        {
            return Err(anyhow::anyhow!("Unknown strategy preset '{}'", preset));
        }
    }
    if let Some(strategy) = &strategy {
        if !catalog.strategies.iter().any(|s| &s.id == strategy) {
            return Err(anyhow::anyhow!("Unknown strategy '{}'", strategy));
        }
    }

    let extra_params = params
        .map(|raw| serde_json::from_str::<serde_json::Value>(&raw))
        .transpose()
        .map_err(|e| anyhow::anyhow!("--params is not valid JSON: {e}"))?;

    let scan = api.scan_session(&session).await?;
    if scan.categories.is_empty() {
        return Err(anyhow::anyhow!(
            "Session {} has no uploaded categories - run `upload` first",
            session
        ));
    }

    let variants: Vec<OutputVariant> = modes
        .iter()
        .map(|mode| OutputVariant::new(mode, preset.as_deref()))
        .collect();

    let request = build_request(
        &session,
        &scan.categories,
        strategy.as_deref(),
        extra_params.as_ref(),
        &variants,
    );

    println!(
        "🚀 Submitting {} files × {} variants = {} outputs",
        request
            .categories
            .iter()
            .map(|c| c.files.len())
            .sum::<usize>(),
        variants.len(),
        request.expected_total()
    );

    let launcher = JobLauncher::new(api.clone());
    let created = launcher.submit(&request).await?;

    println!("Task {} accepted ({} outputs)", created.task_id, created.total);

    if watch {
        cmd_watch(config, &created.task_id, JobState::running(created.total)).await
    } else {
        println!("Follow it with: video-mixer watch {}", created.task_id);
        Ok(())
    }
}

async fn cmd_watch(config: &ClientConfig, task_id: &str, initial: JobState) -> Result<()> {
    let display = ProgressDisplay::new(initial.total.max(1) as u64);
    let monitor = JobMonitor::new(config, task_id);

    // Ctrl-C chiude il monitor senza toccare il task remoto
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_cancel.cancel();
        }
    });

    let final_state = match monitor.follow(initial, &display, &cancel).await {
        Ok(state) => state,
        Err(MixerError::Cancelled) => {
            display.clear();
            println!("Monitor detached - the task keeps running on the server.");
            println!("Reattach with: video-mixer watch {}", task_id);
            return Ok(());
        }
        Err(e) => {
            display.clear();
            return Err(e.into());
        }
    };

    let elapsed = final_state
        .elapsed
        .map(|s| format!(" in {:.1}s", s))
        .unwrap_or_default();

    match final_state.status {
        JobStatus::Completed => display.finish(&format!(
            "✅ Completed: {} ok, {} failed{}",
            final_state.completed, final_state.failed, elapsed
        )),
        JobStatus::Failed => display.finish(&format!(
            "❌ Finished with errors: {} ok, {} failed{}",
            final_state.completed, final_state.failed, elapsed
        )),
        JobStatus::Cancelled => display.finish("🛑 Cancelled"),
        _ => display.clear(),
    }

    for result in final_state.file_results.iter().filter(|r| !r.is_done()) {
        println!("  ❌ {}: {}", result.filename, result.error);
    }

    Ok(())
}

async fn cmd_strategies(api: &ApiClient) -> Result<()> {
    let catalog = api.strategies().await?;

    println!("📋 Strategies:");
    for strategy in &catalog.strategies {
        println!("  {} - {}", strategy.id, strategy.name);
        if !strategy.description.is_empty() {
            println!("      {}", strategy.description);
        }
    }

    if !catalog.strategy_presets.is_empty() {
        println!("\n🎛 Presets:");
        for preset in &catalog.strategy_presets {
            println!("  {} - {}", preset.id, preset.name);
        }
    }

    if !catalog.mixing_modes.is_empty() {
        println!("\n🎬 Mixing modes:");
        for mode in &catalog.mixing_modes {
            println!("  {} {}", mode.id, mode.name);
        }
    }

    if !catalog.sparkle_styles.is_empty() {
        println!("\n✨ Sparkle styles: {}", catalog.sparkle_styles.join(", "));
    }
    if !catalog.color_schemes.is_empty() {
        println!("🎨 Color schemes: {}", catalog.color_schemes.join(", "));
    }
    Ok(())
}

async fn cmd_assets(api: &ApiClient) -> Result<()> {
    let overview = api.assets_overview().await?;

    println!("🖼 Stickers: {} total", overview.stickers.total);
    let mut categories: Vec<_> = overview.stickers.categories.iter().collect();
    categories.sort();
    for (name, count) in categories {
        println!("  {} - {}", name, count);
    }

    println!("\n✨ Sparkles: {} total", overview.sparkles.total);
    let mut styles: Vec<_> = overview.sparkles.styles.iter().collect();
    styles.sort();
    for (name, count) in styles {
        println!("  {} - {}", name, count);
    }

    if !overview.effects.is_empty() {
        println!("\n🎛 Effect pools:");
        let mut effects: Vec<_> = overview.effects.iter().collect();
        effects.sort();
        for (name, count) in effects {
            println!("  {} - {}", name, count);
        }
    }
    Ok(())
}

async fn cmd_config(api: &ApiClient, set: Option<String>) -> Result<()> {
    match set {
        None => {
            let blob = api.get_config().await?;
            println!("{}", serde_json::to_string_pretty(&blob)?);
        }
        Some(raw) => {
            let body: serde_json::Value = serde_json::from_str(&raw)
                .map_err(|e| anyhow::anyhow!("--set is not valid JSON: {e}"))?;
            api.put_config(&body).await?;
            println!("✅ Configuration updated");
        }
    }
    Ok(())
}

async fn cmd_history(api: &ApiClient, clear: bool) -> Result<()> {
    if clear {
        api.clear_history().await?;
        println!("✅ History cleared");
        return Ok(());
    }

    let history = api.history().await?;
    if history.tasks.is_empty() {
        println!("No archived tasks.");
        return Ok(());
    }

    for task in &history.tasks {
        let badge = match task.status.as_str() {
            "completed" => "✅",
            "cancelled" => "🛑",
            _ => "❌",
        };
        println!(
            "{} {} [{}] {}/{} ok, {} failed, {:.1}s",
            badge, task.id, task.timestamp, task.completed, task.total, task.failed, task.elapsed
        );
        for category in &task.categories {
            println!("    {} × {} ({})", category.folder, category.count, category.strategy);
        }
    }
    Ok(())
}

async fn cmd_stats(
    api: &ApiClient,
    update: Option<String>,
    data: Option<String>,
    batch: Option<PathBuf>,
) -> Result<()> {
    if let Some(path) = batch {
        let content = tokio::fs::read_to_string(&path).await?;
        let videos: Vec<serde_json::Value> = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("{} is not a JSON array: {e}", path.display()))?;
        api.batch_video_stats(&videos).await?;
        println!("✅ Registered {} records", videos.len());
        return Ok(());
    }

    if let Some(id) = update {
        let raw = data.ok_or_else(|| anyhow::anyhow!("--update requires --data <json>"))?;
        let stats: serde_json::Value = serde_json::from_str(&raw)
            .map_err(|e| anyhow::anyhow!("--data is not valid JSON: {e}"))?;
        api.update_video_stat(&video_mixer_cli::api::VideoStatUpdate { id, stats })
            .await?;
        println!("✅ Stats updated");
        return Ok(());
    }

    let stats = api.video_stats().await?;
    if stats.videos.is_empty() {
        println!("No tracked outputs.");
        return Ok(());
    }
    println!("{}", serde_json::to_string_pretty(&stats.videos)?);
    Ok(())
}

async fn cmd_env_check(api: &ApiClient) -> Result<()> {
    let env = api.env_check().await?;

    let ffmpeg_badge = if env.ffmpeg.installed { "✅" } else { "❌" };
    println!(
        "{} ffmpeg {}",
        ffmpeg_badge,
        env.ffmpeg.version.as_deref().unwrap_or("not found")
    );

    let ffprobe_badge = if env.ffprobe.installed { "✅" } else { "❌" };
    println!(
        "{} ffprobe {}",
        ffprobe_badge,
        env.ffprobe.path.as_deref().unwrap_or("not found")
    );

    let stickers = &env.assets.stickers;
    println!(
        "{} stickers: {} files",
        if stickers.exists { "✅" } else { "❌" },
        stickers.count
    );
    let sparkles = &env.assets.sparkles;
    println!(
        "{} sparkles: {} files",
        if sparkles.exists { "✅" } else { "❌" },
        sparkles.count
    );

    if !env.ffmpeg.installed {
        println!("\nInstall the backend dependencies with: video-mixer env-install");
    }
    Ok(())
}

async fn cmd_stream(config: &ClientConfig, channel: &str, label: &str) -> Result<()> {
    let url = format!("{}{}", config.ws_url(), channel);
    let spinner = ProgressDisplay::spinner(&format!("Running {label}..."));

    let outcome = follow_stream(&url, |line| {
        spinner.println(format!("  {line}"));
    })
    .await;

    spinner.finish_and_clear();
    let (success, error) = outcome?;
    if success {
        println!("✅ {label} finished");
        Ok(())
    } else {
        Err(anyhow::anyhow!("{label} failed: {error}"))
    }
}

async fn cmd_check_update(api: &ApiClient, config: &ClientConfig, force: bool) -> Result<()> {
    let cache = CacheStore::new(config.data_dir.as_deref(), &config.server_url).await?;

    if !force {
        if let Some(marker) = cache.load_marker().await {
            if marker.is_fresh(chrono::Utc::now()) {
                if marker.has_update {
                    println!(
                        "⬆️ Update available ({} commits behind, cached check)",
                        marker.ahead
                    );
                } else {
                    println!("✅ Up to date (cached check)");
                }
                return Ok(());
            }
        }
    }

    let check = api.check_update().await?;

    cache
        .save_marker(&UpdateMarker {
            checked_at: chrono::Utc::now(),
            has_update: check.has_update,
            ahead: check.ahead,
        })
        .await?;

    if let Some(error) = &check.error {
        println!("⚠️ Update check degraded: {error}");
    }

    if check.has_update {
        println!("⬆️ Update available: {} new commits", check.ahead);
        for commit in &check.commits {
            println!("  {} {}", commit.sha, commit.message);
        }
        println!("\nApply with: video-mixer update");
    } else {
        println!(
            "✅ Up to date{}",
            check
                .local_sha
                .map(|sha| format!(" ({sha})"))
                .unwrap_or_default()
        );
    }
    Ok(())
}

async fn cmd_download(
    api: &ApiClient,
    task_id: &str,
    folder: Option<String>,
    file: Option<String>,
    output: &PathBuf,
) -> Result<()> {
    let (path, filename) = match (&folder, &file) {
        (Some(folder), Some(file)) => (
            format!("/api/download/{}/{}/{}", task_id, folder, file),
            file.clone(),
        ),
        _ => (
            format!("/api/download/{}/all", task_id),
            format!("{}_outputs.zip", task_id),
        ),
    };

    let spinner = ProgressDisplay::spinner(&format!("Downloading {filename}..."));
    let result = api.download(&path, output, &filename).await;
    spinner.finish_and_clear();

    let (saved_path, bytes) = result?;
    println!("💾 Saved {} ({})", saved_path.display(), format_size(bytes));
    Ok(())
}
