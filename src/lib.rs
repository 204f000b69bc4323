// Project Manager setup
// Library entry point: logging, service wiring and the terminal front-end.

pub mod api;
pub mod auth;
pub mod config;
pub mod models;
pub mod security;
pub mod store;
mod tui;
pub mod utils;
pub mod wizard;

use anyhow::{Context, Result};
use log::{error, info};
use std::path::Path;
use std::sync::Arc;

use api::{HttpRemoteApi, RemoteApi};
use config::AppConfig;
use security::secret_protector::{self, SecretProtector};
use store::{CredentialStore, FileKeyValueStore};

/// Initialize logging with dual format (JSON + human-readable).
///
/// Every line carries a per-process run id so a single launch can be isolated in the JSON log.
pub fn init_logging(log_dir: &Path, with_stdout: bool) -> Result<()> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    let timestamp = chrono::Utc::now().format("%Y-%m-%d-%H%M%S");
    let json_log_file = log_dir.join(format!("pm-setup-{}.log", timestamp));
    let txt_log_file = log_dir.join(format!("pm-setup-{}.txt", timestamp));
    let run_id = uuid::Uuid::new_v4().to_string();

    // Stdout stays off for the TUI; it would corrupt the screen.
    let mut dispatch = fern::Dispatch::new()
        .level(log::LevelFilter::Debug)
        .level_for("hyper", log::LevelFilter::Info)
        .level_for("reqwest", log::LevelFilter::Info);

    if with_stdout {
        dispatch = dispatch.chain(
            fern::Dispatch::new()
                .format(move |out, message, record| {
                    let timestamp_local = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
                    let message_str = format!("{}", message);
                    let (phase, step, cleaned_message) =
                        utils::logging::parse_log_metadata(&message_str);
                    let txt_line = utils::logging::format_human_readable_log(
                        &timestamp_local.to_string(),
                        record.level(),
                        record.target(),
                        &cleaned_message,
                        phase.as_deref(),
                        step.as_deref(),
                    );
                    out.finish(format_args!("{}", txt_line));
                })
                .chain(std::io::stdout()),
        );
    }

    dispatch = dispatch
        .chain(
            fern::Dispatch::new()
                .format(move |out, message, record| {
                    let timestamp_utc = chrono::Utc::now().to_rfc3339();
                    let message_str = format!("{}", message);
                    let (phase, step, cleaned_message) =
                        utils::logging::parse_log_metadata(&message_str);
                    let json_line = utils::logging::format_json_log(
                        &timestamp_utc,
                        record.level(),
                        record.target(),
                        &cleaned_message,
                        phase.as_deref(),
                        step.as_deref(),
                        Some(run_id.as_str()),
                    );
                    out.finish(format_args!("{}\n", json_line));
                })
                .chain(fern::log_file(&json_log_file)?),
        )
        .chain(
            fern::Dispatch::new()
                .format(move |out, message, record| {
                    let timestamp_local = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
                    let message_str = format!("{}", message);
                    let (phase, step, cleaned_message) =
                        utils::logging::parse_log_metadata(&message_str);
                    let txt_line = utils::logging::format_human_readable_log(
                        &timestamp_local.to_string(),
                        record.level(),
                        record.target(),
                        &cleaned_message,
                        phase.as_deref(),
                        step.as_deref(),
                    );
                    out.finish(format_args!("{}\n", txt_line));
                })
                .chain(fern::log_file(&txt_log_file)?),
        );

    dispatch.apply()?;

    info!(
        "[PHASE: initialization] Logging initialized, log directory: {:?}",
        log_dir
    );
    Ok(())
}

struct Services {
    api: Arc<dyn RemoteApi>,
    store: CredentialStore,
}

/// Load configuration, start logging and build the backend client and the credential store.
fn bootstrap(with_stdout: bool) -> Result<Services> {
    let cfg = AppConfig::load()?;
    let data_folder = cfg.data_folder();
    let log_folder = utils::path_resolver::resolve_log_folder(&data_folder)?;

    if let Err(e) = init_logging(&log_folder, with_stdout) {
        eprintln!("Failed to initialize logging: {}", e);
    }

    info!(
        "[PHASE: initialization] pm-setup {} starting at {}",
        env!("CARGO_PKG_VERSION"),
        chrono::Utc::now()
    );
    info!(
        "[PHASE: initialization] [STEP: data_folder] Data folder: {:?}",
        data_folder
    );
    info!(
        "[PHASE: initialization] [STEP: config] Backend: {} (request timeout {}s, import timeout {}s)",
        cfg.api_base_url,
        cfg.request_timeout_secs,
        cfg.import_timeout_secs
    );

    let records = Arc::new(FileKeyValueStore::new(
        utils::path_resolver::resolve_records_folder(&data_folder),
    ));
    let secrets = Arc::new(SecretProtector::new(secret_protector::default_key_path(
        &data_folder,
    )));
    let store = CredentialStore::new(records, secrets);
    let api: Arc<dyn RemoteApi> = Arc::new(HttpRemoteApi::from_config(&cfg)?);

    Ok(Services { api, store })
}

/// Interactive terminal front-end.
pub fn run_tui() -> Result<()> {
    let services = bootstrap(false)?;

    let ctx = tui::AppContext {
        api: services.api,
        store: services.store,
    };
    if let Err(e) = tui::run(ctx) {
        error!("[PHASE: tui] [STEP: fatal] TUI exited with error: {:?}", e);
        return Err(e);
    }
    Ok(())
}

/// Render a single frame of `target` off-screen and exit. Used by automated checks.
pub fn run_tui_smoke(target: Option<String>) -> Result<()> {
    let target = target.as_deref().unwrap_or("index");
    tui::smoke(target).map_err(|e| {
        error!(
            "[PHASE: tui] [STEP: smoke] TUI smoke exited with error: {:?}",
            e
        );
        e
    })
}

/// Query the backend's engine status once. Exit code 0 only when MySQL is installed and running.
pub fn run_engine_check() -> Result<i32> {
    let services = bootstrap(true)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    let status = runtime.block_on(async {
        let installed = services.api.check_installed().await;
        let running = match installed {
            Ok(true) => services.api.check_running().await,
            Ok(false) => Ok(false),
            Err(ref e) => Err(e.clone()),
        };
        (installed, running)
    });

    match status {
        (Ok(installed), Ok(running)) => {
            println!("MySQL installed: {}", if installed { "yes" } else { "no" });
            println!("MySQL running:   {}", if running { "yes" } else { "no" });
            Ok(if installed && running { 0 } else { 1 })
        }
        (Err(e), _) | (_, Err(e)) => {
            error!("[PHASE: engine] [STEP: check] Engine status query failed: {}", e);
            eprintln!("Engine status query failed: {}", e);
            Ok(1)
        }
    }
}
