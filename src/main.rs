// src/main.rs

use log::info;

use ipcam_recorder::app::{AppContext, build_notifier};
use ipcam_recorder::config;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    // ------------------------------------------------------------
    // Config
    // ------------------------------------------------------------
    let cfg_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config.toml".into());

    let cfg = config::load(&cfg_path)?;
    info!("[ipcam] loaded {}", cfg_path);

    let notifier = build_notifier(&cfg);
    if !notifier.is_enabled() {
        info!("[ipcam] no [slack] section, notifications are disabled");
    }
    let ctx = AppContext::new(cfg, notifier)?;

    // ------------------------------------------------------------
    // Graceful shutdown (SIGINT / SIGTERM)
    // ------------------------------------------------------------
    {
        let shutdown = ctx.shutdown.clone();
        ctrlc::set_handler(move || {
            info!("[ipcam] shutdown requested");
            shutdown.set();
        })?;
    }

    // ------------------------------------------------------------
    // Monitor + recorder
    // ------------------------------------------------------------
    let monitor = ctx.spawn_monitor()?;
    ctx.start_recording()?;

    info!("[ipcam] recording – Ctrl+C to stop");
    ctx.wait_for_shutdown();

    info!("[ipcam] shutting down…");
    ctx.shutdown(Some(monitor))?;
    info!("[ipcam] shutdown complete");

    Ok(())
}
