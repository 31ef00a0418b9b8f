//! Viseme sequencing HTTP server.
//!
//! Serves `POST /viseme/elevenlabs` from the local sequencer so that
//! clients configured with remote sequencing can reach it.
//!
//! Usage: `lipsync-server [config.toml]`. Without an argument the default
//! config path is used, falling back to built-in defaults.

use std::path::PathBuf;

use anyhow::Context;
use lipsync::LipSyncConfig;
use lipsync::viseme::LocalSequencer;
use lipsync::viseme::server::VisemeServer;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("lipsync=info")),
        )
        .init();

    let config = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => LipSyncConfig::from_file(&path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => LipSyncConfig::load_or_default().context("failed to load config")?,
    };
    config.validate().context("invalid config")?;

    let sequencer =
        LocalSequencer::from_config(&config.dictionary).context("failed to load dictionary")?;
    if !sequencer.dictionary().has_full_dictionary() {
        tracing::warn!(
            entries = sequencer.dictionary().len(),
            "no full cmudict.dict found; only the core lexicon is available (set LIPSYNC_CMUDICT)"
        );
    }
    let mut server = VisemeServer::start(sequencer, &config.server)
        .await
        .context("failed to start viseme server")?;
    tracing::info!(url = %server.base_url(), "lipsync-server ready");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupt received, shutting down");
        }
        () = server.wait() => {
            tracing::warn!("server task exited");
        }
    }
    server.shutdown();
    Ok(())
}
