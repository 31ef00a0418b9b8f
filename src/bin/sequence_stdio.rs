//! Viseme sequencing over stdin/stdout.
//!
//! Reads one JSON request per line (`{"sentence", "start_seconds",
//! "end_seconds", "version"}`) and writes one `{"visemeList": [...]}` or
//! `{"error": {...}}` line per request. Tracing goes to stderr so stdout
//! stays a clean protocol channel.

use lipsync::LipSyncConfig;
use lipsync::viseme::{LocalSequencer, run_sequence_stdio};
use tokio::io::{BufReader, BufWriter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("lipsync=info")),
        )
        .init();

    let config = LipSyncConfig::load_or_default()?;
    let sequencer = LocalSequencer::from_config(&config.dictionary)?;
    tracing::info!(
        dictionary_entries = sequencer.dictionary().len(),
        full_cmudict = sequencer.dictionary().has_full_dictionary(),
        "lipsync-sequence starting"
    );

    let reader = BufReader::new(tokio::io::stdin());
    let writer = BufWriter::new(tokio::io::stdout());
    run_sequence_stdio(&sequencer, reader, writer)
        .await
        .map_err(|e| {
            tracing::error!(error = %e, "lipsync-sequence exited with error");
            anyhow::anyhow!("lipsync-sequence failed: {e}")
        })?;
    Ok(())
}
