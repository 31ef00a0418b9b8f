//! Newline-delimited JSON sequencing over a reader/writer pair.
//!
//! Each input line is a [`VisemeRequest`]; each output line is either a
//! [`VisemeResponse`] or an [`ErrorResponse`]. Used by the
//! `lipsync-sequence` binary with stdin/stdout.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{info, warn};

use super::local::{LocalSequencer, SequencingRevision};
use super::remote::{VisemeRequest, VisemeResponse};
use super::server::{ErrorBody, ErrorResponse};
use crate::error::{LipSyncError, Result};

fn error_line(message: String) -> Result<String> {
    let body = ErrorResponse {
        error: ErrorBody {
            message,
            error_type: "invalid_request_error".to_owned(),
        },
    };
    serde_json::to_string(&body)
        .map_err(|e| LipSyncError::Channel(format!("failed to serialize error response: {e}")))
}

/// Answer one request line.
fn respond(sequencer: &LocalSequencer, line: &str) -> Result<String> {
    let request: VisemeRequest = match serde_json::from_str(line) {
        Ok(req) => req,
        Err(e) => {
            warn!(error = %e, raw_line = %line, "failed to parse request");
            return error_line(format!("failed to parse request: {e}"));
        }
    };
    let Some(revision) = SequencingRevision::from_version(request.version) else {
        return error_line(format!("unsupported version {}", request.version));
    };
    let sequence = sequencer.clone().with_revision(revision).sequence_with_end_times(
        &request.sentence,
        &request.start_seconds,
        &request.end_seconds,
    );
    serde_json::to_string(&VisemeResponse {
        viseme_list: sequence.into_vec(),
    })
    .map_err(|e| LipSyncError::Channel(format!("failed to serialize response: {e}")))
}

/// Serve requests from `reader` until EOF, writing one line per request.
///
/// Blank lines are ignored. Malformed requests produce an error line and
/// processing continues.
///
/// # Errors
///
/// Returns [`LipSyncError::Channel`] if reading or writing fails.
pub async fn run_sequence_stdio<R, W>(
    sequencer: &LocalSequencer,
    mut reader: R,
    mut writer: W,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut line = String::new();
    let mut served = 0usize;
    loop {
        line.clear();
        let bytes_read = reader
            .read_line(&mut line)
            .await
            .map_err(|e| LipSyncError::Channel(format!("failed to read request: {e}")))?;
        if bytes_read == 0 {
            info!(served, "input closed (EOF)");
            break;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let json = respond(sequencer, trimmed)?;
        writer
            .write_all(json.as_bytes())
            .await
            .map_err(|e| LipSyncError::Channel(format!("failed to write response: {e}")))?;
        writer
            .write_all(b"\n")
            .await
            .map_err(|e| LipSyncError::Channel(format!("failed to write newline: {e}")))?;
        writer
            .flush()
            .await
            .map_err(|e| LipSyncError::Channel(format!("failed to flush output: {e}")))?;
        served += 1;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    async fn run(input: &str) -> Vec<serde_json::Value> {
        let mut out = Vec::new();
        run_sequence_stdio(&LocalSequencer::new(), input.as_bytes(), &mut out)
            .await
            .unwrap();
        String::from_utf8(out)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn answers_each_line() {
        let input = concat!(
            r#"{"sentence":"hello","start_seconds":[0.0,0.05,0.1,0.15,0.2]}"#,
            "\n\n",
            r#"{"sentence":"zzzz","start_seconds":[0.0,0.1,0.2,0.3],"version":2}"#,
            "\n"
        );
        let out = run(input).await;
        assert_eq!(out.len(), 2);
        assert_eq!(out[0]["visemeList"][0], serde_json::json!({"visemeId": 11, "startMs": 0}));
        assert_eq!(out[1], serde_json::json!({"visemeList": []}));
    }

    #[tokio::test]
    async fn malformed_line_reports_error_and_continues() {
        let input = "not json\n{\"sentence\":\"a\",\"start_seconds\":[0.0],\"version\":5}\n";
        let out = run(input).await;
        assert_eq!(out.len(), 2);
        assert_eq!(out[0]["error"]["type"], "invalid_request_error");
        assert!(
            out[1]["error"]["message"]
                .as_str()
                .unwrap()
                .contains("unsupported version 5")
        );
    }
}
