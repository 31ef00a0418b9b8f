//! Round trip between `RemoteSequencer` and `VisemeServer`.
//!
//! The served sequence must match what the local sequencer computes in
//! process, for each supported revision.
#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::time::Duration;

use lipsync::config::ServerConfig;
use lipsync::error::LipSyncError;
use lipsync::viseme::server::VisemeServer;
use lipsync::viseme::{LocalSequencer, RemoteSequencer, SequencingRevision, Viseme};

fn per_char_times(text: &str, step_secs: f64) -> Vec<f64> {
    (0..text.chars().count()).map(|i| i as f64 * step_secs).collect()
}

async fn start_server() -> VisemeServer {
    let config = ServerConfig {
        host: "127.0.0.1".to_owned(),
        port: 0,
    };
    VisemeServer::start(LocalSequencer::new(), &config)
        .await
        .expect("server should bind an ephemeral port")
}

#[tokio::test]
async fn hello_matches_local_sequencer() {
    let server = start_server().await;
    let remote = RemoteSequencer::new(server.base_url(), Duration::from_secs(5)).unwrap();

    let starts = [0.0, 0.05, 0.1, 0.15, 0.2];
    let seq = remote.sequence_remote("hello", &starts, &[], 1).await.unwrap();
    assert_eq!(
        seq.into_vec(),
        vec![
            Viseme::new(11, 0),
            Viseme::new(8, 100),
            Viseme::new(13, 150),
            Viseme::neutral(200),
        ]
    );
    server.shutdown();
}

#[tokio::test]
async fn both_revisions_match_in_process_results() {
    let server = start_server().await;
    let remote = RemoteSequencer::new(server.base_url(), Duration::from_secs(5)).unwrap();

    let text = "Hello, nice to meet you. The weather is really nice today.";
    let starts = per_char_times(text, 0.04);
    let ends: Vec<f64> = starts.iter().map(|s| s + 0.04).collect();

    for revision in [SequencingRevision::Positional, SequencingRevision::Proportional] {
        let local = LocalSequencer::new()
            .with_revision(revision)
            .sequence_with_end_times(text, &starts, &ends);
        let served = remote
            .sequence_remote(text, &starts, &ends, revision.version())
            .await
            .unwrap();
        assert_eq!(served, local, "revision {revision:?}");
        assert!(served.check().is_ok());
    }
    server.shutdown();
}

#[tokio::test]
async fn unsupported_version_is_rejected() {
    let server = start_server().await;
    let remote = RemoteSequencer::new(server.base_url(), Duration::from_secs(5)).unwrap();

    let err = remote
        .sequence_remote("hello", &[0.0], &[], 9)
        .await
        .unwrap_err();
    match err {
        LipSyncError::Remote(msg) => {
            assert!(msg.contains("400"), "message: {msg}");
            assert!(msg.contains("unsupported version 9"), "message: {msg}");
        }
        other => panic!("expected Remote, got {other:?}"),
    }
}

#[tokio::test]
async fn unknown_text_round_trips_as_empty() {
    let server = start_server().await;
    let remote = RemoteSequencer::new(server.base_url(), Duration::from_secs(5)).unwrap();

    let seq = remote
        .sequence_remote("xyzzy", &per_char_times("xyzzy", 0.05), &[], 1)
        .await
        .unwrap();
    assert!(seq.is_empty());
}
