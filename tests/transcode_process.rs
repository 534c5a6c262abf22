//! Process-lifecycle tests for the transcode stream pipeline.
//!
//! These use `/bin/sh` stand-ins through the `AudioTranscoder` seam so they
//! run without an encoder installed. The properties under test: chunked
//! relay with bounded buffering, independence of concurrent jobs, process
//! cleanup on every exit path, and startup failures reported before any
//! output.

mod support;

use futures::StreamExt;
use phono::transcode::{
    AudioTranscoder, FfmpegTranscoder, JobState, TranscodeError, STREAM_CHUNK_CAPACITY,
};
use std::path::PathBuf;
use std::time::Duration;
use support::ShellTranscoder;

/// True once the process is dead (reaped, or a zombie awaiting reaping).
fn process_gone(pid: u32) -> bool {
    match std::fs::read_to_string(format!("/proc/{}/stat", pid)) {
        Err(_) => true,
        Ok(stat) => stat
            .rsplit_once(')')
            .and_then(|(_, rest)| rest.trim_start().chars().next())
            .map(|state| state == 'Z' || state == 'X')
            .unwrap_or(true),
    }
}

/// Poll `cond` for up to five seconds.
async fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if cond() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

#[tokio::test]
async fn chunks_are_bounded_and_complete() {
    let total: usize = 1024 * 1024;
    let mut stream = ShellTranscoder::spawn(&format!("head -c {} /dev/zero", total))
        .await
        .expect("spawn failed");

    let mut received = 0;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.expect("stream error");
        assert!(
            chunk.len() <= STREAM_CHUNK_CAPACITY,
            "chunk of {} bytes exceeds the relay buffer",
            chunk.len()
        );
        received += chunk.len();
    }
    assert_eq!(received, total);

    assert!(wait_for(|| stream.state() == JobState::Completed).await);
}

#[tokio::test]
async fn nonzero_exit_is_classified_as_failed() {
    let mut stream = ShellTranscoder::spawn("printf x; exit 3")
        .await
        .expect("spawn failed");

    let mut received = Vec::new();
    while let Some(chunk) = stream.next().await {
        received.extend_from_slice(&chunk.expect("stream error"));
    }
    assert_eq!(received, b"x");

    assert!(wait_for(|| stream.state() == JobState::Failed).await);
}

#[tokio::test]
async fn abort_terminates_the_process() {
    let mut stream = ShellTranscoder::spawn("printf x; sleep 30")
        .await
        .expect("spawn failed");

    let first = stream.next().await.expect("no output").expect("stream error");
    assert_eq!(&first[..], b"x");

    let pid = stream.pid().expect("process already gone");
    stream.abort();
    assert_eq!(stream.state(), JobState::Killed);
    assert!(
        wait_for(|| process_gone(pid)).await,
        "encoder still running after abort"
    );
}

#[tokio::test]
async fn dropping_the_stream_kills_the_process() {
    // Warm up the runtime's child-process machinery so the fd count below
    // only measures what this test leaks.
    let warmup = ShellTranscoder::spawn("printf warm").await.expect("spawn failed");
    drop(warmup);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let fds_before = std::fs::read_dir("/proc/self/fd").unwrap().count();

    let mut stream = ShellTranscoder::spawn("printf x; sleep 30")
        .await
        .expect("spawn failed");
    let first = stream.next().await.expect("no output").expect("stream error");
    assert_eq!(&first[..], b"x");

    let pid = stream.pid().expect("process already gone");
    drop(stream);

    assert!(
        wait_for(|| process_gone(pid)).await,
        "encoder still running after drop"
    );

    let fds_after = std::fs::read_dir("/proc/self/fd").unwrap().count();
    assert_eq!(fds_before, fds_after, "file descriptors leaked");
}

#[tokio::test]
async fn concurrent_jobs_are_isolated() {
    let script = "printf AAA; sleep 1; printf BBB";

    let mut first = ShellTranscoder::spawn(script).await.expect("spawn failed");
    let mut second = ShellTranscoder::spawn(script).await.expect("spawn failed");

    let chunk = first.next().await.expect("no output").expect("stream error");
    assert_eq!(&chunk[..], b"AAA");
    let chunk = second.next().await.expect("no output").expect("stream error");
    assert_eq!(&chunk[..], b"AAA");

    // Killing one job early must not affect the other.
    let first_pid = first.pid().expect("process already gone");
    drop(first);
    assert!(wait_for(|| process_gone(first_pid)).await);

    let mut received = b"AAA".to_vec();
    while let Some(chunk) = second.next().await {
        received.extend_from_slice(&chunk.expect("stream error"));
    }
    assert_eq!(received, b"AAABBB");
    assert!(wait_for(|| second.state() == JobState::Completed).await);
}

#[tokio::test]
async fn missing_binary_fails_before_any_output() {
    let input = tempfile::NamedTempFile::new().expect("temp file");
    let transcoder = FfmpegTranscoder::new(PathBuf::from("/nonexistent/transcoder"), 5);

    match transcoder.start(input.path()).await {
        Err(TranscodeError::BinaryNotFound(path)) => {
            assert!(path.contains("/nonexistent/transcoder"));
        }
        other => panic!("expected BinaryNotFound, got {:?}", other.map(|_| ())),
    }
}

#[tokio::test]
async fn unreadable_input_fails_before_spawning() {
    let transcoder = FfmpegTranscoder::new(PathBuf::from("/nonexistent/transcoder"), 5);

    match transcoder.start(std::path::Path::new("/no/such/input.flac")).await {
        Err(TranscodeError::Startup(_)) => {}
        other => panic!("expected Startup error, got {:?}", other.map(|_| ())),
    }
}
