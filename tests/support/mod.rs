// Test support utilities shared by the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use phono::db::Database;
use phono::library::{LibraryManager, SharedLibraryManager};
use phono::server::AppState;
use phono::transcode::{AudioTranscoder, TranscodeError, TranscodeStream};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use tokio::process::Command;

/// Shared secret used by all router tests
pub const TEST_TOKEN: &str = "test-token";

/// Transcoder stand-in that runs a shell command instead of an encoder.
///
/// Lets the process-lifecycle and delivery tests exercise the real stream
/// adapter without requiring ffmpeg on the test machine.
pub struct ShellTranscoder {
    script: String,
}

impl ShellTranscoder {
    pub fn new(script: impl Into<String>) -> Self {
        ShellTranscoder {
            script: script.into(),
        }
    }

    /// Spawn the script directly, without going through the trait.
    pub async fn spawn(script: &str) -> Result<TranscodeStream, TranscodeError> {
        let child = Command::new("/bin/sh")
            .arg("-c")
            .arg(script)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()?;
        TranscodeStream::from_child(child)
    }
}

#[async_trait]
impl AudioTranscoder for ShellTranscoder {
    async fn start(&self, _input: &Path) -> Result<TranscodeStream, TranscodeError> {
        Self::spawn(&self.script).await
    }
}

/// Open a fresh catalog database in a temp directory.
///
/// The directory handle must be kept alive for the duration of the test.
pub async fn temp_database() -> (Database, tempfile::TempDir) {
    let dir = tempfile::tempdir().expect("failed to create temp dir");
    let db_path = dir.path().join("library.db");
    let database = Database::new(db_path.to_str().unwrap())
        .await
        .expect("failed to open database");
    (database, dir)
}

/// Build server state around a database and a transcoder stand-in.
pub fn app_state(
    database: Database,
    transcoder: Arc<dyn AudioTranscoder>,
    media_root: PathBuf,
) -> AppState {
    AppState {
        library: SharedLibraryManager::new(LibraryManager::new(database)),
        transcoder,
        media_root,
        auth_token: TEST_TOKEN.to_string(),
    }
}
