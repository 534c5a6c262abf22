use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::io;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::process::{Child, ChildStdout, Command};
use tokio_util::io::ReaderStream;
use tracing::{debug, warn};

use crate::config::Config;

/// Upper bound on a single stream chunk. Output is relayed to the client as
/// it is produced; nothing ever accumulates more than one chunk, so a slow
/// client throttles the encoder through pipe backpressure.
pub const STREAM_CHUNK_CAPACITY: usize = 64 * 1024;

/// Errors raised before any response bytes are produced.
///
/// Failures after the stream has started are not represented here: once
/// headers are committed the body simply ends, and the client re-requests if
/// it wants a retry.
#[derive(Error, Debug)]
pub enum TranscodeError {
    #[error("transcoder binary not found: {0}")]
    BinaryNotFound(String),
    #[error("failed to start transcoder: {0}")]
    Startup(#[from] io::Error),
    #[error("transcoder stdout was not captured")]
    MissingStdout,
}

/// Lifecycle of one transcoding job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Running,
    /// Zero exit status after producing all output.
    Completed,
    /// Nonzero exit status.
    Failed,
    /// Terminated by the cleanup path before it finished.
    Killed,
}

/// Capability interface for starting one encoding job.
///
/// The delivery handler depends on this seam rather than on a concrete
/// external binary, so tests (or an in-process codec) can stand in for it.
#[async_trait]
pub trait AudioTranscoder: Send + Sync {
    async fn start(&self, input: &Path) -> Result<TranscodeStream, TranscodeError>;
}

/// Invokes `ffmpeg` to encode a source file to ogg/vorbis on stdout.
#[derive(Debug, Clone)]
pub struct FfmpegTranscoder {
    binary: PathBuf,
    quality: u8,
}

impl FfmpegTranscoder {
    pub fn new(binary: PathBuf, quality: u8) -> Self {
        FfmpegTranscoder { binary, quality }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.ffmpeg_bin.clone(), config.transcode_quality)
    }

    fn build_command(&self, input: &Path) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("-v")
            .arg("quiet")
            .arg("-i")
            .arg(input)
            .arg("-f")
            .arg("ogg")
            .arg("-acodec")
            .arg("libvorbis")
            .arg("-aq")
            .arg(self.quality.to_string())
            .arg("pipe:1")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true);
        cmd
    }
}

#[async_trait]
impl AudioTranscoder for FfmpegTranscoder {
    async fn start(&self, input: &Path) -> Result<TranscodeStream, TranscodeError> {
        // An unreadable input surfaces here, before spawning, so the caller
        // can still send a clean error status.
        tokio::fs::metadata(input).await?;

        debug!(path = %input.display(), quality = self.quality, "starting transcode");

        let child = self.build_command(input).spawn().map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                TranscodeError::BinaryNotFound(self.binary.display().to_string())
            } else {
                TranscodeError::Startup(e)
            }
        })?;

        TranscodeStream::from_child(child)
    }
}

/// Byte stream adapter over a transcoder process's stdout.
///
/// Owns the child process for exactly the lifetime of one HTTP response.
/// Chunks are yielded in production order with bounded buffering; dropping
/// the stream on any exit path (normal end, handler error, client
/// disconnect) terminates the process if it is still running.
pub struct TranscodeStream {
    inner: ReaderStream<ChildStdout>,
    child: Child,
    killed: bool,
}

impl TranscodeStream {
    /// Adapt a spawned child whose stdout is piped.
    pub fn from_child(mut child: Child) -> Result<Self, TranscodeError> {
        let stdout = child.stdout.take().ok_or(TranscodeError::MissingStdout)?;
        Ok(TranscodeStream {
            inner: ReaderStream::with_capacity(stdout, STREAM_CHUNK_CAPACITY),
            child,
            killed: false,
        })
    }

    /// OS pid of the encoder process, while it is running.
    pub fn pid(&self) -> Option<u32> {
        self.child.id()
    }

    /// Current lifecycle state of the job.
    pub fn state(&mut self) -> JobState {
        if self.killed {
            // Reap if the kill has already taken effect.
            let _ = self.child.try_wait();
            return JobState::Killed;
        }
        match self.child.try_wait() {
            Ok(Some(status)) if status.success() => JobState::Completed,
            Ok(Some(_)) => JobState::Failed,
            _ => JobState::Running,
        }
    }

    /// Explicit cancellation hook: terminate the encoder if still running.
    ///
    /// Dropping the stream does the same; this exists for callers that want
    /// to cancel and then observe the terminal state.
    pub fn abort(&mut self) {
        if matches!(self.child.try_wait(), Ok(None)) {
            if let Err(e) = self.child.start_kill() {
                warn!(error = %e, "failed to kill transcoder process");
            }
            self.killed = true;
        }
    }
}

impl Stream for TranscodeStream {
    type Item = Result<Bytes, io::Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

impl Drop for TranscodeStream {
    fn drop(&mut self) {
        match self.child.try_wait() {
            Ok(Some(status)) if status.success() => {
                debug!("transcoder exited cleanly");
            }
            Ok(Some(status)) => {
                // Headers were already committed when this happened, so the
                // truncated body is all the client sees.
                warn!(%status, "transcoder exited with failure");
            }
            _ => {
                // Still running: the response ended before the encoder did.
                // kill_on_drop has tokio reap the zombie afterwards.
                if let Err(e) = self.child.start_kill() {
                    warn!(error = %e, "failed to kill transcoder process on drop");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ffmpeg_invocation_matches_contract() {
        let transcoder = FfmpegTranscoder::new(PathBuf::from("ffmpeg"), 5);
        let cmd = transcoder.build_command(Path::new("/music/a.flac"));
        let args: Vec<String> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert_eq!(
            args,
            [
                "-v", "quiet", "-i", "/music/a.flac", "-f", "ogg", "-acodec", "libvorbis",
                "-aq", "5", "pipe:1"
            ]
        );
    }

    #[test]
    fn quality_is_configurable() {
        let transcoder = FfmpegTranscoder::new(PathBuf::from("ffmpeg"), 8);
        let cmd = transcoder.build_command(Path::new("in.wav"));
        let args: Vec<String> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert!(args.windows(2).any(|w| w == ["-aq", "8"]));
    }
}
