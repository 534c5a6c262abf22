use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, warn};

/// Default encoder quality, matching `-aq 5` for libvorbis.
pub const DEFAULT_TRANSCODE_QUALITY: u8 = 5;

const DEFAULT_PORT: u16 = 5000;

// Insecure, for testing and development only.
const DEFAULT_DEV_TOKEN: &str = "phono-dev-token";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("PHONO_AUTH_TOKEN must be set")]
    MissingAuthToken,
    #[error("invalid value for {key}: {value}")]
    Invalid { key: String, value: String },
}

/// Application configuration
///
/// Loaded once at startup and passed explicitly to the server and the
/// transcoder; nothing reads the environment after `load()` returns.
/// In debug builds a `.env` file is honored first.
#[derive(Clone, Debug)]
pub struct Config {
    /// Path of the SQLite catalog database
    pub db_path: String,
    /// Root directory containing the music files referenced by the catalog
    pub music_dir: PathBuf,
    /// Port the HTTP server binds on
    pub port: u16,
    /// Shared secret for the single trusted user
    pub auth_token: String,
    /// libvorbis quality level used when transcoding (`-aq`)
    pub transcode_quality: u8,
    /// Transcoder binary to invoke
    pub ffmpeg_bin: PathBuf,
}

impl Config {
    /// Load configuration from environment variables
    pub fn load() -> Result<Self, ConfigError> {
        if cfg!(debug_assertions) && dotenvy::dotenv().is_ok() {
            info!("loaded .env file");
        }

        let db_path = match std::env::var("PHONO_DB_PATH") {
            Ok(path) => path,
            Err(_) => default_db_path(),
        };

        let music_dir = std::env::var("PHONO_MUSIC_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("music"));

        let port = parse_env("PHONO_PORT", DEFAULT_PORT)?;
        let transcode_quality = parse_env("PHONO_TRANSCODE_QUALITY", DEFAULT_TRANSCODE_QUALITY)?;

        let ffmpeg_bin = std::env::var("PHONO_FFMPEG_BIN")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("ffmpeg"));

        let auth_token = match std::env::var("PHONO_AUTH_TOKEN") {
            Ok(token) if !token.is_empty() => token,
            _ => {
                if cfg!(debug_assertions) {
                    warn!("PHONO_AUTH_TOKEN not set, using default (insecure) dev token");
                    DEFAULT_DEV_TOKEN.to_string()
                } else {
                    return Err(ConfigError::MissingAuthToken);
                }
            }
        };

        Ok(Config {
            db_path,
            music_dir,
            port,
            auth_token,
            transcode_quality,
            ffmpeg_bin,
        })
    }
}

fn default_db_path() -> String {
    match dirs::home_dir() {
        Some(home) => home
            .join(".phono")
            .join("library.db")
            .to_string_lossy()
            .into_owned(),
        None => "phono.db".to_string(),
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value.parse().map_err(|_| ConfigError::Invalid {
            key: key.to_string(),
            value,
        }),
        Err(_) => Ok(default),
    }
}
