use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Track metadata
///
/// `filename` is relative to the configured music root and always carries a
/// format extension; rows without one are treated as corrupt at delivery
/// time. Tracks may exist without an album (loose files).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DbTrack {
    pub id: i64,
    pub artist: String,
    pub title: String,
    pub filename: String,
    pub track_number: Option<i64>,
    pub album_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl DbTrack {
    /// API payload shape; the album field is the serialized album, or `""`
    /// for albumless tracks.
    pub fn payload(&self, album: Option<&DbAlbum>) -> serde_json::Value {
        json!({
            "id": self.id,
            "artist": self.artist,
            "title": self.title,
            "track": self.track_number,
            "album": album.map(DbAlbum::payload).unwrap_or_else(|| json!("")),
        })
    }
}

/// Album metadata
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DbAlbum {
    pub id: i64,
    pub artist: String,
    pub title: String,
    pub date: Option<String>,
    pub label: Option<String>,
    pub catalog_number: Option<String>,
    /// Filename of cover art under the music root, jpg/png
    pub cover_art: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl DbAlbum {
    pub fn payload(&self) -> serde_json::Value {
        json!({
            "id": self.id,
            "artist": self.artist,
            "title": self.title,
            "date": self.date,
            "label": self.label,
            "cat_number": self.catalog_number,
            "has_cover_art": self.cover_art.is_some(),
        })
    }
}

/// Insert payload for a track; the id is assigned by the database.
#[derive(Debug, Clone)]
pub struct NewTrack {
    pub artist: String,
    pub title: String,
    pub filename: String,
    pub track_number: Option<i64>,
    pub album_id: Option<i64>,
}

/// Insert payload for an album; the id is assigned by the database.
#[derive(Debug, Clone)]
pub struct NewAlbum {
    pub artist: String,
    pub title: String,
    pub date: Option<String>,
    pub label: Option<String>,
    pub catalog_number: Option<String>,
    pub cover_art: Option<String>,
}
