use crate::db::{Database, DbAlbum, DbTrack};
use thiserror::Error;

/// Search terms beyond this count are ignored
pub const SEARCH_TOKEN_LIMIT: usize = 10;

const TRACK_RESULT_LIMIT: u32 = 30;
const ALBUM_RESULT_LIMIT: u32 = 10;

#[derive(Error, Debug)]
pub enum LibraryError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Read-side catalog manager for the HTTP server
///
/// Thin query layer over the database: lookups by id, album track listings,
/// and the general search. The catalog itself is written by the scanner,
/// never by the server.
#[derive(Debug, Clone)]
pub struct LibraryManager {
    database: Database,
}

impl LibraryManager {
    /// Create a new library manager
    pub fn new(database: Database) -> Self {
        LibraryManager { database }
    }

    /// Get a single track by ID
    pub async fn get_track(&self, track_id: i64) -> Result<Option<DbTrack>, LibraryError> {
        Ok(self.database.get_track_by_id(track_id).await?)
    }

    /// Get a single album by ID
    pub async fn get_album(&self, album_id: i64) -> Result<Option<DbAlbum>, LibraryError> {
        Ok(self.database.get_album_by_id(album_id).await?)
    }

    /// Get an album's tracks in track-number order
    pub async fn get_tracks_for_album(&self, album_id: i64) -> Result<Vec<DbTrack>, LibraryError> {
        Ok(self.database.get_tracks_for_album(album_id).await?)
    }

    /// General search encompassing artists, tracks, and albums.
    ///
    /// The query string is split on whitespace into at most
    /// `SEARCH_TOKEN_LIMIT` tokens; every token must substring-match the
    /// title or artist of a result row.
    pub async fn search(
        &self,
        query: &str,
    ) -> Result<(Vec<DbAlbum>, Vec<DbTrack>), LibraryError> {
        let tokens = search_tokens(query);
        let tracks = self
            .database
            .search_tracks(&tokens, TRACK_RESULT_LIMIT)
            .await?;
        let albums = self
            .database
            .search_albums(&tokens, ALBUM_RESULT_LIMIT)
            .await?;
        Ok((albums, tracks))
    }
}

fn search_tokens(query: &str) -> Vec<String> {
    query
        .split_whitespace()
        .take(SEARCH_TOKEN_LIMIT)
        .map(str::to_string)
        .collect()
}
