use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::info;

use crate::db::models::*;

#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Initialize database connection and create tables
    pub async fn new(database_path: &str) -> Result<Self, sqlx::Error> {
        // Use sqlite:// with ?mode=rwc to create if it doesn't exist
        let database_url = format!("sqlite://{}?mode=rwc", database_path);
        info!("Connecting to {}", database_url);
        let pool = SqlitePool::connect(&database_url).await?;

        let db = Database { pool };
        db.create_tables().await?;
        Ok(db)
    }

    /// Create all necessary tables
    async fn create_tables(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS albums (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                artist TEXT NOT NULL,
                title TEXT NOT NULL,
                date TEXT,
                label TEXT,
                catalog_number TEXT,
                cover_art TEXT,
                created_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS tracks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                artist TEXT NOT NULL,
                title TEXT NOT NULL,
                filename TEXT NOT NULL,
                track_number INTEGER,
                album_id INTEGER,
                created_at TEXT NOT NULL,
                FOREIGN KEY (album_id) REFERENCES albums (id) ON DELETE SET NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Insert an album, returning its assigned id
    pub async fn insert_album(&self, album: &NewAlbum) -> Result<i64, sqlx::Error> {
        let now: DateTime<Utc> = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO albums (
                artist, title, date, label, catalog_number, cover_art, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&album.artist)
        .bind(&album.title)
        .bind(&album.date)
        .bind(&album.label)
        .bind(&album.catalog_number)
        .bind(&album.cover_art)
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Insert a track, returning its assigned id
    pub async fn insert_track(&self, track: &NewTrack) -> Result<i64, sqlx::Error> {
        let now: DateTime<Utc> = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO tracks (
                artist, title, filename, track_number, album_id, created_at
            ) VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&track.artist)
        .bind(&track.title)
        .bind(&track.filename)
        .bind(track.track_number)
        .bind(track.album_id)
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.last_insert_rowid())
    }

    /// Get a single track by ID
    pub async fn get_track_by_id(&self, track_id: i64) -> Result<Option<DbTrack>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM tracks WHERE id = ?")
            .bind(track_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| track_from_row(&r)))
    }

    /// Get a single album by ID
    pub async fn get_album_by_id(&self, album_id: i64) -> Result<Option<DbAlbum>, sqlx::Error> {
        let row = sqlx::query("SELECT * FROM albums WHERE id = ?")
            .bind(album_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| album_from_row(&r)))
    }

    /// Get tracks for an album, in track-number order
    pub async fn get_tracks_for_album(&self, album_id: i64) -> Result<Vec<DbTrack>, sqlx::Error> {
        let rows = sqlx::query("SELECT * FROM tracks WHERE album_id = ? ORDER BY track_number")
            .bind(album_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.iter().map(track_from_row).collect())
    }

    /// Substring search over track title/artist: every token must match one
    /// of the two columns.
    pub async fn search_tracks(
        &self,
        tokens: &[String],
        limit: u32,
    ) -> Result<Vec<DbTrack>, sqlx::Error> {
        let sql = search_sql("tracks", tokens);
        let mut query = sqlx::query(&sql);
        for token in tokens {
            let pattern = format!("%{}%", token);
            query = query.bind(pattern.clone()).bind(pattern);
        }
        let rows = query.bind(limit).fetch_all(&self.pool).await?;

        Ok(rows.iter().map(track_from_row).collect())
    }

    /// Substring search over album title/artist, same token semantics as
    /// `search_tracks`.
    pub async fn search_albums(
        &self,
        tokens: &[String],
        limit: u32,
    ) -> Result<Vec<DbAlbum>, sqlx::Error> {
        let sql = search_sql("albums", tokens);
        let mut query = sqlx::query(&sql);
        for token in tokens {
            let pattern = format!("%{}%", token);
            query = query.bind(pattern.clone()).bind(pattern);
        }
        let rows = query.bind(limit).fetch_all(&self.pool).await?;

        Ok(rows.iter().map(album_from_row).collect())
    }
}

fn search_sql(table: &str, tokens: &[String]) -> String {
    let mut sql = format!("SELECT * FROM {}", table);
    if !tokens.is_empty() {
        let conditions = vec!["(title LIKE ? OR artist LIKE ?)"; tokens.len()].join(" AND ");
        sql.push_str(" WHERE ");
        sql.push_str(&conditions);
    }
    sql.push_str(" LIMIT ?");
    sql
}

fn track_from_row(row: &SqliteRow) -> DbTrack {
    DbTrack {
        id: row.get("id"),
        artist: row.get("artist"),
        title: row.get("title"),
        filename: row.get("filename"),
        track_number: row.get("track_number"),
        album_id: row.get("album_id"),
        created_at: row.get("created_at"),
    }
}

fn album_from_row(row: &SqliteRow) -> DbAlbum {
    DbAlbum {
        id: row.get("id"),
        artist: row.get("artist"),
        title: row.get("title"),
        date: row.get("date"),
        label: row.get("label"),
        catalog_number: row.get("catalog_number"),
        cover_art: row.get("cover_art"),
        created_at: row.get("created_at"),
    }
}
