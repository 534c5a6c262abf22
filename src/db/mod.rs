pub mod client;
pub mod models;

pub use client::Database;
pub use models::{DbAlbum, DbTrack, NewAlbum, NewTrack};
