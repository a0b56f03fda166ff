//! Access to the media server.
//!
//! [`MediaServer`] is the seam the walker and the run orchestrator depend on;
//! [`PlexClient`] implements it over the Plex HTTP API, tests implement it
//! in memory.

pub mod client;
pub mod models;

use async_trait::async_trait;

use crate::error::PlexError;

pub use client::PlexClient;
pub use models::{
    ItemKind, Library, Marker, MarkerKind, Media, Metadata, Part, ServerIdentity, Setting,
};

/// Read-only view of a media server's library tree.
#[async_trait]
pub trait MediaServer: Send + Sync {
    /// All library sections, in server order.
    async fn libraries(&self) -> Result<Vec<Library>, PlexError>;

    /// The library's current settings collection; never cached.
    async fn library_settings(&self, library: &Library) -> Result<Vec<Setting>, PlexError>;

    /// Top-level items of a library (movies, shows or photo albums).
    async fn library_items(&self, library: &Library) -> Result<Vec<Metadata>, PlexError>;

    /// Every episode of a show, across all seasons.
    async fn episodes(&self, show: &Metadata) -> Result<Vec<Metadata>, PlexError>;

    /// Direct children of a photo album: sub-albums, photos and clips.
    async fn album_children(&self, album: &Metadata) -> Result<Vec<Metadata>, PlexError>;

    /// Full metadata of a single item, including media, parts and markers.
    async fn item_details(&self, item: &Metadata) -> Result<Metadata, PlexError>;
}
