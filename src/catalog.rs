//! File-backed music catalog.
//!
//! The catalog file is a JSON array of [`CatalogTrack`] records:
//!
//! ```json
//! [
//!   {
//!     "id": "3AJwUDP919kvQ9QcozQPxg",
//!     "name": "Yellow (Remastered)",
//!     "artists": ["Coldplay"],
//!     "genres": ["rock", "pop"],
//!     "popularity": 84,
//!     "preview_url": "https://p.scdn.co/mp3-preview/..."
//!   }
//! ]
//! ```

use anyhow::{Context, Result};
use std::path::Path;

use crate::models::{CatalogTrack, Track};
use crate::selection::CatalogQuery;
use crate::services::{Catalog, ServiceError};

#[derive(Debug, Clone, Default)]
pub struct JsonCatalog {
    tracks: Vec<CatalogTrack>,
}

impl JsonCatalog {
    pub fn new(tracks: Vec<CatalogTrack>) -> Self {
        JsonCatalog { tracks }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let tracks: Vec<CatalogTrack> =
            serde_json::from_str(json).context("Failed to parse catalog JSON")?;
        Ok(Self::new(tracks))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog {:?}", path))?;
        Self::from_json(&json).with_context(|| format!("Invalid catalog {:?}", path))
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }
}

fn matches_genres(track: &CatalogTrack, genres: &[String]) -> bool {
    genres.is_empty()
        || track
            .genres
            .iter()
            .any(|g| genres.iter().any(|wanted| g.eq_ignore_ascii_case(wanted)))
}

impl Catalog for JsonCatalog {
    /// Tracks matching the genre seeds with popularity at or above the floor,
    /// in file order, truncated to the result limit. Preview URLs are not
    /// checked here; selection filters unplayable tracks.
    fn search(&self, query: &CatalogQuery, access_token: &str) -> Result<Vec<Track>, ServiceError> {
        if access_token.trim().is_empty() {
            return Err(ServiceError::NotSignedIn);
        }

        let tracks: Vec<Track> = self
            .tracks
            .iter()
            .filter(|t| t.popularity >= query.minimum_popularity)
            .filter(|t| matches_genres(t, &query.genres))
            .take(query.result_limit)
            .cloned()
            .map(Track::from)
            .collect();

        tracing::debug!(
            genres = ?query.genres,
            floor = query.minimum_popularity,
            returned = tracks.len(),
            "catalog search"
        );
        Ok(tracks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Difficulty;
    use std::io::Write;

    const CATALOG: &str = r#"[
        {"id": "1", "name": "Yellow", "artists": ["Coldplay"], "genres": ["rock"], "popularity": 84, "preview_url": "https://p/1.mp3"},
        {"id": "2", "name": "Obscure", "artists": ["Nobody"], "genres": ["rock"], "popularity": 35, "preview_url": "https://p/2.mp3"},
        {"id": "3", "name": "Hit", "artists": ["Star"], "genres": ["pop"], "popularity": 90},
        {"id": "4", "name": "Deep Cut", "artists": ["Band"], "genres": ["Rock"], "popularity": 55, "preview_url": "https://p/4.mp3"}
    ]"#;

    fn ids(tracks: &[Track]) -> Vec<&str> {
        tracks.iter().map(|t| t.id.as_str()).collect()
    }

    #[test]
    fn test_search_filters_by_floor_and_genre() {
        let catalog = JsonCatalog::from_json(CATALOG).unwrap();
        let easy = CatalogQuery::new(Some("rock"), Difficulty::Easy, 20);
        assert_eq!(ids(&catalog.search(&easy, "t").unwrap()), vec!["1"]);

        let medium = CatalogQuery::new(Some("Rock"), Difficulty::Medium, 20);
        assert_eq!(ids(&catalog.search(&medium, "t").unwrap()), vec!["1", "4"]);

        let hard = CatalogQuery::new(Some("rock"), Difficulty::Hard, 20);
        assert_eq!(ids(&catalog.search(&hard, "t").unwrap()), vec!["1", "2", "4"]);
    }

    #[test]
    fn test_search_mixed_and_limit() {
        let catalog = JsonCatalog::from_json(CATALOG).unwrap();
        let mixed = CatalogQuery::new(None, Difficulty::Hard, 2);
        assert_eq!(ids(&catalog.search(&mixed, "t").unwrap()), vec!["1", "2"]);
    }

    #[test]
    fn test_search_keeps_unplayable_tracks() {
        let catalog = JsonCatalog::from_json(CATALOG).unwrap();
        let pop = CatalogQuery::new(Some("pop"), Difficulty::Easy, 20);
        let tracks = catalog.search(&pop, "t").unwrap();
        assert_eq!(ids(&tracks), vec!["3"]);
        assert!(!tracks[0].is_playable());
    }

    #[test]
    fn test_search_requires_token() {
        let catalog = JsonCatalog::from_json(CATALOG).unwrap();
        let q = CatalogQuery::new(None, Difficulty::Easy, 20);
        assert_eq!(catalog.search(&q, " "), Err(ServiceError::NotSignedIn));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(CATALOG.as_bytes()).unwrap();
        let catalog = JsonCatalog::load(file.path()).unwrap();
        assert_eq!(catalog.len(), 4);
    }

    #[test]
    fn test_sample_catalog_parses() {
        let catalog = JsonCatalog::from_json(include_str!("../data/sample_catalog.json")).unwrap();
        assert!(!catalog.is_empty());
        let jazz = CatalogQuery::new(Some("jazz"), Difficulty::Hard, 20);
        assert_eq!(catalog.search(&jazz, "t").unwrap().len(), 2);
    }

    #[test]
    fn test_load_invalid_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"{not json").unwrap();
        let err = JsonCatalog::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("Invalid catalog"));
    }
}
