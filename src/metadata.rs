//! Host-facing metadata records
//!
//! The catalog is shaped after the remote document. These records are what a
//! media library wants per item: a series, a season (arc) or an episode, with
//! the catalog's fields mapped to their library meaning.

use crate::catalog::{Catalog, SeriesStatus, StoryArc};
use crate::episode_matcher::{EpisodeMatch, MatchTier};
use chrono::{Datelike, NaiveDate};
use serde::Serialize;

/// Series-level metadata
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesMetadata {
    pub title: String,
    pub original_title: String,
    pub sort_title: String,
    pub genres: Vec<String>,
    pub premiere_date: Option<NaiveDate>,
    pub production_year: Option<u32>,
    pub status: SeriesStatus,
    pub overview: String,
    pub official_rating: Option<String>,
}

impl SeriesMetadata {
    pub fn from_catalog(catalog: &Catalog) -> Self {
        let show = &catalog.show;
        let premiere_date = show.premiere_date();

        Self {
            title: show.title.clone(),
            original_title: show.original_title.clone(),
            sort_title: show.sort_title.clone(),
            genres: show.genres.clone(),
            premiere_date,
            production_year: premiere_date
                .and_then(|date| u32::try_from(date.year()).ok())
                .or(show.year),
            status: show.status,
            overview: show.plot.clone(),
            official_rating: show.content_rating.clone(),
        }
    }
}

/// Season-level metadata for one arc
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeasonMetadata {
    pub index: u32,
    pub name: String,
    pub saga: String,
    pub overview: String,
}

impl SeasonMetadata {
    pub fn from_arc(arc: &StoryArc) -> Self {
        Self {
            index: arc.part,
            name: arc.title.clone(),
            saga: arc.saga.clone(),
            overview: arc.description.clone(),
        }
    }
}

/// Episode-level metadata for a matched file
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EpisodeMetadata {
    pub title: String,
    pub season_index: u32,
    /// Numeric value of the episode key, when the key is a number
    pub episode_index: Option<u32>,
    pub episode_key: String,
    /// Episodes have no own plot, the arc description is used
    pub overview: String,
    pub runtime_minutes: Option<f64>,
    pub crc32: Option<String>,
    pub crc32_extended: Option<String>,
    pub matched_by: MatchTier,
}

impl EpisodeMetadata {
    pub fn from_match(found: &EpisodeMatch<'_>) -> Self {
        Self {
            title: format!("{} {}", found.arc.title, found.episode_key),
            season_index: found.arc.part,
            episode_index: found.episode_key.trim().parse().ok(),
            episode_key: found.episode_key.to_string(),
            overview: found.arc.description.clone(),
            runtime_minutes: found.episode.runtime_minutes(),
            crc32: found.episode.crc32.clone(),
            crc32_extended: found.episode.crc32_extended.clone(),
            matched_by: found.tier,
        }
    }
}
