//! Episode matching module
//!
//! This module maps a media file to a catalog episode. Three strategies are
//! tried in a fixed order and the first one that finds an episode wins; the
//! signals of different strategies are never combined.
//!
//! 1. Checksum: an `[XXXXXXXX]` CRC32 token in the file name, compared against
//!    the known encode checksums of every episode.
//! 2. Hints: the host's season/episode numbers, season mapped to arc `part`.
//! 3. Path: the parent folder name containing an arc title, plus the episode
//!    number hint.

use crate::catalog::{Catalog, Episode, StoryArc};
use regex_lite::Regex;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::debug;

static CHECKSUM_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([0-9A-Fa-f]{8})\]").expect("checksum pattern is valid"));

/// A media file to identify, with whatever numbering the host parsed from it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileCandidate {
    pub path: PathBuf,
    pub season_hint: Option<u32>,
    pub episode_hint: Option<u32>,
}

impl FileCandidate {
    /// A candidate without any numbering hints
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            season_hint: None,
            episode_hint: None,
        }
    }

    pub fn with_hints(mut self, season: Option<u32>, episode: Option<u32>) -> Self {
        self.season_hint = season;
        self.episode_hint = episode;
        self
    }
}

/// Which strategy produced a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchTier {
    Checksum,
    Hint,
    Path,
}

impl fmt::Display for MatchTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Checksum => "checksum",
            Self::Hint => "hint",
            Self::Path => "path",
        })
    }
}

/// A matched episode, borrowed from the catalog it was found in
#[derive(Debug, Clone, Copy)]
pub struct EpisodeMatch<'a> {
    pub arc: &'a StoryArc,
    /// The episode key exactly as it appears in the catalog
    pub episode_key: &'a str,
    pub episode: &'a Episode,
    pub tier: MatchTier,
}

/// Matches a media file to an episode of `catalog`
///
/// The checksum strategy only runs when `prefer_checksum` is set. Returns
/// `None` when no strategy finds an episode.
///
/// # Examples
///
/// ```ignore
/// let candidate = FileCandidate::new("[One Pace][1-7] Romance Dawn 01 [1080p][D767799C].mkv");
/// let found = match_episode(&candidate, &catalog, true).unwrap();
/// assert_eq!(found.arc.part, 1);
/// ```
pub fn match_episode<'a>(
    candidate: &FileCandidate,
    catalog: &'a Catalog,
    prefer_checksum: bool,
) -> Option<EpisodeMatch<'a>> {
    let found = checksum_tier(candidate, catalog, prefer_checksum)
        .or_else(|| hint_tier(candidate, catalog))
        .or_else(|| path_tier(candidate, catalog));

    match &found {
        Some(found) => debug!(
            path = %candidate.path.display(),
            tier = %found.tier,
            part = found.arc.part,
            episode = found.episode_key,
            "Matched episode"
        ),
        None => debug!(path = %candidate.path.display(), "No episode match"),
    }

    found
}

/// Extracts the bracketed CRC32 token from a file name, uppercased
///
/// When several bracketed 8-digit hex tokens are present the last one is
/// taken, as release names put the checksum at the end.
pub fn extract_checksum(file_name: &str) -> Option<String> {
    CHECKSUM_TOKEN
        .captures_iter(file_name)
        .last()
        .map(|captures| captures[1].to_ascii_uppercase())
}

fn checksum_tier<'a>(
    candidate: &FileCandidate,
    catalog: &'a Catalog,
    prefer_checksum: bool,
) -> Option<EpisodeMatch<'a>> {
    if !prefer_checksum {
        return None;
    }

    let file_name = candidate.path.file_name()?.to_str()?;
    let checksum = extract_checksum(file_name)?;

    catalog.arcs.iter().find_map(|arc| {
        arc.episodes
            .iter()
            .find(|(_, episode)| episode.has_checksum(&checksum))
            .map(|(episode_key, episode)| EpisodeMatch {
                arc,
                episode_key,
                episode,
                tier: MatchTier::Checksum,
            })
    })
}

fn hint_tier<'a>(candidate: &FileCandidate, catalog: &'a Catalog) -> Option<EpisodeMatch<'a>> {
    let season = candidate.season_hint?;
    let number = candidate.episode_hint?;

    let arc = catalog.arc_by_part(season)?;
    episode_in_arc(arc, number, MatchTier::Hint)
}

fn path_tier<'a>(candidate: &FileCandidate, catalog: &'a Catalog) -> Option<EpisodeMatch<'a>> {
    let number = candidate.episode_hint?;
    let folder = parent_folder_name(&candidate.path)?.to_lowercase();

    let arc = catalog
        .arcs
        .iter()
        .find(|arc| !arc.title.is_empty() && folder.contains(&arc.title.to_lowercase()))?;
    episode_in_arc(arc, number, MatchTier::Path)
}

fn episode_in_arc(arc: &StoryArc, number: u32, tier: MatchTier) -> Option<EpisodeMatch<'_>> {
    arc.episodes
        .get_number(number)
        .map(|(episode_key, episode)| EpisodeMatch {
            arc,
            episode_key,
            episode,
            tier,
        })
}

fn parent_folder_name(path: &Path) -> Option<&str> {
    path.parent()?.file_name()?.to_str()
}
