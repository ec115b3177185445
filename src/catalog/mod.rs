//! Catalog data model
//!
//! In-memory representation of the remote catalog document: the show, its arcs
//! and the episodes inside each arc. The structures mirror the JSON document
//! field by field, so the same types are used for the network payload and for
//! the on-disk cache copy.
//!
//! A `Catalog` is never mutated after it has been parsed. Refreshing produces a
//! new value which replaces the old one behind an `Arc`.

mod episode_map;

pub use episode_map::EpisodeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Root snapshot of the remote dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    /// Human-readable time of the last catalog update
    #[serde(default, deserialize_with = "null_as_default")]
    pub last_update: String,
    /// Numeric time of the last update, the authoritative version marker
    pub last_update_ts: u64,
    /// Prefix for resolving relative resource paths such as posters
    pub base_url: String,
    /// Show-level attributes
    #[serde(rename = "tvshow")]
    pub show: Series,
    /// Arcs in source order
    pub arcs: Vec<StoryArc>,
}

impl Catalog {
    /// Returns the first arc whose `part` equals the given number
    pub fn arc_by_part(&self, part: u32) -> Option<&StoryArc> {
        self.arcs.iter().find(|arc| arc.part == part)
    }

    /// Returns the first arc whose title equals `title`, ignoring case
    pub fn arc_by_title(&self, title: &str) -> Option<&StoryArc> {
        let wanted = title.to_lowercase();
        self.arcs
            .iter()
            .find(|arc| arc.title.to_lowercase() == wanted)
    }

    /// Total number of episodes across all arcs
    pub fn episode_count(&self) -> usize {
        self.arcs.iter().map(|arc| arc.episodes.len()).sum()
    }
}

/// Show-level attributes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Series {
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default, rename = "originaltitle", deserialize_with = "null_as_default")]
    pub original_title: String,
    #[serde(default, rename = "sorttitle", deserialize_with = "null_as_default")]
    pub sort_title: String,
    #[serde(default, rename = "genre", deserialize_with = "null_as_default")]
    pub genres: Vec<String>,
    /// Premiere date as given by the source, usually `YYYY-MM-DD`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub premiered: Option<String>,
    #[serde(
        default,
        rename = "releasedate",
        skip_serializing_if = "Option::is_none"
    )]
    pub release_date: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_year",
        skip_serializing_if = "Option::is_none"
    )]
    pub year: Option<u32>,
    #[serde(default)]
    pub status: SeriesStatus,
    #[serde(default, deserialize_with = "null_as_default")]
    pub plot: String,
    #[serde(
        default,
        rename = "customrating",
        skip_serializing_if = "Option::is_none"
    )]
    pub content_rating: Option<String>,
}

impl Series {
    /// Parses the premiere date
    ///
    /// Returns `None` when the field is missing or not a valid `YYYY-MM-DD`
    /// date.
    pub fn premiere_date(&self) -> Option<NaiveDate> {
        self.premiered
            .as_deref()
            .and_then(|raw| NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok())
    }
}

/// Airing status of the show
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SeriesStatus {
    Continuing,
    Ended,
    #[default]
    Unknown,
}

impl SeriesStatus {
    /// Interprets a free-form status string, ignoring case
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "continuing" | "ongoing" | "airing" => Self::Continuing,
            "ended" | "completed" | "finished" => Self::Ended,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Continuing => "Continuing",
            Self::Ended => "Ended",
            Self::Unknown => "Unknown",
        }
    }
}

impl Serialize for SeriesStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for SeriesStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map(Self::parse).unwrap_or_default())
    }
}

/// One season-equivalent unit of the show
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoryArc {
    /// Canonical season/ordering number
    pub part: u32,
    pub title: String,
    #[serde(default, rename = "originaltitle", deserialize_with = "null_as_default")]
    pub original_title: String,
    /// Grouping label, display only
    #[serde(default, deserialize_with = "null_as_default")]
    pub saga: String,
    /// Plot text, shared by every episode of the arc
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    /// Poster path relative to the catalog's `base_url`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poster: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub episodes: EpisodeMap,
}

/// One episode-equivalent unit inside an arc
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    /// Duration in `MM:SS` form
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crc32: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crc32_extended: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tid: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tid_extended: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length_extended: Option<String>,
}

impl Episode {
    /// Runtime in fractional minutes, if `length` is a valid `MM:SS` string
    pub fn runtime_minutes(&self) -> Option<f64> {
        self.length.as_deref().and_then(parse_length)
    }

    /// Returns true if `checksum` equals either known encode checksum
    pub fn has_checksum(&self, checksum: &str) -> bool {
        [self.crc32.as_deref(), self.crc32_extended.as_deref()]
            .into_iter()
            .flatten()
            .map(str::trim)
            .any(|known| !known.is_empty() && known.eq_ignore_ascii_case(checksum))
    }
}

/// Converts an `MM:SS` length string into fractional minutes
///
/// `"24:30"` becomes `24.5`. Anything that is not exactly two numeric,
/// colon-separated parts yields `None`.
pub fn parse_length(raw: &str) -> Option<f64> {
    let mut parts = raw.trim().split(':');
    let minutes: u32 = parts.next()?.trim().parse().ok()?;
    let seconds: u32 = parts.next()?.trim().parse().ok()?;
    if parts.next().is_some() {
        return None;
    }

    Some(f64::from(minutes) + f64::from(seconds) / 60.0)
}

/// Treats an explicit `null` like a missing key
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de> + Default,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accepts the year as a JSON number or a numeric string
fn deserialize_year<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawYear {
        Number(u32),
        Text(String),
    }

    Ok(match Option::<RawYear>::deserialize(deserializer)? {
        Some(RawYear::Number(year)) => Some(year),
        Some(RawYear::Text(text)) => text.trim().parse().ok(),
        None => None,
    })
}
