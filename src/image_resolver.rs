//! Poster URL resolution for arcs
//!
//! Posters come from the catalog's own `poster` field, resolved against the
//! catalog's `base_url`. Downloading the image is left to the caller.

use crate::catalog::{Catalog, StoryArc};

/// How the host identifies the season it wants a poster for
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeasonHint<'a> {
    /// Season number, compared with the arc `part`
    pub index: Option<u32>,
    /// Season name, compared with the arc title ignoring case
    pub name: Option<&'a str>,
}

impl<'a> SeasonHint<'a> {
    pub fn index(index: u32) -> Self {
        Self {
            index: Some(index),
            name: None,
        }
    }

    pub fn name(name: &'a str) -> Self {
        Self {
            index: None,
            name: Some(name),
        }
    }
}

/// Resolves the absolute poster URL for the arc the hint points at
///
/// The index takes precedence; the name is only consulted when no index is
/// given. Returns `None` if no arc matches or the arc has no poster.
pub fn resolve_arc_poster(hint: SeasonHint<'_>, catalog: &Catalog) -> Option<String> {
    let arc = find_arc(hint, catalog)?;
    poster_url(catalog, arc)
}

fn find_arc<'c>(hint: SeasonHint<'_>, catalog: &'c Catalog) -> Option<&'c StoryArc> {
    match (hint.index, hint.name) {
        (Some(index), _) => catalog.arc_by_part(index),
        (None, Some(name)) => catalog.arc_by_title(name.trim()),
        (None, None) => None,
    }
}

/// Joins the catalog base URL and the arc's poster path
pub fn poster_url(catalog: &Catalog, arc: &StoryArc) -> Option<String> {
    let poster = arc.poster.as_deref().map(str::trim).filter(|p| !p.is_empty())?;

    if poster.starts_with("http://") || poster.starts_with("https://") {
        return Some(poster.to_string());
    }

    Some(format!(
        "{}/{}",
        catalog.base_url.trim_end_matches('/'),
        poster.trim_start_matches('/')
    ))
}
