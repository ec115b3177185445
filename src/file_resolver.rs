//! File resolver module for locating video files
//!
//! This module scans directories for video files, detected by content rather
//! than extension, and guesses season/episode numbers from file names the way
//! a media library would before handing them to the episode matcher.

use crate::episode_matcher::FileCandidate;
use regex_lite::Regex;
use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;

static SEASON_EPISODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[Ss](\d{1,3})[ ._-]?[Ee](\d{1,4})").expect("season/episode pattern is valid")
});

/// A trailing episode number: "Romance Dawn 01 [1080p].mkv", "02.mkv"
static TRAILING_EPISODE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:^|[\s_\-.\]])(\d{1,4})(?:v\d)?\s*(?:[\[(].*)?$")
        .expect("episode pattern is valid")
});

/// Errors that can occur during file resolution
#[derive(Debug, Error)]
pub enum FileResolverError {
    /// Path is not a directory
    #[error("Path is not a directory: {0}")]
    NotADirectory(PathBuf),

    /// Failed to read directory
    #[error("Failed to read directory {path}: {source}")]
    ReadDirectoryFailed { path: PathBuf, source: io::Error },

    /// Failed to read directory entry
    #[error("Failed to read directory entry: {0}")]
    ReadEntryFailed(#[from] io::Error),
}

/// Represents a detected video file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFile {
    /// Path to the video file
    pub path: PathBuf,
}

impl VideoFile {
    /// Builds a match candidate with hints guessed from the file name
    pub fn to_candidate(&self) -> FileCandidate {
        let (season, episode) = guess_hints(&self.path);
        FileCandidate::new(&self.path).with_hints(season, episode)
    }
}

/// Scans a directory recursively to find all video files
///
/// Files are recognized by content (magic bytes), not by extension.
///
/// # Arguments
///
/// * `dir_path` - The directory path to scan
///
/// # Returns
///
/// A Result containing the video files sorted by path, or an error if the
/// path is not a directory or cannot be read
pub fn scan_for_videos(dir_path: &Path) -> Result<Vec<VideoFile>, FileResolverError> {
    let mut video_files = Vec::new();
    scan_directory_recursive(dir_path, &mut video_files)?;
    video_files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(video_files)
}

/// Recursively scans a directory and collects video files
fn scan_directory_recursive(
    dir_path: &Path,
    video_files: &mut Vec<VideoFile>,
) -> Result<(), FileResolverError> {
    if !dir_path.is_dir() {
        return Err(FileResolverError::NotADirectory(dir_path.to_path_buf()));
    }

    for entry in fs::read_dir(dir_path).map_err(|e| FileResolverError::ReadDirectoryFailed {
        path: dir_path.to_path_buf(),
        source: e,
    })? {
        let entry = entry?;
        let path = entry.path();

        if path.is_dir() {
            scan_directory_recursive(&path, video_files)?;
        } else if path.is_file() && is_video_file(&path) {
            video_files.push(VideoFile { path });
        }
    }

    Ok(())
}

/// Analyzes a file to determine if it's a video file
///
/// Only reads the first 8KB of the file.
fn is_video_file(file_path: &Path) -> bool {
    const BUFFER_SIZE: usize = 8192;

    let mut file = match File::open(file_path) {
        Ok(f) => f,
        Err(_) => return false,
    };

    let mut buffer = vec![0u8; BUFFER_SIZE];
    let bytes_read = match file.read(&mut buffer) {
        Ok(n) => n,
        Err(_) => return false,
    };
    buffer.truncate(bytes_read);

    infer::is_video(&buffer)
}

/// Guesses (season, episode) numbers from a file name
///
/// # Arguments
///
/// * `path` - Path of the media file; only the file stem is inspected
///
/// `SxxEyy` yields both numbers. Otherwise a number at the end of the name,
/// before any bracketed tags, is taken as the episode number.
pub fn guess_hints(path: &Path) -> (Option<u32>, Option<u32>) {
    let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) else {
        return (None, None);
    };

    if let Some(captures) = SEASON_EPISODE.captures(stem) {
        return (captures[1].parse().ok(), captures[2].parse().ok());
    }

    let without_tags = strip_trailing_tags(stem);
    let episode = TRAILING_EPISODE
        .captures(without_tags)
        .and_then(|captures| captures[1].parse().ok());

    (None, episode)
}

/// Drops trailing `[...]` and `(...)` groups such as `[1080p][D767799C]`
fn strip_trailing_tags(stem: &str) -> &str {
    let mut rest = stem.trim_end();
    loop {
        let open = match rest.chars().last() {
            Some(']') => rest.rfind('['),
            Some(')') => rest.rfind('('),
            _ => None,
        };
        let Some(open) = open else {
            return rest;
        };
        rest = rest[..open].trim_end();
    }
}
