//! Audiobook domain model.
//!
//! A [`JobSubmission`] is what the upload layer hands over: uploaded files and
//! per-chapter metadata as two parallel lists. Pairing and validating them
//! yields an [`AudiobookRequest`], whose chapters carry a contiguous
//! `sequence_index` that fixes their order for the rest of the pipeline.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Content type advertised for produced containers.
pub const M4B_CONTENT_TYPE: &str = "audio/mp4a-latm";

/// Genre written into every produced audiobook.
pub const AUDIOBOOK_GENRE: &str = "Audiobook";

/// One chapter's audio file plus its display data.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterSource {
    /// Path of the (read-only) audio file.
    pub source_path: PathBuf,
    /// Chapter title written into the chapter timeline.
    pub title: String,
    /// File name as supplied by the client, used in error messages.
    pub original_name: String,
    /// Submission order; the sole ordering key.
    pub sequence_index: usize,
}

/// A validated request to assemble one audiobook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudiobookRequest {
    pub book_title: String,
    pub author: String,
    pub cover_art_path: Option<PathBuf>,
    pub chapters: Vec<ChapterSource>,
}

impl AudiobookRequest {
    /// Check the structural invariants: required fields present, at least one
    /// chapter, and `sequence_index` values contiguous from 0 in vector order.
    pub fn validate(&self) -> Result<()> {
        if self.book_title.trim().is_empty() {
            return Err(Error::validation("Book title is required."));
        }
        if self.author.trim().is_empty() {
            return Err(Error::validation("Author is required."));
        }
        if self.chapters.is_empty() {
            return Err(Error::validation("At least one audio chapter is required."));
        }
        for (position, chapter) in self.chapters.iter().enumerate() {
            if chapter.sequence_index != position {
                return Err(Error::validation(format!(
                    "chapter '{}' has sequence index {} but sits at position {position}",
                    chapter.original_name, chapter.sequence_index
                )));
            }
            if chapter.title.trim().is_empty() {
                return Err(Error::validation(format!(
                    "Chapter title is required for chapter {}.",
                    position + 1
                )));
            }
        }
        Ok(())
    }

    /// Pair uploaded files with their metadata entries and validate the result.
    pub fn from_submission(submission: JobSubmission) -> Result<Self> {
        let JobSubmission {
            book_title,
            author,
            cover_art_path,
            files,
            chapter_metadata,
        } = submission;

        if book_title.trim().is_empty() || author.trim().is_empty() {
            return Err(Error::validation(
                "Missing required fields: bookTitle, author, or chapterMetadataJson",
            ));
        }
        if files.is_empty() {
            return Err(Error::validation(
                "No chapter files uploaded or files are invalid.",
            ));
        }
        if files.len() != chapter_metadata.len() {
            return Err(Error::validation(format!(
                "Mismatch between number of chapter files ({}) and chapter metadata entries ({}).",
                files.len(),
                chapter_metadata.len()
            )));
        }

        let chapters = files
            .into_iter()
            .zip(chapter_metadata)
            .enumerate()
            .map(|(i, (file, meta))| {
                let title = if meta.title.trim().is_empty() {
                    format!("Chapter {}", i + 1)
                } else {
                    meta.title
                };
                let original_name = file
                    .original_name
                    .filter(|n| !n.is_empty())
                    .or_else(|| Some(meta.original_name).filter(|n| !n.is_empty()))
                    .unwrap_or_else(|| format!("UnknownFile_{}", i + 1));
                ChapterSource {
                    source_path: file.path,
                    title,
                    original_name,
                    sequence_index: i,
                }
            })
            .collect();

        let request = Self {
            book_title,
            author,
            cover_art_path,
            chapters,
        };
        request.validate()?;
        Ok(request)
    }
}

/// A chapter file as persisted by the upload layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedChapter {
    pub path: PathBuf,
    pub original_name: Option<String>,
}

/// Per-chapter metadata entry as sent by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterMetadata {
    #[serde(default)]
    pub original_name: String,
    #[serde(default)]
    pub title: String,
}

/// Raw, not-yet-paired job input delivered by the upload layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobSubmission {
    pub book_title: String,
    pub author: String,
    pub cover_art_path: Option<PathBuf>,
    pub files: Vec<UploadedChapter>,
    pub chapter_metadata: Vec<ChapterMetadata>,
}

/// Start/end of one chapter inside the assembled container, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterTimestamp {
    pub start_ms: u64,
    pub end_ms: u64,
    pub title: String,
}

impl ChapterTimestamp {
    pub fn duration_ms(&self) -> u64 {
        self.end_ms - self.start_ms
    }
}

/// Longest stem kept in an output file name, in bytes. Leaves room for the
/// suffix under the common 255-byte file name limit.
pub const MAX_STEM_BYTES: usize = 200;

/// Derive the download file name for a book title.
///
/// Runs of whitespace and colons become a single `_`, characters that are not
/// safe in a file name are replaced, and `_Audiobook.m4b` is appended. The
/// stem is cut to [`MAX_STEM_BYTES`] on a char boundary.
pub fn output_file_name(book_title: &str) -> String {
    let mut stem = String::with_capacity(book_title.len());
    let mut in_separator_run = false;

    for c in book_title.trim().chars() {
        if c.is_whitespace() || c == ':' {
            if !in_separator_run {
                stem.push('_');
                in_separator_run = true;
            }
            continue;
        }
        in_separator_run = false;
        match c {
            '/' | '\\' | '<' | '>' | '"' | '|' | '?' | '*' => stem.push('-'),
            c if c.is_control() => {}
            c => stem.push(c),
        }
    }

    let mut cut = stem.len().min(MAX_STEM_BYTES);
    while !stem.is_char_boundary(cut) {
        cut -= 1;
    }
    let stem = stem[..cut].trim_matches('.');
    if stem.is_empty() {
        "Audiobook.m4b".to_string()
    } else {
        format!("{stem}_Audiobook.m4b")
    }
}
