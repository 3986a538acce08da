//! Chapter timeline and ffmetadata document construction.
//!
//! Chapters are laid end to end: each one starts where the previous one ended
//! and the first starts at zero. The resulting spans and the book tags are
//! rendered as an `FFMETADATA1` document that the engine reads as an input.

use std::fmt::Write as _;

use bf_core::{AudiobookRequest, ChapterSource, ChapterTimestamp, Error, Result, AUDIOBOOK_GENRE};

/// File name of the metadata document inside a job's working directory.
pub const METADATA_FILE_NAME: &str = "ffmpeg_metadata.txt";

/// Computed chapter spans plus the serialized metadata document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Timeline {
    pub timestamps: Vec<ChapterTimestamp>,
    pub document: String,
}

impl Timeline {
    /// Total length of the book in milliseconds.
    pub fn total_ms(&self) -> u64 {
        self.timestamps.last().map_or(0, |t| t.end_ms)
    }
}

/// Lay chapters end to end.
///
/// # Errors
///
/// [`Error::Internal`] if `durations_ms` does not have one entry per chapter.
pub fn compute_timestamps(
    chapters: &[ChapterSource],
    durations_ms: &[u64],
) -> Result<Vec<ChapterTimestamp>> {
    if chapters.len() != durations_ms.len() {
        return Err(Error::Internal(format!(
            "timeline needs one duration per chapter ({} chapters, {} durations)",
            chapters.len(),
            durations_ms.len()
        )));
    }

    let mut cursor = 0u64;
    Ok(chapters
        .iter()
        .zip(durations_ms)
        .map(|(chapter, &duration)| {
            let start_ms = cursor;
            cursor += duration;
            ChapterTimestamp {
                start_ms,
                end_ms: cursor,
                title: chapter.title.clone(),
            }
        })
        .collect())
}

/// Render the `FFMETADATA1` document.
pub fn render_metadata(
    book_title: &str,
    author: &str,
    year: i32,
    timestamps: &[ChapterTimestamp],
) -> String {
    let mut doc = String::from(";FFMETADATA1\n");
    let title = escape_value(book_title);
    // Writing to a String cannot fail.
    let _ = writeln!(doc, "title={title}");
    let _ = writeln!(doc, "artist={}", escape_value(author));
    let _ = writeln!(doc, "album={title}");
    let _ = writeln!(doc, "genre={AUDIOBOOK_GENRE}");
    let _ = writeln!(doc, "date={year}");
    doc.push('\n');

    for ts in timestamps {
        doc.push_str("[CHAPTER]\nTIMEBASE=1/1000\n");
        let _ = writeln!(doc, "START={}", ts.start_ms);
        let _ = writeln!(doc, "END={}", ts.end_ms);
        let _ = writeln!(doc, "title={}", escape_value(&ts.title));
        doc.push('\n');
    }
    doc
}

/// Build the timeline for a validated request.
pub fn build_timeline(
    request: &AudiobookRequest,
    durations_ms: &[u64],
    year: i32,
) -> Result<Timeline> {
    let timestamps = compute_timestamps(&request.chapters, durations_ms)?;
    let document = render_metadata(&request.book_title, &request.author, year, &timestamps);
    Ok(Timeline {
        timestamps,
        document,
    })
}

/// Escape the characters ffmetadata treats as special.
fn escape_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '=' | ';' | '#' | '\\' | '\n') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
