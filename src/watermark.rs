//! Per-serie page marks: the chapters already seen and reported.

use crate::chapter::{Chapter, ChapterRecord};
use chrono::{DateTime, NaiveDateTime, Utc};
use eyre::{ensure, Result, WrapErr};
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};
use tracing::warn;

/// Date format used in stored documents.
const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Serie ID on MangaUpdates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SerieID(String);

impl fmt::Display for SerieID {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SerieID {
    fn from(value: &str) -> Self {
        Self(value.trim().to_owned())
    }
}

impl FromStr for SerieID {
    type Err = eyre::Report;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let value = value.trim();
        ensure!(!value.is_empty(), "empty serie ID");
        Ok(Self(value.to_owned()))
    }
}

// -----------------------------------------------------------------------------

/// Everything recorded about a watched serie.
///
/// The chapter marks are the watermark used to detect novelty; they are kept
/// sorted newest first.
#[derive(Debug, Clone)]
pub struct PageMark {
    /// Serie ID.
    serie_id: SerieID,
    /// Display name of the serie.
    serie_name: Option<String>,
    /// When the marks were last extended.
    latest_update: Option<DateTime<Utc>>,
    /// Chapters already reported, newest first.
    chapter_marks: Vec<Chapter>,
}

impl PageMark {
    /// Registers a fresh page mark with no chapters seen yet.
    pub fn new(serie_id: SerieID, serie_name: Option<String>) -> Self {
        Self {
            serie_id,
            serie_name,
            latest_update: None,
            chapter_marks: Vec::new(),
        }
    }

    /// Returns the serie ID.
    pub fn serie_id(&self) -> &SerieID {
        &self.serie_id
    }

    /// Returns the serie name, falling back on the ID.
    pub fn display_name(&self) -> &str {
        self.serie_name.as_deref().unwrap_or(&self.serie_id.0)
    }

    /// Returns the serie name.
    pub fn serie_name(&self) -> Option<&str> {
        self.serie_name.as_deref()
    }

    /// Overrides the serie name.
    pub fn set_serie_name(&mut self, name: String) {
        self.serie_name = Some(name);
    }

    /// Returns the last time marks were added.
    pub fn latest_update(&self) -> Option<DateTime<Utc>> {
        self.latest_update
    }

    /// Returns the recorded chapters, newest first.
    pub fn chapter_marks(&self) -> &[Chapter] {
        &self.chapter_marks
    }

    /// Records freshly reported chapters and bumps the update timestamp.
    pub fn extend(&mut self, chapters: impl IntoIterator<Item = Chapter>) {
        self.chapter_marks.extend(chapters);
        self.chapter_marks.sort_by(|a, b| b.cmp_by_value(a));
        self.latest_update = Some(Utc::now());
    }

    /// Converts to the on-disk document.
    pub fn to_record(&self) -> PageMarkRecord {
        PageMarkRecord {
            serie_id: self.serie_id.0.clone(),
            serie_name: self.serie_name.clone(),
            latest_update: self
                .latest_update
                .map(|date| date.format(DATE_FORMAT).to_string()),
            chapter_marks: self
                .chapter_marks
                .iter()
                .map(|chapter| {
                    serde_json::to_value(chapter.to_record())
                        .expect("serializable chapter record")
                })
                .collect(),
        }
    }

    /// Rebuilds a page mark from a stored document.
    ///
    /// Degrades gracefully on corruption: every defect (missing name, bad
    /// date, malformed chapter mark) is logged with the raw offending value
    /// and the loadable remainder is kept. A mark whose label nothing can
    /// interpret is kept too: the label still identifies the chapter, only
    /// its sort position is degraded.
    pub fn from_record(record: PageMarkRecord) -> Self {
        let serie_id = SerieID(record.serie_id);

        if record.serie_name.is_none() {
            warn!(%serie_id, "corrupted page mark: serie_name is missing");
        }

        let latest_update = record.latest_update.as_deref().and_then(|raw| {
            match NaiveDateTime::parse_from_str(raw, DATE_FORMAT) {
                Ok(naive) => Some(naive.and_utc()),
                Err(err) => {
                    warn!(
                        %serie_id,
                        raw,
                        %err,
                        "corrupted page mark: unreadable latest_update",
                    );
                    None
                },
            }
        });

        let mut chapter_marks = Vec::with_capacity(record.chapter_marks.len());
        for (position, value) in record.chapter_marks.iter().enumerate() {
            let chapter = match ChapterRecord::from_json(value) {
                Ok(chapter_record) => Chapter::from(chapter_record),
                Err(err) => {
                    warn!(%serie_id, position, "skipping mark: {err}");
                    continue;
                },
            };
            if !chapter.is_valid() {
                // Dropping it would re-report the same release every cycle.
                warn!(
                    %serie_id,
                    position,
                    %chapter,
                    "keeping mark with an uninterpretable label",
                );
            }
            chapter_marks.push(chapter);
        }
        chapter_marks.sort_by(|a, b| b.cmp_by_value(a));

        Self {
            serie_id,
            serie_name: record.serie_name,
            latest_update,
            chapter_marks,
        }
    }
}

impl fmt::Display for PageMark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}): {} chapter marks",
            self.display_name(),
            self.serie_id,
            self.chapter_marks.len()
        )
    }
}

// -----------------------------------------------------------------------------

/// On-disk document for a watched serie.
///
/// `serie_id` is the only hard requirement; everything else is recovered
/// best-effort. Chapter marks stay raw JSON here so one malformed mark can
/// be skipped without losing the whole document.
#[derive(Debug, Serialize, Deserialize)]
pub struct PageMarkRecord {
    serie_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    serie_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    latest_update: Option<String>,
    #[serde(default)]
    chapter_marks: Vec<serde_json::Value>,
}

impl PageMarkRecord {
    /// Parses a stored JSON document.
    ///
    /// A document without a `serie_id` is corrupt beyond recovery and is
    /// reported as a hard error.
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).context("parse page mark document")
    }
}
