//! File-backed store of page marks, one JSON document per serie.

use crate::{fs, watermark::PageMarkRecord, PageMark, SerieID};
use eyre::{Result, WrapErr};
use std::{
    fs as stdfs,
    path::{Path, PathBuf},
};
use tracing::error;

/// The page mark store.
///
/// Documents are written atomically, so a crash mid-cycle never leaves a
/// half-written watermark behind.
pub struct PageMarkStore {
    /// Directory holding the documents.
    root: PathBuf,
}

impl PageMarkStore {
    /// Opens the store, creating the directory if necessary.
    pub fn open(root: &Path) -> Result<Self> {
        fs::mkdir_p(root).context("create store directory")?;

        Ok(Self {
            root: root.to_owned(),
        })
    }

    /// Loads one page mark, `None` if the serie is not watched.
    pub fn get(&self, serie_id: &SerieID) -> Result<Option<PageMark>> {
        let path = self.document_path(serie_id);
        if !path.is_file() {
            return Ok(None);
        }

        let raw = stdfs::read_to_string(&path)
            .with_context(|| format!("read {}", path.display()))?;
        let record = PageMarkRecord::from_json(&raw)
            .with_context(|| format!("load {}", path.display()))?;

        Ok(Some(PageMark::from_record(record)))
    }

    /// Loads every page mark, sorted by serie ID.
    ///
    /// A document corrupt beyond recovery is skipped with a loud diagnostic
    /// rather than aborting the whole run.
    pub fn get_all(&self) -> Result<Vec<PageMark>> {
        let mut page_marks = Vec::new();

        for entry in stdfs::read_dir(&self.root)
            .with_context(|| format!("read store {}", self.root.display()))?
        {
            let path = entry.context("read store entry")?.path();
            if path.extension() != Some("json".as_ref()) {
                continue;
            }
            let raw = stdfs::read_to_string(&path)
                .with_context(|| format!("read {}", path.display()))?;
            match PageMarkRecord::from_json(&raw) {
                Ok(record) => page_marks.push(PageMark::from_record(record)),
                Err(err) => {
                    error!(
                        path = %path.display(),
                        "skipping corrupted page mark document: {err}",
                    );
                },
            }
        }
        page_marks.sort_by(|a, b| a.serie_id().cmp(b.serie_id()));

        Ok(page_marks)
    }

    /// Stores one page mark.
    pub fn put(&self, page_mark: &PageMark) -> Result<()> {
        let json = serde_json::to_vec_pretty(&page_mark.to_record())
            .context("serialize page mark")?;

        fs::atomic_write(&self.document_path(page_mark.serie_id()), &json)
            .with_context(|| format!("store {}", page_mark.serie_id()))
    }

    /// Stores a batch of page marks.
    pub fn batch_put<'a>(
        &self,
        page_marks: impl IntoIterator<Item = &'a PageMark>,
    ) -> Result<()> {
        for page_mark in page_marks {
            self.put(page_mark)?;
        }

        Ok(())
    }

    /// Removes a serie from the store.
    ///
    /// Returns whether a document was actually deleted.
    pub fn delete(&self, serie_id: &SerieID) -> Result<bool> {
        let path = self.document_path(serie_id);
        if !path.is_file() {
            return Ok(false);
        }

        stdfs::remove_file(&path)
            .with_context(|| format!("delete {}", path.display()))?;

        Ok(true)
    }

    fn document_path(&self, serie_id: &SerieID) -> PathBuf {
        [
            self.root.as_path(),
            fs::document_name(&serie_id.to_string()).as_path(),
        ]
        .iter()
        .collect()
    }
}
