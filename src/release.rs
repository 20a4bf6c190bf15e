//! Scraped chapter releases and the novelty diff against stored marks.

use crate::{Chapter, SerieID};
use std::{collections::HashSet, fmt};

/// A chapter release as reported by the release tracker.
///
/// The scanlation group is display-only: it is never part of the chapter's
/// identity nor of its ordering.
#[derive(Debug, Clone)]
pub struct Release {
    /// The released chapter.
    chapter: Chapter,
    /// Scanlation group that put it out.
    group: String,
}

impl Release {
    /// Builds a release.
    pub fn new(group: &str, chapter: Chapter) -> Self {
        Self {
            chapter,
            group: group.trim().to_owned(),
        }
    }

    /// Returns the released chapter.
    pub fn chapter(&self) -> &Chapter {
        &self.chapter
    }

    /// Returns the scanlation group.
    pub fn group(&self) -> &str {
        &self.group
    }
}

impl fmt::Display for Release {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} \tby group {}", self.chapter, self.group)
    }
}

// -----------------------------------------------------------------------------

/// Releases scraped for one serie, ordered from newest to oldest.
#[derive(Debug)]
pub struct ScrapedReleases {
    /// Serie the releases belong to.
    serie_id: SerieID,
    /// Releases, highest chapter first.
    releases: Vec<Release>,
}

impl ScrapedReleases {
    /// Builds the collection, sorting the releases newest first.
    pub fn new(serie_id: SerieID, mut releases: Vec<Release>) -> Self {
        releases.sort_by(|a, b| b.chapter.cmp_by_value(&a.chapter));

        Self { serie_id, releases }
    }

    /// Returns the serie ID.
    pub fn serie_id(&self) -> &SerieID {
        &self.serie_id
    }

    /// Returns the releases, newest first.
    pub fn releases(
        &self,
    ) -> impl Iterator<Item = &Release> + ExactSizeIterator + '_ {
        self.releases.iter()
    }
}

impl fmt::Display for ScrapedReleases {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Available releases for serie {}:", self.serie_id)?;
        for release in &self.releases {
            write!(f, "\n{release}")?;
        }
        Ok(())
    }
}

// -----------------------------------------------------------------------------

/// Computes which scraped releases are new relative to the recorded marks,
/// flagging the ones that rank above the `top_limit`-th highest mark.
///
/// "New" is a label-level test: a re-release under a slightly different
/// label ("24.0" after "24") counts as new, by design. The returned pairs
/// are ordered newest first. With no marks at all, everything is top.
pub fn new_releases<'a>(
    scraped: &'a ScrapedReleases,
    marks: &[Chapter],
    top_limit: usize,
) -> Vec<(&'a Release, bool)> {
    let seen = marks.iter().collect::<HashSet<_>>();
    let mut fresh = scraped
        .releases()
        .filter(|release| !seen.contains(release.chapter()))
        .collect::<Vec<_>>();
    fresh.sort_by(|a, b| b.chapter().cmp_by_value(a.chapter()));

    let mut ranked = marks.iter().collect::<Vec<_>>();
    ranked.sort_by(|a, b| b.cmp_by_value(a));
    // The mark a release must outrank to be "top": the top_limit-th highest,
    // or the lowest one present when there are fewer marks than that.
    let limiting = (!ranked.is_empty())
        .then(|| ranked[ranked.len().min(top_limit).max(1) - 1]);

    fresh
        .into_iter()
        .map(|release| {
            let top =
                limiting.map_or(true, |mark| release.chapter().gt(mark));
            (release, top)
        })
        .collect()
}
