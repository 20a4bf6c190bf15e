//! Release extraction from MangaUpdates pages.

use crate::{
    Chapter, Client, Release, ScrapedReleases, SerieID, DIV_SELECTOR,
    RELEASE_TABLE_SELECTOR, SERIE_TITLE_SELECTOR,
};
use eyre::{bail, ensure, eyre, Result, WrapErr};
use kuchiki::traits::*;
use std::mem;
use tracing::{debug, warn};
use url::Url;

/// Full width of a bootstrap grid line.
const GRID_WIDTH: u32 = 12;
/// Cells per release row: date, serie, volume, chapter, groups.
const CELLS_PER_ROW: usize = 5;
/// Volume cell position.
const VOLUME_COLUMN: usize = 2;
/// Chapter cell position.
const CHAPTER_COLUMN: usize = 3;
/// Groups cell position.
const GROUPS_COLUMN: usize = 4;
/// A cell like "24-25" or "12+13" covers several chapters.
const CHAPTER_SEPARATORS: [char; 2] = ['+', '-'];

/// Returns the release search URL for a serie.
pub fn releases_url(serie_id: &SerieID) -> Url {
    Url::parse(&format!(
        "https://www.mangaupdates.com/releases.html?search={serie_id}&stype=series"
    ))
    .expect("valid releases URL")
}

/// Returns the home page URL for a serie.
pub fn serie_url(serie_id: &SerieID) -> Url {
    Url::parse(&format!(
        "https://www.mangaupdates.com/series.html?id={serie_id}"
    ))
    .expect("valid serie URL")
}

/// Scrapes the recent releases reported for one serie.
pub fn scrape_releases(
    client: &Client,
    serie_id: &SerieID,
) -> Result<ScrapedReleases> {
    let html = client
        .get_html(&releases_url(serie_id))
        .context("get releases page")?;

    // The release list is the second bootstrap row of the main content.
    let table = RELEASE_TABLE_SELECTOR
        .filter(html.descendants().elements())
        .nth(1)
        .ok_or_else(|| eyre!("release table not found"))?;

    let rows = extract_rows(&table)
        .with_context(|| format!("extract rows for serie {serie_id}"))?;

    Ok(ScrapedReleases::new(
        serie_id.clone(),
        releases_from_rows(serie_id, &rows),
    ))
}

/// Scrapes the title of a serie from its home page.
///
/// Doubles as an existence check when registering a new watch.
pub fn scrape_serie_title(
    client: &Client,
    serie_id: &SerieID,
) -> Result<String> {
    let html = client
        .get_html(&serie_url(serie_id))
        .context("get serie page")?;

    let title = SERIE_TITLE_SELECTOR
        .filter(html.descendants().elements())
        .next()
        .ok_or_else(|| eyre!("serie title not found"))?
        .text_contents();
    let title = title.trim();
    ensure!(!title.is_empty(), "empty serie title");

    Ok(title.to_owned())
}

/// Reconstitutes table rows hidden in the bootstrap grid markup.
///
/// Each row is flattened into `col-<width>` divs: accumulate the widths
/// until a full grid line is reached. Leading "title" divs are the header;
/// the first div without a column class marks the end of the table.
fn extract_rows(table: &kuchiki::NodeDataRef<kuchiki::ElementData>) -> Result<Vec<Vec<String>>> {
    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut width = 0;
    let mut in_table = false;

    for div in DIV_SELECTOR.filter(table.as_node().descendants().elements()) {
        let classes = div
            .attributes
            .borrow()
            .get("class")
            .unwrap_or_default()
            .to_owned();
        let classes = classes.split_whitespace().collect::<Vec<_>>();

        if !in_table {
            if classes.iter().any(|class| class.contains("title")) {
                continue;
            }
            in_table = true;
        }

        let col_width = classes.iter().find_map(|class| {
            class.strip_prefix("col-")?.parse::<u32>().ok()
        });
        let col_width = match col_width {
            Some(col_width) => col_width,
            // Not a grid cell: the table is over.
            None => break,
        };

        row.push(div.text_contents());
        width += col_width;
        if width > GRID_WIDTH {
            bail!("row width {width} exceeds the {GRID_WIDTH}-column grid");
        }
        if width == GRID_WIDTH {
            rows.push(mem::take(&mut row));
            width = 0;
        }
    }

    Ok(rows)
}

/// Maps raw row cells to releases.
///
/// Bad rows never abort the scrape: they are logged and skipped.
fn releases_from_rows(
    serie_id: &SerieID,
    rows: &[Vec<String>],
) -> Vec<Release> {
    let mut releases = Vec::new();

    for (row_number, cells) in rows.iter().enumerate() {
        if cells.len() != CELLS_PER_ROW {
            if cells.len() > 1 {
                warn!(
                    %serie_id,
                    row_number,
                    ?cells,
                    "release row does not have {CELLS_PER_ROW} cells, \
                     skipping it",
                );
            } else {
                debug!(%serie_id, row_number, "skipping stray cell");
            }
            continue;
        }

        let volume = parse_volume(serie_id, &cells[VOLUME_COLUMN]);
        let group = &cells[GROUPS_COLUMN];
        releases.extend(
            cells[CHAPTER_COLUMN]
                .split(CHAPTER_SEPARATORS)
                .map(|label| Release::new(group, Chapter::new(label, volume))),
        );
    }

    releases
}

/// Coerces the volume cell, empty meaning "no volume".
fn parse_volume(serie_id: &SerieID, cell: &str) -> Option<u32> {
    let cell = cell.trim();
    if cell.is_empty() {
        return None;
    }

    match cell.parse() {
        Ok(volume) => Some(volume),
        Err(err) => {
            warn!(
                %serie_id,
                cell,
                %err,
                "non-empty volume cell is not an integer",
            );
            None
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A trimmed-down release search results page.
    const RELEASES_PAGE: &str = r#"
        <html><body><div id="main_content">
          <div class="row">search form, ignored</div>
          <div class="row">
            <div class="col-12 titleclass">Releases</div>
            <div class="col-2">08/27/26</div>
            <div class="col-4"><a>Some Serie</a></div>
            <div class="col-1"></div>
            <div class="col-2">25+26</div>
            <div class="col-3">GroupA</div>
            <div class="col-2">08/20/26</div>
            <div class="col-4"><a>Some Serie</a></div>
            <div class="col-1">4</div>
            <div class="col-2">24</div>
            <div class="col-3">GroupB</div>
            <div class="footer">done</div>
          </div>
        </div></body></html>
    "#;

    fn table(html: &str) -> kuchiki::NodeDataRef<kuchiki::ElementData> {
        let document = kuchiki::parse_html().one(html);
        RELEASE_TABLE_SELECTOR
            .filter(document.descendants().elements())
            .nth(1)
            .expect("release table")
    }

    #[test]
    fn rows_are_reconstituted_from_the_grid() {
        let rows = extract_rows(&table(RELEASES_PAGE)).expect("rows");

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].len(), 5);
        assert_eq!(rows[0][CHAPTER_COLUMN], "25+26");
        assert_eq!(rows[1][VOLUME_COLUMN], "4");
    }

    #[test]
    fn overflowing_row_is_an_error() {
        let html = r#"
            <html><body><div id="main_content">
              <div class="row"></div>
              <div class="row">
                <div class="col-8">a</div>
                <div class="col-8">b</div>
              </div>
            </div></body></html>
        "#;

        assert!(extract_rows(&table(html)).is_err());
    }

    #[test]
    fn rows_map_to_releases_with_split_chapters() {
        let rows = extract_rows(&table(RELEASES_PAGE)).expect("rows");
        let serie_id = SerieID::from("12345");

        let releases = releases_from_rows(&serie_id, &rows);

        let got = releases
            .iter()
            .map(|release| {
                (
                    release.chapter().label(),
                    release.chapter().volume(),
                    release.group(),
                )
            })
            .collect::<Vec<_>>();
        assert_eq!(
            got,
            [
                ("25", None, "GroupA"),
                ("26", None, "GroupA"),
                ("24", Some(4), "GroupB"),
            ]
        );
    }

    #[test]
    fn short_rows_are_skipped() {
        let serie_id = SerieID::from("12345");
        let rows = vec![vec!["only".to_owned(), "four".to_owned()]];

        assert!(releases_from_rows(&serie_id, &rows).is_empty());
    }

    #[test]
    fn volume_cell_coercion() {
        let serie_id = SerieID::from("12345");

        assert_eq!(parse_volume(&serie_id, " 7 "), Some(7));
        assert_eq!(parse_volume(&serie_id, ""), None);
        assert_eq!(parse_volume(&serie_id, "  "), None);
        // Garbage degrades to "no volume", it does not abort.
        assert_eq!(parse_volume(&serie_id, "vol?"), None);
    }
}
