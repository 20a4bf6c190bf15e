//! Digest formatting: links, top markers and email-ready bodies.
//!
//! Delivery itself is left to the caller; this module only renders.

use crate::{release, Chapter, PageMark, Release, ScrapedReleases, SerieID};
use chrono::Local;
use std::fmt::Write;
use url::Url;

/// A new release annotated for display.
///
/// Plain composition over the chapter: the top flag and the link are
/// attached alongside, they are not part of the chapter's identity.
#[derive(Debug, Clone)]
pub struct NewRelease {
    /// The released chapter.
    chapter: Chapter,
    /// Scanlation group, for display.
    group: String,
    /// Does it rank above the recent marks?
    top: bool,
    /// Best-guess link to read it.
    link: Url,
}

impl NewRelease {
    /// Returns the released chapter.
    pub fn chapter(&self) -> &Chapter {
        &self.chapter
    }

    /// Returns the scanlation group.
    pub fn group(&self) -> &str {
        &self.group
    }

    /// Tests if the release is a top (hot) one.
    pub fn is_top(&self) -> bool {
        self.top
    }

    /// Returns the best-guess link.
    pub fn link(&self) -> &Url {
        &self.link
    }
}

/// New releases for one serie, ready for the digest.
#[derive(Debug)]
pub struct SerieDigest {
    /// Serie ID.
    serie_id: SerieID,
    /// Serie display name.
    serie_title: String,
    /// New releases, newest first.
    releases: Vec<NewRelease>,
}

impl SerieDigest {
    /// Returns the serie ID.
    pub fn serie_id(&self) -> &SerieID {
        &self.serie_id
    }

    /// Returns the serie title.
    pub fn serie_title(&self) -> &str {
        &self.serie_title
    }

    /// Returns the new releases, newest first.
    pub fn releases(&self) -> impl Iterator<Item = &NewRelease> + '_ {
        self.releases.iter()
    }

    /// Returns the new chapters, newest first.
    pub fn chapters(&self) -> impl Iterator<Item = &Chapter> + '_ {
        self.releases.iter().map(NewRelease::chapter)
    }

    /// Tests if the serie has anything new to report.
    pub fn is_empty(&self) -> bool {
        self.releases.is_empty()
    }
}

/// Flags and links the scraped releases not yet recorded in the page mark.
pub fn format_new_releases(
    scraped: &ScrapedReleases,
    page_mark: &PageMark,
    top_limit: usize,
) -> SerieDigest {
    let releases = release::new_releases(
        scraped,
        page_mark.chapter_marks(),
        top_limit,
    )
    .into_iter()
    .map(|(found, top)| NewRelease {
        chapter: found.chapter().clone(),
        group: found.group().to_owned(),
        top,
        link: likely_link(page_mark.display_name(), found),
    })
    .collect();

    SerieDigest {
        serie_id: page_mark.serie_id().clone(),
        serie_title: page_mark.display_name().to_owned(),
        releases,
    }
}

/// Builds a best-guess search link for a release.
///
/// There is no canonical reader URL on the tracker, so point at a search
/// narrowed down by serie, chapter, group and a few noisy-domain exclusions.
fn likely_link(serie_name: &str, found: &Release) -> Url {
    let mut query = String::new();
    if let Some(volume) = found.chapter().volume() {
        query.push_str(&format!(" v.{volume} "));
    }
    query.push_str(&format!(
        "\"{}\" manga {serie_name} {} \
         -site:mangaupdates.com -site:play.google.com",
        found.chapter().label(),
        found.group(),
    ));

    Url::parse_with_params(
        "https://www.google.com/search",
        &[
            ("q", query.as_str()),
            // Remove safe search.
            ("safe", "images"),
            ("btnG", "Search"),
            ("lr", "lang_en"),
        ],
    )
    .expect("valid search URL")
}

/// Today, short form, for the digest subject and headers.
fn todays_date() -> String {
    Local::now().format("%a %d-%b").to_string()
}

/// Returns the digest email subject.
pub fn subject() -> String {
    format!("Manga Newsletter - {}", todays_date())
}

/// Builds the plain text digest body.
pub fn build_txt_body(digests: &[SerieDigest]) -> String {
    let mut body = String::from("Hello,\n");
    if digests.is_empty() {
        body.push_str("no new release were available for your series.\n");
        return body;
    }

    for digest in digests {
        body.push_str(digest.serie_title());
        for found in digest.releases() {
            body.push_str("\n\t");
            if found.is_top() {
                body.push_str("Top -> ");
            }
            let _ = write!(body, "{}\t\t{}", found.chapter(), found.link());
        }
        body.push_str("\r\n");
    }

    body
}

/// Builds the HTML digest body.
pub fn build_html_body(digests: &[SerieDigest], watched_count: usize) -> String {
    let mut html = String::from("<html>\n<body>\n");
    let _ = write!(html, "<h2>Manga releases - {}</h2>\n", todays_date());

    if digests.is_empty() {
        html.push_str("<p>No new release for your series.</p>\n");
    }
    for digest in digests {
        let _ = write!(
            html,
            "<h3>{}</h3>\n<ul>\n",
            escape_html(digest.serie_title())
        );
        for found in digest.releases() {
            html.push_str("<li>");
            if found.is_top() {
                html.push_str("<b>Top</b> ");
            }
            let _ = write!(
                html,
                "<a href=\"{}\">{}</a> by group {}",
                found.link(),
                escape_html(found.chapter().label()),
                escape_html(found.group()),
            );
            html.push_str("</li>\n");
        }
        html.push_str("</ul>\n");
    }

    let _ = write!(
        html,
        "<p><i>Tracking {watched_count} series.</i></p>\n</body>\n</html>\n"
    );
    html
}

/// Minimal HTML escaping for scraped text.
fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PageMark, Release};

    fn digest_for(
        scraped_labels: &[&str],
        marked_labels: &[&str],
    ) -> SerieDigest {
        let mut page_mark =
            PageMark::new(SerieID::from("33"), Some("Berserk".to_owned()));
        page_mark.extend(
            marked_labels
                .iter()
                .map(|label| Chapter::new(label, None)),
        );
        let scraped = ScrapedReleases::new(
            SerieID::from("33"),
            scraped_labels
                .iter()
                .map(|label| {
                    Release::new("Evil Genius", Chapter::new(label, None))
                })
                .collect(),
        );

        format_new_releases(&scraped, &page_mark, 3)
    }

    #[test]
    fn digest_carries_flags_and_links() {
        let digest = digest_for(&["364", "363"], &["363"]);

        assert_eq!(digest.serie_title(), "Berserk");
        let releases = digest.releases().collect::<Vec<_>>();
        assert_eq!(releases.len(), 1);
        assert_eq!(releases[0].chapter().label(), "364");
        assert!(releases[0].is_top());
        let link = releases[0].link().as_str();
        assert!(link.starts_with("https://www.google.com/search?"));
        assert!(link.contains("Berserk"));
        assert!(link.contains("%22364%22"));
    }

    #[test]
    fn link_mentions_the_volume_when_known() {
        let found =
            Release::new("anon", Chapter::new("2", Some(7)));

        let link = likely_link("Berserk", &found);

        let query = link
            .query_pairs()
            .find_map(|(key, value)| {
                (key == "q").then(|| value.into_owned())
            })
            .expect("query");
        assert!(query.starts_with(" v.7 "));
        assert!(query.contains("\"2\" manga Berserk anon"));
    }

    #[test]
    fn txt_body_lists_series_and_marks_tops() {
        let body = build_txt_body(&[digest_for(&["364", "363"], &["363"])]);

        assert!(body.starts_with("Hello,\n"));
        assert!(body.contains("Berserk"));
        assert!(body.contains("Top -> "));
        assert!(body.contains("https://www.google.com/search?"));
    }

    #[test]
    fn txt_body_without_release() {
        let body = build_txt_body(&[]);

        assert!(body.contains("no new release"));
    }

    #[test]
    fn html_body_escapes_scraped_text() {
        let mut page_mark = PageMark::new(
            SerieID::from("33"),
            Some("Cats <3 & Dogs".to_owned()),
        );
        page_mark.extend([Chapter::new("1", None)]);
        let scraped = ScrapedReleases::new(
            SerieID::from("33"),
            vec![Release::new("A&B", Chapter::new("2", None))],
        );
        let digest = format_new_releases(&scraped, &page_mark, 3);

        let html = build_html_body(&[digest], 1);

        assert!(html.contains("Cats &lt;3 &amp; Dogs"));
        assert!(html.contains("A&amp;B"));
        assert!(html.contains("Tracking 1 series."));
    }
}
