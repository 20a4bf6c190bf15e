use once_cell::sync::Lazy;

/// Select the bootstrap rows inside the release search results.
pub(crate) static RELEASE_TABLE_SELECTOR: Lazy<kuchiki::Selectors> =
    Lazy::new(|| {
        kuchiki::Selectors::compile("div#main_content div.row")
            .expect("invalid release table selector")
    });

/// Select every div (the release grid cells).
pub(crate) static DIV_SELECTOR: Lazy<kuchiki::Selectors> = Lazy::new(|| {
    kuchiki::Selectors::compile("div").expect("invalid div selector")
});

/// Select the serie title on its home page.
pub(crate) static SERIE_TITLE_SELECTOR: Lazy<kuchiki::Selectors> =
    Lazy::new(|| {
        kuchiki::Selectors::compile("span.releasestitle.tabletitle")
            .expect("invalid serie title selector")
    });
