//! mangamark - Track manga chapter releases and build a digest of what's new

// Lints {{{

#![deny(
    nonstandard_style,
    rust_2018_idioms,
    future_incompatible,
    rustdoc::all,
    rustdoc::missing_crate_level_docs,
    missing_docs,
    unreachable_pub,
    unsafe_code,
    unused,
    unused_import_braces,
    unused_lifetimes,
    variant_size_differences,
    warnings,
    clippy::all,
    clippy::pedantic,
    clippy::clone_on_ref_ptr,
    clippy::exit,
    clippy::filetype_is_file,
    clippy::float_cmp_const,
    clippy::lossy_float_literal,
    clippy::mem_forget,
    clippy::panic,
    clippy::pattern_type_mismatch,
    clippy::rest_pat_in_fully_bound_structs,
    clippy::unneeded_field_pattern,
    clippy::verbose_file_reads,
    clippy::dbg_macro,
    clippy::let_underscore_must_use,
    clippy::todo,
    clippy::unwrap_used,
    clippy::use_debug
)]
// clap 3's derive expansion trips this lint on newer rustc.
#![allow(unused_qualifications)]

// }}}

use clap::{Parser, Subcommand};
use eyre::{Result, WrapErr};
use indicatif::{ProgressBar, ProgressStyle};
use mangamark::{
    digest, fs, scraper, termio, Client, PageMark, PageMarkStore, SerieID,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let opts = Opts::parse();
    let store =
        PageMarkStore::open(&opts.store).context("open page mark store")?;
    let client = Client::new(opts.retry);

    match opts.command {
        Command::Run {
            top_limit,
            html_out,
        } => run(&client, &store, top_limit, html_out.as_deref()),
        Command::Watch {
            serie_id,
            name,
            reset_chapters,
        } => watch(&client, &store, serie_id, name, reset_chapters),
        Command::Unwatch { serie_id } => unwatch(&store, &serie_id),
        Command::List => list(&store),
    }
}

/// Scrapes every watched serie, reports the new releases and records them.
fn run(
    client: &Client,
    store: &PageMarkStore,
    top_limit: usize,
    html_out: Option<&Path>,
) -> Result<()> {
    let page_marks = store.get_all().context("load page marks")?;
    let watched_count = page_marks.len();

    // Setup the progress bar.
    let progress_bar = ProgressBar::new(watched_count as u64);
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template("{msg:10}    [{bar:40.cyan/blue}] {pos:>4}/{len:4}")
            .progress_chars("##-"),
    );
    progress_bar.set_message("series");

    // Scrape, diff and collect the digests.
    let mut digests = Vec::new();
    let mut updated = Vec::new();
    for mut page_mark in page_marks {
        progress_bar.inc(1);

        let scraped =
            match scraper::scrape_releases(client, page_mark.serie_id()) {
                Ok(scraped) => scraped,
                Err(err) => {
                    termio::print_warn(&format!(
                        "skipping {}: {err:#}",
                        page_mark.display_name()
                    ));
                    continue;
                },
            };

        let serie_digest =
            digest::format_new_releases(&scraped, &page_mark, top_limit);
        if serie_digest.is_empty() {
            continue;
        }

        page_mark.extend(serie_digest.chapters().cloned());
        updated.push(page_mark);
        digests.push(serie_digest);
    }
    progress_bar.finish();

    // Emit the digest bodies.
    println!("{}", digest::subject());
    println!("{}", digest::build_txt_body(&digests));
    if let Some(path) = html_out {
        let html = digest::build_html_body(&digests, watched_count);
        fs::atomic_write(path, html.as_bytes()).context("save HTML digest")?;
        termio::print_ok(&format!("HTML digest saved to {}", path.display()));
    }

    if updated.is_empty() {
        termio::print_ok("nothing new, nothing to record");
        return Ok(());
    }

    // The digest went out: move the watermarks forward.
    store.batch_put(&updated).context("record page marks")?;
    for page_mark in &updated {
        termio::print_ok(&format!("recorded {page_mark}"));
    }

    Ok(())
}

/// Registers a serie (or refreshes its name), keeping marks by default.
fn watch(
    client: &Client,
    store: &PageMarkStore,
    serie_id: SerieID,
    name: Option<String>,
    reset_chapters: bool,
) -> Result<()> {
    let existing = if reset_chapters {
        None
    } else {
        store.get(&serie_id).context("load page mark")?
    };

    let page_mark = match existing {
        Some(mut page_mark) => {
            if let Some(name) = name {
                page_mark.set_serie_name(name);
            }
            page_mark
        },
        None => {
            // Scraping the title doubles as an existence check for the ID.
            let name = match name {
                Some(name) => name,
                None => scraper::scrape_serie_title(client, &serie_id)
                    .with_context(|| format!("scrape title of {serie_id}"))?,
            };
            PageMark::new(serie_id, Some(name))
        },
    };

    store.put(&page_mark).context("store page mark")?;
    termio::print_ok(&format!("watching {page_mark}"));

    Ok(())
}

/// Stops watching a serie.
fn unwatch(store: &PageMarkStore, serie_id: &SerieID) -> Result<()> {
    if store.delete(serie_id).context("delete page mark")? {
        termio::print_ok(&format!("stopped watching {serie_id}"));
    } else {
        termio::print_warn(&format!("{serie_id} was not watched"));
    }

    Ok(())
}

/// Lists the watched series.
fn list(store: &PageMarkStore) -> Result<()> {
    let page_marks = store.get_all().context("load page marks")?;
    if page_marks.is_empty() {
        termio::print_warn("no serie watched yet");
        return Ok(());
    }

    for page_mark in &page_marks {
        let last = page_mark.latest_update().map_or_else(
            || "never".to_owned(),
            |date| date.format("%Y-%m-%d %H:%M:%S").to_string(),
        );
        println!("{page_mark}\tlast update: {last}");
    }

    Ok(())
}

/// CLI options.
#[derive(Parser)]
#[clap(author, version, about)]
pub struct Opts {
    /// Path to the page mark store directory.
    #[clap(short, long, default_value = "page-marks")]
    store: PathBuf,

    /// Max number of retry for HTTP requests.
    #[clap(long, default_value_t = 3)]
    retry: u8,

    /// What to do.
    #[clap(subcommand)]
    command: Command,
}

/// CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// Scrape all watched series and build the digest of new releases.
    Run {
        /// Number of recent marks a release must outrank to be "top".
        #[clap(short, long, default_value_t = 5)]
        top_limit: usize,

        /// Also write the HTML digest body to this file.
        #[clap(long)]
        html_out: Option<PathBuf>,
    },

    /// Start watching a serie.
    Watch {
        /// Serie ID.
        serie_id: SerieID,

        /// Display name (scraped from the serie page when omitted).
        #[clap(long)]
        name: Option<String>,

        /// Drop the chapters already recorded for the serie.
        #[clap(long)]
        reset_chapters: bool,
    },

    /// Stop watching a serie.
    Unwatch {
        /// Serie ID.
        serie_id: SerieID,
    },

    /// List the watched series.
    List,
}
