//! Chapter identifiers: label parsing, ordering and the on-disk record.

use eyre::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{de, Deserialize, Deserializer, Serialize};
use std::{
    cmp::Ordering,
    fmt,
    hash::{Hash, Hasher},
};
use tracing::warn;

/// Order value for an empty or missing label.
const ABSENT_VALUE: f64 = -9_000_000.0;
/// Order value for a label no rule could interpret.
///
/// Below every keyword bucket but distinguishable from a truly absent label.
const UNPARSED_VALUE: f64 = -8_000_000.0;

/// Keyword buckets, each with a base order value.
///
/// A trailing number offsets within the bucket ("special 3" outranks
/// "special"). Shared read-only across threads, never written after init.
static KEYWORD_BUCKETS: Lazy<Vec<(f64, Regex)>> = Lazy::new(|| {
    [
        (-2_000_000.0, "oneshot"),
        (-1_500_000.0, "drama cd"),
        (-1_000_000.0, "extra"),
        (-1_000_000.0, "extras"),
        (-1_000_000.0, "omake"),
        (-1_000_000.0, "omakes"),
        (-500_000.0, "special"),
        (-100_000.0, "prologue"),
        (9_000_000.0, "epilogue"),
    ]
    .into_iter()
    .map(|(value, keyword)| {
        let regex = Regex::new(&format!("^{keyword} ?(?P<number>[0-9]*)$"))
            .expect("invalid keyword regex");
        (value, regex)
    })
    .collect()
});

/// Match anything outside {word characters, space, dot}.
static UNSUPPORTED_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\w .]").expect("invalid chars regex"));

/// Match a trailing "end" marker ("24 end" is still chapter 24).
static END_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"end$").expect("invalid end marker regex"));

/// Match a trailing re-release suffix ("24v2", "24 v.2").
static VERSION_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"v[ .]*[0-9]+$").expect("invalid version regex"));

/// Match a numeric chapter with a single-letter sub-chapter ("24b").
static LETTER_SUB_CHAPTER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<number>[0-9]+)(?P<letter>[a-z])$")
        .expect("invalid sub-chapter regex")
});

/// The numeric sort key derived from a chapter label.
#[derive(Debug, Clone, Copy)]
pub struct ChapterValue {
    /// Position on the chapter axis.
    value: f64,
    /// Whether a parsing rule actually matched (vs the fallback sentinel).
    parsed: bool,
}

impl ChapterValue {
    /// Parses a raw chapter label into an order value.
    ///
    /// Never fails: a label nothing can interpret gets a reserved low
    /// sentinel, a warning, and `is_parsed() == false`.
    pub fn parse(label: &str) -> Self {
        parse_value(label, None)
    }

    /// Returns the order value.
    pub fn value(self) -> f64 {
        self.value
    }

    /// Tests if a parsing rule matched the label.
    pub fn is_parsed(self) -> bool {
        self.parsed
    }
}

/// Parses `label`, with the volume carried along for diagnostics only.
fn parse_value(label: &str, volume: Option<u32>) -> ChapterValue {
    let label = label.trim();

    // The overwhelming majority of labels are plain numbers ("24", "24.1").
    // This path takes priority over every other rule.
    if let Ok(value) = label.parse::<f64>() {
        return ChapterValue {
            value,
            parsed: true,
        };
    }

    let normalized = UNSUPPORTED_CHARS.replace_all(label, "").to_lowercase();
    let normalized = normalized.trim();
    if normalized.is_empty() {
        // Absence is expected (some releases are volume-only), not garbage.
        return ChapterValue {
            value: ABSENT_VALUE,
            parsed: true,
        };
    }
    let normalized = END_MARKER.replace(normalized, "");
    let normalized = normalized.trim();
    let normalized = VERSION_SUFFIX.replace(normalized, "");
    let normalized = normalized.trim();

    for (base, regex) in KEYWORD_BUCKETS.iter() {
        if let Some(captures) = regex.captures(normalized) {
            let number = captures
                .name("number")
                .expect("capture group 'number'")
                .as_str();
            // Digits only, so f64 parsing cannot fail.
            let offset = if number.is_empty() {
                0.0
            } else {
                number.parse::<f64>().expect("numeric suffix")
            };
            return ChapterValue {
                value: base + offset,
                parsed: true,
            };
        }
    }

    if let Some(captures) = LETTER_SUB_CHAPTER.captures(normalized) {
        let number = captures
            .name("number")
            .expect("capture group 'number'")
            .as_str()
            .parse::<f64>()
            .expect("chapter number");
        let letter = captures
            .name("letter")
            .expect("capture group 'letter'")
            .as_str()
            .bytes()
            .next()
            .expect("sub-chapter letter");
        // a=1, b=2, ... as a tenths offset: "24b" lands on 24.2.
        let rank = f64::from(letter - b'a' + 1);
        return ChapterValue {
            value: number + rank / 10.0,
            parsed: true,
        };
    }

    // Normalization may have revealed a plain number (e.g. "ch. 24").
    if let Ok(value) = normalized.parse::<f64>() {
        return ChapterValue {
            value,
            parsed: true,
        };
    }

    warn!(label, ?volume, normalized, "unsupported chapter label");
    ChapterValue {
        value: UNPARSED_VALUE,
        parsed: false,
    }
}

// -----------------------------------------------------------------------------

/// A manga chapter identifier: a raw label plus an optional volume.
///
/// Immutable once built. Equality and hashing are label-level (exact string
/// plus volume); ordering is value-level, so "24" and "24.0" sort together
/// but are distinct chapters.
#[derive(Debug, Clone)]
pub struct Chapter {
    /// Raw label, trimmed, kept verbatim for display and storage.
    label: String,
    /// Disambiguating volume number, if the tracker reported one.
    volume: Option<u32>,
    /// Sort key derived from the label at construction.
    value: ChapterValue,
}

impl Chapter {
    /// Builds a chapter from a raw label and an optional volume.
    pub fn new(label: &str, volume: Option<u32>) -> Self {
        let label = label.trim().to_owned();
        let value = parse_value(&label, volume);

        Self {
            label,
            volume,
            value,
        }
    }

    /// Returns the raw label.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns the volume number.
    pub fn volume(&self) -> Option<u32> {
        self.volume
    }

    /// Returns the numeric sort key.
    pub fn order_value(&self) -> f64 {
        self.value.value()
    }

    /// Tests if the label was given a real order value (vs a fallback one).
    pub fn is_valid(&self) -> bool {
        // A malformed volume can't exist here: the record layer rejects it
        // before a chapter is ever built.
        self.value.is_parsed()
    }

    /// Tests if `self` ranks strictly above `other`.
    ///
    /// A chapter with a volume always outranks one without, and differing
    /// volumes win over any chapter value.
    pub fn gt(&self, other: &Self) -> bool {
        match (self.volume, other.volume) {
            (None, Some(_)) => false,
            (Some(_), None) => true,
            (Some(own), Some(theirs)) if own != theirs => own > theirs,
            _ => self.order_value() > other.order_value(),
        }
    }

    /// Tests if `self` ranks at or above `other`.
    ///
    /// Careful: this is a value-level check while `==` compares labels, so
    /// `a.ge(b)` and `b.ge(a)` can both hold for chapters that are NOT equal
    /// (e.g. "24" and "24.0").
    #[allow(clippy::float_cmp)] // exact tie is the documented contract
    pub fn ge(&self, other: &Self) -> bool {
        self.gt(other)
            || (self.volume == other.volume
                && self.order_value() == other.order_value())
    }

    /// Ordering by `(volume, order value)`, for sorting.
    ///
    /// Deliberately NOT an `Ord` impl: it would disagree with the
    /// label-based `Eq` and break the `Ord` contract.
    pub fn cmp_by_value(&self, other: &Self) -> Ordering {
        if self.gt(other) {
            Ordering::Greater
        } else if other.gt(self) {
            Ordering::Less
        } else {
            Ordering::Equal
        }
    }

    /// Converts to the on-disk record.
    pub fn to_record(&self) -> ChapterRecord {
        ChapterRecord {
            volume: self.volume,
            chapter: self.label.clone(),
        }
    }
}

impl From<ChapterRecord> for Chapter {
    fn from(record: ChapterRecord) -> Self {
        Self::new(&record.chapter, record.volume)
    }
}

impl PartialEq for Chapter {
    fn eq(&self, other: &Self) -> bool {
        self.volume == other.volume && self.label == other.label
    }
}

impl Eq for Chapter {}

impl Hash for Chapter {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.volume.hash(state);
        self.label.hash(state);
    }
}

impl fmt::Display for Chapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.volume {
            Some(volume) => write!(f, "volume: {volume}, ")?,
            None => write!(f, "volume: none, ")?,
        }
        write!(
            f,
            "chapter: \"{}\" (value: {})",
            self.label,
            format_value(self.order_value())
        )
    }
}

/// Compact scientific-notation rendering, for log legibility.
fn format_value(value: f64) -> String {
    let mut formatted = format!("{value:.1e}").replace(".0e", "e");
    if let Some(stripped) = formatted.strip_suffix("e0") {
        formatted = stripped.to_owned();
    }
    formatted
}

// -----------------------------------------------------------------------------

/// On-disk record for a chapter mark.
///
/// Field names are the stable wire contract with previously stored
/// documents: `chapter` is required, a null `volume` is omitted entirely.
/// Old documents may carry the volume as a string; it is coerced back to an
/// integer on read and a non-coercible volume is a (recoverable) error.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChapterRecord {
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "volume_from_record"
    )]
    volume: Option<u32>,
    chapter: String,
}

impl ChapterRecord {
    /// Parses a JSON value into a record.
    ///
    /// A missing `chapter` field or a malformed volume is reported as an
    /// error carrying the raw input; the caller decides whether to drop the
    /// record or keep going.
    pub fn from_json(value: &serde_json::Value) -> Result<Self> {
        serde_json::from_value(value.clone())
            .map_err(|err| eyre::eyre!("malformed chapter record {value}: {err}"))
    }
}

/// Coerces a stored volume, whether it was written as a number or a string.
fn volume_from_record<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u32),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Number(volume)) => Ok(Some(volume)),
        Some(Raw::Text(text)) => {
            let text = text.trim();
            if text.is_empty() {
                // A blank volume means no volume.
                return Ok(None);
            }
            text.parse().map(Some).map_err(|_| {
                de::Error::custom(format!("volume is not an integer: {text:?}"))
            })
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value_of(label: &str) -> f64 {
        ChapterValue::parse(label).value()
    }

    #[test]
    fn direct_numeric_precedence() {
        assert_eq!(value_of("24"), 24.0);
        assert_eq!(value_of("24.1"), 24.1);
        assert_eq!(value_of("3.5"), 3.5);
        assert_eq!(value_of("0"), 0.0);
        assert_eq!(value_of(" 12 "), 12.0);
    }

    #[test]
    fn keyword_bucket_ordering() {
        assert!(value_of("oneshot") < value_of("drama cd"));
        assert!(value_of("drama cd") < value_of("extra"));
        assert!(value_of("extra") < value_of("special"));
        assert!(value_of("special") < value_of("prologue"));
        assert!(value_of("prologue") < value_of("1"));
        assert!(value_of("1") < value_of("epilogue"));
    }

    #[test]
    fn keyword_aliases_share_a_bucket() {
        assert_eq!(value_of("extra"), value_of("extras"));
        assert_eq!(value_of("extra"), value_of("omake"));
        assert_eq!(value_of("extra"), value_of("omakes"));
    }

    #[test]
    fn keyword_numeric_suffix_offsets_within_bucket() {
        assert_eq!(value_of("special 3"), value_of("special") + 3.0);
        assert!(value_of("special 3") < value_of("prologue"));
        assert_eq!(value_of("Special"), value_of("special"));
    }

    #[test]
    fn letter_sub_chapter_spacing() {
        assert!(value_of("24") < value_of("24a"));
        assert!(value_of("24a") < value_of("24b"));
        assert!(value_of("24b") < value_of("25"));
        assert_eq!(value_of("24a"), 24.1);
        assert_eq!(value_of("24b"), 24.2);
    }

    #[test]
    fn version_suffix_is_stripped() {
        assert_eq!(value_of("24v2"), value_of("24"));
        assert_eq!(value_of("24 v.2"), value_of("24"));
        assert_eq!(value_of("24 end"), value_of("24"));
    }

    #[test]
    fn empty_label_is_lowest() {
        assert!(value_of("") < value_of("oneshot"));
        assert!(value_of("   ") < value_of("oneshot"));
        // Symbols-only labels normalize down to nothing.
        assert!(value_of("???") < value_of("oneshot"));
    }

    #[test]
    fn garbage_never_panics() {
        for label in ["n/a", "日本語", "chapter ???!!", "."] {
            let parsed = ChapterValue::parse(label);
            assert!(!parsed.is_parsed(), "{label:?} should not parse");
            assert!(parsed.value() < value_of("oneshot"));
            // Distinct from an absent label.
            assert!(parsed.value() > value_of(""));
        }
    }

    #[test]
    fn equality_is_label_level_ordering_is_value_level() {
        let plain = Chapter::new("24", None);
        let decimal = Chapter::new("24.0", None);

        assert_ne!(plain, decimal);
        assert_eq!(plain.order_value(), decimal.order_value());
        assert!(plain.ge(&decimal));
        assert!(decimal.ge(&plain));
        assert!(!plain.gt(&decimal));
    }

    #[test]
    fn volume_trumps_chapter_value() {
        assert!(Chapter::new("1", Some(2)).gt(&Chapter::new("999", Some(1))));
        // A volume outranks no volume at all.
        assert!(Chapter::new("1", Some(1)).gt(&Chapter::new("999", None)));
        assert!(!Chapter::new("999", None).gt(&Chapter::new("1", Some(1))));
        // Equal volumes fall through to the chapter value.
        assert!(Chapter::new("2", Some(3)).gt(&Chapter::new("1", Some(3))));
    }

    #[test]
    fn cmp_by_value_sorts_descending() {
        let mut chapters = vec![
            Chapter::new("oneshot", None),
            Chapter::new("25", None),
            Chapter::new("epilogue", None),
            Chapter::new("2", Some(1)),
        ];
        chapters.sort_by(|a, b| b.cmp_by_value(a));

        let labels =
            chapters.iter().map(Chapter::label).collect::<Vec<_>>();
        assert_eq!(labels, ["2", "epilogue", "25", "oneshot"]);
    }

    #[test]
    fn display_is_compact() {
        let chapter = Chapter::new("24", Some(3));
        assert_eq!(
            chapter.to_string(),
            "volume: 3, chapter: \"24\" (value: 2.4e1)"
        );
        let oneshot = Chapter::new("oneshot", None);
        assert_eq!(
            oneshot.to_string(),
            "volume: none, chapter: \"oneshot\" (value: -2e6)"
        );
    }

    #[test]
    fn record_round_trip() {
        for chapter in [
            Chapter::new("24", None),
            Chapter::new("24.0", None),
            Chapter::new("oneshot", Some(3)),
            Chapter::new("n/a", None),
        ] {
            let json = serde_json::to_string(&chapter.to_record())
                .expect("serialize record");
            let record = serde_json::from_str::<ChapterRecord>(&json)
                .expect("deserialize record");
            assert_eq!(Chapter::from(record), chapter);
        }
    }

    #[test]
    fn record_omits_null_volume() {
        let json = serde_json::to_value(Chapter::new("24", None).to_record())
            .expect("serialize record");
        assert_eq!(json, serde_json::json!({ "chapter": "24" }));

        let json = serde_json::to_value(Chapter::new("24", Some(2)).to_record())
            .expect("serialize record");
        assert_eq!(json, serde_json::json!({ "volume": 2, "chapter": "24" }));
    }

    #[test]
    fn record_coerces_string_volume() {
        let record = ChapterRecord::from_json(
            &serde_json::json!({ "volume": "3", "chapter": "12" }),
        )
        .expect("valid record");
        assert_eq!(Chapter::from(record), Chapter::new("12", Some(3)));

        // Blank volume means no volume.
        let record = ChapterRecord::from_json(
            &serde_json::json!({ "volume": " ", "chapter": "12" }),
        )
        .expect("valid record");
        assert_eq!(Chapter::from(record), Chapter::new("12", None));
    }

    #[test]
    fn record_rejects_malformed_input() {
        // Non-coercible volume.
        let res = ChapterRecord::from_json(
            &serde_json::json!({ "volume": "twelve", "chapter": "12" }),
        );
        assert!(res.is_err());

        // Missing required `chapter` field.
        let res = ChapterRecord::from_json(&serde_json::json!({ "volume": 2 }));
        assert!(res.is_err());
    }
}
