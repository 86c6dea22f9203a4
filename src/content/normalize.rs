//! Normalization of parsed front-matter into a typed [`Post`]

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use lazy_static::lazy_static;
use regex::Regex;
use thiserror::Error;

use super::date::parse_date;
use super::frontmatter::{MetaValue, RawMetadata};
use super::post::{Post, PostMeta};

lazy_static! {
    static ref SLUG_RE: Regex = Regex::new(r"^[a-z0-9-]+$").unwrap();
}

/// Errors that prevent building a [`Post`]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    #[error("cannot resolve a slug: no usable `slug`, `title` or file name")]
    SlugUnresolvable,

    #[error("required field `{0}` is missing")]
    MissingField(String),

    #[error("field `{field}` is not a valid date: {value:?}")]
    InvalidDate { field: String, value: String },
}

/// Defaults and settings used while normalizing
#[derive(Debug, Clone)]
pub struct NormalizeOptions {
    /// Timezone for dates written without an offset
    pub timezone: Tz,
    pub words_per_minute: usize,
    pub default_author: String,
    pub default_author_image: String,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            timezone: Tz::UTC,
            words_per_minute: 200,
            default_author: "Editorial Team".to_string(),
            default_author_image: "./images/authors/default.png".to_string(),
        }
    }
}

/// Normalize with default options
pub fn normalize(
    metadata: &RawMetadata,
    content: &str,
    fallback_slug: Option<&str>,
) -> Result<Post, NormalizeError> {
    normalize_with(metadata, content, fallback_slug, &NormalizeOptions::default())
}

/// Build a [`Post`] from parsed front-matter and body.
///
/// Callers are expected to have run the validator first; defaults fill in
/// anything optional, so unvalidated input may normalize into a post that
/// hides authoring mistakes.
pub fn normalize_with(
    metadata: &RawMetadata,
    content: &str,
    fallback_slug: Option<&str>,
    options: &NormalizeOptions,
) -> Result<Post, NormalizeError> {
    let slug = resolve_slug(metadata, fallback_slug)?;

    let title = required_str(metadata, "title")?;
    let description = required_str(metadata, "description")?;
    let category = required_str(metadata, "category")?;
    let hero_image = required_str(metadata, "heroImage")?;

    let pub_date = date_field(metadata, "pubDate", options.timezone)?
        .ok_or_else(|| NormalizeError::MissingField("pubDate".to_string()))?;
    let modified_date = date_field(metadata, "modifiedDate", options.timezone)?.unwrap_or(pub_date);

    let tags = metadata
        .get("tags")
        .and_then(coerce_tags)
        .unwrap_or_default()
        .into_iter()
        .filter(|t| !t.is_empty())
        .collect();

    let author = metadata
        .get_str("author")
        .map_or_else(|| options.default_author.clone(), str::to_string);
    let author_image = metadata
        .get_str("authorImage")
        .map_or_else(|| options.default_author_image.clone(), str::to_string);

    let content = normalize_content(content);
    let word_count = count_words(&content);

    Ok(Post {
        meta: PostMeta {
            slug,
            title,
            description,
            category,
            pub_date,
            modified_date,
            hero_image,
            tags,
            author,
            author_image,
            word_count,
            reading_time: reading_time(word_count, options.words_per_minute),
            source: None,
        },
        content,
    })
}

/// Slug from `slug`, then `title`, then the fallback
fn resolve_slug(metadata: &RawMetadata, fallback: Option<&str>) -> Result<String, NormalizeError> {
    metadata
        .get_str("slug")
        .and_then(slugify)
        .or_else(|| metadata.get_str("title").and_then(slugify))
        .or_else(|| fallback.and_then(slugify))
        .ok_or(NormalizeError::SlugUnresolvable)
}

/// Lowercase, collapse runs of non-alphanumerics into one hyphen and trim
/// hyphens. Non-ASCII letters are transliterated. `None` when nothing is left.
pub fn slugify(s: &str) -> Option<String> {
    let slug = slug::slugify(s);
    if slug.is_empty() {
        None
    } else {
        Some(slug)
    }
}

/// Whether `s` is a well-formed slug
pub fn is_valid_slug(s: &str) -> bool {
    SLUG_RE.is_match(s)
}

/// Coerce a tags value into a list of trimmed strings.
///
/// A scalar is split on commas, so `"ai, ml"` yields `["ai", "ml"]`.
/// Empty elements are kept for the validator to report. Returns `None`
/// when an element is not a scalar.
pub fn coerce_tags(value: &MetaValue) -> Option<Vec<String>> {
    match value {
        MetaValue::Null => Some(Vec::new()),
        MetaValue::Scalar(s) => Some(s.split(',').map(|t| t.trim().to_string()).collect()),
        MetaValue::List(items) => items
            .iter()
            .map(|item| item.as_str().map(|t| t.trim().to_string()))
            .collect(),
        MetaValue::Map(_) => None,
    }
}

fn required_str(metadata: &RawMetadata, field: &str) -> Result<String, NormalizeError> {
    metadata
        .get_str(field)
        .map(str::to_string)
        .ok_or_else(|| NormalizeError::MissingField(field.to_string()))
}

fn date_field(
    metadata: &RawMetadata,
    field: &str,
    tz: Tz,
) -> Result<Option<DateTime<Utc>>, NormalizeError> {
    let Some(raw) = metadata.get_str(field) else {
        return Ok(None);
    };

    parse_date(raw, tz)
        .map(Some)
        .ok_or_else(|| NormalizeError::InvalidDate {
            field: field.to_string(),
            value: raw.to_string(),
        })
}

/// Strip a byte-order mark, unify line endings to `\n` and trim
pub fn normalize_content(content: &str) -> String {
    let content = content.strip_prefix('\u{feff}').unwrap_or(content);
    content
        .replace("\r\n", "\n")
        .replace('\r', "\n")
        .trim()
        .to_string()
}

pub fn count_words(content: &str) -> usize {
    content.split_whitespace().count()
}

/// Minutes to read `word_count` words, rounded up, never below one
pub fn reading_time(word_count: usize, words_per_minute: usize) -> usize {
    let wpm = words_per_minute.max(1);
    word_count.div_ceil(wpm).max(1)
}
