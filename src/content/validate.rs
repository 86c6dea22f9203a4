//! Post validation
//!
//! Inspects parsed front-matter and content without mutating either. Every
//! applicable check runs, so one call reports all problems in a file.

use chrono_tz::Tz;
use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::fmt;

use super::date::parse_date;
use super::frontmatter::{MetaValue, RawMetadata};
use super::normalize::coerce_tags;

lazy_static! {
    /// `scheme:rest`, no whitespace
    static ref ABSOLUTE_URL_RE: Regex =
        Regex::new(r"^([A-Za-z][A-Za-z0-9+.\-]*):(\S+)$").unwrap();
    /// `//authority[/path][?query][#fragment]`
    static ref AUTHORITY_RE: Regex = Regex::new(r"^//[^/?#]+(?:[/?#].*)?$").unwrap();
}

/// Schemes that must carry a host
const HOST_SCHEMES: [&str; 5] = ["http", "https", "ws", "wss", "ftp"];

/// Required fields holding free text
const TEXT_FIELDS: [&str; 3] = ["title", "description", "category"];

/// Fields every post must define, in reporting order
pub const REQUIRED_FIELDS: [&str; 6] = [
    "title",
    "description",
    "pubDate",
    "heroImage",
    "category",
    "tags",
];

/// Category of a validation failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ValidationErrorKind {
    MissingField,
    InvalidDate,
    #[serde(rename = "InvalidURL")]
    InvalidUrl,
    InvalidTags,
    ContentTooShort,
}

impl fmt::Display for ValidationErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValidationErrorKind::MissingField => "MissingField",
            ValidationErrorKind::InvalidDate => "InvalidDate",
            ValidationErrorKind::InvalidUrl => "InvalidURL",
            ValidationErrorKind::InvalidTags => "InvalidTags",
            ValidationErrorKind::ContentTooShort => "ContentTooShort",
        };
        f.write_str(name)
    }
}

/// A single validation problem
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub kind: ValidationErrorKind,
    /// Offending front-matter field, `None` for content checks
    pub field: Option<String>,
    pub message: String,
    /// How to fix it
    pub suggestion: Option<String>,
}

impl ValidationError {
    fn new(
        kind: ValidationErrorKind,
        field: Option<&str>,
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            field: field.map(str::to_string),
            message: message.into(),
            suggestion: Some(suggestion.into()),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.field {
            Some(field) => write!(f, "{}({}): {}", self.kind, field, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

/// Tunable validation thresholds
#[derive(Debug, Clone)]
pub struct ValidationRules {
    /// Minimum non-whitespace characters in the body
    pub min_content_chars: usize,
    /// Timezone used when checking dates without an offset
    pub timezone: Tz,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            min_content_chars: 50,
            timezone: Tz::UTC,
        }
    }
}

/// Validate with the default rules
pub fn validate(metadata: &RawMetadata, content: &str) -> Vec<ValidationError> {
    validate_with(metadata, content, &ValidationRules::default())
}

/// Run every check and collect all errors; an empty result means valid
pub fn validate_with(
    metadata: &RawMetadata,
    content: &str,
    rules: &ValidationRules,
) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    for field in REQUIRED_FIELDS {
        if is_missing(metadata, field) {
            errors.push(ValidationError::new(
                ValidationErrorKind::MissingField,
                Some(field),
                format!("required field `{}` is missing", field),
                format!("add `{}: {}` to the front-matter", field, example_value(field)),
            ));
        }
    }

    for field in TEXT_FIELDS {
        if let Some(kind) = metadata.get(field).and_then(non_scalar_kind) {
            errors.push(ValidationError::new(
                ValidationErrorKind::MissingField,
                Some(field),
                format!("`{}` must be a single text value, found a {}", field, kind),
                format!("write `{}: {}` as plain text", field, example_value(field)),
            ));
        }
    }

    for field in ["pubDate", "modifiedDate"] {
        let problem = match metadata.get(field) {
            Some(MetaValue::Scalar(raw)) if !raw.trim().is_empty() => {
                let raw = raw.trim();
                parse_date(raw, rules.timezone)
                    .is_none()
                    .then(|| format!("`{}` is not a valid date", raw))
            }
            Some(value) => non_scalar_kind(value)
                .map(|kind| format!("`{}` must be a single date, found a {}", field, kind)),
            None => None,
        };
        if let Some(message) = problem {
            errors.push(ValidationError::new(
                ValidationErrorKind::InvalidDate,
                Some(field),
                message,
                "use an ISO 8601 date such as 2024-02-20 or 2024-02-20T09:30:00Z",
            ));
        }
    }

    let image_problem = match metadata.get("heroImage") {
        Some(MetaValue::Scalar(image)) if !image.trim().is_empty() => {
            let image = image.trim();
            (!is_valid_image_ref(image))
                .then(|| format!("`{}` is neither an absolute URL nor a relative path", image))
        }
        Some(value) => non_scalar_kind(value)
            .map(|kind| format!("`heroImage` must be a single URL, found a {}", kind)),
        None => None,
    };
    if let Some(message) = image_problem {
        errors.push(ValidationError::new(
            ValidationErrorKind::InvalidUrl,
            Some("heroImage"),
            message,
            "use an absolute URL (https://...) or a path starting with ./ or ../",
        ));
    }

    if !is_missing(metadata, "tags") {
        if let Some(problem) = metadata.get("tags").and_then(tags_problem) {
            errors.push(ValidationError::new(
                ValidationErrorKind::InvalidTags,
                Some("tags"),
                problem,
                "provide a list such as [rust, web] or a comma-separated string",
            ));
        }
    }

    let chars = content_chars(content);
    if chars < rules.min_content_chars {
        errors.push(ValidationError::new(
            ValidationErrorKind::ContentTooShort,
            None,
            format!(
                "content has {} non-whitespace characters, at least {} are required",
                chars, rules.min_content_chars
            ),
            format!(
                "add at least {} more characters to the body",
                rules.min_content_chars - chars
            ),
        ));
    }

    errors
}

fn is_missing(metadata: &RawMetadata, field: &str) -> bool {
    metadata.get(field).map_or(true, |v| v.is_blank())
}

fn example_value(field: &str) -> &'static str {
    match field {
        "pubDate" => "2024-02-20",
        "heroImage" => "./images/hero.png",
        "tags" => "[tag-one, tag-two]",
        "category" => "Engineering",
        _ => "...",
    }
}

/// `list` or `map` for structured values, `None` for scalars and null
fn non_scalar_kind(value: &MetaValue) -> Option<&'static str> {
    match value {
        MetaValue::List(_) => Some("list"),
        MetaValue::Map(_) => Some("map"),
        MetaValue::Null | MetaValue::Scalar(_) => None,
    }
}

/// Absolute URL, or a `./` / `../` relative path
pub fn is_valid_image_ref(s: &str) -> bool {
    s.starts_with("./") || s.starts_with("../") || is_absolute_url(s)
}

/// Web schemes need `//host`, `file:` needs `//`, any other scheme
/// (`data:`, `mailto:`) only a non-empty remainder
fn is_absolute_url(s: &str) -> bool {
    let Some(caps) = ABSOLUTE_URL_RE.captures(s) else {
        return false;
    };
    let scheme = caps[1].to_ascii_lowercase();
    let rest = &caps[2];

    if HOST_SCHEMES.contains(&scheme.as_str()) {
        AUTHORITY_RE.is_match(rest)
    } else if scheme == "file" {
        rest.starts_with("//")
    } else {
        true
    }
}

fn tags_problem(value: &MetaValue) -> Option<String> {
    let Some(tags) = coerce_tags(value) else {
        return Some("tags must be strings".to_string());
    };

    if tags.is_empty() {
        return Some("at least one tag is required".to_string());
    }

    tags.iter()
        .position(String::is_empty)
        .map(|i| format!("tag #{} is empty", i + 1))
}

fn content_chars(content: &str) -> usize {
    content.trim().chars().filter(|c| !c.is_whitespace()).count()
}
