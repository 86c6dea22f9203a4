//! Front-matter parsing
//!
//! Splits a raw document into its YAML metadata block and the markdown body.
//! Metadata stays loosely typed here: every scalar is kept as text so that
//! dates and numbers reach the validator exactly as they were authored.

use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;

/// Errors raised while splitting or decoding a document
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("malformed document: expected a front-matter block delimited by two `---` lines")]
    MalformedDocument,

    #[error("invalid YAML front-matter: {message}")]
    InvalidYaml { message: String },
}

/// A loosely typed front-matter value
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum MetaValue {
    Null,
    /// Strings, numbers and booleans, in their textual form
    Scalar(String),
    List(Vec<MetaValue>),
    Map(RawMetadata),
}

impl MetaValue {
    /// The scalar text, if this is a scalar
    pub fn as_str(&self) -> Option<&str> {
        match self {
            MetaValue::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// Null or a whitespace-only scalar
    pub fn is_blank(&self) -> bool {
        match self {
            MetaValue::Null => true,
            MetaValue::Scalar(s) => s.trim().is_empty(),
            MetaValue::List(_) | MetaValue::Map(_) => false,
        }
    }
}

impl From<serde_yaml::Value> for MetaValue {
    fn from(value: serde_yaml::Value) -> Self {
        use serde_yaml::Value;

        match value {
            Value::Null => MetaValue::Null,
            Value::Bool(b) => MetaValue::Scalar(b.to_string()),
            Value::Number(n) => MetaValue::Scalar(n.to_string()),
            Value::String(s) => MetaValue::Scalar(s),
            Value::Sequence(items) => MetaValue::List(items.into_iter().map(Into::into).collect()),
            Value::Mapping(mapping) => MetaValue::Map(RawMetadata::from_mapping(mapping)),
            Value::Tagged(tagged) => tagged.value.into(),
        }
    }
}

/// Front-matter as an ordered key/value mapping, before any schema is applied
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct RawMetadata(IndexMap<String, MetaValue>);

impl RawMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    fn from_mapping(mapping: serde_yaml::Mapping) -> Self {
        let entries = mapping
            .into_iter()
            .map(|(key, value)| (key_to_string(key), MetaValue::from(value)))
            .collect();
        Self(entries)
    }

    pub fn get(&self, key: &str) -> Option<&MetaValue> {
        self.0.get(key)
    }

    /// Scalar value for `key`, trimmed; `None` when absent, blank or not a scalar
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key)
            .and_then(MetaValue::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: MetaValue) -> Option<MetaValue> {
        self.0.insert(key.into(), value)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Render a YAML mapping key as a string
fn key_to_string(key: serde_yaml::Value) -> String {
    use serde_yaml::Value;

    match key {
        Value::String(s) => s,
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null => "null".to_string(),
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim().to_string())
            .unwrap_or_default(),
    }
}

/// A document split into metadata and body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub metadata: RawMetadata,
    pub content: String,
}

/// Split a raw document into front-matter and content.
///
/// The first line that is exactly `---` opens the metadata block and the next
/// one closes it. Later `---` lines are ordinary content (markdown thematic
/// breaks). Anything before the opening line is discarded.
pub fn parse(raw: &str) -> Result<Document, ParseError> {
    let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);

    let mut opening_end: Option<usize> = None;
    let mut offset = 0;

    for line in raw.split_inclusive('\n') {
        let line_end = offset + line.len();
        if is_delimiter(line) {
            match opening_end {
                None => opening_end = Some(line_end),
                Some(block_start) => {
                    let metadata = parse_metadata(&raw[block_start..offset])?;
                    return Ok(Document {
                        metadata,
                        content: raw[line_end..].to_string(),
                    });
                }
            }
        }
        offset = line_end;
    }

    Err(ParseError::MalformedDocument)
}

fn is_delimiter(line: &str) -> bool {
    line.trim_end() == "---"
}

fn parse_metadata(block: &str) -> Result<RawMetadata, ParseError> {
    if block.trim().is_empty() {
        return Ok(RawMetadata::new());
    }

    let value: serde_yaml::Value =
        serde_yaml::from_str(block).map_err(|e| ParseError::InvalidYaml {
            message: e.to_string(),
        })?;

    match value {
        serde_yaml::Value::Mapping(mapping) => Ok(RawMetadata::from_mapping(mapping)),
        // A block holding only comments
        serde_yaml::Value::Null => Ok(RawMetadata::new()),
        other => Err(ParseError::InvalidYaml {
            message: format!("expected a mapping of keys to values, found {}", kind_of(&other)),
        }),
    }
}

fn kind_of(value: &serde_yaml::Value) -> &'static str {
    use serde_yaml::Value;

    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}
