//! Content module - parses, validates and normalizes blog posts
//!
//! The pipeline runs in four steps:
//!
//! 1. [`frontmatter::parse`] splits a raw file into [`RawMetadata`] and body.
//! 2. [`validate()`] reports every problem with the metadata and body.
//! 3. [`normalize()`] projects the loose metadata into a typed [`Post`].
//! 4. [`PostRepository`] runs the steps over a content directory.

pub mod date;
pub mod frontmatter;
mod markdown;
pub mod normalize;
mod post;
pub mod repository;
pub mod validate;

pub use frontmatter::{Document, MetaValue, ParseError, RawMetadata};
pub use markdown::MarkdownRenderer;
pub use normalize::{normalize, normalize_with, NormalizeError, NormalizeOptions};
pub use post::{Post, PostMeta, RenderedPost};
pub use repository::{LoadError, LoadReport, PostRepository, RepositoryOptions, SkippedFile};
pub use validate::{validate, validate_with, ValidationError, ValidationErrorKind, ValidationRules};
