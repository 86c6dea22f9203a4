//! Post repository - read-only queries over a directory of post files
//!
//! Every query goes back to disk: there is no cache to invalidate, and a file
//! that fails to load is treated as absent instead of failing the caller.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

use super::frontmatter::{self, ParseError};
use super::normalize::{is_valid_slug, normalize_with, NormalizeError, NormalizeOptions};
use super::post::{Post, PostMeta};
use super::validate::{validate_with, ValidationError, ValidationRules};

/// Why a single post file could not be loaded
#[derive(Error, Debug)]
pub enum LoadError {
    #[error("failed to read file: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("{}", InvalidSummary(.0))]
    Invalid(Vec<ValidationError>),

    #[error(transparent)]
    Normalize(#[from] NormalizeError),
}

struct InvalidSummary<'a>(&'a [ValidationError]);

impl fmt::Display for InvalidSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} validation error(s)", self.0.len())?;
        for (i, error) in self.0.iter().enumerate() {
            let sep = if i == 0 { ": " } else { "; " };
            write!(f, "{}{}", sep, error)?;
        }
        Ok(())
    }
}

/// A file left out of a batch load
#[derive(Debug)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub error: LoadError,
}

/// Result of loading every post in the content directory
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Newest first
    pub posts: Vec<PostMeta>,
    pub skipped: Vec<SkippedFile>,
}

/// Settings for the repository pipeline
#[derive(Debug, Clone)]
pub struct RepositoryOptions {
    /// Source file extension, without the dot
    pub extension: String,
    pub rules: ValidationRules,
    pub normalize: NormalizeOptions,
}

impl Default for RepositoryOptions {
    fn default() -> Self {
        Self {
            extension: "md".to_string(),
            rules: ValidationRules::default(),
            normalize: NormalizeOptions::default(),
        }
    }
}

/// Loads posts from a content directory
#[derive(Debug, Clone)]
pub struct PostRepository {
    content_dir: PathBuf,
    options: RepositoryOptions,
}

impl PostRepository {
    /// Create a repository over `content_dir`
    pub fn new<P: Into<PathBuf>>(content_dir: P, options: RepositoryOptions) -> Self {
        Self {
            content_dir: content_dir.into(),
            options,
        }
    }

    pub fn content_dir(&self) -> &Path {
        &self.content_dir
    }

    pub fn options(&self) -> &RepositoryOptions {
        &self.options
    }

    /// Load the post whose slug is `slug`; `None` if absent or invalid.
    ///
    /// `{slug}.{ext}` is tried first. Otherwise every post file is loaded
    /// and matched on its resolved slug, so slugs derived from a title or
    /// an explicit `slug` field resolve too.
    pub fn get_post_by_slug(&self, slug: &str) -> Option<Post> {
        if !is_safe_file_stem(slug) {
            tracing::debug!("Rejected lookup key {:?}", slug);
            return None;
        }

        let path = self.path_for(slug);
        if path.is_file() {
            match self.load_file(&path) {
                Ok(post) => return Some(post),
                Err(e) => tracing::warn!("Failed to load post {:?}: {}", path, e),
            }
        }

        if !is_valid_slug(slug) {
            return None;
        }
        self.find_by_resolved_slug(slug, &path)
    }

    /// Metadata of the post whose slug is `slug`
    pub fn get_post_meta_by_slug(&self, slug: &str) -> Option<PostMeta> {
        self.get_post_by_slug(slug).map(Post::into_meta)
    }

    /// All loadable posts, newest first
    pub fn get_all_posts(&self) -> Vec<PostMeta> {
        self.load_all().posts
    }

    /// Load every post file, keeping track of the ones that failed.
    ///
    /// Posts sharing a `pub_date` keep file-name order.
    pub fn load_all(&self) -> LoadReport {
        let mut report = LoadReport::default();

        for path in self.source_files() {
            match self.load_file(&path) {
                Ok(post) => report.posts.push(post.into_meta()),
                Err(error) => {
                    tracing::warn!("Skipping post {:?}: {}", path, error);
                    report.skipped.push(SkippedFile { path, error });
                }
            }
        }

        // Stable sort, newest first
        report.posts.sort_by(|a, b| b.pub_date.cmp(&a.pub_date));

        tracing::debug!(
            "Loaded {} posts from {:?} ({} skipped)",
            report.posts.len(),
            self.content_dir,
            report.skipped.len()
        );

        report
    }

    /// File stems of all post files, without reading them
    pub fn get_all_post_slugs(&self) -> Vec<String> {
        self.source_files()
            .iter()
            .filter_map(|path| path.file_stem().and_then(|s| s.to_str()))
            .map(str::to_string)
            .collect()
    }

    /// Read, parse, validate and normalize a single file
    pub fn load_file(&self, path: &Path) -> Result<Post, LoadError> {
        let raw = fs::read_to_string(path)?;
        let doc = frontmatter::parse(&raw)?;

        let errors = validate_with(&doc.metadata, &doc.content, &self.options.rules);
        if !errors.is_empty() {
            return Err(LoadError::Invalid(errors));
        }

        let stem = path.file_stem().and_then(|s| s.to_str());
        let mut post = normalize_with(&doc.metadata, &doc.content, stem, &self.options.normalize)?;
        post.meta.source = path
            .file_name()
            .map(|name| name.to_string_lossy().to_string());

        Ok(post)
    }

    fn find_by_resolved_slug(&self, slug: &str, tried: &Path) -> Option<Post> {
        let found = self
            .source_files()
            .into_iter()
            .filter(|path| path != tried)
            .find_map(|path| match self.load_file(&path) {
                Ok(post) if post.meta.slug == slug => Some(post),
                Ok(_) => None,
                Err(e) => {
                    tracing::debug!("Ignoring {:?} while resolving {:?}: {}", path, slug, e);
                    None
                }
            });

        if found.is_none() {
            tracing::debug!("No post with slug {:?}", slug);
        }
        found
    }

    fn path_for(&self, slug: &str) -> PathBuf {
        self.content_dir
            .join(format!("{}.{}", slug, self.options.extension))
    }

    /// Post files directly inside the content directory, sorted by name
    fn source_files(&self) -> Vec<PathBuf> {
        if !self.content_dir.is_dir() {
            tracing::warn!("Content directory {:?} is not readable", self.content_dir);
            return Vec::new();
        }

        WalkDir::new(&self.content_dir)
            .min_depth(1)
            .max_depth(1)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(e) => {
                    tracing::warn!("Failed to read directory entry: {}", e);
                    None
                }
            })
            .map(|entry| entry.into_path())
            .filter(|path| path.is_file() && self.is_source_file(path))
            .collect()
    }

    fn is_source_file(&self, path: &Path) -> bool {
        let hidden = path
            .file_name()
            .and_then(|n| n.to_str())
            .map_or(true, |n| n.starts_with('.'));

        !hidden
            && path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e == self.options.extension)
    }
}

/// A lookup key must name a file inside the content directory
fn is_safe_file_stem(slug: &str) -> bool {
    !slug.is_empty()
        && !slug.starts_with('.')
        && !slug.contains(['/', '\\', '\0'])
}
