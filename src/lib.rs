//! postkit: a markdown blog content pipeline
//!
//! This crate reads a directory of markdown posts with YAML front-matter,
//! validates them, normalizes them into typed posts and serves them through
//! a small read-only JSON API.

pub mod commands;
pub mod config;
pub mod content;
pub mod ratelimit;
pub mod server;

use anyhow::Result;
use std::path::{Path, PathBuf};

use content::{
    MarkdownRenderer, NormalizeOptions, PostRepository, RepositoryOptions, ValidationRules,
};

/// Name of the site configuration file in the base directory
pub const CONFIG_FILE: &str = "_config.yml";

/// A blog site rooted at a base directory
#[derive(Debug, Clone)]
pub struct Site {
    /// Site configuration
    pub config: config::SiteConfig,
    /// Base directory
    pub base_dir: PathBuf,
    /// Directory holding the post files
    pub content_dir: PathBuf,
}

impl Site {
    /// Open a site, loading `_config.yml` when present
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let base_dir = base_dir.as_ref();
        let config_path = base_dir.join(CONFIG_FILE);

        let config = if config_path.exists() {
            config::SiteConfig::load(&config_path)?
        } else {
            tracing::debug!("No {} in {:?}, using defaults", CONFIG_FILE, base_dir);
            config::SiteConfig::default()
        };

        Ok(Self::with_config(base_dir, config))
    }

    /// Open a site with an explicit configuration
    pub fn with_config<P: AsRef<Path>>(base_dir: P, config: config::SiteConfig) -> Self {
        let base_dir = base_dir.as_ref().to_path_buf();
        let content_dir = base_dir.join(&config.content_dir);

        Self {
            config,
            base_dir,
            content_dir,
        }
    }

    /// Pipeline settings derived from the configuration
    pub fn repository_options(&self) -> Result<RepositoryOptions> {
        let timezone = self.config.tz()?;

        Ok(RepositoryOptions {
            extension: self.config.extension.trim_start_matches('.').to_string(),
            rules: ValidationRules {
                min_content_chars: self.config.min_content_chars,
                timezone,
            },
            normalize: NormalizeOptions {
                timezone,
                words_per_minute: self.config.words_per_minute,
                default_author: self.config.default_author.clone(),
                default_author_image: self.config.default_author_image.clone(),
            },
        })
    }

    /// Repository over the content directory
    pub fn repository(&self) -> Result<PostRepository> {
        Ok(PostRepository::new(
            &self.content_dir,
            self.repository_options()?,
        ))
    }

    /// Markdown renderer configured for this site
    pub fn renderer(&self) -> MarkdownRenderer {
        MarkdownRenderer::with_options(&self.config.highlight_theme, self.config.line_numbers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_site_defaults_without_config() {
        let dir = TempDir::new().unwrap();
        let site = Site::new(dir.path()).unwrap();

        assert_eq!(site.content_dir, dir.path().join("content/blog"));
        let options = site.repository_options().unwrap();
        assert_eq!(options.extension, "md");
        assert_eq!(options.rules.min_content_chars, 50);
        assert_eq!(options.normalize.words_per_minute, 200);
    }

    #[test]
    fn test_site_reads_config() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            "content_dir: posts\nextension: .mdx\ntimezone: Europe/Berlin\ndefault_author: Ada\n",
        )
        .unwrap();

        let site = Site::new(dir.path()).unwrap();
        assert_eq!(site.content_dir, dir.path().join("posts"));

        let repo = site.repository().unwrap();
        assert_eq!(repo.content_dir(), dir.path().join("posts"));
        assert_eq!(repo.options().extension, "mdx");
        assert_eq!(repo.options().normalize.timezone, chrono_tz::Europe::Berlin);
        assert_eq!(repo.options().normalize.default_author, "Ada");
    }

    #[test]
    fn test_site_rejects_bad_config() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "timezone: Nowhere/Land\n").unwrap();

        assert!(Site::new(dir.path()).is_err());
    }
}
