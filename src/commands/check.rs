//! Validate every post file and report problems

use anyhow::Result;
use std::fmt::Write as _;
use std::path::Path;

use crate::content::{LoadError, LoadReport};
use crate::Site;

/// Outcome of a check run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckSummary {
    pub valid: usize,
    pub failed: usize,
}

impl CheckSummary {
    pub fn is_ok(&self) -> bool {
        self.failed == 0
    }
}

/// Check all posts, printing each failing file with its errors
pub fn run(site: &Site) -> Result<CheckSummary> {
    let repository = site.repository()?;
    if !repository.content_dir().is_dir() {
        anyhow::bail!("Content directory {:?} does not exist", repository.content_dir());
    }

    let report = repository.load_all();
    print!("{}", render_report(&report, repository.content_dir()));

    Ok(CheckSummary {
        valid: report.posts.len(),
        failed: report.skipped.len(),
    })
}

/// Human-readable report of a load run
pub fn render_report(report: &LoadReport, content_dir: &Path) -> String {
    let mut out = String::new();

    for skipped in &report.skipped {
        let name = skipped
            .path
            .strip_prefix(content_dir)
            .unwrap_or(&skipped.path)
            .display();
        let _ = writeln!(out, "✗ {}", name);

        match &skipped.error {
            LoadError::Invalid(errors) => {
                for error in errors {
                    let _ = writeln!(out, "    {}", error);
                    if let Some(suggestion) = &error.suggestion {
                        let _ = writeln!(out, "      hint: {}", suggestion);
                    }
                }
            }
            other => {
                let _ = writeln!(out, "    {}", other);
            }
        }
    }

    let _ = writeln!(
        out,
        "{} valid, {} failed",
        report.posts.len(),
        report.skipped.len()
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_check_reports_failures() {
        let dir = TempDir::new().unwrap();
        let config = SiteConfig {
            content_dir: "posts".to_string(),
            ..Default::default()
        };
        let site = Site::with_config(dir.path(), config);
        fs::create_dir_all(&site.content_dir).unwrap();

        fs::write(
            site.content_dir.join("good.md"),
            "---\ntitle: Good\ndescription: d\npubDate: 2024-01-01\nheroImage: ./a.png\ncategory: c\ntags: [t]\n---\nThis body is long enough to pass the minimum content length check.\n",
        )
        .unwrap();
        fs::write(
            site.content_dir.join("bad.md"),
            "---\ntitle: Bad\ndescription: d\npubDate: 2024-01-01\nheroImage: nope\ncategory: c\ntags: [t]\n---\nThis body is long enough to pass the minimum content length check.\n",
        )
        .unwrap();
        fs::write(site.content_dir.join("worse.md"), "plain text").unwrap();

        let summary = run(&site).unwrap();
        assert_eq!(summary, CheckSummary { valid: 1, failed: 2 });
        assert!(!summary.is_ok());

        let report = site.repository().unwrap().load_all();
        let text = render_report(&report, &site.content_dir);
        assert!(text.contains("✗ bad.md"));
        assert!(text.contains("InvalidURL(heroImage)"));
        assert!(text.contains("hint: "));
        assert!(text.contains("✗ worse.md"));
        assert!(text.contains("malformed document"));
        assert!(text.ends_with("1 valid, 2 failed\n"));
    }

    #[test]
    fn test_check_missing_directory() {
        let dir = TempDir::new().unwrap();
        let site = Site::with_config(dir.path(), SiteConfig::default());
        assert!(run(&site).is_err());
    }
}
