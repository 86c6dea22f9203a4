//! Create a new post

use anyhow::{Context, Result};
use chrono::Utc;
use std::fs;
use std::path::PathBuf;

use crate::content::normalize::slugify;
use crate::Site;

/// Front-matter values for a new post
#[derive(Debug, Clone, Default)]
pub struct NewPost<'a> {
    pub title: &'a str,
    pub category: Option<&'a str>,
    pub tags: Vec<String>,
}

/// Scaffold `{slug}.{ext}` in the content directory with every required field
pub fn create_post(site: &Site, new_post: &NewPost<'_>) -> Result<PathBuf> {
    let slug = slugify(new_post.title)
        .with_context(|| format!("Cannot derive a file name from title {:?}", new_post.title))?;

    fs::create_dir_all(&site.content_dir)
        .with_context(|| format!("Failed to create {:?}", site.content_dir))?;

    let extension = site.config.extension.trim_start_matches('.');
    let file_path = site.content_dir.join(format!("{}.{}", slug, extension));

    // Check if file already exists
    if file_path.exists() {
        anyhow::bail!("File already exists: {:?}", file_path);
    }

    fs::write(&file_path, scaffold(new_post))?;
    tracing::info!("Created {:?}", file_path);

    Ok(file_path)
}

fn scaffold(new_post: &NewPost<'_>) -> String {
    let today = Utc::now().format("%Y-%m-%d");
    let tags = if new_post.tags.is_empty() {
        "[draft]".to_string()
    } else {
        let quoted: Vec<String> = new_post.tags.iter().map(|t| yaml_string(t)).collect();
        format!("[{}]", quoted.join(", "))
    };

    format!(
        r#"---
title: {title}
description: {description}
pubDate: {today}
heroImage: ./images/hero.png
category: {category}
tags: {tags}
---

Write your post here. Replace this paragraph with the body of the post before publishing.
"#,
        title = yaml_string(new_post.title),
        description = yaml_string(&format!("About {}", new_post.title)),
        category = yaml_string(new_post.category.unwrap_or("General")),
    )
}

/// Double-quoted YAML scalar
fn yaml_string(s: &str) -> String {
    format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
}
