//! Show a single post

use anyhow::Result;

use crate::Site;

/// Print a post as JSON, optionally with rendered HTML
pub fn run(site: &Site, slug: &str, html: bool) -> Result<()> {
    let post = site
        .repository()?
        .get_post_by_slug(slug)
        .ok_or_else(|| anyhow::anyhow!("Post not found: {}", slug))?;

    let output = if html {
        serde_json::to_string_pretty(&site.renderer().render_post(post))?
    } else {
        serde_json::to_string_pretty(&post)?
    };
    println!("{}", output);

    Ok(())
}
