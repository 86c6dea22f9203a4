//! List posts and slugs

use anyhow::Result;

use crate::content::PostMeta;
use crate::Site;

/// List posts, newest first
pub fn run(site: &Site, json: bool) -> Result<()> {
    let report = site.repository()?.load_all();

    if json {
        println!("{}", serde_json::to_string_pretty(&report.posts)?);
    } else {
        println!("Posts ({}):", report.posts.len());
        for post in &report.posts {
            println!("  {}", format_post_line(post));
        }
    }

    if !report.skipped.is_empty() {
        eprintln!(
            "Skipped {} file(s), run `postkit check` for details",
            report.skipped.len()
        );
    }

    Ok(())
}

/// List slugs, one per line
pub fn slugs(site: &Site) -> Result<()> {
    for slug in site.repository()?.get_all_post_slugs() {
        println!("{}", slug);
    }
    Ok(())
}

/// `2024-02-20  my-post  My Post [tag, tag] (3 min)`
pub fn format_post_line(post: &PostMeta) -> String {
    let date = post.pub_date.format("%Y-%m-%d");
    let tags = if post.tags.is_empty() {
        String::new()
    } else {
        format!(" [{}]", post.tags.join(", "))
    };

    format!(
        "{}  {}  {}{} ({} min)",
        date, post.slug, post.title, tags, post.reading_time
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_format_post_line() {
        let date = Utc.with_ymd_and_hms(2024, 2, 20, 9, 30, 0).unwrap();
        let mut post = PostMeta {
            slug: "hello".to_string(),
            title: "Hello".to_string(),
            description: "d".to_string(),
            category: "c".to_string(),
            pub_date: date,
            modified_date: date,
            hero_image: "./h.png".to_string(),
            tags: vec!["rust".to_string(), "web".to_string()],
            author: "a".to_string(),
            author_image: "./a.png".to_string(),
            word_count: 450,
            reading_time: 3,
            source: None,
        };

        assert_eq!(
            format_post_line(&post),
            "2024-02-20  hello  Hello [rust, web] (3 min)"
        );

        post.tags.clear();
        assert_eq!(format_post_line(&post), "2024-02-20  hello  Hello (3 min)");
    }
}
