//! Post models

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::date::serialize_iso;

/// Post metadata, everything but the body
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostMeta {
    /// URL-friendly identifier, always `[a-z0-9-]+`
    pub slug: String,

    /// Post title
    pub title: String,

    /// Short summary
    pub description: String,

    /// Primary category
    pub category: String,

    /// Publication date
    #[serde(serialize_with = "serialize_iso")]
    pub pub_date: DateTime<Utc>,

    /// Last modification date, `pub_date` unless authored
    #[serde(serialize_with = "serialize_iso")]
    pub modified_date: DateTime<Utc>,

    /// Absolute URL or `./` / `../` relative path
    pub hero_image: String,

    /// Tags in authored order
    pub tags: Vec<String>,

    pub author: String,

    pub author_image: String,

    /// Whitespace-delimited tokens in the content
    pub word_count: usize,

    /// Minutes, at least 1
    pub reading_time: usize,

    /// File name the post was loaded from
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// A blog post
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Post {
    #[serde(flatten)]
    pub meta: PostMeta,

    /// Normalized markdown body
    pub content: String,
}

impl Post {
    pub fn slug(&self) -> &str {
        &self.meta.slug
    }

    /// Drop the body, keeping only the metadata
    pub fn into_meta(self) -> PostMeta {
        self.meta
    }
}

/// A post together with its rendered HTML
#[derive(Debug, Clone, Serialize)]
pub struct RenderedPost {
    #[serde(flatten)]
    pub post: Post,

    pub html: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample() -> Post {
        let date = Utc.with_ymd_and_hms(2024, 2, 20, 0, 0, 0).unwrap();
        Post {
            meta: PostMeta {
                slug: "hello-world".to_string(),
                title: "Hello World".to_string(),
                description: "A first post".to_string(),
                category: "news".to_string(),
                pub_date: date,
                modified_date: date,
                hero_image: "./hero.png".to_string(),
                tags: vec!["intro".to_string()],
                author: "Ada".to_string(),
                author_image: "./ada.png".to_string(),
                word_count: 2,
                reading_time: 1,
                source: None,
            },
            content: "Hello there".to_string(),
        }
    }

    #[test]
    fn test_serializes_camel_case_iso_dates() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["pubDate"], "2024-02-20T00:00:00.000Z");
        assert_eq!(json["modifiedDate"], "2024-02-20T00:00:00.000Z");
        assert_eq!(json["heroImage"], "./hero.png");
        assert_eq!(json["readingTime"], 1);
        assert_eq!(json["content"], "Hello there");
        assert!(json.get("source").is_none());
        assert!(json.get("meta").is_none());
    }

    #[test]
    fn test_rendered_post_flattens() {
        let rendered = RenderedPost {
            post: sample(),
            html: "<p>Hello there</p>".to_string(),
        };
        let json = serde_json::to_value(rendered).unwrap();
        assert_eq!(json["slug"], "hello-world");
        assert_eq!(json["html"], "<p>Hello there</p>");
    }
}
