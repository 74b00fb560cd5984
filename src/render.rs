use askama::Template;
use std::borrow::Cow;

use crate::db::models::{Category, Post};
use crate::db::PostType;

/// Number of characters of a post kept in summaries.
pub const SUMMARY_LENGTH: usize = 124;


#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}


/// First [`SUMMARY_LENGTH`] characters of `text`, followed by `...` if anything was cut.
pub fn summarize(text: &str) -> Cow<'_, str> {
    match text.char_indices().nth(SUMMARY_LENGTH) {
        Some((end, _)) => Cow::Owned(format!("{}...", &text[..end])),
        None => Cow::Borrowed(text),
    }
}

/// Absolute link to a post's page on `site_url`.
pub fn post_url(site_url: &str, post: &Post) -> String {
    format!(
        "{}/{}/{}/",
        site_url.trim_end_matches('/'),
        post.post_type.path_segment(),
        post.id
    )
}

fn category_names(categories: &[Category]) -> String {
    categories
        .iter()
        .map(|category| category.name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}


/// Plain-text and HTML versions of the same message.
#[derive(Debug, Clone)]
pub struct Rendered {
    pub subject: String,
    pub text: String,
    pub html: String,
}


/// Notification about a single new post.
#[derive(Debug, Clone)]
pub struct PostNotice {
    pub username: String,
    pub kind: PostType,
    pub categories: String,
    pub title: String,
    pub summary: String,
    pub link: String,
}

#[derive(Template)]
#[template(path = "post_notification.txt")]
struct PostNoticeText<'a> {
    notice: &'a PostNotice,
}

#[derive(Template)]
#[template(path = "post_notification.html")]
struct PostNoticeHtml<'a> {
    notice: &'a PostNotice,
}

impl PostNotice {
    pub fn new(username: &str, post: &Post, categories: &[Category], site_url: &str) -> Self {
        PostNotice {
            username: username.to_owned(),
            kind: post.post_type,
            categories: category_names(categories),
            title: post.title.clone(),
            summary: summarize(&post.content).into_owned(),
            link: post_url(site_url, post),
        }
    }

    pub fn subject(&self) -> String {
        if self.categories.is_empty() {
            format!("New {}: {}", self.kind, self.title)
        } else {
            format!("New {} in {}: {}", self.kind, self.categories, self.title)
        }
    }

    pub fn render(&self) -> Result<Rendered, Error> {
        Ok(Rendered {
            subject: self.subject(),
            text: PostNoticeText { notice: self }.render()?,
            html: PostNoticeHtml { notice: self }.render()?,
        })
    }
}


#[derive(Debug, Clone)]
pub struct DigestEntry {
    pub title: String,
    pub link: String,
    pub summary: String,
    pub published: String,
}

impl DigestEntry {
    pub fn new(post: &Post, site_url: &str) -> Self {
        DigestEntry {
            title: post.title.clone(),
            link: post_url(site_url, post),
            summary: summarize(&post.content).into_owned(),
            published: post.created_at.format("%Y-%m-%d %H:%M UTC").to_string(),
        }
    }
}

/// A user's weekly list of new articles.
#[derive(Debug, Clone)]
pub struct WeeklyDigest {
    pub username: String,
    pub articles: Vec<DigestEntry>,
}

#[derive(Template)]
#[template(path = "weekly_digest.txt")]
struct WeeklyDigestText<'a> {
    digest: &'a WeeklyDigest,
}

#[derive(Template)]
#[template(path = "weekly_digest.html")]
struct WeeklyDigestHtml<'a> {
    digest: &'a WeeklyDigest,
}

impl WeeklyDigest {
    pub const SUBJECT: &'static str = "Weekly digest: new articles";

    pub fn new(username: &str, posts: &[Post], site_url: &str) -> Self {
        WeeklyDigest {
            username: username.to_owned(),
            articles: posts
                .iter()
                .map(|post| DigestEntry::new(post, site_url))
                .collect(),
        }
    }

    pub fn render(&self) -> Result<Rendered, Error> {
        Ok(Rendered {
            subject: Self::SUBJECT.to_owned(),
            text: WeeklyDigestText { digest: self }.render()?,
            html: WeeklyDigestHtml { digest: self }.render()?,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn post(post_type: PostType, title: &str, content: &str) -> Post {
        let created_at = chrono::NaiveDate::from_ymd(2024, 3, 1).and_hms(9, 30, 0);

        Post {
            id: db::Id::from(42),
            author_id: db::Id::from(1),
            post_type,
            title: title.to_owned(),
            content: content.to_owned(),
            created_at,
            updated_at: created_at,
            rating: 0,
            published: true,
        }
    }

    #[test]
    fn short_text_is_kept() {
        let text = "a".repeat(SUMMARY_LENGTH);

        assert_eq!(summarize(&text), text.as_str());
        assert_eq!(summarize(""), "");
    }

    #[test]
    fn long_text_is_cut() {
        let text = "a".repeat(SUMMARY_LENGTH + 1);

        assert_eq!(summarize(&text), format!("{}...", "a".repeat(SUMMARY_LENGTH)));
    }

    #[test]
    fn cut_counts_characters() {
        let text = "é".repeat(SUMMARY_LENGTH + 10);
        let summary = summarize(&text);

        assert_eq!(summary.chars().count(), SUMMARY_LENGTH + 3);
        assert!(summary.ends_with("é..."));
    }

    #[test]
    fn links_by_post_type() {
        let article = post(PostType::Article, "t", "c");
        let news = post(PostType::News, "t", "c");

        assert_eq!(
            post_url("https://example.com/", &article),
            "https://example.com/articles/42/"
        );
        assert_eq!(post_url("https://example.com", &news), "https://example.com/news/42/");
    }

    #[test]
    fn notice_contains_title_summary_and_link() {
        let long = "word ".repeat(40);
        let post = post(PostType::Article, "Rust <3", &long);
        let categories = vec![
            Category {
                id: db::Id::from(1),
                name: "Tech".to_owned(),
            },
            Category {
                id: db::Id::from(2),
                name: "World".to_owned(),
            },
        ];

        let rendered = PostNotice::new("alice", &post, &categories, "https://example.com")
            .render()
            .unwrap();

        assert_eq!(rendered.subject, "New article in Tech, World: Rust <3");
        assert!(rendered.text.contains("Hello, alice!"));
        assert!(rendered.text.contains("Rust <3"));
        assert!(rendered.text.contains(summarize(&long).as_ref()));
        assert!(rendered.text.contains("https://example.com/articles/42/"));
        assert!(rendered.html.contains("Rust &lt;3"));
    }

    #[test]
    fn digest_lists_every_article() {
        let posts = vec![
            post(PostType::Article, "First", "one"),
            post(PostType::Article, "Second", "two"),
        ];

        let rendered = WeeklyDigest::new("bob", &posts, "https://example.com")
            .render()
            .unwrap();

        assert_eq!(rendered.subject, WeeklyDigest::SUBJECT);
        assert!(rendered.text.contains("- First: https://example.com/articles/42/"));
        assert!(rendered.text.contains("Second"));
        assert!(rendered.text.contains("2024-03-01 09:30 UTC"));
        assert!(rendered.html.contains("<li>"));
    }
}
