use std::fmt::{self, Display};

use super::schema::*;
use crate::db::{self, PostType};

#[derive(Debug, Clone, Identifiable, Queryable)]
pub struct User {
    pub id: db::Id,
    pub username: String,
    pub email: Option<String>,
}

impl User {
    /// Trimmed e-mail address, if the user has a non-empty one.
    pub fn mailbox(&self) -> Option<&str> {
        self.email
            .as_deref()
            .map(str::trim)
            .filter(|email| !email.is_empty())
    }
}

impl Display for User {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} ({})", self.username, self.id)
    }
}

#[derive(Debug, Insertable)]
#[table_name = "users"]
pub struct NewUser {
    pub username: String,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Identifiable, Queryable)]
pub struct Author {
    pub id: db::Id,
    pub user_id: db::Id,
    pub rating: i32,
}

#[derive(Debug, Insertable)]
#[table_name = "authors"]
pub struct NewAuthor<'a> {
    pub user_id: &'a db::Id,
}

#[derive(Debug, Clone, Eq, PartialEq, Identifiable, Queryable)]
#[table_name = "categories"]
pub struct Category {
    pub id: db::Id,
    pub name: String,
}

#[derive(Debug, Insertable)]
#[table_name = "categories"]
pub struct NewCategory<'a> {
    pub name: &'a str,
}

#[derive(Debug, Clone, Identifiable, Queryable)]
pub struct Post {
    pub id: db::Id,
    pub author_id: db::Id,
    pub post_type: PostType,
    pub title: String,
    pub content: String,
    pub created_at: chrono::NaiveDateTime,
    pub updated_at: chrono::NaiveDateTime,
    pub rating: i32,
    pub published: bool,
}

impl Display for Post {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} {} ({:?})", self.post_type, self.id, self.title)
    }
}

#[derive(Debug, Clone, Insertable)]
#[table_name = "posts"]
pub struct NewPost {
    pub author_id: db::Id,
    pub post_type: PostType,
    pub title: String,
    pub content: String,
    pub created_at: chrono::NaiveDateTime,
    pub updated_at: chrono::NaiveDateTime,
    pub rating: i32,
    pub published: bool,
}

impl NewPost {
    /// A published post stamped with the current time.
    pub fn new(author_id: db::Id, post_type: PostType, title: &str, content: &str) -> Self {
        let now = chrono::Utc::now().naive_utc();

        Self {
            author_id,
            post_type,
            title: title.to_owned(),
            content: content.to_owned(),
            created_at: now,
            updated_at: now,
            rating: 0,
            published: true,
        }
    }
}

/// Partial update of a post, `None` fields are left untouched.
#[derive(Debug, Default, AsChangeset)]
#[table_name = "posts"]
pub struct PostChanges {
    pub title: Option<String>,
    pub content: Option<String>,
    pub published: Option<bool>,
    pub updated_at: Option<chrono::NaiveDateTime>,
}

#[derive(Debug, Insertable)]
#[table_name = "post_categories"]
pub struct NewPostCategory<'a> {
    pub post_id: &'a db::Id,
    pub category_id: &'a db::Id,
}

#[derive(Debug, Insertable)]
#[table_name = "subscriptions"]
pub struct NewSubscription<'a> {
    pub user_id: &'a db::Id,
    pub category_id: &'a db::Id,
}

/// Someone to notify: a subscriber with a usable e-mail address.
#[derive(Debug, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub struct Subscriber {
    pub username: String,
    pub email: String,
}

#[derive(Debug, Clone, Identifiable, Queryable)]
pub struct Comment {
    pub id: db::Id,
    pub post_id: db::Id,
    pub user_id: db::Id,
    pub text: String,
    pub created_at: chrono::NaiveDateTime,
    pub rating: i32,
}

#[derive(Debug, Insertable)]
#[table_name = "comments"]
pub struct NewComment {
    pub post_id: db::Id,
    pub user_id: db::Id,
    pub text: String,
    pub created_at: chrono::NaiveDateTime,
    pub rating: i32,
}

#[derive(Debug, Insertable)]
#[table_name = "post_votes"]
pub struct NewPostVote<'a> {
    pub post_id: &'a db::Id,
    pub user_id: &'a db::Id,
    pub value: i32,
}

#[derive(Debug, Insertable)]
#[table_name = "comment_votes"]
pub struct NewCommentVote<'a> {
    pub comment_id: &'a db::Id,
    pub user_id: &'a db::Id,
    pub value: i32,
}
