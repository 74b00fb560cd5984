use crate::db::{self, models::*, PostType, Vote};
use crate::events::{PostCreated, Publisher};

/// Content operations: everything authors and readers do to posts and subscriptions.
#[derive(Clone)]
pub struct Newsroom {
    db: db::Helper,
    events: Publisher,
}

impl Newsroom {
    pub fn new(db: db::Helper, events: Publisher) -> Self {
        Newsroom { db, events }
    }

    /// Store `post` under the named categories, creating missing ones, and announce it.
    ///
    /// Listeners are notified after the post is committed and are not waited for.
    pub async fn publish_post(
        &self,
        post: NewPost,
        category_names: &[&str],
    ) -> Result<Post, db::Error> {
        let mut categories = Vec::with_capacity(category_names.len());
        for name in category_names {
            categories.push(self.db.get_or_create_category((*name).to_owned()).await?);
        }

        let category_ids = categories.iter().map(|category| category.id).collect();
        let post = self.db.create_post(post, category_ids).await?;

        log::info!("Published {}", post);

        self.events.publish(PostCreated {
            post: post.clone(),
            categories,
        });

        Ok(post)
    }

    /// A post with its categories, or `None` if it does not exist.
    pub async fn post(&self, id: db::Id) -> Result<Option<(Post, Vec<Category>)>, db::Error> {
        let post = match self.db.get_post(id).await {
            Ok(post) => post,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };
        let categories = self.db.get_post_categories(id).await?;

        Ok(Some((post, categories)))
    }

    pub async fn edit_post(
        &self,
        id: db::Id,
        changes: PostChanges,
        category_names: Option<&[&str]>,
    ) -> Result<Post, db::Error> {
        let categories = match category_names {
            Some(names) => {
                let mut ids = Vec::with_capacity(names.len());
                for name in names {
                    ids.push(self.db.get_or_create_category((*name).to_owned()).await?.id);
                }
                Some(ids)
            }
            None => None,
        };

        self.db.update_post(id, changes, categories).await
    }

    pub async fn delete_post(&self, id: db::Id) -> Result<bool, db::Error> {
        Ok(self.db.delete_post(id).await? > 0)
    }

    /// Delete every post in a category, or only those of `post_type`.
    pub async fn purge_category(
        &self,
        category_name: &str,
        post_type: Option<PostType>,
    ) -> Result<usize, db::Error> {
        let deleted = match self
            .db
            .delete_category_posts(category_name.to_owned(), post_type)
            .await
        {
            Err(e) if e.is_not_found() => {
                log::warn!("No category named {:?}", category_name);
                return Err(e);
            }
            res => res?,
        };

        log::info!("Deleted {} post(s) from {}", deleted, category_name);

        Ok(deleted)
    }

    pub async fn like_post(&self, post: db::Id, user: db::Id) -> Result<Post, db::Error> {
        self.db.vote_post(post, user, Vote::Like).await
    }

    pub async fn dislike_post(&self, post: db::Id, user: db::Id) -> Result<Post, db::Error> {
        self.db.vote_post(post, user, Vote::Dislike).await
    }

    pub async fn comment(
        &self,
        post: db::Id,
        user: db::Id,
        text: &str,
    ) -> Result<Comment, db::Error> {
        self.db
            .create_comment(NewComment {
                post_id: post,
                user_id: user,
                text: text.to_owned(),
                created_at: chrono::Utc::now().naive_utc(),
                rating: 0,
            })
            .await
    }

    pub async fn like_comment(&self, comment: db::Id, user: db::Id) -> Result<Comment, db::Error> {
        self.db.vote_comment(comment, user, Vote::Like).await
    }

    pub async fn dislike_comment(
        &self,
        comment: db::Id,
        user: db::Id,
    ) -> Result<Comment, db::Error> {
        self.db.vote_comment(comment, user, Vote::Dislike).await
    }

    pub async fn refresh_author_rating(&self, author: db::Id) -> Result<Author, db::Error> {
        self.db.update_author_rating(author).await
    }

    pub async fn subscribe(&self, user: db::Id, category: db::Id) -> Result<(), db::Error> {
        self.db.subscribe(user, category).await
    }

    pub async fn unsubscribe(&self, user: db::Id, category: db::Id) -> Result<(), db::Error> {
        self.db.unsubscribe(user, category).await
    }

    /// Bulk replace-on-save of a user's subscriptions.
    pub async fn replace_subscriptions(
        &self,
        user: db::Id,
        categories: Vec<db::Id>,
    ) -> Result<(), db::Error> {
        self.db.replace_subscriptions(user, categories).await
    }
}


#[cfg(test)]
mod tests {
    use actix::prelude::*;
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::db::tests::memory_db;
    use crate::events::Delivery;

    type Seen = Arc<Mutex<Vec<(db::Id, Vec<String>)>>>;

    struct Recorder(Seen);

    impl Actor for Recorder {
        type Context = Context<Self>;
    }

    impl Handler<PostCreated> for Recorder {
        type Result = Result<Delivery, ()>;

        fn handle(&mut self, msg: PostCreated, _: &mut Self::Context) -> Self::Result {
            let names = msg.categories.into_iter().map(|c| c.name).collect();
            self.0.lock().unwrap().push((msg.post.id, names));
            Ok(Delivery::default())
        }
    }

    async fn newsroom() -> (Newsroom, Addr<Recorder>, Seen, Author) {
        let db = memory_db();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let recorder = Recorder(seen.clone()).start();

        let mut events = Publisher::default();
        events.subscribe(recorder.clone().recipient());

        let writer = db
            .create_user(NewUser {
                username: "writer".to_owned(),
                email: None,
            })
            .await
            .unwrap();
        let author = db.create_author(writer.id).await.unwrap();

        (Newsroom::new(db, events), recorder, seen, author)
    }

    #[actix_rt::test]
    async fn publishing_emits_post_created() {
        let (newsroom, recorder, seen, author) = newsroom().await;

        let post = newsroom
            .publish_post(
                NewPost::new(author.id, PostType::Article, "Hello", "World"),
                &["Tech", "World"],
            )
            .await
            .unwrap();

        // Flush the recorder's mailbox
        recorder
            .send(PostCreated {
                post: post.clone(),
                categories: vec![],
            })
            .await
            .unwrap()
            .unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(
            seen[0],
            (post.id, vec!["Tech".to_owned(), "World".to_owned()])
        );
    }

    #[actix_rt::test]
    async fn editing_does_not_emit() {
        let (newsroom, recorder, seen, author) = newsroom().await;

        let post = newsroom
            .publish_post(NewPost::new(author.id, PostType::News, "a", "b"), &["Tech"])
            .await
            .unwrap();
        let edited = newsroom
            .edit_post(post.id, PostChanges::default(), Some(&["Sports"][..]))
            .await
            .unwrap();

        recorder
            .send(PostCreated {
                post: edited,
                categories: vec![],
            })
            .await
            .unwrap()
            .unwrap();

        // The publication and the flush, nothing from the edit
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[actix_rt::test]
    async fn purge_and_delete() {
        let (newsroom, _recorder, _seen, author) = newsroom().await;

        let kept = newsroom
            .publish_post(NewPost::new(author.id, PostType::News, "a", "b"), &["World"])
            .await
            .unwrap();
        newsroom
            .publish_post(NewPost::new(author.id, PostType::News, "c", "d"), &["Tech"])
            .await
            .unwrap();

        assert_eq!(newsroom.purge_category("Tech", None).await.unwrap(), 1);
        assert!(newsroom
            .purge_category("Nowhere", None)
            .await
            .unwrap_err()
            .is_not_found());

        assert!(newsroom.delete_post(kept.id).await.unwrap());
        assert!(!newsroom.delete_post(kept.id).await.unwrap());
    }

    #[actix_rt::test]
    async fn post_comes_with_its_categories() {
        let (newsroom, _recorder, _seen, author) = newsroom().await;

        let post = newsroom
            .publish_post(
                NewPost::new(author.id, PostType::Article, "a", "b"),
                &["World", "Tech"],
            )
            .await
            .unwrap();

        let (found, categories) = newsroom.post(post.id).await.unwrap().unwrap();
        let names: Vec<&str> = categories.iter().map(|c| c.name.as_str()).collect();

        assert_eq!(found.id, post.id);
        assert_eq!(names, vec!["Tech", "World"]);

        newsroom.delete_post(post.id).await.unwrap();
        assert!(newsroom.post(post.id).await.unwrap().is_none());
    }
}
