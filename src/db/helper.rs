use actix::prelude::*;

use super::executor::*;
use crate::db::{self, models::*, PostType, Vote};


#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("MailboxError: {0}")]
    MailboxError(MailboxError),
    #[error("DatabaseError: {0}")]
    DatabaseError(#[from] diesel::result::Error),
}

impl From<MailboxError> for Error {
    fn from(e: MailboxError) -> Self {
        Self::MailboxError(e)
    }
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::DatabaseError(diesel::result::Error::NotFound))
    }
}


/// Async front of the [`Executor`] pool.
#[derive(Clone)]
pub struct Helper {
    executor: Addr<Executor>,
}

impl Helper {
    pub fn new(executor: Addr<Executor>) -> Self {
        Helper { executor }
    }

    async fn send<M, T>(&self, msg: M) -> Result<T, Error>
    where
        M: Message<Result = diesel::QueryResult<T>> + Send + 'static,
        T: Send + 'static,
        Executor: Handler<M>,
    {
        Ok(self.executor.send(msg).await??)
    }

    pub async fn create_user(&self, user: NewUser) -> Result<User, Error> {
        self.send(CreateUser(user)).await
    }

    pub async fn find_users_with_email(&self) -> Result<Vec<User>, Error> {
        self.send(FindUsersWithEmail).await
    }

    pub async fn create_author(&self, user_id: db::Id) -> Result<Author, Error> {
        self.send(CreateAuthor(user_id)).await
    }

    pub async fn update_author_rating(&self, author_id: db::Id) -> Result<Author, Error> {
        self.send(UpdateAuthorRating(author_id)).await
    }

    pub async fn create_category(&self, name: String) -> Result<Category, Error> {
        self.send(CreateCategory { name }).await
    }

    #[cfg(test)]
    pub async fn get_category_by_name(&self, name: String) -> Result<Option<Category>, Error> {
        self.send(GetCategoryByName(name)).await
    }

    pub async fn get_or_create_category(&self, name: String) -> Result<Category, Error> {
        self.send(GetOrCreateCategory { name }).await
    }

    pub async fn create_post(
        &self,
        post: NewPost,
        categories: Vec<db::Id>,
    ) -> Result<Post, Error> {
        self.send(CreatePost { post, categories }).await
    }

    pub async fn get_post(&self, id: db::Id) -> Result<Post, Error> {
        self.send(GetPost(id)).await
    }

    pub async fn get_post_categories(&self, id: db::Id) -> Result<Vec<Category>, Error> {
        self.send(GetPostCategories(id)).await
    }

    pub async fn update_post(
        &self,
        id: db::Id,
        changes: PostChanges,
        categories: Option<Vec<db::Id>>,
    ) -> Result<Post, Error> {
        self.send(UpdatePost {
            id,
            changes,
            categories,
        })
        .await
    }

    pub async fn delete_post(&self, id: db::Id) -> Result<usize, Error> {
        self.send(DeletePost(id)).await
    }

    pub async fn delete_category_posts(
        &self,
        category_name: String,
        post_type: Option<PostType>,
    ) -> Result<usize, Error> {
        self.send(DeleteCategoryPosts {
            category_name,
            post_type,
        })
        .await
    }

    pub async fn vote_post(
        &self,
        post_id: db::Id,
        user_id: db::Id,
        vote: Vote,
    ) -> Result<Post, Error> {
        self.send(VotePost {
            post_id,
            user_id,
            vote,
        })
        .await
    }

    pub async fn create_comment(&self, comment: NewComment) -> Result<Comment, Error> {
        self.send(CreateComment(comment)).await
    }

    pub async fn vote_comment(
        &self,
        comment_id: db::Id,
        user_id: db::Id,
        vote: Vote,
    ) -> Result<Comment, Error> {
        self.send(VoteComment {
            comment_id,
            user_id,
            vote,
        })
        .await
    }

    pub async fn subscribe(&self, user_id: db::Id, category_id: db::Id) -> Result<(), Error> {
        self.send(Subscribe {
            user_id,
            category_id,
        })
        .await
    }

    pub async fn unsubscribe(&self, user_id: db::Id, category_id: db::Id) -> Result<(), Error> {
        self.send(Unsubscribe {
            user_id,
            category_id,
        })
        .await
    }

    pub async fn replace_subscriptions(
        &self,
        user_id: db::Id,
        categories: Vec<db::Id>,
    ) -> Result<(), Error> {
        self.send(ReplaceSubscriptions {
            user_id,
            categories,
        })
        .await
    }

    pub async fn get_user_categories(&self, user_id: db::Id) -> Result<Vec<db::Id>, Error> {
        self.send(GetUserCategories(user_id)).await
    }

    pub async fn find_subscribers(
        &self,
        categories: Vec<db::Id>,
    ) -> Result<Vec<Subscriber>, Error> {
        self.send(FindSubscribers(categories)).await
    }

    pub async fn find_recent_posts(
        &self,
        categories: Vec<db::Id>,
        since: chrono::NaiveDateTime,
        post_type: PostType,
    ) -> Result<Vec<Post>, Error> {
        self.send(FindRecentPosts {
            categories,
            since,
            post_type,
        })
        .await
    }
}
