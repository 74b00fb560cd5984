use actix::prelude::*;
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use std::collections::BTreeMap;
use std::rc::Rc;

use crate::db::{self, models::*, schema, PostType, Vote};

const SCHEMA: &str = include_str!("schema.sql");

pub struct Executor {
    conn: Rc<SqliteConnection>,
}

impl Executor {
    /// Open the database and make sure the schema exists.
    pub fn connect(connspec: &str) -> ConnectionResult<Self> {
        let conn = SqliteConnection::establish(connspec)?;

        conn.batch_execute(SCHEMA)
            .map_err(ConnectionError::CouldntSetupConfiguration)?;

        Ok(Executor {
            conn: Rc::new(conn),
        })
    }

    fn add_post_categories(&self, post: db::Id, categories: &[db::Id]) -> QueryResult<()> {
        use schema::post_categories::dsl::post_categories;

        for category in categories {
            diesel::insert_or_ignore_into(post_categories)
                .values(&NewPostCategory {
                    post_id: &post,
                    category_id: category,
                })
                .execute(self.conn.as_ref())?;
        }

        Ok(())
    }
}

impl Actor for Executor {
    type Context = SyncContext<Self>;
}


pub struct CreateUser(pub NewUser);

impl Message for CreateUser {
    type Result = diesel::QueryResult<User>;
}

impl Handler<CreateUser> for Executor {
    type Result = <CreateUser as Message>::Result;

    fn handle(&mut self, msg: CreateUser, _: &mut Self::Context) -> Self::Result {
        self.conn.transaction(|| {
            use schema::users::dsl::*;

            diesel::insert_into(users)
                .values(&msg.0)
                .execute(self.conn.as_ref())?;

            users.order(id.desc()).first(self.conn.as_ref())
        })
    }
}


pub struct FindUsersWithEmail;

impl Message for FindUsersWithEmail {
    type Result = diesel::QueryResult<Vec<User>>;
}

impl Handler<FindUsersWithEmail> for Executor {
    type Result = <FindUsersWithEmail as Message>::Result;

    fn handle(&mut self, _: FindUsersWithEmail, _: &mut Self::Context) -> Self::Result {
        use schema::users::dsl::*;

        let found: Vec<User> = users
            .filter(email.is_not_null())
            .order(id.asc())
            .load(self.conn.as_ref())?;

        Ok(found
            .into_iter()
            .filter(|user| user.mailbox().is_some())
            .collect())
    }
}


pub struct CreateAuthor(pub db::Id);

impl Message for CreateAuthor {
    type Result = diesel::QueryResult<Author>;
}

impl Handler<CreateAuthor> for Executor {
    type Result = <CreateAuthor as Message>::Result;

    fn handle(&mut self, msg: CreateAuthor, _: &mut Self::Context) -> Self::Result {
        self.conn.transaction(|| {
            use schema::authors::dsl::*;

            diesel::insert_into(authors)
                .values(&NewAuthor { user_id: &msg.0 })
                .execute(self.conn.as_ref())?;

            authors.order(id.desc()).first(self.conn.as_ref())
        })
    }
}


/// Recompute an author's rating from their posts and comments.
///
/// Each post counts three times its rating, the author's own comments and the comments
/// left under their posts count once.
pub struct UpdateAuthorRating(pub db::Id);

impl Message for UpdateAuthorRating {
    type Result = diesel::QueryResult<Author>;
}

impl Handler<UpdateAuthorRating> for Executor {
    type Result = <UpdateAuthorRating as Message>::Result;

    fn handle(&mut self, msg: UpdateAuthorRating, _: &mut Self::Context) -> Self::Result {
        use schema::{authors, comments, posts};

        self.conn.transaction(|| {
            let conn = self.conn.as_ref();

            let author: Author = authors::table.find(msg.0).get_result(conn)?;

            let post_ratings: Vec<(db::Id, i32)> = posts::table
                .filter(posts::author_id.eq(author.id))
                .select((posts::id, posts::rating))
                .load(conn)?;

            let own_comments: Vec<i32> = comments::table
                .filter(comments::user_id.eq(author.user_id))
                .select(comments::rating)
                .load(conn)?;

            let post_ids: Vec<db::Id> = post_ratings.iter().map(|(id, _)| *id).collect();
            let received_comments: Vec<i32> = comments::table
                .filter(comments::post_id.eq_any(post_ids))
                .select(comments::rating)
                .load(conn)?;

            let rating = post_ratings.iter().map(|(_, rating)| rating * 3).sum::<i32>()
                + own_comments.iter().sum::<i32>()
                + received_comments.iter().sum::<i32>();

            diesel::update(&author)
                .set(authors::rating.eq(rating))
                .execute(conn)?;

            Ok(Author { rating, ..author })
        })
    }
}


pub struct CreateCategory {
    pub name: String,
}

impl Message for CreateCategory {
    type Result = diesel::QueryResult<Category>;
}

impl Handler<CreateCategory> for Executor {
    type Result = <CreateCategory as Message>::Result;

    fn handle(&mut self, msg: CreateCategory, _: &mut Self::Context) -> Self::Result {
        let category = NewCategory { name: &msg.name };

        self.conn.transaction(|| {
            use schema::categories::dsl::*;

            diesel::insert_into(categories)
                .values(&category)
                .execute(self.conn.as_ref())?;

            categories.order(id.desc()).first(self.conn.as_ref())
        })
    }
}


pub struct GetCategoryByName(pub String);

impl Message for GetCategoryByName {
    type Result = diesel::QueryResult<Option<Category>>;
}

impl Handler<GetCategoryByName> for Executor {
    type Result = <GetCategoryByName as Message>::Result;

    fn handle(&mut self, msg: GetCategoryByName, _: &mut Self::Context) -> Self::Result {
        use schema::categories::dsl::*;

        let maybe_category = categories
            .filter(name.eq(&msg.0))
            .limit(1)
            .load(self.conn.as_ref())?
            .pop();

        Ok(maybe_category)
    }
}


pub struct GetOrCreateCategory {
    pub name: String,
}

impl Message for GetOrCreateCategory {
    type Result = diesel::QueryResult<Category>;
}

impl Handler<GetOrCreateCategory> for Executor {
    type Result = <GetOrCreateCategory as Message>::Result;

    fn handle(&mut self, msg: GetOrCreateCategory, ctx: &mut Self::Context) -> Self::Result {
        self.conn.clone().transaction(|| {
            self.handle(GetCategoryByName(msg.name.clone()), ctx)?
                .map(Ok)
                .unwrap_or_else(|| self.handle(CreateCategory { name: msg.name }, ctx))
        })
    }
}


pub struct CreatePost {
    pub post: NewPost,
    pub categories: Vec<db::Id>,
}

impl Message for CreatePost {
    type Result = diesel::QueryResult<Post>;
}

impl Handler<CreatePost> for Executor {
    type Result = <CreatePost as Message>::Result;

    fn handle(&mut self, msg: CreatePost, _: &mut Self::Context) -> Self::Result {
        self.conn.transaction(|| {
            use schema::posts::dsl::*;

            diesel::insert_into(posts)
                .values(&msg.post)
                .execute(self.conn.as_ref())?;

            let post: Post = posts.order(id.desc()).first(self.conn.as_ref())?;

            self.add_post_categories(post.id, &msg.categories)?;

            Ok(post)
        })
    }
}


pub struct GetPost(pub db::Id);

impl Message for GetPost {
    type Result = diesel::QueryResult<Post>;
}

impl Handler<GetPost> for Executor {
    type Result = <GetPost as Message>::Result;

    fn handle(&mut self, msg: GetPost, _: &mut Self::Context) -> Self::Result {
        use schema::posts::dsl::*;

        posts.find(msg.0).get_result(self.conn.as_ref())
    }
}


pub struct GetPostCategories(pub db::Id);

impl Message for GetPostCategories {
    type Result = diesel::QueryResult<Vec<Category>>;
}

impl Handler<GetPostCategories> for Executor {
    type Result = <GetPostCategories as Message>::Result;

    fn handle(&mut self, msg: GetPostCategories, _: &mut Self::Context) -> Self::Result {
        use schema::categories;
        use schema::post_categories::dsl::*;

        post_categories
            .filter(post_id.eq(msg.0))
            .inner_join(categories::table)
            .select(categories::all_columns)
            .order(categories::name.asc())
            .load(self.conn.as_ref())
    }
}


pub struct UpdatePost {
    pub id: db::Id,
    pub changes: PostChanges,
    /// Replaces the post's categories when set.
    pub categories: Option<Vec<db::Id>>,
}

impl Message for UpdatePost {
    type Result = diesel::QueryResult<Post>;
}

impl Handler<UpdatePost> for Executor {
    type Result = <UpdatePost as Message>::Result;

    fn handle(&mut self, msg: UpdatePost, ctx: &mut Self::Context) -> Self::Result {
        let UpdatePost {
            id,
            mut changes,
            categories,
        } = msg;

        changes.updated_at = Some(chrono::Utc::now().naive_utc());

        self.conn.clone().transaction(|| {
            use schema::post_categories::dsl::{post_categories, post_id};
            use schema::posts::dsl::posts;

            diesel::update(posts.find(id))
                .set(&changes)
                .execute(self.conn.as_ref())?;

            if let Some(categories) = categories {
                diesel::delete(post_categories.filter(post_id.eq(id)))
                    .execute(self.conn.as_ref())?;

                self.add_post_categories(id, &categories)?;
            }

            self.handle(GetPost(id), ctx)
        })
    }
}


pub struct DeletePost(pub db::Id);

impl Message for DeletePost {
    type Result = diesel::QueryResult<usize>;
}

impl Handler<DeletePost> for Executor {
    type Result = <DeletePost as Message>::Result;

    fn handle(&mut self, msg: DeletePost, _: &mut Self::Context) -> Self::Result {
        use schema::posts::dsl::*;

        // Categories, comments and votes go with it (ON DELETE CASCADE)
        diesel::delete(posts.find(msg.0)).execute(self.conn.as_ref())
    }
}


/// Delete every post filed under a category, optionally only those of one kind.
pub struct DeleteCategoryPosts {
    pub category_name: String,
    pub post_type: Option<PostType>,
}

impl Message for DeleteCategoryPosts {
    type Result = diesel::QueryResult<usize>;
}

impl Handler<DeleteCategoryPosts> for Executor {
    type Result = <DeleteCategoryPosts as Message>::Result;

    fn handle(&mut self, msg: DeleteCategoryPosts, ctx: &mut Self::Context) -> Self::Result {
        use schema::{post_categories, posts};

        let DeleteCategoryPosts {
            category_name,
            post_type,
        } = msg;

        self.conn.clone().transaction(|| {
            let category = self
                .handle(GetCategoryByName(category_name), ctx)?
                .ok_or(diesel::result::Error::NotFound)?;

            let mut query = post_categories::table
                .inner_join(posts::table)
                .filter(post_categories::category_id.eq(category.id))
                .select(posts::id)
                .into_boxed();

            if let Some(kind) = post_type {
                query = query.filter(posts::post_type.eq(kind));
            }

            let ids: Vec<db::Id> = query.load(self.conn.as_ref())?;

            diesel::delete(posts::table.filter(posts::id.eq_any(ids)))
                .execute(self.conn.as_ref())
        })
    }
}


pub struct VotePost {
    pub post_id: db::Id,
    pub user_id: db::Id,
    pub vote: Vote,
}

impl Message for VotePost {
    type Result = diesel::QueryResult<Post>;
}

impl Handler<VotePost> for Executor {
    type Result = <VotePost as Message>::Result;

    fn handle(&mut self, msg: VotePost, ctx: &mut Self::Context) -> Self::Result {
        use schema::post_votes::dsl as votes;
        use schema::posts::dsl::{posts, rating};

        let VotePost {
            post_id,
            user_id,
            vote,
        } = msg;

        self.conn.clone().transaction(|| {
            let previous: Option<i32> = votes::post_votes
                .find((post_id, user_id))
                .select(votes::value)
                .first(self.conn.as_ref())
                .optional()?;

            let value = vote.value();
            if previous != Some(value) {
                diesel::replace_into(votes::post_votes)
                    .values(&NewPostVote {
                        post_id: &post_id,
                        user_id: &user_id,
                        value,
                    })
                    .execute(self.conn.as_ref())?;

                let delta = value - previous.unwrap_or(0);
                diesel::update(posts.find(post_id))
                    .set(rating.eq(rating + delta))
                    .execute(self.conn.as_ref())?;
            }

            self.handle(GetPost(post_id), ctx)
        })
    }
}


pub struct CreateComment(pub NewComment);

impl Message for CreateComment {
    type Result = diesel::QueryResult<Comment>;
}

impl Handler<CreateComment> for Executor {
    type Result = <CreateComment as Message>::Result;

    fn handle(&mut self, msg: CreateComment, _: &mut Self::Context) -> Self::Result {
        self.conn.transaction(|| {
            use schema::comments::dsl::*;

            diesel::insert_into(comments)
                .values(&msg.0)
                .execute(self.conn.as_ref())?;

            comments.order(id.desc()).first(self.conn.as_ref())
        })
    }
}


pub struct VoteComment {
    pub comment_id: db::Id,
    pub user_id: db::Id,
    pub vote: Vote,
}

impl Message for VoteComment {
    type Result = diesel::QueryResult<Comment>;
}

impl Handler<VoteComment> for Executor {
    type Result = <VoteComment as Message>::Result;

    fn handle(&mut self, msg: VoteComment, _: &mut Self::Context) -> Self::Result {
        use schema::comment_votes::dsl as votes;
        use schema::comments::dsl::{comments, rating};

        let VoteComment {
            comment_id,
            user_id,
            vote,
        } = msg;

        self.conn.transaction(|| {
            let previous: Option<i32> = votes::comment_votes
                .find((comment_id, user_id))
                .select(votes::value)
                .first(self.conn.as_ref())
                .optional()?;

            let value = vote.value();
            if previous != Some(value) {
                diesel::replace_into(votes::comment_votes)
                    .values(&NewCommentVote {
                        comment_id: &comment_id,
                        user_id: &user_id,
                        value,
                    })
                    .execute(self.conn.as_ref())?;

                let delta = value - previous.unwrap_or(0);
                diesel::update(comments.find(comment_id))
                    .set(rating.eq(rating + delta))
                    .execute(self.conn.as_ref())?;
            }

            comments.find(comment_id).get_result(self.conn.as_ref())
        })
    }
}


pub struct Subscribe {
    pub user_id: db::Id,
    pub category_id: db::Id,
}

impl Message for Subscribe {
    type Result = diesel::QueryResult<()>;
}

impl Handler<Subscribe> for Executor {
    type Result = <Subscribe as Message>::Result;

    fn handle(&mut self, msg: Subscribe, _: &mut Self::Context) -> Self::Result {
        use schema::subscriptions::dsl::subscriptions;

        diesel::insert_or_ignore_into(subscriptions)
            .values(&NewSubscription {
                user_id: &msg.user_id,
                category_id: &msg.category_id,
            })
            .execute(self.conn.as_ref())?;

        Ok(())
    }
}


pub struct Unsubscribe {
    pub user_id: db::Id,
    pub category_id: db::Id,
}

impl Message for Unsubscribe {
    type Result = diesel::QueryResult<()>;
}

impl Handler<Unsubscribe> for Executor {
    type Result = <Unsubscribe as Message>::Result;

    fn handle(&mut self, msg: Unsubscribe, _: &mut Self::Context) -> Self::Result {
        use schema::subscriptions::dsl::*;

        diesel::delete(
            subscriptions
                .filter(user_id.eq(msg.user_id))
                .filter(category_id.eq(msg.category_id)),
        )
        .execute(self.conn.as_ref())?;

        Ok(())
    }
}


/// Make `categories` the user's exact set of subscriptions.
pub struct ReplaceSubscriptions {
    pub user_id: db::Id,
    pub categories: Vec<db::Id>,
}

impl Message for ReplaceSubscriptions {
    type Result = diesel::QueryResult<()>;
}

impl Handler<ReplaceSubscriptions> for Executor {
    type Result = <ReplaceSubscriptions as Message>::Result;

    fn handle(&mut self, msg: ReplaceSubscriptions, ctx: &mut Self::Context) -> Self::Result {
        use schema::subscriptions::dsl::{subscriptions, user_id};

        let ReplaceSubscriptions {
            user_id: user,
            categories,
        } = msg;

        self.conn.clone().transaction(|| {
            diesel::delete(subscriptions.filter(user_id.eq(user)))
                .execute(self.conn.as_ref())?;

            for category_id in categories {
                self.handle(
                    Subscribe {
                        user_id: user,
                        category_id,
                    },
                    ctx,
                )?;
            }

            Ok(())
        })
    }
}


pub struct GetUserCategories(pub db::Id);

impl Message for GetUserCategories {
    type Result = diesel::QueryResult<Vec<db::Id>>;
}

impl Handler<GetUserCategories> for Executor {
    type Result = <GetUserCategories as Message>::Result;

    fn handle(&mut self, msg: GetUserCategories, _: &mut Self::Context) -> Self::Result {
        use schema::subscriptions::dsl::*;

        subscriptions
            .filter(user_id.eq(msg.0))
            .select(category_id)
            .distinct()
            .order(category_id.asc())
            .load(self.conn.as_ref())
    }
}


/// Distinct subscribers, keyed by e-mail, of any of the given categories.
///
/// Users without an e-mail address, or with a blank one, are left out.
pub struct FindSubscribers(pub Vec<db::Id>);

impl Message for FindSubscribers {
    type Result = diesel::QueryResult<Vec<Subscriber>>;
}

impl Handler<FindSubscribers> for Executor {
    type Result = <FindSubscribers as Message>::Result;

    fn handle(&mut self, msg: FindSubscribers, _: &mut Self::Context) -> Self::Result {
        use schema::{subscriptions, users};

        let rows: Vec<(String, Option<String>)> = subscriptions::table
            .inner_join(users::table)
            .filter(subscriptions::category_id.eq_any(msg.0))
            .filter(users::email.is_not_null())
            .select((users::username, users::email))
            .distinct()
            .order(users::id.asc())
            .load(self.conn.as_ref())?;

        let mut by_email = BTreeMap::new();
        for (username, email) in rows {
            let email = match email.as_deref().map(str::trim) {
                Some(email) if !email.is_empty() => email.to_owned(),
                _ => continue,
            };

            by_email.entry(email).or_insert(username);
        }

        Ok(by_email
            .into_iter()
            .map(|(email, username)| Subscriber { username, email })
            .collect())
    }
}


/// Posts of a kind created since a point in time in any of the given categories, newest first.
pub struct FindRecentPosts {
    pub categories: Vec<db::Id>,
    pub since: chrono::NaiveDateTime,
    pub post_type: PostType,
}

impl Message for FindRecentPosts {
    type Result = diesel::QueryResult<Vec<Post>>;
}

impl Handler<FindRecentPosts> for Executor {
    type Result = <FindRecentPosts as Message>::Result;

    fn handle(&mut self, msg: FindRecentPosts, _: &mut Self::Context) -> Self::Result {
        use schema::{post_categories, posts};

        posts::table
            .inner_join(post_categories::table)
            .filter(post_categories::category_id.eq_any(msg.categories))
            .filter(posts::created_at.ge(msg.since))
            .filter(posts::post_type.eq(msg.post_type))
            .filter(posts::published.eq(true))
            .select(posts::all_columns)
            .distinct()
            .order((posts::created_at.desc(), posts::id.desc()))
            .load(self.conn.as_ref())
    }
}
