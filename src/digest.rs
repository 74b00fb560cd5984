use actix::prelude::*;

use crate::db::{self, models::User, PostType};
use crate::mail::{Email, Mailer, SendEmail};
use crate::render::WeeklyDigest;
use crate::scheduler::RunJob;

/// Outcome of a digest run.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct DigestReport {
    pub users: usize,
    pub sent: usize,
    pub skipped: usize,
    pub failed: usize,
}

enum Outcome {
    Sent,
    Skipped,
}


/// Actor that mails every user the articles recently published in their categories.
#[derive(Clone)]
pub struct Digest {
    db: db::Helper,
    mailer: Addr<Mailer>,
    site_url: String,
    from: String,
    window: chrono::Duration,
}

impl Digest {
    pub fn new(
        db: db::Helper,
        mailer: Addr<Mailer>,
        site_url: String,
        from: String,
        window: chrono::Duration,
    ) -> Self {
        Digest {
            db,
            mailer,
            site_url,
            from,
            window,
        }
    }

    pub async fn run(self) -> Result<DigestReport, ()> {
        let since = chrono::Utc::now().naive_utc() - self.window;

        log::debug!("Composing digests of articles since {}", since);

        let users = self.db.find_users_with_email().await.map_err(|e| {
            log::error!("Could not load digest recipients from db: {}", e);
        })?;

        let mut report = DigestReport::default();

        for user in &users {
            let to = match user.mailbox() {
                Some(to) => to,
                None => continue,
            };
            report.users += 1;

            match self.send_to(user, to, since).await {
                Ok(Outcome::Sent) => report.sent += 1,
                Ok(Outcome::Skipped) => report.skipped += 1,
                Err(e) => {
                    log::error!("Could not send digest to {}: {}", user, e);
                    report.failed += 1;
                }
            }
        }

        log::info!(
            "Sent {} digest(s) to {} user(s): {} skipped, {} failed",
            report.sent,
            report.users,
            report.skipped,
            report.failed
        );

        Ok(report)
    }

    async fn send_to(
        &self,
        user: &User,
        to: &str,
        since: chrono::NaiveDateTime,
    ) -> Result<Outcome, crate::Error> {
        let categories = self.db.get_user_categories(user.id).await?;
        if categories.is_empty() {
            log::debug!("{} has no subscriptions", user);
            return Ok(Outcome::Skipped);
        }

        let articles = self
            .db
            .find_recent_posts(categories, since, PostType::Article)
            .await?;
        if articles.is_empty() {
            log::debug!("No new articles for {}", user);
            return Ok(Outcome::Skipped);
        }

        let rendered = WeeklyDigest::new(&user.username, &articles, &self.site_url).render()?;

        let email = Email {
            subject: rendered.subject,
            body: rendered.text,
            html_body: Some(rendered.html),
            from: self.from.clone(),
            to: vec![to.to_owned()],
            fail_silently: false,
        };

        self.mailer.send(SendEmail(email)).await??;

        Ok(Outcome::Sent)
    }
}

impl Actor for Digest {
    type Context = Context<Self>;
}

impl Handler<RunJob> for Digest {
    type Result = ResponseActFuture<Self, <RunJob as Message>::Result>;

    fn handle(&mut self, job: RunJob, _: &mut Self::Context) -> Self::Result {
        log::debug!("Running {}", job.id);

        let digest = self.clone();

        Box::pin(actix::fut::wrap_future(async move {
            digest.run().await.map(|_| ())
        }))
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::*;
    use crate::db::tests::memory_db;
    use crate::mail::testing::Outbox;

    struct Fixture {
        db: db::Helper,
        outbox: Outbox,
        digest: Digest,
        author: Author,
        tech: Category,
    }

    async fn user(db: &db::Helper, name: &str, email: Option<&str>) -> User {
        db.create_user(NewUser {
            username: name.to_owned(),
            email: email.map(str::to_owned),
        })
        .await
        .unwrap()
    }

    async fn fixture() -> Fixture {
        let db = memory_db();
        let outbox = Outbox::default();
        let digest = Digest::new(
            db.clone(),
            outbox.mailer(),
            "https://news.example.com".to_owned(),
            "noreply@news.example.com".to_owned(),
            chrono::Duration::days(7),
        );

        let writer = user(&db, "writer", None).await;
        let author = db.create_author(writer.id).await.unwrap();
        let tech = db.create_category("Tech".to_owned()).await.unwrap();

        Fixture {
            db,
            outbox,
            digest,
            author,
            tech,
        }
    }

    async fn post(f: &Fixture, post_type: PostType, title: &str, age: chrono::Duration) {
        let mut new = NewPost::new(f.author.id, post_type, title, "Body");
        new.created_at = chrono::Utc::now().naive_utc() - age;

        f.db.create_post(new, vec![f.tech.id]).await.unwrap();
    }

    #[actix_rt::test]
    async fn nothing_recent_sends_nothing() {
        let f = fixture().await;

        let reader = user(&f.db, "reader", Some("reader@example.com")).await;
        f.db.subscribe(reader.id, f.tech.id).await.unwrap();

        post(&f, PostType::Article, "Old", chrono::Duration::days(8)).await;
        post(&f, PostType::News, "Fresh news", chrono::Duration::hours(1)).await;

        let report = f.digest.clone().run().await.unwrap();

        assert_eq!(
            report,
            DigestReport {
                users: 1,
                sent: 0,
                skipped: 1,
                failed: 0
            }
        );
        assert!(f.outbox.sent().is_empty());
    }

    #[actix_rt::test]
    async fn recent_articles_are_sent_newest_first() {
        let f = fixture().await;

        let reader = user(&f.db, "reader", Some("reader@example.com")).await;
        let idle = user(&f.db, "idle", Some("idle@example.com")).await;
        user(&f.db, "silent", Some("  ")).await;
        f.db.subscribe(reader.id, f.tech.id).await.unwrap();
        let sports = f.db.create_category("Sports".to_owned()).await.unwrap();
        f.db.subscribe(idle.id, sports.id).await.unwrap();

        post(&f, PostType::Article, "Older", chrono::Duration::days(3)).await;
        post(&f, PostType::Article, "Newer", chrono::Duration::hours(2)).await;

        let report = f.digest.clone().run().await.unwrap();

        assert_eq!(report.sent, 1);
        assert_eq!(report.skipped, 1);

        let sent = f.outbox.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, vec!["reader@example.com".to_owned()]);
        assert_eq!(sent[0].subject, WeeklyDigest::SUBJECT);

        let newer = sent[0].body.find("Newer").unwrap();
        let older = sent[0].body.find("Older").unwrap();
        assert!(newer < older);
    }

    #[actix_rt::test]
    async fn failures_are_counted_per_user() {
        let f = fixture().await;

        for (name, email) in &[("good", "good@example.com"), ("bad", "not-an-address")] {
            let u = user(&f.db, name, Some(*email)).await;
            f.db.subscribe(u.id, f.tech.id).await.unwrap();
        }
        post(&f, PostType::Article, "Fresh", chrono::Duration::hours(1)).await;

        let report = f.digest.clone().run().await.unwrap();

        assert_eq!(report.sent, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(f.outbox.recipients(), vec!["good@example.com"]);
    }

    #[actix_rt::test]
    async fn runs_as_a_job() {
        let f = fixture().await;

        let reader = user(&f.db, "reader", Some("reader@example.com")).await;
        f.db.subscribe(reader.id, f.tech.id).await.unwrap();
        post(&f, PostType::Article, "Fresh", chrono::Duration::hours(1)).await;

        let addr = f.digest.clone().start();
        addr.send(RunJob {
            id: "weekly_digest".to_owned(),
        })
        .await
        .unwrap()
        .unwrap();

        assert_eq!(f.outbox.recipients(), vec!["reader@example.com"]);
    }
}
