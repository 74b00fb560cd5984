use actix::prelude::*;
use std::future::Future;
use std::sync::Arc;

use crate::content::Newsroom;
use crate::digest::Digest;
use crate::events::Publisher;
use crate::mail::{self, Mailer};
use crate::notifier::Notifier;
use crate::prelude::*;
use crate::scheduler::{AddJob, JobRecord, Scheduler, WEEKLY_DIGEST_JOB};

pub struct AppData {
    pub cfg: Config,
    pub db: db::Helper,
    pub mailer: Addr<Mailer>,
    pub notifier: Addr<Notifier>,
    pub digest: Addr<Digest>,
    pub newsroom: Newsroom,
}

impl AppData {
    pub fn new(cfg: Config) -> Result<Self, Error> {
        let backend = mail::backend(&cfg);
        Self::with_backend(cfg, backend)
    }

    pub fn with_backend(cfg: Config, backend: Arc<dyn mail::Backend>) -> Result<Self, Error> {
        // Test DB connection now
        drop(db::Executor::connect(&cfg.sqlite_db)?);

        let sqlite_db = cfg.sqlite_db.clone();
        let db_pool = SyncArbiter::start(cfg.db_workers, move || {
            db::Executor::connect(&sqlite_db).expect("DB connection failed")
        });
        let db = db::Helper::new(db_pool);

        let mailer = SyncArbiter::start(cfg.mail_workers, move || Mailer::new(backend.clone()));

        let notifier = Notifier::new(
            db.clone(),
            mailer.clone(),
            cfg.site_url.clone(),
            cfg.mail_from.clone(),
        )
        .start();

        let digest = Digest::new(
            db.clone(),
            mailer.clone(),
            cfg.site_url.clone(),
            cfg.mail_from.clone(),
            chrono::Duration::days(i64::from(cfg.digest_interval_days)),
        )
        .start();

        let mut events = Publisher::default();
        events.subscribe(notifier.clone().recipient());

        Ok(AppData {
            newsroom: Newsroom::new(db.clone(), events),
            cfg,
            db,
            mailer,
            notifier,
            digest,
        })
    }

    /// Register the weekly digest with `scheduler`, sending the first one right away.
    pub fn schedule_digest(
        &self,
        scheduler: &Addr<Scheduler>,
    ) -> impl Future<Output = Result<JobRecord, Error>> {
        let request = scheduler.send(AddJob {
            id: WEEKLY_DIGEST_JOB.to_owned(),
            interval: self.cfg.digest_interval(),
            target: self.digest.clone().recipient(),
            run_now: true,
        });

        async move {
            match request.await {
                Ok(res) => res.map_err(Error::from),
                Err(e) => Err(Error::from(e)),
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use actix_rt::time::delay_for;
    use std::time::Duration;

    use super::*;
    use crate::config::MailBackend;
    use crate::db::models::*;
    use crate::db::PostType;
    use crate::mail::testing::Outbox;
    use crate::scheduler::{GetJobs, MemoryJobStore};

    fn config() -> Config {
        Config {
            sqlite_db: ":memory:".to_owned(),
            db_workers: 1,
            site_url: "https://news.example.com".to_owned(),
            mail_from: "noreply@news.example.com".to_owned(),
            mail_backend: MailBackend::Console,
            mail_workers: 1,
            smtp_host: "localhost".to_owned(),
            smtp_port: 25,
            smtp_username: None,
            smtp_password: None,
            digest_interval_days: 7,
        }
    }

    async fn wait_for(outbox: &Outbox, count: usize) {
        for _ in 0..50 {
            if outbox.sent().len() >= count {
                return;
            }
            delay_for(Duration::from_millis(20)).await;
        }
    }

    #[actix_rt::test]
    async fn publishing_notifies_and_digest_runs_at_start() {
        let outbox = Outbox::default();
        let data = AppData::with_backend(config(), Arc::new(outbox.clone())).unwrap();

        let reader = data
            .db
            .create_user(NewUser {
                username: "reader".to_owned(),
                email: Some("reader@example.com".to_owned()),
            })
            .await
            .unwrap();
        let writer = data
            .db
            .create_user(NewUser {
                username: "writer".to_owned(),
                email: None,
            })
            .await
            .unwrap();
        let author = data.db.create_author(writer.id).await.unwrap();
        let tech = data
            .db
            .get_or_create_category("Tech".to_owned())
            .await
            .unwrap();
        data.newsroom.subscribe(reader.id, tech.id).await.unwrap();

        let post = data
            .newsroom
            .publish_post(
                NewPost::new(author.id, PostType::Article, "Launch", "We shipped"),
                &["Tech", "World"],
            )
            .await
            .unwrap();

        wait_for(&outbox, 1).await;
        let sent = outbox.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].subject.contains("Launch"));
        assert!(sent[0]
            .body
            .contains(&format!("https://news.example.com/articles/{}/", post.id)));

        let scheduler = Scheduler::new(MemoryJobStore::default()).start();
        let job = data.schedule_digest(&scheduler).await.unwrap();
        assert_eq!(job.id, WEEKLY_DIGEST_JOB);

        wait_for(&outbox, 2).await;
        let sent = outbox.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1].to, vec!["reader@example.com".to_owned()]);
        assert!(sent[1].body.contains("Launch"));

        let jobs = scheduler.send(GetJobs).await.unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].id, WEEKLY_DIGEST_JOB);
    }

    #[actix_rt::test]
    async fn failed_digest_registration_is_reported() {
        let mut cfg = config();
        cfg.digest_interval_days = 0;
        let data = AppData::with_backend(cfg, Arc::new(Outbox::default())).unwrap();
        let scheduler = Scheduler::new(MemoryJobStore::default()).start();

        let err = data.schedule_digest(&scheduler).await.unwrap_err();

        assert!(matches!(
            err,
            Error::Scheduler(crate::scheduler::Error::InvalidInterval(_))
        ));
        assert!(scheduler.send(GetJobs).await.unwrap().is_empty());
    }
}
