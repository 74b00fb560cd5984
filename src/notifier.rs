use actix::prelude::*;
use futures::future::join_all;

use crate::db;
use crate::events::{Delivery, PostCreated};
use crate::mail::{Email, Mailer, SendEmail};
use crate::render::PostNotice;

/// Actor that tells category subscribers about new posts.
///
/// Every subscriber gets their own message, and a failed delivery only affects that
/// subscriber.
#[derive(Clone)]
pub struct Notifier {
    db: db::Helper,
    mailer: Addr<Mailer>,
    site_url: String,
    from: String,
}

impl Notifier {
    pub fn new(db: db::Helper, mailer: Addr<Mailer>, site_url: String, from: String) -> Self {
        Notifier {
            db,
            mailer,
            site_url,
            from,
        }
    }

    async fn notify(self, event: PostCreated) -> Result<Delivery, ()> {
        let PostCreated { post, categories } = event;

        if !post.published {
            log::debug!("Not notifying about unpublished {}", post);
            return Ok(Delivery::default());
        }

        let category_ids = categories.iter().map(|category| category.id).collect();
        let subscribers = self.db.find_subscribers(category_ids).await.map_err(|e| {
            log::error!("Could not load subscribers for {}: {}", post, e);
        })?;

        if subscribers.is_empty() {
            log::debug!("Nobody to notify about {}", post);
            return Ok(Delivery::default());
        }

        let mut delivery = Delivery::default();
        let mut requests = Vec::with_capacity(subscribers.len());

        for subscriber in subscribers {
            let notice = PostNotice::new(&subscriber.username, &post, &categories, &self.site_url);
            let rendered = match notice.render() {
                Ok(rendered) => rendered,
                Err(e) => {
                    log::error!("Could not render notification for {}: {}", subscriber.email, e);
                    delivery.failed += 1;
                    continue;
                }
            };

            let email = Email {
                subject: rendered.subject,
                body: rendered.text,
                html_body: Some(rendered.html),
                from: self.from.clone(),
                to: vec![subscriber.email.clone()],
                fail_silently: false,
            };

            let request = self.mailer.send(SendEmail(email));
            requests.push(async move { (subscriber.email, request.await) });
        }

        for (to, result) in join_all(requests).await {
            match result {
                Ok(Ok(())) => delivery.sent += 1,
                Ok(Err(e)) => {
                    log::error!("Could not notify {} about {}: {}", to, post, e);
                    delivery.failed += 1;
                }
                Err(e) => {
                    log::error!("Could not hand notification for {} to a mailer: {}", to, e);
                    delivery.failed += 1;
                }
            }
        }

        log::info!(
            "Notified {} subscriber(s) about {}, {} failed",
            delivery.sent,
            post,
            delivery.failed
        );

        Ok(delivery)
    }
}

impl Actor for Notifier {
    type Context = Context<Self>;
}

impl Handler<PostCreated> for Notifier {
    type Result = ResponseActFuture<Self, <PostCreated as Message>::Result>;

    fn handle(&mut self, event: PostCreated, _: &mut Self::Context) -> Self::Result {
        Box::pin(actix::fut::wrap_future(self.clone().notify(event)))
    }
}
