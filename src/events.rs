use actix::prelude::*;

use crate::db::models::{Category, Post};

/// A post was just stored, along with the categories it was filed under.
#[derive(Debug, Clone)]
pub struct PostCreated {
    pub post: Post,
    pub categories: Vec<Category>,
}

impl Message for PostCreated {
    type Result = Result<Delivery, ()>;
}

/// Outcome of notifying subscribers about a post.
#[derive(Debug, Clone, Copy, Default, Eq, PartialEq)]
pub struct Delivery {
    pub sent: usize,
    pub failed: usize,
}


/// Hands content events to every registered listener.
///
/// Publishing does not wait for listeners to handle the event.
#[derive(Clone, Default)]
pub struct Publisher {
    listeners: Vec<Recipient<PostCreated>>,
}

impl Publisher {
    pub fn subscribe(&mut self, listener: Recipient<PostCreated>) {
        self.listeners.push(listener);
    }

    pub fn publish(&self, event: PostCreated) {
        log::debug!(
            "Publishing creation of {} to {} listener(s)",
            event.post,
            self.listeners.len()
        );

        for listener in &self.listeners {
            if let Err(e) = listener.do_send(event.clone()) {
                log::error!("Could not publish creation of {}: {}", event.post, e);
            }
        }
    }
}
