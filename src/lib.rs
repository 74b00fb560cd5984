#[macro_use]
extern crate diesel;

pub mod appdata;
pub mod config;
pub mod content;
pub mod db;
pub mod digest;
pub mod events;
pub mod mail;
pub mod notifier;
pub mod render;
pub mod scheduler;

pub mod prelude {
    pub use crate::appdata::AppData;
    pub use crate::config::Config;
    pub use crate::db;
    pub use crate::Error;
}


#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] config::Error),
    #[error("Could not connect to the database: {0}")]
    Connection(#[from] diesel::result::ConnectionError),
    #[error(transparent)]
    Database(#[from] db::Error),
    #[error("Mail error: {0}")]
    Mail(#[from] mail::Error),
    #[error("Rendering error: {0}")]
    Render(#[from] render::Error),
    #[error("Scheduler error: {0}")]
    Scheduler(#[from] scheduler::Error),
    #[error("Actor mailbox error: {0}")]
    Mailbox(actix::MailboxError),
}

impl From<actix::MailboxError> for Error {
    fn from(e: actix::MailboxError) -> Self {
        Self::Mailbox(e)
    }
}
