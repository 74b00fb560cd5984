use actix::prelude::*;

use gazette::prelude::*;
use gazette::scheduler::{MemoryJobStore, Scheduler};

fn main() -> Result<(), std::io::Error> {
    dotenv::dotenv().ok();

    env_logger::from_env(env_logger::Env::default().default_filter_or("gazette=info")).init();

    let cfg = match Config::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            log::error!("Invalid configuration: {}", e);
            std::process::exit(1);
        }
    };

    let sys = actix::System::new("gazette");

    let data = match AppData::new(cfg) {
        Ok(data) => data,
        Err(e) => {
            log::error!("Could not start: {}", e);
            std::process::exit(1);
        }
    };

    let scheduler = Scheduler::new(MemoryJobStore::default()).start();
    let registration = data.schedule_digest(&scheduler);
    actix::spawn(async move {
        if let Err(e) = registration.await {
            log::error!("Could not schedule the weekly digest: {}", e);
            System::current().stop_with_code(1);
        }
    });

    log::info!(
        "Sending digests every {} day(s) with the {:?} mail backend",
        data.cfg.digest_interval_days,
        data.cfg.mail_backend
    );

    sys.run()
}
