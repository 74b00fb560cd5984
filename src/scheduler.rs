//! Recurring jobs.
//!
//! A [`Scheduler`] owns a [`JobStore`] and one timer per job. When a timer fires, the
//! job's target gets a [`RunJob`] message. A job never runs twice at the same time: a
//! tick that comes while the previous run is still going is skipped.

use actix::prelude::*;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

/// Id of the job sending the weekly digest.
pub const WEEKLY_DIGEST_JOB: &str = "weekly_digest";


#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Job {0} already exists")]
    Conflict(String),
    #[error("No job with id {0}")]
    NotFound(String),
    #[error("Job {0} needs a non-zero interval")]
    InvalidInterval(String),
}


/// Sent to a job's target every time the job fires.
#[derive(Debug, Clone)]
pub struct RunJob {
    pub id: String,
}

impl Message for RunJob {
    type Result = Result<(), ()>;
}


#[derive(Debug, Clone, PartialEq)]
pub struct JobRecord {
    pub id: String,
    pub interval: Duration,
    pub next_run_time: Option<DateTime<Utc>>,
    pub last_run_time: Option<DateTime<Utc>>,
}

fn after(time: DateTime<Utc>, interval: Duration) -> Option<DateTime<Utc>> {
    chrono::Duration::from_std(interval)
        .ok()
        .and_then(|interval| time.checked_add_signed(interval))
}


pub trait JobStore {
    /// Fails with [`Error::Conflict`] if a job with the same id exists.
    fn add(&mut self, job: JobRecord) -> Result<(), Error>;
    fn remove(&mut self, id: &str) -> Result<JobRecord, Error>;
    fn get(&self, id: &str) -> Option<&JobRecord>;
    fn update(&mut self, job: JobRecord) -> Result<(), Error>;
    fn jobs(&self) -> Vec<JobRecord>;
}

#[derive(Debug, Default)]
pub struct MemoryJobStore {
    jobs: BTreeMap<String, JobRecord>,
}

impl JobStore for MemoryJobStore {
    fn add(&mut self, job: JobRecord) -> Result<(), Error> {
        if self.jobs.contains_key(&job.id) {
            return Err(Error::Conflict(job.id));
        }

        self.jobs.insert(job.id.clone(), job);
        Ok(())
    }

    fn remove(&mut self, id: &str) -> Result<JobRecord, Error> {
        self.jobs
            .remove(id)
            .ok_or_else(|| Error::NotFound(id.to_owned()))
    }

    fn get(&self, id: &str) -> Option<&JobRecord> {
        self.jobs.get(id)
    }

    fn update(&mut self, job: JobRecord) -> Result<(), Error> {
        match self.jobs.get_mut(&job.id) {
            Some(existing) => {
                *existing = job;
                Ok(())
            }
            None => Err(Error::NotFound(job.id)),
        }
    }

    fn jobs(&self) -> Vec<JobRecord> {
        self.jobs.values().cloned().collect()
    }
}


struct ActiveJob {
    target: Recipient<RunJob>,
    timer: SpawnHandle,
    generation: u64,
    running: bool,
}

pub struct Scheduler {
    store: Box<dyn JobStore>,
    active: HashMap<String, ActiveJob>,
    generation: u64,
}

impl Scheduler {
    pub fn new<S: JobStore + 'static>(store: S) -> Self {
        Scheduler {
            store: Box::new(store),
            active: HashMap::new(),
            generation: 0,
        }
    }

    fn fire(&mut self, id: &str, generation: u64, ctx: &mut <Self as Actor>::Context) {
        let job = match self.active.get_mut(id) {
            Some(job) if job.generation == generation => job,
            _ => return,
        };

        if job.running {
            log::warn!("Job {} is still running, skipping this run", id);
            return;
        }

        job.running = true;
        let request = job.target.send(RunJob { id: id.to_owned() });

        let now = Utc::now();
        if let Some(mut record) = self.store.get(id).cloned() {
            record.last_run_time = Some(now);
            record.next_run_time = after(now, record.interval);

            if let Err(e) = self.store.update(record) {
                log::error!("Could not update job {}: {}", id, e);
            }
        }

        log::debug!("Running job {}", id);

        let id = id.to_owned();
        ctx.spawn(request.into_actor(self).map(move |res, act, _| {
            match res {
                Ok(Ok(())) => log::debug!("Job {} finished", id),
                Ok(Err(())) => log::error!("Job {} failed", id),
                Err(e) => log::error!("Could not run job {}: {}", id, e),
            }

            // A replaced job keeps running to completion but no longer owns the flag
            if let Some(job) = act.active.get_mut(&id) {
                if job.generation == generation {
                    job.running = false;
                }
            }
        }));
    }

    fn deactivate(&mut self, id: &str, ctx: &mut <Self as Actor>::Context) {
        if let Some(job) = self.active.remove(id) {
            ctx.cancel_future(job.timer);
        }
    }
}

impl Actor for Scheduler {
    type Context = Context<Self>;

    fn started(&mut self, _: &mut Self::Context) {
        log::info!("Scheduler started");
    }

    fn stopped(&mut self, _: &mut Self::Context) {
        log::info!("Scheduler stopped");
    }
}


/// Register a job, replacing any job with the same id.
pub struct AddJob {
    pub id: String,
    pub interval: Duration,
    pub target: Recipient<RunJob>,
    /// Also run the job right away instead of waiting for the first interval.
    pub run_now: bool,
}

impl Message for AddJob {
    type Result = Result<JobRecord, Error>;
}

impl Handler<AddJob> for Scheduler {
    type Result = <AddJob as Message>::Result;

    fn handle(&mut self, msg: AddJob, ctx: &mut Self::Context) -> Self::Result {
        let AddJob {
            id,
            interval,
            target,
            run_now,
        } = msg;

        if interval == Duration::from_secs(0) {
            log::error!("Refusing to schedule job {} with a zero interval", id);
            return Err(Error::InvalidInterval(id));
        }

        self.deactivate(&id, ctx);
        if self.store.get(&id).is_some() {
            log::warn!("Job {} already exists, replacing it", id);
            self.store.remove(&id)?;
        }

        let now = Utc::now();
        let record = JobRecord {
            id: id.clone(),
            interval,
            next_run_time: if run_now {
                Some(now)
            } else {
                after(now, interval)
            },
            last_run_time: None,
        };
        self.store.add(record.clone())?;

        self.generation += 1;
        let generation = self.generation;

        let timer_id = id.clone();
        let timer = ctx.run_interval(interval, move |act, ctx| {
            act.fire(&timer_id, generation, ctx)
        });

        self.active.insert(
            id.clone(),
            ActiveJob {
                target,
                timer,
                generation,
                running: false,
            },
        );

        log::info!("Scheduled job {} every {:?}", id, interval);

        if run_now {
            self.fire(&id, generation, ctx);
        }

        Ok(record)
    }
}


pub struct RemoveJob(pub String);

impl Message for RemoveJob {
    type Result = Result<JobRecord, Error>;
}

impl Handler<RemoveJob> for Scheduler {
    type Result = <RemoveJob as Message>::Result;

    fn handle(&mut self, msg: RemoveJob, ctx: &mut Self::Context) -> Self::Result {
        self.deactivate(&msg.0, ctx);

        let removed = self.store.remove(&msg.0)?;
        log::info!("Removed job {}", removed.id);

        Ok(removed)
    }
}


pub struct GetJobs;

impl Message for GetJobs {
    type Result = Vec<JobRecord>;
}

impl Handler<GetJobs> for Scheduler {
    type Result = MessageResult<GetJobs>;

    fn handle(&mut self, _: GetJobs, _: &mut Self::Context) -> Self::Result {
        MessageResult(self.store.jobs())
    }
}


/// Stop the scheduler and every timer it owns.
pub struct Shutdown;

impl Message for Shutdown {
    type Result = ();
}

impl Handler<Shutdown> for Scheduler {
    type Result = ();

    fn handle(&mut self, _: Shutdown, ctx: &mut Self::Context) {
        let ids: Vec<String> = self.active.keys().cloned().collect();
        for id in ids {
            self.deactivate(&id, ctx);
        }

        ctx.stop();
    }
}
