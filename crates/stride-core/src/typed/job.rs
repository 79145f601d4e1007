//! Job trait and its two stock shapes.
//!
//! The poll loop only knows [`Job`]: `fetch` turns a leased task into a
//! payload, `execute` processes it and returns the success count.
//! [`WindowedJob`] and [`MessageJob`] cover the two scheduling modes; a job
//! with its own payload handling implements [`Job`] directly.

use std::marker::PhantomData;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use super::batch::{MessageHandler, run_batch};
use super::codec::{decode_batch, decode_items};
use super::context::JobContext;
use crate::domain::{JobDefinition, JobMode, Window};
use crate::error::JobError;

/// What `fetch` hands to `execute`.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// The task's time slice (`None` for ad-hoc tasks).
    Window(Option<Window>),
    /// Raw messages of a batch, one JSON string each.
    Messages(Vec<String>),
}

#[async_trait]
pub trait Job: Send + Sync + 'static {
    /// Definition published to the coordinator on startup.
    fn definition(&self) -> JobDefinition;

    fn name(&self) -> String {
        self.definition().name
    }

    /// Load the work for this task. `Ok(None)` means nothing to do.
    async fn fetch(&self, ctx: &mut JobContext) -> Result<Option<Payload>, JobError>;

    /// Process the payload and return the number of successful items.
    async fn execute(&self, ctx: &mut JobContext, payload: Payload) -> Result<u64, JobError>;
}

/// Logic of a time-windowed job.
#[async_trait]
pub trait WindowHandler: Send + Sync + 'static {
    async fn process(&self, ctx: &mut JobContext, window: Option<Window>) -> Result<u64, JobError>;
}

/// A [`Job`] that processes one time window per task.
pub struct WindowedJob<H> {
    definition: JobDefinition,
    handler: H,
}

impl<H: WindowHandler> WindowedJob<H> {
    pub fn new(definition: JobDefinition, handler: H) -> Self {
        Self {
            definition: JobDefinition {
                mode: JobMode::TimeWindow,
                ..definition
            },
            handler,
        }
    }
}

#[async_trait]
impl<H: WindowHandler> Job for WindowedJob<H> {
    fn definition(&self) -> JobDefinition {
        self.definition.clone()
    }

    async fn fetch(&self, ctx: &mut JobContext) -> Result<Option<Payload>, JobError> {
        Ok(Some(Payload::Window(ctx.window())))
    }

    async fn execute(&self, ctx: &mut JobContext, payload: Payload) -> Result<u64, JobError> {
        match payload {
            Payload::Window(window) => self.handler.process(ctx, window).await,
            Payload::Messages(_) => Err(JobError::new("windowed job received a message batch")),
        }
    }
}

/// A [`Job`] that processes a batch of produced messages per task.
pub struct MessageJob<M, H> {
    definition: JobDefinition,
    handler: H,
    _message: PhantomData<fn() -> M>,
}

impl<M, H> MessageJob<M, H>
where
    M: DeserializeOwned + Send + 'static,
    H: MessageHandler<M>,
{
    pub fn new(definition: JobDefinition, handler: H) -> Self {
        Self {
            definition: JobDefinition {
                mode: JobMode::Message,
                ..definition
            },
            handler,
            _message: PhantomData,
        }
    }
}

#[async_trait]
impl<M, H> Job for MessageJob<M, H>
where
    M: DeserializeOwned + Send + 'static,
    H: MessageHandler<M>,
{
    fn definition(&self) -> JobDefinition {
        self.definition.clone()
    }

    async fn fetch(&self, ctx: &mut JobContext) -> Result<Option<Payload>, JobError> {
        let raw = decode_batch(ctx.task().data.as_deref());
        if raw.is_empty() {
            return Ok(None);
        }
        Ok(Some(Payload::Messages(raw)))
    }

    async fn execute(&self, ctx: &mut JobContext, payload: Payload) -> Result<u64, JobError> {
        let Payload::Messages(raw) = payload else {
            return Err(JobError::new("message job received a window"));
        };
        let items = decode_items::<M>(raw);
        run_batch(&self.handler, ctx, items).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{JobId, NewTask, Task, TaskId};
    use crate::typed::context::ProgressHandle;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use serde::Deserialize;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()
    }

    struct CountMinutes;

    #[async_trait]
    impl WindowHandler for CountMinutes {
        async fn process(
            &self,
            _ctx: &mut JobContext,
            window: Option<Window>,
        ) -> Result<u64, JobError> {
            Ok(window.map_or(0, |w| w.width().num_minutes() as u64))
        }
    }

    #[derive(Debug, Deserialize)]
    struct Order {
        amount: i64,
    }

    struct Positive;

    #[async_trait]
    impl MessageHandler<Order> for Positive {
        async fn process_item(
            &self,
            _ctx: &mut JobContext,
            order: Order,
        ) -> Result<bool, JobError> {
            Ok(order.amount > 0)
        }
    }

    fn ctx_for(new: NewTask) -> JobContext {
        JobContext::new(Task::from_new(TaskId::new(1), new, t0()), ProgressHandle::default())
    }

    #[tokio::test]
    async fn windowed_job_passes_task_window() {
        let job = WindowedJob::new(JobDefinition::windowed("etl", t0(), 600), CountMinutes);
        let window = Window::new(t0(), t0() + Duration::minutes(10));
        let mut ctx = ctx_for(NewTask::window(JobId::new(1), "app", window));

        let payload = job.fetch(&mut ctx).await.unwrap().unwrap();
        assert_eq!(payload, Payload::Window(Some(window)));
        assert_eq!(job.execute(&mut ctx, payload).await.unwrap(), 10);
    }

    #[tokio::test]
    async fn message_job_decodes_and_counts() {
        let def = JobDefinition::message("orders", "order.created");
        let job = MessageJob::<Order, _>::new(def, Positive);
        let data = serde_json::to_string(&[r#"{"amount":5}"#, r#"{"amount":-1}"#, "junk"]).unwrap();
        let mut ctx = ctx_for(NewTask::batch(JobId::new(1), "app", data));

        let payload = job.fetch(&mut ctx).await.unwrap().unwrap();
        assert_eq!(job.execute(&mut ctx, payload).await.unwrap(), 1);
        assert_eq!(ctx.progress().snapshot().total, 2);
    }

    #[tokio::test]
    async fn empty_message_batch_fetches_nothing() {
        let def = JobDefinition::message("orders", "order.created");
        let job = MessageJob::<Order, _>::new(def, Positive);
        let mut ctx = ctx_for(NewTask::batch(JobId::new(1), "app", "not json".to_string()));
        assert!(job.fetch(&mut ctx).await.unwrap().is_none());
    }

    #[test]
    fn constructors_force_mode() {
        let job = MessageJob::<Order, _>::new(JobDefinition::windowed("orders", t0(), 0), Positive);
        assert_eq!(job.definition().mode, JobMode::Message);
        assert_eq!(job.name(), "orders");
    }
}
