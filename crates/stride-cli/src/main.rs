use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use clap::Parser;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use stride_core::app::{PartitionLoop, ReaperLoop, WorkerBuilder};
use stride_core::domain::{JobDefinition, Window};
use stride_core::impls::{InMemoryTaskStore, LocalCoordinator};
use stride_core::observability::TaskCounts;
use stride_core::ports::{Coordinator, FieldLimits, ProduceOptions, SystemClock};
use stride_core::typed::{
    ItemDecision, JobContext, MessageHandler, MessageJob, WindowHandler, WindowedJob,
};
use stride_core::{CoordinatorConfig, JobError, WorkerConfig};

const WINDOW_JOB: &str = "hello";
const MESSAGE_JOB: &str = "greeter";
const TOPIC: &str = "greetings";

#[derive(Parser, Debug)]
#[command(name = "stride")]
#[command(version)]
#[command(about = "Run an in-process coordinator and worker with two demo jobs")]
struct Args {
    /// Application id the jobs are registered under
    #[arg(long, default_value = "stride-demo")]
    app: String,

    /// Window width of the windowed job, in seconds
    #[arg(long, default_value = "300")]
    step_secs: i64,

    /// How far back the windowed job starts, in minutes
    #[arg(long, default_value = "60")]
    backfill_minutes: i64,

    /// Seconds windows must stay behind real time
    #[arg(long, default_value = "0")]
    offset_secs: i64,

    /// Number of messages produced to the message job
    #[arg(long, default_value = "10")]
    messages: usize,

    /// Messages per task
    #[arg(long, default_value = "4")]
    batch_size: usize,

    /// Tasks requested per acquire call
    #[arg(long, default_value = "2")]
    acquire_count: usize,

    /// Expire leases older than this many seconds (disabled when absent)
    #[arg(long)]
    lease_ttl_secs: Option<i64>,

    /// Stop after this many seconds (Ctrl-C stops earlier)
    #[arg(long, default_value = "3")]
    run_secs: u64,

    /// Print the final counts as JSON
    #[arg(long)]
    json: bool,
}

struct HelloWindow;

#[async_trait]
impl WindowHandler for HelloWindow {
    async fn process(&self, ctx: &mut JobContext, window: Option<Window>) -> Result<u64, JobError> {
        match window {
            Some(w) => {
                tracing::info!(
                    task_id = %ctx.task().id,
                    start = %w.start,
                    end = %w.end,
                    "Hello from window"
                );
                ctx.set_remark(format!("{} minutes", w.width().num_minutes()));
            }
            None => tracing::info!(task_id = %ctx.task().id, "Hello from ad-hoc task"),
        }
        Ok(1)
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Greeting {
    name: String,
}

struct Greeter;

#[async_trait]
impl MessageHandler<Greeting> for Greeter {
    async fn process_item(
        &self,
        ctx: &mut JobContext,
        greeting: Greeting,
    ) -> Result<bool, JobError> {
        if greeting.name.is_empty() {
            return Err(JobError::new("ValidationError: empty name"));
        }
        tracing::info!(task_id = %ctx.task().id, name = %greeting.name, "Greeting");
        ctx.set_key(greeting.name);
        Ok(true)
    }

    fn on_error(&self, _ctx: &JobContext, _error: &JobError) -> ItemDecision {
        ItemDecision::Continue
    }
}

#[derive(Debug, Serialize)]
struct JobSummary {
    job: &'static str,
    #[serde(flatten)]
    counts: TaskCounts,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let mut coordinator_config =
        CoordinatorConfig::new(&args.app).with_field_limits(FieldLimits::default());
    if let Some(ttl) = args.lease_ttl_secs {
        coordinator_config = coordinator_config.with_lease_ttl(chrono::Duration::seconds(ttl));
    }
    let store = Arc::new(InMemoryTaskStore::with_limits(coordinator_config.field_limits));
    let coordinator = Arc::new(LocalCoordinator::new(coordinator_config, store, SystemClock));

    let start = Utc::now() - chrono::Duration::minutes(args.backfill_minutes);
    let hello = WindowedJob::new(
        JobDefinition::windowed(WINDOW_JOB, start, args.step_secs)
            .with_offset(args.offset_secs)
            .with_description("logs every window it is handed"),
        HelloWindow,
    );
    let greeter = MessageJob::<Greeting, _>::new(
        JobDefinition::message(MESSAGE_JOB, TOPIC).with_batch_size(args.batch_size),
        Greeter,
    );

    let worker_config = WorkerConfig::new(&args.app)
        .with_acquire_count(args.acquire_count)
        .with_idle_delay(Duration::from_millis(200));
    let worker = WorkerBuilder::new(worker_config)
        .register(hello)?
        .register(greeter)?
        .expect_jobs(&[WINDOW_JOB, MESSAGE_JOB])
        .build()?;

    let group = worker.start(coordinator.clone()).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let partition =
        PartitionLoop::new(coordinator.clone(), Duration::from_secs(1)).spawn(shutdown_rx.clone());
    let reaper = ReaperLoop::new(coordinator.clone(), Duration::from_secs(5)).spawn(shutdown_rx);

    let messages: Vec<String> = (0..args.messages)
        .map(|i| {
            // every fifth greeting is invalid, to exercise the item error hook
            let name = if i % 5 == 4 { String::new() } else { format!("user-{i}") };
            serde_json::to_string(&Greeting { name })
        })
        .collect::<Result<_, _>>()?;
    let accepted = coordinator
        .produce(TOPIC, messages, &ProduceOptions::default())
        .await?;
    tracing::info!(accepted, topic = TOPIC, "Messages produced");

    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(args.run_secs)) => {}
        _ = tokio::signal::ctrl_c() => tracing::info!("Interrupted"),
    }

    group.shutdown_and_join().await;
    // receivers may already be gone
    let _ = shutdown_tx.send(true);
    partition.await?;
    reaper.await?;

    let mut summary = Vec::new();
    for job in [WINDOW_JOB, MESSAGE_JOB] {
        summary.push(JobSummary {
            job,
            counts: coordinator.counts(job).await?,
        });
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        println!(
            "{:<10} {:>6} {:>7} {:>10} {:>8}",
            "JOB", "READY", "LEASED", "COMPLETED", "ERRORED"
        );
        for s in &summary {
            println!(
                "{:<10} {:>6} {:>7} {:>10} {:>8}",
                s.job, s.counts.ready, s.counts.leased, s.counts.completed, s.counts.errored
            );
        }
    }

    Ok(())
}
