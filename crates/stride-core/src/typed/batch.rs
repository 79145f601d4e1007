//! Batch execution adapter for message jobs.
//!
//! Items run in order. A failing item asks the handler whether to keep going;
//! the default is to abort, which turns the remaining batch into the task's
//! Errored finish while keeping the successes counted so far.

use async_trait::async_trait;

use super::context::JobContext;
use crate::error::JobError;

/// What to do after an item fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ItemDecision {
    /// Count the item as not processed and move on.
    Continue,
    /// Stop the batch and fail the task with this item's error.
    #[default]
    Abort,
}

/// Per-item logic of a message job.
#[async_trait]
pub trait MessageHandler<M>: Send + Sync + 'static
where
    M: Send + 'static,
{
    /// Process one message. `Ok(false)` means "handled, but not a success".
    async fn process_item(&self, ctx: &mut JobContext, message: M) -> Result<bool, JobError>;

    /// Called when `process_item` fails.
    fn on_error(&self, _ctx: &JobContext, _error: &JobError) -> ItemDecision {
        ItemDecision::Abort
    }
}

/// Run `items` through `handler`. Returns the number of successful items.
pub async fn run_batch<M, H>(
    handler: &H,
    ctx: &mut JobContext,
    items: Vec<M>,
) -> Result<u64, JobError>
where
    M: Send + 'static,
    H: MessageHandler<M> + ?Sized,
{
    ctx.progress().set_total(items.len() as u64);

    let mut success = 0;
    for (index, item) in items.into_iter().enumerate() {
        match handler.process_item(ctx, item).await {
            Ok(true) => {
                success += 1;
                ctx.progress().add_success(1);
            }
            Ok(false) => {}
            Err(err) => match handler.on_error(ctx, &err) {
                ItemDecision::Continue => {
                    tracing::warn!(
                        task_id = %ctx.task().id,
                        index,
                        error = %err.innermost_message(),
                        "Item failed, continuing batch"
                    );
                }
                ItemDecision::Abort => return Err(err),
            },
        }
    }
    Ok(success)
}
