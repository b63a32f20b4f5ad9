//! Supervised fire-and-forget work: fan-out, notifications and broadcasts.
//!
//! Tasks never report back to the request that started them. Failures and
//! panics are logged here instead.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, error, info_span};

use crate::error::AppError;

#[derive(Clone, Default)]
pub struct Background {
    tracker: TaskTracker,
}

impl Background {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `task` detached from the caller.
    pub fn spawn<F>(&self, name: &'static str, task: F)
    where
        F: Future<Output = Result<(), AppError>> + Send + 'static,
    {
        let span = info_span!("background", task = name);
        self.tracker.spawn(
            async move {
                match AssertUnwindSafe(task).catch_unwind().await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => error!(error = %e, "Background task failed"),
                    Err(panic) => {
                        error!(panic = %panic_message(panic.as_ref()), "Background task panicked")
                    }
                }
            }
            .instrument(span),
        );
    }

    pub fn len(&self) -> usize {
        self.tracker.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracker.is_empty()
    }

    /// Wait until every task spawned so far has finished, including tasks
    /// those tasks spawned in turn. New tasks may be spawned afterwards.
    pub async fn wait_idle(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// Wait for the remaining tasks before the process exits.
    pub async fn shutdown(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn failures_and_panics_do_not_escape() {
        let bg = Background::new();
        let done = Arc::new(AtomicUsize::new(0));

        bg.spawn("fails", async { Err(AppError::not_found("gone")) });
        bg.spawn("panics", async { panic!("boom") });
        let counter = done.clone();
        bg.spawn("works", async move {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        bg.wait_idle().await;
        assert_eq!(done.load(Ordering::SeqCst), 1);
        assert!(bg.is_empty());
    }

    #[tokio::test]
    async fn tracker_reopens_after_wait() {
        let bg = Background::new();
        bg.wait_idle().await;

        let done = Arc::new(AtomicUsize::new(0));
        let counter = done.clone();
        bg.spawn("later", async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        bg.wait_idle().await;
        assert_eq!(done.load(Ordering::SeqCst), 1);
    }
}
