//! Concurrent fan-out to the two stores.
//!
//! Each branch runs as its own tokio task inside a [`JoinSet`]. All branches
//! share a child [`CancellationToken`], so cancelling the caller's token, an
//! elapsed deadline, or the first branch failure stops every sibling. The
//! barrier drains all branches before returning so the caller learns which
//! halves were applied.
//!
//! A branch whose store call has already completed is reported as applied
//! even if the scope was cancelled meanwhile. A branch cancelled while its
//! call is still in flight reports [`IndexError::Cancelled`]; the store may
//! nevertheless finish that write on its own.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::{Half, IndexError, IndexResult};

/// Point in time by which an operation must finish.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Deadline {
    at: Instant,
    limit: Duration,
}

impl Deadline {
    pub(crate) fn after(limit: Duration) -> Self {
        Self {
            at: Instant::now() + limit,
            limit,
        }
    }

    async fn elapsed(self) -> IndexError {
        tokio::time::sleep_until(self.at).await;
        IndexError::TimedOut(self.limit)
    }
}

async fn expiry(deadline: Option<Deadline>) -> IndexError {
    match deadline {
        Some(deadline) => deadline.elapsed().await,
        None => std::future::pending().await,
    }
}

/// Run a single-store step under the caller's token and the deadline.
pub(crate) async fn guarded<T>(
    cancel: &CancellationToken,
    deadline: Option<Deadline>,
    step: impl Future<Output = IndexResult<T>>,
) -> IndexResult<T> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(IndexError::Cancelled),
        err = expiry(deadline) => Err(err),
        result = step => result,
    }
}

/// The first failure of a fan-out together with the branches that succeeded.
#[derive(Debug)]
pub(crate) struct Failure<T> {
    pub error: IndexError,
    pub applied: Vec<(Half, T)>,
}

impl<T> Failure<T> {
    pub fn applied_halves(&self) -> Vec<Half> {
        self.applied.iter().map(|(half, _)| *half).collect()
    }
}

/// A set of concurrently running store branches.
pub(crate) struct FanOut<T> {
    tasks: JoinSet<(Half, IndexResult<T>)>,
    scope: CancellationToken,
}

impl<T: Send + 'static> FanOut<T> {
    pub fn new(cancel: &CancellationToken) -> Self {
        Self {
            tasks: JoinSet::new(),
            scope: cancel.child_token(),
        }
    }

    pub fn spawn<F>(&mut self, half: Half, branch: F)
    where
        F: Future<Output = IndexResult<T>> + Send + 'static,
    {
        let scope = self.scope.clone();
        self.tasks.spawn(async move {
            let result = tokio::select! {
                biased;
                result = branch => result,
                _ = scope.cancelled() => Err(IndexError::Cancelled),
            };
            (half, result)
        });
    }

    /// Wait for every branch. Succeeds only if all branches succeed.
    ///
    /// The first error (or the deadline) cancels the remaining branches; the
    /// failure reports that error and every branch that completed anyway.
    pub async fn join(mut self, deadline: Option<Deadline>) -> Result<Vec<(Half, T)>, Failure<T>> {
        let mut applied = Vec::with_capacity(self.tasks.len());
        let mut first_error: Option<IndexError> = None;
        let timer = expiry(deadline);
        tokio::pin!(timer);

        loop {
            let joined = tokio::select! {
                joined = self.tasks.join_next() => joined,
                err = &mut timer, if first_error.is_none() => {
                    first_error = Some(err);
                    self.scope.cancel();
                    continue;
                }
            };
            let Some(joined) = joined else {
                break;
            };

            match joined {
                Ok((half, Ok(value))) => applied.push((half, value)),
                Ok((half, Err(err))) => {
                    if first_error.is_none() {
                        warn!(%half, error = %err, "store branch failed, cancelling siblings");
                        first_error = Some(err);
                        self.scope.cancel();
                    }
                }
                Err(join_err) => {
                    if first_error.is_none() {
                        first_error = Some(IndexError::Internal(format!(
                            "store task failed: {join_err}"
                        )));
                        self.scope.cancel();
                    }
                }
            }
        }

        match first_error {
            None => Ok(applied),
            Some(error) => Err(Failure { error, applied }),
        }
    }
}
