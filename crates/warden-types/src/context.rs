//! Request scoping: cancellation and deadlines for outbound calls.

use std::future::Future;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Why a scoped call did not complete.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Cancelled {
    #[error("request cancelled")]
    Cancelled,
    #[error("request deadline exceeded")]
    DeadlineExceeded,
}

/// Per-request context carried through every outbound call.
///
/// Cloning shares the cancellation token, so cancelling any clone cancels the
/// request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    request_id: Uuid,
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4(),
            cancel: CancellationToken::new(),
            deadline: None,
        }
    }

    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// Token for tying other work to this request.
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Fails fast if the request is already cancelled or past its deadline.
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.cancel.is_cancelled() {
            return Err(Cancelled::Cancelled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(Cancelled::DeadlineExceeded);
        }
        Ok(())
    }

    /// Runs `fut` until it completes, the request is cancelled, or the deadline passes.
    ///
    /// The future is dropped on cancellation, which aborts any I/O it owns.
    pub async fn run<F>(&self, fut: F) -> Result<F::Output, Cancelled>
    where
        F: Future,
    {
        self.check()?;
        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            biased;
            () = self.cancel.cancelled() => Err(Cancelled::Cancelled),
            () = deadline => Err(Cancelled::DeadlineExceeded),
            out = fut => Ok(out),
        }
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn run_completes() {
        let ctx = RequestContext::new();
        assert_eq!(ctx.run(async { 7 }).await, Ok(7));
    }

    #[tokio::test]
    async fn cancelled_before_start() {
        let ctx = RequestContext::new();
        ctx.cancel();
        assert_eq!(ctx.run(async { 7 }).await, Err(Cancelled::Cancelled));
    }

    #[tokio::test]
    async fn cancel_aborts_pending_future() {
        let ctx = RequestContext::new();
        let handle = ctx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            handle.cancel();
        });
        let out = ctx.run(std::future::pending::<()>()).await;
        assert_eq!(out, Err(Cancelled::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_exceeded() {
        let ctx = RequestContext::new().with_deadline(Instant::now() + Duration::from_secs(5));
        let out = ctx.run(std::future::pending::<()>()).await;
        assert_eq!(out, Err(Cancelled::DeadlineExceeded));
    }
}
