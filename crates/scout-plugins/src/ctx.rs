use std::time::Instant;

use tokio_util::sync::CancellationToken;

use scout_errors::CancelSignal;

/// Cooperative cancellation context for one invocation.
///
/// Carries the caller's cancellation token and optional deadline. Every
/// suspension point (walk iteration, process wait, stream send) consults it;
/// cancellation wins over deadline expiry when both hold.
#[derive(Debug, Clone, Default)]
pub struct Ctx {
    cancel: CancellationToken,
    deadline: Option<Instant>,
}

impl Ctx {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cancel(cancel: CancellationToken) -> Self {
        Self {
            cancel,
            deadline: None,
        }
    }

    #[must_use]
    pub fn deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn deadline_exceeded(&self) -> bool {
        self.deadline.is_some_and(|deadline| Instant::now() >= deadline)
    }

    /// The signal to hand to error classification, if any.
    pub fn cancel_signal(&self) -> Option<CancelSignal> {
        if self.is_cancelled() {
            Some(CancelSignal::Canceled)
        } else if self.deadline_exceeded() {
            Some(CancelSignal::DeadlineExceeded)
        } else {
            None
        }
    }
}
