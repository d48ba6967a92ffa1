//! Cancellable deadline scopes for retry calls.
//!
//! A [`Context`] couples a [`CancellationToken`] with an optional deadline.
//! Contexts form a tree: a child derived with [`Context::with_timeout`] or
//! [`Context::with_deadline`] is cancelled whenever its parent is, and its
//! deadline is never later than the parent's.

use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Why a [`Context`] is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoneReason {
    /// The token (or an ancestor's token) was cancelled.
    Cancelled,
    /// The deadline passed.
    DeadlineExceeded,
}

/// A cancellation scope with an optional deadline.
///
/// Cloning a context yields a handle to the *same* scope: cancelling any
/// clone cancels them all.
///
/// # Examples
///
/// ```rust
/// use reattempt::{Context, DoneReason};
///
/// let parent = Context::background();
/// let child = parent.with_timeout(std::time::Duration::from_secs(30));
///
/// parent.cancel();
/// assert_eq!(child.reason(), Some(DoneReason::Cancelled));
/// ```
#[derive(Debug, Clone, Default)]
pub struct Context {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl Context {
    /// A scope that is never done unless explicitly cancelled.
    pub fn background() -> Self {
        Self::default()
    }

    /// Wrap an existing cancellation token.
    pub fn new(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Derive a child scope that also expires `timeout` from now.
    ///
    /// A timeout too large to represent leaves the parent's deadline in place.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        match Instant::now().checked_add(timeout) {
            Some(deadline) => self.with_deadline(deadline),
            None => self.child(),
        }
    }

    /// Derive a child scope that also expires at `deadline`.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        let deadline = match self.deadline {
            Some(current) => current.min(deadline),
            None => deadline,
        };
        Self {
            token: self.token.child_token(),
            deadline: Some(deadline),
        }
    }

    /// Derive a child scope with the same deadline.
    pub fn child(&self) -> Self {
        Self {
            token: self.token.child_token(),
            deadline: self.deadline,
        }
    }

    /// Cancel this scope and every scope derived from it.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// The underlying cancellation token.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// The deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Why the scope is done, or `None` while it is still live.
    ///
    /// Cancellation takes precedence over an expired deadline.
    pub fn reason(&self) -> Option<DoneReason> {
        if self.token.is_cancelled() {
            return Some(DoneReason::Cancelled);
        }
        match self.deadline {
            Some(deadline) if deadline <= Instant::now() => Some(DoneReason::DeadlineExceeded),
            _ => None,
        }
    }

    /// Whether the scope is cancelled or past its deadline.
    pub fn is_done(&self) -> bool {
        self.reason().is_some()
    }

    /// Wait until the scope is done.
    pub async fn done(&self) -> DoneReason {
        match self.deadline {
            Some(deadline) => tokio::select! {
                biased;
                _ = self.token.cancelled() => DoneReason::Cancelled,
                _ = tokio::time::sleep_until(deadline) => DoneReason::DeadlineExceeded,
            },
            None => {
                self.token.cancelled().await;
                DoneReason::Cancelled
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_pending, assert_ready_eq, task};

    #[test]
    fn test_background_is_never_done() {
        let ctx = Context::background();
        assert!(!ctx.is_done());
        assert_eq!(ctx.deadline(), None);
    }

    #[test]
    fn test_cancel_propagates_to_children_only() {
        let parent = Context::background();
        let child = parent.child();
        let grandchild = child.child();

        child.cancel();
        assert!(!parent.is_done());
        assert_eq!(child.reason(), Some(DoneReason::Cancelled));
        assert_eq!(grandchild.reason(), Some(DoneReason::Cancelled));
    }

    #[test]
    fn test_wrapping_external_token() {
        let token = CancellationToken::new();
        let ctx = Context::new(token.clone());
        token.cancel();
        assert!(ctx.is_done());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_expires() {
        let ctx = Context::background().with_timeout(Duration::from_millis(100));
        assert!(!ctx.is_done());

        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(ctx.reason(), Some(DoneReason::DeadlineExceeded));
    }

    #[tokio::test(start_paused = true)]
    async fn test_child_deadline_never_extends_parent() {
        let parent = Context::background().with_timeout(Duration::from_millis(50));
        let child = parent.with_timeout(Duration::from_secs(10));
        assert_eq!(child.deadline(), parent.deadline());

        let shorter = parent.with_timeout(Duration::from_millis(10));
        assert!(shorter.deadline() < parent.deadline());
    }

    #[tokio::test(start_paused = true)]
    async fn test_done_resolves_on_deadline() {
        let ctx = Context::background().with_timeout(Duration::from_millis(250));
        let start = Instant::now();
        assert_eq!(ctx.done().await, DoneReason::DeadlineExceeded);
        assert!(start.elapsed() >= Duration::from_millis(250));
    }

    #[test]
    fn test_done_wakes_on_cancel() {
        let ctx = Context::background();
        let mut done = task::spawn(ctx.done());
        assert_pending!(done.poll());

        ctx.cancel();
        assert!(done.is_woken());
        assert_ready_eq!(done.poll(), DoneReason::Cancelled);
    }
}
