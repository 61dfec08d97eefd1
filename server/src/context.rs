//! Context provides a cancellation, similar to Golang's Context.

use std::{ops::Deref, sync::Arc};

use tokio::sync::watch;

#[derive(Clone, Debug)]
pub struct Context {
    inner: Arc<ContextInner>,
}

impl Context {
    /// Create a new Context.
    pub fn new() -> Self {
        Context {
            inner: Arc::new(ContextInner::new()),
        }
    }

    /// Cancel this context when the process gets SIGINT.
    pub fn cancel_on_interrupt(&self) -> Result<(), ctrlc::Error> {
        let ctx = self.clone();
        ctrlc::set_handler(move || {
            tracing::info!("got SIGINT, closing context");
            ctx.cancel();
        })
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Deref for Context {
    type Target = ContextInner;

    fn deref(&self) -> &Self::Target {
        self.inner.deref()
    }
}

#[derive(Debug)]
pub struct ContextInner {
    cancelled: watch::Sender<bool>,
}

impl ContextInner {
    fn new() -> Self {
        ContextInner {
            cancelled: watch::Sender::new(false),
        }
    }

    /// Cancel the context.
    /// Safe to call from outside the runtime, e.g. a signal handler.
    pub fn cancel(&self) {
        self.cancelled.send_replace(true);
    }

    /// Wait until the context is cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.cancelled.subscribe();
        // The sender lives as long as self, so this can't fail.
        let _ = rx.wait_for(|c| *c).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn cancel_wakes_waiters() {
        let ctx = Context::new();
        let waiter = {
            let ctx = ctx.clone();
            tokio::spawn(async move { ctx.cancelled().await })
        };
        ctx.cancel();
        waiter.await.expect("waiter should finish");
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_waits_for_cancel() {
        let ctx = Context::new();
        let early = tokio::time::timeout(Duration::from_secs(5), ctx.cancelled()).await;
        assert!(early.is_err());

        ctx.cancel();
        // Already cancelled: returns straight away.
        let late = tokio::time::timeout(Duration::from_secs(5), ctx.cancelled()).await;
        assert!(late.is_ok());
    }
}
