//! Completion callbacks for asynchronous writes.
//!
//! Every submitted write owns exactly one callback, and it is consumed by the
//! first completion. Callbacks run on whichever task completes the write, so
//! they should hand work off rather than block.

use tokio::sync::oneshot;

use crate::error::WriteError;

pub trait WriteCallback: Send + 'static {
    fn on_success(self: Box<Self>);
    fn on_error(self: Box<Self>, error: WriteError);
}

pub(crate) fn complete(callback: Box<dyn WriteCallback>, result: Result<(), WriteError>) {
    match result {
        Ok(()) => callback.on_success(),
        Err(error) => callback.on_error(error),
    }
}

/// Wraps a closure receiving the write's result.
pub struct FnCallback<F>(F);

impl<F> WriteCallback for FnCallback<F>
where
    F: FnOnce(Result<(), WriteError>) + Send + 'static,
{
    fn on_success(self: Box<Self>) {
        (self.0)(Ok(()))
    }

    fn on_error(self: Box<Self>, error: WriteError) {
        (self.0)(Err(error))
    }
}

pub fn from_fn<F>(f: F) -> Box<dyn WriteCallback>
where
    F: FnOnce(Result<(), WriteError>) + Send + 'static,
{
    Box::new(FnCallback(f))
}

/// Logs the outcome and nothing else.
#[derive(Debug, Default, Clone)]
pub struct LoggingCallback {
    label: String,
}

impl LoggingCallback {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

impl WriteCallback for LoggingCallback {
    fn on_success(self: Box<Self>) {
        log::info!("{}: write succeeded", self.label);
    }

    fn on_error(self: Box<Self>, error: WriteError) {
        log::warn!("{}: write failed: {error}", self.label);
    }
}

/// Produces a fresh callback for callers that don't bring their own.
pub trait CallbackFactory: Send + Sync {
    fn create(&self, label: &str) -> Box<dyn WriteCallback>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingCallbackFactory;

impl CallbackFactory for LoggingCallbackFactory {
    fn create(&self, label: &str) -> Box<dyn WriteCallback> {
        Box::new(LoggingCallback::new(label))
    }
}

/// Awaitable side of [`completion`].
#[derive(Debug)]
pub struct Completion(oneshot::Receiver<Result<(), WriteError>>);

impl Completion {
    /// Wait for the write to complete. A write whose callback was suppressed
    /// by cancellation reports [`WriteError::Cancelled`].
    pub async fn wait(self) -> Result<(), WriteError> {
        self.0.await.unwrap_or(Err(WriteError::Cancelled))
    }
}

/// A callback that forwards its result to an awaitable [`Completion`].
pub fn completion() -> (Box<dyn WriteCallback>, Completion) {
    let (tx, rx) = oneshot::channel();
    let callback = from_fn(move |result| {
        // The receiver may have been dropped, nobody is waiting then
        let _ = tx.send(result);
    });
    (callback, Completion(rx))
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;

    #[tokio::test]
    async fn test_completion() {
        let (callback, completion) = completion();
        complete(callback, Err(WriteError::Timeout));
        assert_eq!(completion.wait().await, Err(WriteError::Timeout));
    }

    #[tokio::test]
    async fn test_dropped_callback_is_cancelled() {
        let (callback, completion) = completion();
        drop(callback);
        assert_eq!(completion.wait().await, Err(WriteError::Cancelled));
    }

    #[test]
    fn test_from_fn() {
        let seen = Arc::new(Mutex::new(vec![]));
        let sink = seen.clone();
        complete(from_fn(move |result| sink.lock().unwrap().push(result)), Ok(()));
        assert_eq!(*seen.lock().unwrap(), vec![Ok(())]);
    }

    #[test]
    fn test_logging_factory() {
        let callback = LoggingCallbackFactory.create("onOff.onTime");
        complete(callback, Err(WriteError::ConnectionLost));
    }
}
