//! # Effects
//!
//! An `Effect` is an async computation that settles into at most one message.
//! `update()` hands one back next to the new model; the actuator publishes the
//! model right away and runs the effect on its own tokio task. Whatever message
//! the effect produces goes back into the queue, in settlement order.
//!
//! ```text
//! update() ──► (Model, Effect) ──► publish Model
//!                      │
//!                      └──► tokio::spawn ──► ... ──► Message ──► queue
//! ```
//!
//! A failed effect produces nothing unless a fallback was attached with
//! [`Effect::or_else`], in which case the fallback's message is queued instead.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use futures::future::BoxFuture;
use log::{debug, warn};

use crate::core::error::BoxError;

type Fallback<M> = Box<dyn FnOnce(BoxError) -> M + Send>;

pub struct Effect<M> {
    future: BoxFuture<'static, Result<M, BoxError>>,
    fallback: Option<Fallback<M>>,
}

/// The effect did not settle within the configured limit.
#[derive(Debug)]
pub struct EffectTimeout(pub Duration);

impl fmt::Display for EffectTimeout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "effect timed out after {}ms", self.0.as_millis())
    }
}

impl std::error::Error for EffectTimeout {}

impl<M: Send + 'static> Effect<M> {
    /// An effect that always yields a message.
    pub fn new<F>(future: F) -> Self
    where
        F: Future<Output = M> + Send + 'static,
    {
        Self {
            future: future.map(Ok).boxed(),
            fallback: None,
        }
    }

    /// An effect whose underlying operation can fail.
    pub fn try_new<F, E>(future: F) -> Self
    where
        F: Future<Output = Result<M, E>> + Send + 'static,
        E: Into<BoxError>,
    {
        Self {
            future: future.map(|result| result.map_err(Into::into)).boxed(),
            fallback: None,
        }
    }

    /// An effect that has already settled.
    pub fn message(message: M) -> Self {
        Self::new(futures::future::ready(message))
    }

    /// Settles with `message` once `delay` has elapsed.
    pub fn after(delay: Duration, message: M) -> Self {
        Self::new(async move {
            tokio::time::sleep(delay).await;
            message
        })
    }

    /// Turn a failure into a message instead of dropping it.
    pub fn or_else<F>(mut self, fallback: F) -> Self
    where
        F: FnOnce(BoxError) -> M + Send + 'static,
    {
        self.fallback = Some(Box::new(fallback));
        self
    }

    /// Transforms the produced message, including one from a fallback.
    pub fn map<N, F>(self, f: F) -> Effect<N>
    where
        N: Send + 'static,
        F: Fn(M) -> N + Send + Sync + 'static,
    {
        let f = Arc::new(f);
        let Effect { future, fallback } = self;

        let on_success = Arc::clone(&f);
        let future = future
            .map(move |result| result.map(|message| on_success(message)))
            .boxed();
        let fallback = fallback.map(|fallback| -> Fallback<N> {
            Box::new(move |err| f(fallback(err)))
        });

        Effect { future, fallback }
    }

    /// Drive the effect to completion. Returns `None` when it faulted
    /// and no fallback was attached.
    pub(crate) async fn settle(self, timeout: Option<Duration>) -> Option<M> {
        let Effect { future, fallback } = self;

        let outcome = match timeout {
            Some(limit) => match tokio::time::timeout(limit, future).await {
                Ok(result) => result,
                Err(_) => Err(Box::new(EffectTimeout(limit)) as BoxError),
            },
            None => future.await,
        };

        match outcome {
            Ok(message) => Some(message),
            Err(err) => match fallback {
                Some(fallback) => {
                    debug!("Effect failed ({}), using fallback message", err);
                    Some(fallback(err))
                }
                None => {
                    warn!("Effect failed, no message produced: {}", err);
                    None
                }
            },
        }
    }
}

impl<M> fmt::Debug for Effect<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Effect")
            .field("has_fallback", &self.fallback.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[derive(Debug, PartialEq)]
    enum Msg {
        Loaded(u32),
        Failed(String),
    }

    fn failing() -> Effect<u32> {
        Effect::try_new(async { Err::<u32, _>(io::Error::other("disk on fire")) })
    }

    #[tokio::test]
    async fn test_new_settles_with_message() {
        let effect = Effect::new(async { 7 });
        assert_eq!(effect.settle(None).await, Some(7));
    }

    #[tokio::test]
    async fn test_failure_without_fallback_is_dropped() {
        assert_eq!(failing().settle(None).await, None);
    }

    #[tokio::test]
    async fn test_fallback_turns_failure_into_message() {
        let effect = failing()
            .map(Msg::Loaded)
            .or_else(|e| Msg::Failed(e.to_string()));
        assert_eq!(
            effect.settle(None).await,
            Some(Msg::Failed("disk on fire".to_string()))
        );
    }

    #[tokio::test]
    async fn test_map_applies_to_fallback_message() {
        let effect = failing().or_else(|_| 0).map(Msg::Loaded);
        assert_eq!(effect.settle(None).await, Some(Msg::Loaded(0)));
    }

    #[tokio::test]
    async fn test_timeout_drops_slow_effect() {
        let effect: Effect<u32> = Effect::new(futures::future::pending());
        let settled = effect.settle(Some(Duration::from_millis(20))).await;
        assert_eq!(settled, None);
    }

    #[tokio::test]
    async fn test_timeout_uses_fallback() {
        let effect: Effect<Msg> =
            Effect::new(futures::future::pending()).or_else(|e| Msg::Failed(e.to_string()));
        let settled = effect.settle(Some(Duration::from_millis(20))).await;
        assert_eq!(settled, Some(Msg::Failed("effect timed out after 20ms".into())));
    }

    #[tokio::test]
    async fn test_after_waits_before_settling() {
        let start = std::time::Instant::now();
        let settled = Effect::after(Duration::from_millis(15), 3).settle(None).await;
        assert_eq!(settled, Some(3));
        assert!(start.elapsed() >= Duration::from_millis(15));
    }
}
