//! Event subscribers.

use std::{borrow::Cow, future::Future, panic::AssertUnwindSafe};

use futures_util::FutureExt;

use crate::ws::Event;

/// Error returned by a subscriber, only logged by the gateway engine.
pub type DeliverError = Box<dyn std::error::Error + Send + Sync>;

/// Subscriber receives every event decoded by the gateway engine.
#[async_trait::async_trait]
pub trait Subscriber: Send + Sync {
    /// subscriber name
    fn name(&self) -> Cow<'static, str>;
    /// callback will be execute for each event, in arrival order
    async fn deliver(&self, event: Event) -> Result<(), DeliverError>;
}

#[async_trait::async_trait]
impl<F, Fut> Subscriber for F
where
    F: Fn(Event) -> Fut + Send + Sync,
    Fut: Future<Output = Result<(), DeliverError>> + Send,
{
    fn name(&self) -> Cow<'static, str> {
        "Anonymous Fn Subscriber".into()
    }

    async fn deliver(&self, event: Event) -> Result<(), DeliverError> {
        self(event).await
    }
}

/// Deliver an event, errors and panics of subscriber stop here.
pub(crate) async fn deliver(subscriber: &dyn Subscriber, event: Event) {
    match AssertUnwindSafe(subscriber.deliver(event))
        .catch_unwind()
        .await
    {
        Ok(Ok(())) => log::trace!("Deliver event to {} success", subscriber.name()),
        Ok(Err(err)) => log::warn!("Subscriber {} failed: {}", subscriber.name(), err),
        Err(_) => log::error!("Subscriber {} panicked", subscriber.name()),
    }
}

#[cfg(test)]
mod test {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use serde_json::json;

    use super::*;

    #[derive(Debug, Default)]
    struct Counting {
        delivered: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl Subscriber for Counting {
        fn name(&self) -> Cow<'static, str> {
            "counting".into()
        }

        async fn deliver(&self, event: Event) -> Result<(), DeliverError> {
            self.delivered.fetch_add(1, Ordering::SeqCst);
            match event["kind"].as_str() {
                Some("error") => Err("can't handle".into()),
                Some("panic") => panic!("subscriber bug"),
                _ => Ok(()),
            }
        }
    }

    #[tokio::test]
    async fn test_subscriber_failures_are_contained() {
        let subscriber = Arc::new(Counting::default());

        deliver(subscriber.as_ref(), json!({ "kind": "error" })).await;
        deliver(subscriber.as_ref(), json!({ "kind": "panic" })).await;
        deliver(subscriber.as_ref(), json!({ "kind": "ok" })).await;

        assert_eq!(subscriber.delivered.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_closure_subscriber() {
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let subscriber = move |_event: Event| {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<(), DeliverError>(())
            }
        };

        assert_eq!(subscriber.name(), "Anonymous Fn Subscriber");
        deliver(&subscriber, json!({})).await;

        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }
}
