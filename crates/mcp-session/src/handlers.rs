//! Inbound dispatch targets: one [`RequestHandler`] per method, an ordered
//! list of [`NotificationHandler`]s per method.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use mcp_protocol::McpError;

/// Answers a single inbound request for one method.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// Produce the `result` payload, or an error to report back to the peer.
    async fn handle(&self, params: Option<Value>) -> Result<Value, McpError>;
}

/// Observes a single inbound notification for one method. Errors are
/// logged by the dispatcher and otherwise discarded — notifications never
/// produce a response.
#[async_trait]
pub trait NotificationHandler: Send + Sync {
    async fn handle(&self, params: Option<Value>);
}

/// Adapts a plain async closure into a [`RequestHandler`] so callers don't
/// need to name a type for every registration.
struct FnRequestHandler<F>(F);

#[async_trait]
impl<F, Fut> RequestHandler for FnRequestHandler<F>
where
    F: Fn(Option<Value>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, McpError>> + Send,
{
    async fn handle(&self, params: Option<Value>) -> Result<Value, McpError> {
        (self.0)(params).await
    }
}

/// Wrap a closure as a [`RequestHandler`] trait object.
pub fn request_handler_fn<F, Fut>(f: F) -> Arc<dyn RequestHandler>
where
    F: Fn(Option<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, McpError>> + Send + 'static,
{
    Arc::new(FnRequestHandler(f))
}

struct FnNotificationHandler<F>(F);

#[async_trait]
impl<F, Fut> NotificationHandler for FnNotificationHandler<F>
where
    F: Fn(Option<Value>) -> Fut + Send + Sync,
    Fut: Future<Output = ()> + Send,
{
    async fn handle(&self, params: Option<Value>) {
        (self.0)(params).await;
    }
}

/// Wrap a closure as a [`NotificationHandler`] trait object.
pub fn notification_handler_fn<F, Fut>(f: F) -> Arc<dyn NotificationHandler>
where
    F: Fn(Option<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(FnNotificationHandler(f))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fn_request_handler_runs_the_closure() {
        let handler = request_handler_fn(|_params| async { Ok(serde_json::json!({"ok": true})) });
        let result = handler.handle(None).await.unwrap();
        assert_eq!(result, serde_json::json!({"ok": true}));
    }

    #[tokio::test]
    async fn fn_notification_handler_runs_the_closure() {
        let seen = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let seen2 = seen.clone();
        let handler = notification_handler_fn(move |_params| {
            let seen = seen2.clone();
            async move {
                seen.store(true, std::sync::atomic::Ordering::SeqCst);
            }
        });
        handler.handle(None).await;
        assert!(seen.load(std::sync::atomic::Ordering::SeqCst));
    }
}
