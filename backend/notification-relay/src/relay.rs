//! Startup and shutdown orchestration.
//!
//! Startup connects the publisher, then the subscriber, starts the receive loop,
//! binds HTTP and only then enters `Serving`. Draining runs in the reverse order:
//! reject submissions, unsubscribe, close listeners, stop HTTP, close the publisher.

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::handlers::register_routes;
use crate::lifecycle::{Lifecycle, RelayState};
use crate::metrics::MetricsMiddleware;
use crate::state::AppState;
use crate::websocket::ListenerRegistry;
use actix_web::dev::ServerHandle;
use actix_web::{middleware, web, App, HttpServer};
use async_trait::async_trait;
use futures::future::BoxFuture;
use notification_channel::{
    ChannelPublisher, ChannelSubscriber, EventPublisher, NotificationEvent, SubscriptionHandle,
};
use resilience::with_retry;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Why the relay left `Serving`
#[derive(Debug)]
enum DrainReason {
    Signal,
    SubscriptionLost(String),
    ServerStopped(String),
}

/// Subscription handler that fans each event out to every connected listener
pub fn fan_out(
    registry: ListenerRegistry,
) -> impl Fn(NotificationEvent) -> BoxFuture<'static, ()> + Send + Sync + 'static {
    move |event| {
        let registry = registry.clone();
        Box::pin(async move {
            let outcome = registry.broadcast(&event).await;
            tracing::debug!(
                delivered = outcome.delivered,
                removed = outcome.removed,
                "Notification fanned out"
            );
        })
    }
}

/// Run the relay until a shutdown signal or a fatal error.
pub async fn run(config: Config) -> AppResult<()> {
    let lifecycle = Lifecycle::new();
    let registry = ListenerRegistry::with_queue_capacity(config.websocket.queue_capacity);
    let retry = config.startup.retry_config();

    lifecycle.transition(RelayState::ConnectingPublisher)?;
    let publisher = match with_retry(retry.clone(), "connect publisher", || {
        ChannelPublisher::connect(&config.redis.url, config.redis.channel.clone())
    })
    .await
    {
        Ok(publisher) => Arc::new(publisher),
        Err(e) => {
            let attempts = e.attempts();
            let cause = e.into_inner();
            error!(attempts, error = %cause, "Failed to connect publisher");
            lifecycle.transition(RelayState::Terminated)?;
            return Err(AppError::StartServer(format!(
                "publisher connection failed after {attempts} attempt(s): {cause}"
            )));
        }
    };

    lifecycle.transition(RelayState::ConnectingSubscriber)?;
    let subscriber = match with_retry(retry, "connect subscriber", || {
        ChannelSubscriber::connect(&config.redis.url, config.redis.channel.clone())
    })
    .await
    {
        Ok(subscriber) => subscriber,
        Err(e) => {
            let attempts = e.attempts();
            let cause = e.into_inner();
            error!(attempts, error = %cause, "Failed to subscribe");
            publisher.close().await;
            lifecycle.transition(RelayState::Terminated)?;
            return Err(AppError::StartServer(format!(
                "subscriber connection failed after {attempts} attempt(s): {cause}"
            )));
        }
    };

    let mut subscription = subscriber.spawn(fan_out(registry.clone()));
    lifecycle.transition(RelayState::Subscribed)?;

    let state = AppState::new(
        publisher.clone() as Arc<dyn EventPublisher>,
        registry.clone(),
        lifecycle.clone(),
        config.websocket.clone(),
    );

    let bind_addr = config.bind_addr();
    let server = match HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(state.clone()))
            .wrap(middleware::Logger::default())
            .wrap(MetricsMiddleware)
            .configure(register_routes)
    })
    .disable_signals()
    .shutdown_timeout(config.app.shutdown_timeout.as_secs())
    .bind(&bind_addr)
    {
        Ok(server) => server.run(),
        Err(e) => {
            error!(addr = %bind_addr, error = %e, "Failed to bind HTTP listener");
            let mut resources = RelayResources {
                subscription: Some(subscription),
                registry,
                server_handle: None,
                publisher,
            };
            drain(&lifecycle, &mut resources).await?;
            return Err(AppError::from(e));
        }
    };

    let server_handle = server.handle();
    let mut server_task = actix_web::rt::spawn(server);

    lifecycle.transition(RelayState::Serving)?;
    info!(addr = %bind_addr, channel = %config.redis.channel, "Notification relay serving");

    let reason = tokio::select! {
        _ = shutdown_signal() => DrainReason::Signal,
        result = subscription.closed() => DrainReason::SubscriptionLost(match result {
            Ok(_) => "receive loop exited".to_string(),
            Err(e) => e.to_string(),
        }),
        result = &mut server_task => DrainReason::ServerStopped(match result {
            Ok(Ok(())) => "server exited".to_string(),
            Ok(Err(e)) => e.to_string(),
            Err(e) => e.to_string(),
        }),
    };

    match &reason {
        DrainReason::Signal => info!("Shutdown signal received, draining"),
        DrainReason::SubscriptionLost(detail) => {
            error!(detail = %detail, "Notification subscription lost, draining")
        }
        DrainReason::ServerStopped(detail) => {
            error!(detail = %detail, "HTTP server stopped unexpectedly, draining")
        }
    }

    // A subscription that already ended must not be unsubscribed again
    let subscription = match reason {
        DrainReason::SubscriptionLost(_) => None,
        _ => Some(subscription),
    };
    let mut resources = RelayResources {
        subscription,
        registry,
        server_handle: Some(server_handle),
        publisher,
    };
    drain(&lifecycle, &mut resources).await?;

    match reason {
        DrainReason::Signal => Ok(()),
        DrainReason::SubscriptionLost(_) => Err(AppError::BackendUnavailable),
        DrainReason::ServerStopped(detail) => Err(AppError::StartServer(detail)),
    }
}

/// What draining releases, one call per step
#[async_trait]
pub trait DrainSteps: Send {
    async fn unsubscribe(&mut self);

    /// Returns how many listeners were told to close
    async fn close_listeners(&mut self) -> usize;

    async fn stop_http(&mut self);

    async fn close_publisher(&mut self);
}

/// Everything a running relay holds open
struct RelayResources {
    /// `None` when the receive loop has already ended
    subscription: Option<SubscriptionHandle>,
    registry: ListenerRegistry,
    /// `None` when HTTP never started
    server_handle: Option<ServerHandle>,
    publisher: Arc<ChannelPublisher>,
}

#[async_trait]
impl DrainSteps for RelayResources {
    async fn unsubscribe(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            match subscription.unsubscribe().await {
                Ok(stats) => info!(
                    handled = stats.handled,
                    dropped = stats.dropped,
                    "Subscription removed"
                ),
                Err(e) => warn!(error = %e, "Unsubscribe failed"),
            }
        }
    }

    async fn close_listeners(&mut self) -> usize {
        self.registry.close_all().await
    }

    async fn stop_http(&mut self) {
        if let Some(server_handle) = self.server_handle.take() {
            server_handle.stop(true).await;
            info!("HTTP server stopped");
        }
    }

    async fn close_publisher(&mut self) {
        self.publisher.close().await;
    }
}

/// Enter `Draining`, release everything in order, then enter `Terminated`.
///
/// Submissions are refused from the first transition on, before any resource is
/// released.
pub async fn drain<D: DrainSteps>(lifecycle: &Lifecycle, steps: &mut D) -> AppResult<()> {
    lifecycle.transition(RelayState::Draining)?;

    steps.unsubscribe().await;

    let closed = steps.close_listeners().await;
    info!(listeners = closed, "Listener connections closed");

    steps.stop_http().await;
    steps.close_publisher().await;

    lifecycle.transition(RelayState::Terminated)?;
    Ok(())
}

/// Resolves on SIGINT or SIGTERM
pub async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {},
                    _ = terminate.recv() => {},
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler, only Ctrl+C will stop the relay");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notification_channel::{pump, ChannelError, PumpExit};
    use tokio_stream::wrappers::UnboundedReceiverStream;

    /// Records each step with the lifecycle state seen while it ran
    struct RecordingSteps {
        lifecycle: Lifecycle,
        calls: Vec<(&'static str, RelayState)>,
    }

    impl RecordingSteps {
        fn record(&mut self, step: &'static str) {
            self.calls.push((step, self.lifecycle.current()));
        }
    }

    #[async_trait]
    impl DrainSteps for RecordingSteps {
        async fn unsubscribe(&mut self) {
            self.record("unsubscribe");
        }

        async fn close_listeners(&mut self) -> usize {
            self.record("close_listeners");
            3
        }

        async fn stop_http(&mut self) {
            self.record("stop_http");
        }

        async fn close_publisher(&mut self) {
            self.record("close_publisher");
        }
    }

    fn serving_lifecycle() -> Lifecycle {
        let lifecycle = Lifecycle::new();
        for next in [
            RelayState::ConnectingPublisher,
            RelayState::ConnectingSubscriber,
            RelayState::Subscribed,
            RelayState::Serving,
        ] {
            lifecycle.transition(next).unwrap();
        }
        lifecycle
    }

    #[tokio::test]
    async fn test_drain_releases_in_order_while_draining() {
        let lifecycle = serving_lifecycle();
        let mut steps = RecordingSteps {
            lifecycle: lifecycle.clone(),
            calls: Vec::new(),
        };

        drain(&lifecycle, &mut steps).await.unwrap();

        assert_eq!(
            steps.calls,
            vec![
                ("unsubscribe", RelayState::Draining),
                ("close_listeners", RelayState::Draining),
                ("stop_http", RelayState::Draining),
                ("close_publisher", RelayState::Draining),
            ]
        );
        assert_eq!(lifecycle.current(), RelayState::Terminated);
    }

    #[tokio::test]
    async fn test_drain_after_startup_abort() {
        // Bind failure drains from Subscribed
        let lifecycle = Lifecycle::new();
        for next in [
            RelayState::ConnectingPublisher,
            RelayState::ConnectingSubscriber,
            RelayState::Subscribed,
        ] {
            lifecycle.transition(next).unwrap();
        }
        let mut steps = RecordingSteps {
            lifecycle: lifecycle.clone(),
            calls: Vec::new(),
        };

        drain(&lifecycle, &mut steps).await.unwrap();
        assert_eq!(steps.calls.len(), 4);
        assert_eq!(lifecycle.current(), RelayState::Terminated);
    }

    #[tokio::test]
    async fn test_second_drain_touches_nothing() {
        let lifecycle = serving_lifecycle();
        let mut steps = RecordingSteps {
            lifecycle: lifecycle.clone(),
            calls: Vec::new(),
        };
        drain(&lifecycle, &mut steps).await.unwrap();
        steps.calls.clear();

        let err = drain(&lifecycle, &mut steps).await.unwrap_err();
        assert!(matches!(err, AppError::Lifecycle(_)));
        assert!(steps.calls.is_empty());
    }

    #[tokio::test]
    async fn test_drain_releases_real_listeners() {
        let registry = ListenerRegistry::new();
        let (_id, mut rx) = registry.add_listener().await.unwrap();
        let publisher = Arc::new(ChannelPublisher::disconnected("chat_room"));
        let mut resources = RelayResources {
            subscription: None,
            registry: registry.clone(),
            server_handle: None,
            publisher,
        };

        drain(&serving_lifecycle(), &mut resources).await.unwrap();
        assert_eq!(rx.recv().await, Some(crate::websocket::Outbound::Close));
        assert!(registry.add_listener().await.is_none());
    }

    #[tokio::test]
    async fn test_fan_out_handler_reaches_listeners() {
        let registry = ListenerRegistry::new();
        let (_id, mut rx) = registry.add_listener().await.unwrap();

        let (tx, payloads) = tokio::sync::mpsc::unbounded_channel::<Result<String, ChannelError>>();
        tx.send(Ok(r#"{"user":"alice","text":"hi","type":"chat"}"#.to_string()))
            .unwrap();
        drop(tx);

        let (stats, exit) = pump(
            UnboundedReceiverStream::new(payloads),
            std::future::pending::<()>(),
            fan_out(registry.clone()),
        )
        .await;

        assert_eq!(stats.handled, 1);
        assert_eq!(exit, PumpExit::StreamEnded);
        assert!(matches!(
            rx.recv().await,
            Some(crate::websocket::Outbound::Frame(frame)) if frame.contains("\"alice\"")
        ));
    }
}
