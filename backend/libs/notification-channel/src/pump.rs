//! Receive loop shared by the Redis subscriber and in-memory tests

use crate::error::ChannelError;
use crate::event::NotificationEvent;
use futures_util::{Stream, StreamExt};
use std::future::Future;
use tracing::{info, warn};

/// Counters reported when a receive loop ends
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PumpStats {
    /// Events decoded and handed to the handler
    pub handled: u64,
    /// Payloads dropped because they could not be read or decoded
    pub dropped: u64,
}

/// Why a receive loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PumpExit {
    Shutdown,
    StreamEnded,
}

/// Drive raw channel payloads into `handler` until `shutdown` fires or the stream ends.
///
/// Each handler future completes before the next payload is taken, so events reach the
/// handler in channel order. Undecodable payloads are logged and dropped. Shutdown is
/// only observed between payloads: an event being handled always finishes.
pub async fn pump<S, Sh, F, Fut>(mut payloads: S, shutdown: Sh, handler: F) -> (PumpStats, PumpExit)
where
    S: Stream<Item = Result<String, ChannelError>> + Unpin,
    Sh: Future<Output = ()>,
    F: Fn(NotificationEvent) -> Fut,
    Fut: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut stats = PumpStats::default();

    loop {
        tokio::select! {
            biased;

            _ = &mut shutdown => return (stats, PumpExit::Shutdown),

            next = payloads.next() => match next {
                Some(Ok(payload)) => match NotificationEvent::decode(&payload) {
                    Ok(event) => {
                        info!("Received message from {}: {}", event.user, event.text);
                        handler(event).await;
                        stats.handled += 1;
                    }
                    Err(e) => {
                        warn!(error = %e, payload = %payload, "Dropping undecodable notification");
                        stats.dropped += 1;
                    }
                },
                Some(Err(e)) => {
                    warn!(error = %e, "Dropping unreadable channel message");
                    stats.dropped += 1;
                }
                None => return (stats, PumpExit::StreamEnded),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use std::future::pending;
    use std::sync::{Arc, Mutex};
    use tokio::sync::{mpsc, oneshot};
    use tokio_stream::wrappers::UnboundedReceiverStream;

    fn ok(payload: &str) -> Result<String, ChannelError> {
        Ok(payload.to_string())
    }

    #[tokio::test]
    async fn test_pump_preserves_order_and_ends_with_stream() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();

        let payloads = stream::iter(vec![
            ok(r#"{"user":"a","text":"1","type":"chat"}"#),
            ok(r#"{"user":"b","text":"2","type":"chat"}"#),
            ok(r#"{"user":"c","text":"3","type":"chat"}"#),
        ]);

        let (stats, exit) = pump(payloads, pending::<()>(), move |event| {
            let seen = seen_clone.clone();
            async move {
                seen.lock().unwrap().push(event.text);
            }
        })
        .await;

        assert_eq!(exit, PumpExit::StreamEnded);
        assert_eq!(stats, PumpStats { handled: 3, dropped: 0 });
        assert_eq!(*seen.lock().unwrap(), vec!["1", "2", "3"]);
    }

    #[tokio::test]
    async fn test_pump_drops_bad_payloads_and_keeps_going() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();

        let payloads = stream::iter(vec![
            ok("{not json"),
            ok(r#"{"user":"a","text":"ok","type":"chat"}"#),
            ok(r#"{"user":"a","text":"","type":"chat"}"#),
            Err(ChannelError::InvalidEvent("binary payload".into())),
            ok(r#"{"user":"b","text":"still ok","type":"chat"}"#),
        ]);

        let (stats, _) = pump(payloads, pending::<()>(), move |event| {
            let seen = seen_clone.clone();
            async move {
                seen.lock().unwrap().push(event.text);
            }
        })
        .await;

        assert_eq!(stats, PumpStats { handled: 2, dropped: 3 });
        assert_eq!(*seen.lock().unwrap(), vec!["ok", "still ok"]);
    }

    #[tokio::test]
    async fn test_pump_stops_on_shutdown() {
        let (tx, rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let (handled_tx, mut handled_rx) = mpsc::unbounded_channel();

        let task = tokio::spawn(pump(
            UnboundedReceiverStream::new(rx),
            async move {
                let _ = stop_rx.await;
            },
            move |event| {
                let handled_tx = handled_tx.clone();
                async move {
                    let _ = handled_tx.send(event);
                }
            },
        ));

        tx.send(ok(r#"{"user":"a","text":"before","type":"chat"}"#))
            .unwrap();
        let first = handled_rx.recv().await.unwrap();
        assert_eq!(first.text, "before");

        stop_tx.send(()).unwrap();
        let (stats, exit) = task.await.unwrap();

        assert_eq!(exit, PumpExit::Shutdown);
        assert_eq!(stats.handled, 1);
    }

    #[tokio::test]
    async fn test_in_flight_event_finishes_before_shutdown() {
        let (stop_tx, stop_rx) = oneshot::channel::<()>();
        let stop_tx = Arc::new(Mutex::new(Some(stop_tx)));
        let finished = Arc::new(Mutex::new(false));
        let finished_clone = finished.clone();

        let payloads = stream::iter(vec![ok(r#"{"user":"a","text":"slow","type":"chat"}"#)])
            .chain(stream::pending());

        let (stats, exit) = pump(
            payloads,
            async move {
                let _ = stop_rx.await;
            },
            move |_event| {
                let stop_tx = stop_tx.clone();
                let finished = finished_clone.clone();
                async move {
                    // Shutdown requested while this event is still being handled
                    if let Some(tx) = stop_tx.lock().unwrap().take() {
                        let _ = tx.send(());
                    }
                    tokio::task::yield_now().await;
                    *finished.lock().unwrap() = true;
                }
            },
        )
        .await;

        assert_eq!(exit, PumpExit::Shutdown);
        assert_eq!(stats.handled, 1);
        assert!(*finished.lock().unwrap());
    }
}
