use super::{ListenerId, ListenerMessage, ListenerRegistry, Outbound};
use crate::config::WebSocketConfig;
use actix::{Actor, ActorContext, AsyncContext, StreamHandler};
use actix_web_actors::ws;
use std::time::Instant;
use tokio::sync::mpsc::Receiver;
use tokio_stream::wrappers::ReceiverStream;

/// WebSocket actor for one listener.
///
/// Listeners only receive; inbound text is ignored. Frames queued by the
/// registry are written in the order they were queued.
pub struct ListenerSession {
    listener_id: ListenerId,
    registry: ListenerRegistry,
    outbound: Option<Receiver<Outbound>>,
    config: WebSocketConfig,
    hb: Instant,
}

impl ListenerSession {
    pub fn new(
        listener_id: ListenerId,
        registry: ListenerRegistry,
        outbound: Receiver<Outbound>,
        config: WebSocketConfig,
    ) -> Self {
        Self {
            listener_id,
            registry,
            outbound: Some(outbound),
            config,
            hb: Instant::now(),
        }
    }

    fn hb(&self, ctx: &mut ws::WebsocketContext<Self>) {
        let client_timeout = self.config.client_timeout;
        ctx.run_interval(self.config.heartbeat_interval, move |act, ctx| {
            if Instant::now().duration_since(act.hb) > client_timeout {
                tracing::warn!(listener_id = %act.listener_id, "WebSocket heartbeat failed, disconnecting");
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }
}

impl Actor for ListenerSession {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!(listener_id = %self.listener_id, "Listener connected");

        self.hb(ctx);

        match ListenerMessage::connected(self.listener_id.to_string()).to_json() {
            Ok(frame) => ctx.text(frame),
            Err(e) => tracing::error!(error = %e, "Failed to serialize connected frame"),
        }

        if let Some(rx) = self.outbound.take() {
            ctx.add_stream(ReceiverStream::new(rx));
        }
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!(listener_id = %self.listener_id, "Listener disconnected");

        let registry = self.registry.clone();
        let listener_id = self.listener_id;
        actix::spawn(async move {
            registry.remove_listener(listener_id).await;
        });
    }
}

// Frames from the registry
impl StreamHandler<Outbound> for ListenerSession {
    fn handle(&mut self, msg: Outbound, ctx: &mut Self::Context) {
        match msg {
            Outbound::Frame(frame) => ctx.text(frame),
            Outbound::Close => {
                ctx.close(Some(ws::CloseReason {
                    code: ws::CloseCode::Away,
                    description: Some("server shutting down".to_string()),
                }));
                ctx.stop();
            }
        }
    }

    fn finished(&mut self, ctx: &mut Self::Context) {
        // Registry dropped us without a Close: shutdown with a full queue, or too slow
        ctx.close(Some(ws::CloseReason {
            code: ws::CloseCode::Away,
            description: None,
        }));
        ctx.stop();
    }
}

// WebSocket protocol messages from the client
impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for ListenerSession {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.hb = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Text(_)) | Ok(ws::Message::Binary(_)) => {
                self.hb = Instant::now();
                tracing::debug!(listener_id = %self.listener_id, "Ignoring inbound listener message");
            }
            Ok(ws::Message::Close(reason)) => {
                tracing::debug!(listener_id = %self.listener_id, "WebSocket close received: {:?}", reason);
                ctx.close(reason);
                ctx.stop();
            }
            Err(e) => {
                tracing::warn!(listener_id = %self.listener_id, error = %e, "WebSocket protocol error");
                ctx.stop();
            }
            _ => {}
        }
    }
}
