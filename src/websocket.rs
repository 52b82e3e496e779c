/// WebSocket sessions pushing re-rendered panels to subscribed clients
use actix::prelude::*;
use actix_web_actors::ws;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::dashboard::{Dashboard, Panel};
use crate::messages::{ClientMessage, ServerMessage};
use crate::table::Table;

/// How often heartbeat pings are sent
const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(5);
/// How long before lack of client response causes a timeout
const CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Shared state for all connections: one dashboard session and its
/// subscribers.
pub struct AppState {
    pub dashboard: Dashboard,
    subscribers: Mutex<Vec<Addr<DashboardWebSocket>>>,
}

impl AppState {
    pub fn new(base: Arc<Table>) -> Self {
        Self {
            dashboard: Dashboard::new(base),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    pub fn subscribe(&self, addr: Addr<DashboardWebSocket>) {
        let mut subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        if !subscribers.contains(&addr) {
            subscribers.push(addr);
        }
    }

    pub fn unsubscribe(&self, addr: &Addr<DashboardWebSocket>) {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|a| a != addr);
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Broadcast a message to every connected subscriber
    pub fn broadcast(&self, msg: ServerMessage) {
        let subscribers = self.subscribers.lock().unwrap_or_else(PoisonError::into_inner);
        for addr in subscribers.iter().filter(|a| a.connected()) {
            addr.do_send(BroadcastMessage(msg.clone()));
        }
    }

    /// Re-renders the panels a control change affected and pushes them to
    /// subscribers. Returns the message that was broadcast.
    pub fn publish(&self, affected: &[Panel]) -> ServerMessage {
        let msg = ServerMessage::panels(self.dashboard.render_panels(affected));
        if !affected.is_empty() {
            log::info!(
                "broadcasting {} panels to {} subscribers",
                affected.len(),
                self.subscriber_count()
            );
            self.broadcast(msg.clone());
        }
        msg
    }
}

/// Message to broadcast to clients
#[derive(Message)]
#[rtype(result = "()")]
struct BroadcastMessage(ServerMessage);

/// WebSocket connection actor
pub struct DashboardWebSocket {
    hb: Instant,
    state: actix_web::web::Data<AppState>,
    subscribed: bool,
}

impl DashboardWebSocket {
    pub fn new(state: actix_web::web::Data<AppState>) -> Self {
        Self {
            hb: Instant::now(),
            state,
            subscribed: false,
        }
    }

    fn hb(&self, ctx: &mut ws::WebsocketContext<Self>) {
        ctx.run_interval(HEARTBEAT_INTERVAL, |act, ctx| {
            if Instant::now().duration_since(act.hb) > CLIENT_TIMEOUT {
                log::warn!("websocket client heartbeat failed, disconnecting");
                ctx.stop();
                return;
            }
            ctx.ping(b"");
        });
    }

    fn send(ctx: &mut ws::WebsocketContext<Self>, msg: &ServerMessage) {
        match serde_json::to_string(msg) {
            Ok(text) => ctx.text(text),
            Err(e) => log::error!("failed to serialize server message: {}", e),
        }
    }

    fn handle_client_message(&mut self, msg: ClientMessage, ctx: &mut ws::WebsocketContext<Self>) {
        let dashboard = &self.state.dashboard;
        match msg {
            ClientMessage::Subscribe => {
                self.subscribed = true;
                self.state.subscribe(ctx.address());

                Self::send(
                    ctx,
                    &ServerMessage::Subscribed {
                        panels: Panel::ALL.to_vec(),
                    },
                );
                Self::send(ctx, &ServerMessage::panels(dashboard.render_all()));
            }

            ClientMessage::Render { panel } => {
                Self::send(ctx, &ServerMessage::rendered(panel, dashboard.render(panel)));
            }

            ClientMessage::RenderAll => {
                Self::send(ctx, &ServerMessage::panels(dashboard.render_all()));
            }

            ClientMessage::UpdateControls { update } => {
                let affected = dashboard.apply(update);
                let msg = self.state.publish(&affected);
                // Subscribers already got the broadcast.
                if !self.subscribed || affected.is_empty() {
                    Self::send(ctx, &msg);
                }
            }
        }
    }
}

impl Actor for DashboardWebSocket {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.hb(ctx);
    }

    fn stopped(&mut self, ctx: &mut Self::Context) {
        if self.subscribed {
            self.state.unsubscribe(&ctx.address());
        }
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for DashboardWebSocket {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Ping(msg)) => {
                self.hb = Instant::now();
                ctx.pong(&msg);
            }
            Ok(ws::Message::Pong(_)) => {
                self.hb = Instant::now();
            }
            Ok(ws::Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(client_msg) => self.handle_client_message(client_msg, ctx),
                Err(e) => Self::send(
                    ctx,
                    &ServerMessage::error(format!("Invalid message format: {}", e)),
                ),
            },
            Ok(ws::Message::Binary(_)) => {
                log::debug!("ignoring binary websocket message");
            }
            Ok(ws::Message::Close(reason)) => {
                ctx.close(reason);
                ctx.stop();
            }
            _ => ctx.stop(),
        }
    }
}

impl Handler<BroadcastMessage> for DashboardWebSocket {
    type Result = ();

    fn handle(&mut self, msg: BroadcastMessage, ctx: &mut Self::Context) {
        Self::send(ctx, &msg.0);
    }
}
