use actix::prelude::*;
use actix_web_actors::ws;
use chrono::Utc;
use serde_json::{json, Value};

use crate::hub::{Connect, Disconnect, MarketDataHub, Push};

/// Browser push connection. Forwards hub events as text frames.
pub struct WebSocketActor {
    hub: Addr<MarketDataHub>,
    listener_id: Option<usize>,
}

impl WebSocketActor {
    pub fn new(hub: Addr<MarketDataHub>) -> Self {
        Self { hub, listener_id: None }
    }
}

impl Actor for WebSocketActor {
    type Context = ws::WebsocketContext<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        self.hub
            .send(Connect {
                listener: ctx.address().recipient(),
            })
            .into_actor(self)
            .then(|res, act, ctx| {
                match res {
                    Ok(id) => act.listener_id = Some(id),
                    Err(e) => {
                        error!("Failed to register websocket listener: {}", e);
                        ctx.stop();
                    }
                }
                fut::ready(())
            })
            .wait(ctx);
    }

    fn stopping(&mut self, _: &mut Self::Context) -> Running {
        if let Some(id) = self.listener_id.take() {
            self.hub.do_send(Disconnect { id });
        }
        Running::Stop
    }
}

impl Handler<Push> for WebSocketActor {
    type Result = ();

    fn handle(&mut self, msg: Push, ctx: &mut Self::Context) {
        ctx.text(msg.to_json());
    }
}

impl StreamHandler<Result<ws::Message, ws::ProtocolError>> for WebSocketActor {
    fn handle(&mut self, msg: Result<ws::Message, ws::ProtocolError>, ctx: &mut Self::Context) {
        match msg {
            Ok(ws::Message::Text(text)) => {
                // The only inbound frame is a keepalive: {"type": "PING"}
                let kind = serde_json::from_str::<Value>(&text)
                    .ok()
                    .and_then(|v| v["type"].as_str().map(str::to_owned));
                match kind.as_deref() {
                    Some("PING") => {
                        let now = Utc::now().timestamp_millis();
                        ctx.text(json!({"type": "PONG", "time": now}).to_string());
                    }
                    _ => warn!("Ignoring websocket frame: {}", text),
                }
            }
            Ok(ws::Message::Ping(bytes)) => ctx.pong(&bytes),
            Ok(ws::Message::Close(reason)) => {
                debug!("Websocket client closed: {:?}", reason);
                ctx.close(reason);
                ctx.stop();
            }
            Err(e) => {
                warn!("Websocket protocol error: {}", e);
                ctx.stop();
            }
            _ => {}
        }
    }
}
