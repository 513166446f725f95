//! Fan-out of session events to connected WebSocket listeners.

use actix::prelude::*;
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::HashMap;

/// One event pushed to every listener, rendered as `{"event": .., "data": ..}`.
#[derive(Debug, Clone, PartialEq, Message)]
#[rtype(result = "()")]
pub struct Push {
    pub event: &'static str,
    pub data: Value,
}

impl Push {
    pub fn new<T: Serialize>(event: &'static str, data: &T) -> Self {
        let data = serde_json::to_value(data).unwrap_or_else(|e| {
            error!("Failed to serialize {} payload: {}", event, e);
            Value::Null
        });
        Self { event, data }
    }

    pub fn to_json(&self) -> String {
        json!({ "event": self.event, "data": self.data }).to_string()
    }
}

#[derive(Message)]
#[rtype(result = "usize")]
pub struct Connect {
    pub listener: Recipient<Push>,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Disconnect {
    pub id: usize,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Publish(pub Push);

#[derive(Message)]
#[rtype(result = "usize")]
pub struct ListenerCount;

#[derive(Default)]
pub struct MarketDataHub {
    listeners: HashMap<usize, Recipient<Push>>,
    next_id: usize,
}

impl Actor for MarketDataHub {
    type Context = Context<Self>;
}

impl Handler<Connect> for MarketDataHub {
    type Result = usize;

    fn handle(&mut self, msg: Connect, _: &mut Self::Context) -> usize {
        let id = self.next_id;
        self.next_id += 1;
        self.listeners.insert(id, msg.listener);
        debug!("Listener {} connected ({} total)", id, self.listeners.len());
        id
    }
}

impl Handler<Disconnect> for MarketDataHub {
    type Result = ();

    fn handle(&mut self, msg: Disconnect, _: &mut Self::Context) {
        if self.listeners.remove(&msg.id).is_some() {
            debug!("Listener {} disconnected ({} left)", msg.id, self.listeners.len());
        }
    }
}

impl Handler<Publish> for MarketDataHub {
    type Result = ();

    fn handle(&mut self, Publish(push): Publish, _: &mut Self::Context) {
        self.listeners.retain(|id, listener| match listener.try_send(push.clone()) {
            Ok(()) => true,
            Err(SendError::Full(_)) => {
                warn!("Listener {} is lagging, dropped {} event", id, push.event);
                true
            }
            Err(SendError::Closed(_)) => {
                debug!("Listener {} is gone", id);
                false
            }
        });
    }
}

impl Handler<ListenerCount> for MarketDataHub {
    type Result = usize;

    fn handle(&mut self, _: ListenerCount, _: &mut Self::Context) -> usize {
        self.listeners.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    struct Collector(Arc<Mutex<Vec<Push>>>);

    impl Actor for Collector {
        type Context = Context<Self>;
    }

    impl Handler<Push> for Collector {
        type Result = ();

        fn handle(&mut self, msg: Push, _: &mut Self::Context) {
            self.0.lock().unwrap().push(msg);
        }
    }

    #[test]
    fn test_push_json_shape() {
        let push = Push::new("session_status", &json!({"logged_on": true}));
        let parsed: Value = serde_json::from_str(&push.to_json()).unwrap();
        assert_eq!(parsed["event"], "session_status");
        assert_eq!(parsed["data"]["logged_on"], true);
    }

    #[actix::test]
    async fn test_publish_reaches_connected_listeners() {
        let hub = MarketDataHub::default().start();
        let received = Arc::new(Mutex::new(Vec::new()));
        let collector = Collector(received.clone()).start();

        let id = hub.send(Connect { listener: collector.recipient() }).await.unwrap();
        hub.send(Publish(Push::new("market_data_update", &json!({"symbol": "USD/BRL"}))))
            .await
            .unwrap();
        hub.send(Disconnect { id }).await.unwrap();
        hub.send(Publish(Push::new("market_data_update", &json!({}))))
            .await
            .unwrap();

        // let the collector drain its mailbox
        actix::clock::sleep(std::time::Duration::from_millis(20)).await;

        assert_eq!(hub.send(ListenerCount).await.unwrap(), 0);
        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].data["symbol"], "USD/BRL");
    }
}
