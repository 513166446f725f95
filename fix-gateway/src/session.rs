//! Order-entry session.
//!
//! Owns the logon state towards the market maker, turns gateway commands
//! into venue requests, and consumes every reply: journal, order and quote
//! caches, push events.

use actix::prelude::*;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use std::fs::File;
use thiserror::Error;
use uuid::Uuid;

use crate::hub::{MarketDataHub, Publish, Push};
use crate::journal::Journal;
use crate::market_maker::{Logon, Logout, MarketMaker};
use crate::messages::*;

/// Random six-digit draws before falling back to a uuid.
const ID_ATTEMPTS: usize = 32;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SessionError {
    #[error("Not logged on to any session")]
    NotLoggedOn,

    #[error("Failed to {action}: {reason}")]
    SendFailed { action: &'static str, reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    AlreadyRunning,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Subscription {
    pub md_req_id: String,
    pub symbol: String,
}

/// Top of book from the latest snapshot of a symbol.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Quote {
    pub symbol: String,
    pub bid: Decimal,
    pub offer: Decimal,
    pub updated_at: DateTime<Utc>,
}

impl Quote {
    pub fn mid(&self) -> Decimal {
        (self.bid + self.offer) / Decimal::TWO
    }
}

// ============================================================================
// Commands
// ============================================================================

#[derive(Message)]
#[rtype(result = "Result<StartOutcome, SessionError>")]
pub struct Start;

#[derive(Message)]
#[rtype(result = "Result<(), SessionError>")]
pub struct Stop;

#[derive(Message)]
#[rtype(result = "Result<String, SessionError>")]
pub struct PlaceOrder {
    pub side: Side,
    pub symbol: String,
    pub quantity: u64,
}

#[derive(Message)]
#[rtype(result = "Result<String, SessionError>")]
pub struct SubscribeMarketData {
    pub symbol: String,
}

/// Returns the MDReqID that was disabled, if any.
#[derive(Message)]
#[rtype(result = "Result<Option<String>, SessionError>")]
pub struct CancelMarketData;

#[derive(Message)]
#[rtype(result = "Result<String, SessionError>")]
pub struct CancelOrder {
    pub orig_cl_ord_id: String,
    pub symbol: String,
    pub side: Side,
}

/// Returns the last report the session holds for the order.
#[derive(Message)]
#[rtype(result = "Result<Option<ExecutionReport>, SessionError>")]
pub struct RequestOrderStatus {
    pub cl_ord_id: String,
    pub symbol: String,
    pub side: Side,
}

#[derive(Message)]
#[rtype(result = "bool")]
pub struct IsLoggedOn;

#[derive(Message)]
#[rtype(result = "Vec<ExecutionReport>")]
pub struct ListOrders;

#[derive(Message)]
#[rtype(result = "Option<Quote>")]
pub struct LatestQuote {
    pub symbol: String,
}

#[derive(Message)]
#[rtype(result = "Option<Subscription>")]
pub struct CurrentSubscription;

// ============================================================================
// Actor
// ============================================================================

pub struct ClientSession {
    session_id: String,
    venue: Addr<MarketMaker>,
    hub: Addr<MarketDataHub>,
    journal: Option<Journal<File>>,
    logged_on: bool,
    subscription: Option<Subscription>,
    orders: HashMap<String, ExecutionReport>,
    quotes: HashMap<String, Quote>,
}

impl Actor for ClientSession {
    type Context = Context<Self>;

    fn started(&mut self, _: &mut Self::Context) {
        info!("Session created - {}", self.session_id);
    }
}

impl ClientSession {
    pub fn new(
        session_id: String,
        venue: Addr<MarketMaker>,
        hub: Addr<MarketDataHub>,
        journal: Option<Journal<File>>,
    ) -> Self {
        Self {
            session_id,
            venue,
            hub,
            journal,
            logged_on: false,
            subscription: None,
            orders: HashMap::new(),
            quotes: HashMap::new(),
        }
    }

    fn check_session(&self) -> Result<(), SessionError> {
        if self.logged_on {
            Ok(())
        } else {
            Err(SessionError::NotLoggedOn)
        }
    }

    /// An id not used by any cached order nor the live subscription.
    fn next_id(&self) -> String {
        fresh_id(|id| {
            self.orders.contains_key(id)
                || self.subscription.as_ref().is_some_and(|s| s.md_req_id == id)
        })
    }

    fn venue_available(&self, action: &'static str) -> Result<(), SessionError> {
        if self.venue.connected() {
            Ok(())
        } else {
            error!("Error trying to {}: market maker stopped", action);
            Err(SessionError::SendFailed {
                action,
                reason: "market maker stopped".into(),
            })
        }
    }

    /// Venue traffic bypasses mailbox capacity so bursts are queued, never dropped.
    fn send(&self, request: VenueRequest, action: &'static str) -> Result<(), SessionError> {
        self.venue_available(action)?;
        info!("Sending message: {} {:?}", request.msg_type(), request);
        self.venue.do_send(request);
        Ok(())
    }

    fn publish(&self, push: Push) {
        self.hub.do_send(Publish(push));
    }

    fn publish_status(&self) {
        self.publish(Push::new(
            "session_status",
            &json!({ "session_id": self.session_id, "logged_on": self.logged_on }),
        ));
    }

    fn market_data_request(md_req_id: String, kind: SubscriptionRequestType, symbol: String) -> VenueRequest {
        VenueRequest::MarketDataRequest(MarketDataRequest {
            md_req_id,
            subscription_request_type: kind,
            market_depth: 0,
            entry_types: vec![MdEntryType::Bid, MdEntryType::Offer],
            symbols: vec![symbol],
        })
    }

    fn disable_subscription(&mut self) -> Result<Option<String>, SessionError> {
        let Some(subscription) = self.subscription.take() else {
            return Ok(None);
        };
        let request = Self::market_data_request(
            subscription.md_req_id.clone(),
            SubscriptionRequestType::DisablePreviousSnapshotPlusUpdateRequest,
            subscription.symbol.clone(),
        );
        if let Err(e) = self.send(request, "unsubscribe from market data") {
            self.subscription = Some(subscription);
            return Err(e);
        }
        info!("Unsubscribed from market data ({})", subscription.md_req_id);
        Ok(Some(subscription.md_req_id))
    }

    fn on_execution_report(&mut self, report: &ExecutionReport) {
        // status replies for orders this session never saw are not cached
        if report.exec_type == ExecType::OrderStatus && !self.orders.contains_key(&report.cl_ord_id) {
            return;
        }
        self.orders.insert(report.cl_ord_id.clone(), report.clone());
    }

    fn on_snapshot(&mut self, snapshot: &MarketDataSnapshot) {
        let (Some(bid), Some(offer)) = (
            snapshot.price_of(MdEntryType::Bid),
            snapshot.price_of(MdEntryType::Offer),
        ) else {
            warn!("Snapshot for {} is missing a side", snapshot.symbol);
            return;
        };
        self.quotes.insert(
            snapshot.symbol.clone(),
            Quote {
                symbol: snapshot.symbol.clone(),
                bid,
                offer,
                updated_at: Utc::now(),
            },
        );
    }
}

fn fresh_id(taken: impl Fn(&str) -> bool) -> String {
    (0..ID_ATTEMPTS)
        .map(|_| gen_order_id())
        .find(|id| !taken(id.as_str()))
        .unwrap_or_else(|| Uuid::new_v4().simple().to_string())
}

impl Handler<Start> for ClientSession {
    type Result = Result<StartOutcome, SessionError>;

    fn handle(&mut self, _: Start, ctx: &mut Self::Context) -> Self::Result {
        if self.logged_on {
            info!("Client already running");
            return Ok(StartOutcome::AlreadyRunning);
        }
        self.venue_available("log on")?;
        self.venue.do_send(Logon {
            session_id: self.session_id.clone(),
            counterparty: ctx.address().recipient(),
        });
        self.logged_on = true;
        info!("Logon - {}", self.session_id);
        self.publish_status();
        Ok(StartOutcome::Started)
    }
}

impl Handler<Stop> for ClientSession {
    type Result = Result<(), SessionError>;

    fn handle(&mut self, _: Stop, _: &mut Self::Context) -> Self::Result {
        self.check_session()?;
        self.venue_available("log out")?;
        self.venue.do_send(Logout {
            session_id: self.session_id.clone(),
        });
        self.logged_on = false;
        self.subscription = None;
        info!("Logout - {}", self.session_id);
        self.publish_status();
        Ok(())
    }
}

impl Handler<PlaceOrder> for ClientSession {
    type Result = Result<String, SessionError>;

    fn handle(&mut self, msg: PlaceOrder, _: &mut Self::Context) -> Self::Result {
        self.check_session()?;
        let cl_ord_id = self.next_id();
        let order = NewOrderSingle {
            cl_ord_id: cl_ord_id.clone(),
            symbol: msg.symbol,
            side: msg.side,
            order_qty: msg.quantity,
            ord_type: OrdType::Market,
            transact_time: Utc::now(),
        };
        info!("Order placed: {} {} {} ({})", order.side, order.order_qty, order.symbol, cl_ord_id);
        self.send(VenueRequest::NewOrderSingle(order), "place order")?;
        Ok(cl_ord_id)
    }
}

impl Handler<SubscribeMarketData> for ClientSession {
    type Result = Result<String, SessionError>;

    fn handle(&mut self, msg: SubscribeMarketData, _: &mut Self::Context) -> Self::Result {
        self.check_session()?;
        self.disable_subscription()?;

        let md_req_id = self.next_id();
        let request = Self::market_data_request(
            md_req_id.clone(),
            SubscriptionRequestType::SnapshotPlusUpdates,
            msg.symbol.clone(),
        );
        self.send(request, "subscribe to market data")?;
        info!("Subscribed to market data for {} ({})", msg.symbol, md_req_id);
        self.subscription = Some(Subscription {
            md_req_id: md_req_id.clone(),
            symbol: msg.symbol,
        });
        Ok(md_req_id)
    }
}

impl Handler<CancelMarketData> for ClientSession {
    type Result = Result<Option<String>, SessionError>;

    fn handle(&mut self, _: CancelMarketData, _: &mut Self::Context) -> Self::Result {
        self.check_session()?;
        self.disable_subscription()
    }
}

impl Handler<CancelOrder> for ClientSession {
    type Result = Result<String, SessionError>;

    fn handle(&mut self, msg: CancelOrder, _: &mut Self::Context) -> Self::Result {
        self.check_session()?;
        let cl_ord_id = self.next_id();
        let request = OrderCancelRequest {
            orig_cl_ord_id: msg.orig_cl_ord_id,
            cl_ord_id: cl_ord_id.clone(),
            symbol: msg.symbol,
            side: msg.side,
            transact_time: Utc::now(),
        };
        info!("Cancel order request sent for OrigClOrdID: {}", request.orig_cl_ord_id);
        self.send(VenueRequest::OrderCancelRequest(request), "cancel order")?;
        Ok(cl_ord_id)
    }
}

impl Handler<RequestOrderStatus> for ClientSession {
    type Result = Result<Option<ExecutionReport>, SessionError>;

    fn handle(&mut self, msg: RequestOrderStatus, _: &mut Self::Context) -> Self::Result {
        self.check_session()?;
        let last_known = self.orders.get(&msg.cl_ord_id).cloned();
        let request = OrderStatusRequest {
            cl_ord_id: msg.cl_ord_id,
            symbol: msg.symbol,
            side: msg.side,
        };
        info!("Order status request sent for ClOrdID: {}", request.cl_ord_id);
        self.send(VenueRequest::OrderStatusRequest(request), "send order status request")?;
        Ok(last_known)
    }
}

impl Handler<IsLoggedOn> for ClientSession {
    type Result = bool;

    fn handle(&mut self, _: IsLoggedOn, _: &mut Self::Context) -> bool {
        self.logged_on
    }
}

impl Handler<ListOrders> for ClientSession {
    type Result = Vec<ExecutionReport>;

    fn handle(&mut self, _: ListOrders, _: &mut Self::Context) -> Self::Result {
        let mut orders: Vec<_> = self.orders.values().cloned().collect();
        orders.sort_by(|a, b| a.transact_time.cmp(&b.transact_time));
        orders
    }
}

impl Handler<LatestQuote> for ClientSession {
    type Result = Option<Quote>;

    fn handle(&mut self, msg: LatestQuote, _: &mut Self::Context) -> Self::Result {
        self.quotes.get(&msg.symbol).cloned()
    }
}

impl Handler<CurrentSubscription> for ClientSession {
    type Result = Option<Subscription>;

    fn handle(&mut self, _: CurrentSubscription, _: &mut Self::Context) -> Self::Result {
        self.subscription.clone()
    }
}

impl Handler<AppMessage> for ClientSession {
    type Result = ();

    fn handle(&mut self, msg: AppMessage, _: &mut Self::Context) {
        info!("Received message: {} {:?}", msg.msg_type(), msg);
        if let Some(journal) = self.journal.as_mut() {
            if let Err(e) = journal.record(&msg) {
                error!("Failed to journal message: {}", e);
            }
        }

        let push = match &msg {
            AppMessage::ExecutionReport(report) => {
                self.on_execution_report(report);
                Push::new("execution_report", report)
            }
            AppMessage::OrderCancelReject(reject) => {
                warn!("Cancel rejected for OrigClOrdID {}: {:?}", reject.orig_cl_ord_id, reject.reason);
                Push::new("order_cancel_reject", reject)
            }
            AppMessage::MarketDataSnapshot(snapshot) => {
                self.on_snapshot(snapshot);
                Push::new("market_data_update", snapshot)
            }
            AppMessage::MarketDataRequestReject(reject) => {
                warn!("Market data request {} rejected: {}", reject.md_req_id, reject.text);
                if self
                    .subscription
                    .as_ref()
                    .is_some_and(|s| s.md_req_id == reject.md_req_id)
                {
                    self.subscription = None;
                }
                Push::new("market_data_reject", reject)
            }
        };
        self.publish(push);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::MarketMakerSettings;
    use rust_decimal_macros::dec;
    use std::time::Duration;

    fn start_session() -> Addr<ClientSession> {
        let venue = MarketMaker::new(&MarketMakerSettings {
            update_interval_ms: 3_600_000,
            seed: Some(3),
            ..Default::default()
        })
        .start();
        let hub = MarketDataHub::default().start();
        ClientSession::new("FIX.4.4:CLIENT->MARKETMAKER".into(), venue, hub, None).start()
    }

    async fn settle() {
        actix::clock::sleep(Duration::from_millis(50)).await;
    }

    #[test]
    fn test_quote_mid() {
        let quote = Quote {
            symbol: "USD/BRL".into(),
            bid: dec!(499.99),
            offer: dec!(500.01),
            updated_at: Utc::now(),
        };
        assert_eq!(quote.mid(), dec!(500.00));
    }

    #[actix::test]
    async fn test_commands_require_logon() {
        let session = start_session();
        let order = PlaceOrder {
            side: Side::Buy,
            symbol: "USD/BRL".into(),
            quantity: 100,
        };
        assert_eq!(session.send(order).await.unwrap(), Err(SessionError::NotLoggedOn));
        assert_eq!(
            session.send(SubscribeMarketData { symbol: "USD/BRL".into() }).await.unwrap(),
            Err(SessionError::NotLoggedOn)
        );
        assert_eq!(session.send(CancelMarketData).await.unwrap(), Err(SessionError::NotLoggedOn));
        assert_eq!(session.send(Stop).await.unwrap(), Err(SessionError::NotLoggedOn));
    }

    #[actix::test]
    async fn test_start_is_idempotent() {
        let session = start_session();
        assert_eq!(session.send(Start).await.unwrap(), Ok(StartOutcome::Started));
        assert_eq!(session.send(Start).await.unwrap(), Ok(StartOutcome::AlreadyRunning));
        assert!(session.send(IsLoggedOn).await.unwrap());

        session.send(Stop).await.unwrap().unwrap();
        assert!(!session.send(IsLoggedOn).await.unwrap());
    }

    #[actix::test]
    async fn test_order_is_filled_and_cached() {
        let session = start_session();
        session.send(Start).await.unwrap().unwrap();

        let cl_ord_id = session
            .send(PlaceOrder {
                side: Side::Sell,
                symbol: "USD/BRL".into(),
                quantity: 25,
            })
            .await
            .unwrap()
            .unwrap();
        settle().await;

        let orders = session.send(ListOrders).await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].cl_ord_id, cl_ord_id);
        assert_eq!(orders[0].ord_status, OrdStatus::Filled);
        assert_eq!(orders[0].cum_qty, 25);

        let last_known = session
            .send(RequestOrderStatus {
                cl_ord_id: cl_ord_id.clone(),
                symbol: "USD/BRL".into(),
                side: Side::Sell,
            })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(last_known.map(|r| r.ord_status), Some(OrdStatus::Filled));
    }

    #[test]
    fn test_fresh_id_terminates_when_every_short_id_is_taken() {
        let id = fresh_id(|id| id.len() == 6);
        assert_eq!(id.len(), 32);
        assert_eq!(fresh_id(|_| false).len(), 6);
    }

    #[actix::test]
    async fn test_order_burst_is_fully_processed() {
        let session = start_session();
        session.send(Start).await.unwrap().unwrap();

        // queue every order before awaiting any reply
        let requests: Vec<_> = (0..40)
            .map(|i| {
                session.send(PlaceOrder {
                    side: if i % 2 == 0 { Side::Buy } else { Side::Sell },
                    symbol: "USD/BRL".into(),
                    quantity: i + 1,
                })
            })
            .collect();
        let mut placed = Vec::new();
        for request in requests {
            placed.push(request.await.unwrap().unwrap());
        }
        actix::clock::sleep(Duration::from_millis(200)).await;

        let orders = session.send(ListOrders).await.unwrap();
        assert_eq!(orders.len(), 40);
        assert!(orders.iter().all(|o| o.ord_status == OrdStatus::Filled));
        assert!(placed.iter().all(|id| orders.iter().any(|o| &o.cl_ord_id == id)));
    }

    #[actix::test]
    async fn test_status_of_unknown_order_is_not_cached() {
        let session = start_session();
        session.send(Start).await.unwrap().unwrap();

        let last_known = session
            .send(RequestOrderStatus {
                cl_ord_id: "000001".into(),
                symbol: "USD/BRL".into(),
                side: Side::Buy,
            })
            .await
            .unwrap()
            .unwrap();
        assert!(last_known.is_none());
        settle().await;
        assert!(session.send(ListOrders).await.unwrap().is_empty());
    }

    #[actix::test]
    async fn test_subscription_lifecycle() {
        let session = start_session();
        session.send(Start).await.unwrap().unwrap();

        let first = session
            .send(SubscribeMarketData { symbol: "USD/BRL".into() })
            .await
            .unwrap()
            .unwrap();
        let second = session
            .send(SubscribeMarketData { symbol: "USD/BRL".into() })
            .await
            .unwrap()
            .unwrap();
        assert_ne!(first, second);
        settle().await;

        let quote = session.send(LatestQuote { symbol: "USD/BRL".into() }).await.unwrap().unwrap();
        assert_eq!(quote.offer - quote.bid, dec!(0.02));

        let cancelled = session.send(CancelMarketData).await.unwrap().unwrap();
        assert_eq!(cancelled, Some(second));
        assert_eq!(session.send(CancelMarketData).await.unwrap(), Ok(None));
        assert!(session.send(CurrentSubscription).await.unwrap().is_none());
    }

    #[actix::test]
    async fn test_rejected_subscription_is_cleared() {
        let session = start_session();
        session.send(Start).await.unwrap().unwrap();

        session
            .send(SubscribeMarketData { symbol: "EUR/USD".into() })
            .await
            .unwrap()
            .unwrap();
        settle().await;

        assert!(session.send(CurrentSubscription).await.unwrap().is_none());
    }
}
