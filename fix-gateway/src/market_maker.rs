//! Simulated market maker.
//!
//! Quotes a two-sided market around a random-walk mid for each symbol, fills
//! market orders at the mid, rejects cancels and streams snapshots to
//! subscribers on a fixed interval.

use actix::prelude::*;
use chrono::Utc;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

use crate::messages::*;
use crate::settings::MarketMakerSettings;

const HALF_SPREAD: Decimal = dec!(0.01);
const PRICE_FLOOR: Decimal = dec!(0.01);
/// Largest mid move per tick, in ten-thousandths.
const MAX_STEP_BPS: i64 = 5_000;

pub struct MarketMaker {
    symbols: Vec<String>,
    prices: HashMap<String, Decimal>,
    /// md_req_id -> symbols
    subscriptions: HashMap<String, Vec<String>>,
    /// cl_ord_id -> last report issued for it
    orders: HashMap<String, ExecutionReport>,
    entry_size: Decimal,
    update_interval: Duration,
    rng: StdRng,
    counterparty: Option<Recipient<AppMessage>>,
}

impl Actor for MarketMaker {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        info!(
            "Market maker started for {:?}, publishing every {:?}",
            self.symbols, self.update_interval
        );
        ctx.run_interval(self.update_interval, |act, _| {
            let updates = act.tick();
            act.deliver(updates);
        });
    }
}

/// Attach the session that receives replies and market data.
#[derive(Message)]
#[rtype(result = "()")]
pub struct Logon {
    pub session_id: String,
    pub counterparty: Recipient<AppMessage>,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct Logout {
    pub session_id: String,
}

impl MarketMaker {
    pub fn new(settings: &MarketMakerSettings) -> Self {
        let mut rng = match settings.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let prices = settings
            .symbols
            .iter()
            .map(|symbol| {
                let mid = Decimal::new(rng.gen_range(1_000_000..=10_000_000), 4);
                (symbol.clone(), mid)
            })
            .collect();

        Self {
            symbols: settings.symbols.clone(),
            prices,
            subscriptions: HashMap::new(),
            orders: HashMap::new(),
            entry_size: Decimal::from(settings.entry_size),
            update_interval: settings.update_interval(),
            rng,
            counterparty: None,
        }
    }

    pub fn mid(&self, symbol: &str) -> Option<Decimal> {
        self.prices.get(symbol).copied()
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    /// Process one request and return the replies for the session.
    pub fn handle_request(&mut self, request: VenueRequest) -> Vec<AppMessage> {
        match request {
            VenueRequest::NewOrderSingle(order) => self.handle_new_order(order),
            VenueRequest::OrderCancelRequest(cancel) => vec![self.handle_cancel_request(cancel)],
            VenueRequest::OrderStatusRequest(status) => vec![self.handle_status_request(status)],
            VenueRequest::MarketDataRequest(request) => self.handle_market_data_request(request),
        }
    }

    /// Move every mid one step and build a snapshot for every subscription.
    pub fn tick(&mut self) -> Vec<AppMessage> {
        for symbol in &self.symbols {
            let step = Decimal::new(self.rng.gen_range(-MAX_STEP_BPS..=MAX_STEP_BPS), 4);
            if let Some(mid) = self.prices.get_mut(symbol) {
                *mid = (*mid + step).max(PRICE_FLOOR);
            }
        }

        self.subscriptions
            .iter()
            .flat_map(|(md_req_id, symbols)| {
                symbols
                    .iter()
                    .filter_map(|symbol| self.snapshot(md_req_id, symbol))
                    .map(AppMessage::MarketDataSnapshot)
            })
            .collect()
    }

    fn handle_new_order(&mut self, order: NewOrderSingle) -> Vec<AppMessage> {
        let order_id = Uuid::new_v4().to_string();
        let mut report = ExecutionReport {
            order_id,
            exec_id: Uuid::new_v4().to_string(),
            cl_ord_id: order.cl_ord_id.clone(),
            exec_type: ExecType::New,
            ord_status: OrdStatus::New,
            symbol: order.symbol.clone(),
            side: order.side,
            order_qty: order.order_qty,
            last_qty: None,
            last_px: None,
            cum_qty: 0,
            leaves_qty: order.order_qty,
            avg_px: Decimal::ZERO,
            text: None,
            transact_time: Utc::now(),
        };

        let fill_price = if order.order_qty == 0 {
            Err("Order quantity must be positive".to_string())
        } else {
            self.mid(&order.symbol)
                .ok_or_else(|| format!("Unknown symbol {}", order.symbol))
        };

        match fill_price {
            Ok(mid) => {
                let ack = report.clone();

                report.exec_id = Uuid::new_v4().to_string();
                report.exec_type = ExecType::Trade;
                report.ord_status = OrdStatus::Filled;
                report.last_qty = Some(order.order_qty);
                report.last_px = Some(mid);
                report.cum_qty = order.order_qty;
                report.leaves_qty = 0;
                report.avg_px = mid;
                report.transact_time = Utc::now();

                debug!(
                    "Filled {} {} {} at {} ({})",
                    order.side, order.order_qty, order.symbol, mid, order.cl_ord_id
                );
                self.orders.insert(order.cl_ord_id, report.clone());
                vec![AppMessage::ExecutionReport(ack), AppMessage::ExecutionReport(report)]
            }
            Err(text) => {
                warn!("Rejecting order {}: {}", order.cl_ord_id, text);
                report.exec_type = ExecType::Rejected;
                report.ord_status = OrdStatus::Rejected;
                report.leaves_qty = 0;
                report.text = Some(text);
                self.orders.insert(order.cl_ord_id, report.clone());
                vec![AppMessage::ExecutionReport(report)]
            }
        }
    }

    fn handle_cancel_request(&mut self, cancel: OrderCancelRequest) -> AppMessage {
        let reject = match self.orders.get(&cancel.orig_cl_ord_id) {
            Some(order) => OrderCancelReject {
                order_id: order.order_id.clone(),
                cl_ord_id: cancel.cl_ord_id,
                orig_cl_ord_id: cancel.orig_cl_ord_id,
                ord_status: order.ord_status,
                reason: CxlRejReason::TooLateToCancel,
                text: Some("Order is no longer open".into()),
            },
            None => OrderCancelReject {
                order_id: "NONE".into(),
                cl_ord_id: cancel.cl_ord_id,
                orig_cl_ord_id: cancel.orig_cl_ord_id,
                ord_status: OrdStatus::Rejected,
                reason: CxlRejReason::UnknownOrder,
                text: Some("Unknown order".into()),
            },
        };
        AppMessage::OrderCancelReject(reject)
    }

    fn handle_status_request(&mut self, status: OrderStatusRequest) -> AppMessage {
        let report = match self.orders.get(&status.cl_ord_id) {
            Some(order) => ExecutionReport {
                exec_id: Uuid::new_v4().to_string(),
                exec_type: ExecType::OrderStatus,
                last_qty: None,
                last_px: None,
                transact_time: Utc::now(),
                ..order.clone()
            },
            None => ExecutionReport {
                order_id: "NONE".into(),
                exec_id: Uuid::new_v4().to_string(),
                cl_ord_id: status.cl_ord_id,
                exec_type: ExecType::OrderStatus,
                ord_status: OrdStatus::Rejected,
                symbol: status.symbol,
                side: status.side,
                order_qty: 0,
                last_qty: None,
                last_px: None,
                cum_qty: 0,
                leaves_qty: 0,
                avg_px: Decimal::ZERO,
                text: Some("Unknown order".into()),
                transact_time: Utc::now(),
            },
        };
        AppMessage::ExecutionReport(report)
    }

    fn handle_market_data_request(&mut self, request: MarketDataRequest) -> Vec<AppMessage> {
        match request.subscription_request_type {
            SubscriptionRequestType::DisablePreviousSnapshotPlusUpdateRequest => {
                if self.subscriptions.remove(&request.md_req_id).is_none() {
                    debug!("Ignoring unsubscribe for unknown MDReqID {}", request.md_req_id);
                }
                Vec::new()
            }
            kind => {
                if let Some(unknown) = request.symbols.iter().find(|s| !self.prices.contains_key(*s)) {
                    return vec![AppMessage::MarketDataRequestReject(MarketDataRequestReject {
                        md_req_id: request.md_req_id,
                        text: format!("Unknown symbol {}", unknown),
                    })];
                }
                if request.symbols.is_empty() {
                    return vec![AppMessage::MarketDataRequestReject(MarketDataRequestReject {
                        md_req_id: request.md_req_id,
                        text: "No symbols requested".into(),
                    })];
                }

                let snapshots = request
                    .symbols
                    .iter()
                    .filter_map(|symbol| self.snapshot(&request.md_req_id, symbol))
                    .map(AppMessage::MarketDataSnapshot)
                    .collect();
                if kind == SubscriptionRequestType::SnapshotPlusUpdates {
                    self.subscriptions.insert(request.md_req_id, request.symbols);
                }
                snapshots
            }
        }
    }

    fn snapshot(&self, md_req_id: &str, symbol: &str) -> Option<MarketDataSnapshot> {
        let mid = self.mid(symbol)?;
        Some(MarketDataSnapshot {
            md_req_id: md_req_id.to_string(),
            symbol: symbol.to_string(),
            entries: vec![
                MdEntry {
                    entry_type: MdEntryType::Bid,
                    px: mid - HALF_SPREAD,
                    size: self.entry_size,
                },
                MdEntry {
                    entry_type: MdEntryType::Offer,
                    px: mid + HALF_SPREAD,
                    size: self.entry_size,
                },
            ],
        })
    }

    fn deliver(&self, messages: Vec<AppMessage>) {
        if messages.is_empty() {
            return;
        }
        let Some(counterparty) = &self.counterparty else {
            debug!("No session logged on, dropping {} messages", messages.len());
            return;
        };
        for message in messages {
            debug!("Sending message: {:?}", message);
            counterparty.do_send(message);
        }
    }
}

impl Handler<Logon> for MarketMaker {
    type Result = ();

    fn handle(&mut self, msg: Logon, _: &mut Self::Context) {
        info!("Logon - {}", msg.session_id);
        self.counterparty = Some(msg.counterparty);
    }
}

impl Handler<Logout> for MarketMaker {
    type Result = ();

    fn handle(&mut self, msg: Logout, _: &mut Self::Context) {
        info!("Logout - {}", msg.session_id);
        self.counterparty = None;
        self.subscriptions.clear();
    }
}

impl Handler<VenueRequest> for MarketMaker {
    type Result = ();

    fn handle(&mut self, msg: VenueRequest, _: &mut Self::Context) {
        info!("Received message: {} {:?}", msg.msg_type(), msg);
        let replies = self.handle_request(msg);
        self.deliver(replies);
    }
}
