//! Application messages exchanged between the order-entry session and the venue.
//!
//! The types follow FIX 4.4 field semantics (every enumeration knows its FIX
//! code) but travel between actors as plain Rust values.

use actix::Message;
use chrono::{DateTime, Utc};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Random six-digit identifier used for ClOrdID and MDReqID values.
pub fn gen_order_id() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn code(self) -> char {
        match self {
            Side::Buy => '1',
            Side::Sell => '2',
        }
    }
}

impl FromStr for Side {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "buy" | "1" => Ok(Side::Buy),
            "sell" | "2" => Ok(Side::Sell),
            other => Err(format!("Invalid side: {}", other)),
        }
    }
}

impl TryFrom<String> for Side {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => f.write_str("buy"),
            Side::Sell => f.write_str("sell"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrdType {
    Market,
}

impl OrdType {
    pub fn code(self) -> char {
        match self {
            OrdType::Market => '1',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecType {
    New,
    Trade,
    Rejected,
    OrderStatus,
}

impl ExecType {
    pub fn code(self) -> char {
        match self {
            ExecType::New => '0',
            ExecType::Trade => 'F',
            ExecType::Rejected => '8',
            ExecType::OrderStatus => 'I',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrdStatus {
    New,
    Filled,
    Rejected,
}

impl OrdStatus {
    pub fn code(self) -> char {
        match self {
            OrdStatus::New => '0',
            OrdStatus::Filled => '2',
            OrdStatus::Rejected => '8',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionRequestType {
    Snapshot,
    SnapshotPlusUpdates,
    DisablePreviousSnapshotPlusUpdateRequest,
}

impl SubscriptionRequestType {
    pub fn code(self) -> char {
        match self {
            SubscriptionRequestType::Snapshot => '0',
            SubscriptionRequestType::SnapshotPlusUpdates => '1',
            SubscriptionRequestType::DisablePreviousSnapshotPlusUpdateRequest => '2',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MdEntryType {
    Bid,
    Offer,
}

impl MdEntryType {
    pub fn code(self) -> char {
        match self {
            MdEntryType::Bid => '0',
            MdEntryType::Offer => '1',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CxlRejReason {
    TooLateToCancel,
    UnknownOrder,
    Other,
}

impl CxlRejReason {
    pub fn code(self) -> &'static str {
        match self {
            CxlRejReason::TooLateToCancel => "0",
            CxlRejReason::UnknownOrder => "1",
            CxlRejReason::Other => "99",
        }
    }
}

// ============================================================================
// Session -> venue
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewOrderSingle {
    pub cl_ord_id: String,
    pub symbol: String,
    pub side: Side,
    pub order_qty: u64,
    pub ord_type: OrdType,
    pub transact_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderCancelRequest {
    pub orig_cl_ord_id: String,
    pub cl_ord_id: String,
    pub symbol: String,
    pub side: Side,
    pub transact_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderStatusRequest {
    pub cl_ord_id: String,
    pub symbol: String,
    pub side: Side,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketDataRequest {
    pub md_req_id: String,
    pub subscription_request_type: SubscriptionRequestType,
    /// 0 means full book.
    pub market_depth: u32,
    pub entry_types: Vec<MdEntryType>,
    pub symbols: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Message)]
#[rtype(result = "()")]
pub enum VenueRequest {
    NewOrderSingle(NewOrderSingle),
    OrderCancelRequest(OrderCancelRequest),
    OrderStatusRequest(OrderStatusRequest),
    MarketDataRequest(MarketDataRequest),
}

impl VenueRequest {
    pub fn msg_type(&self) -> &'static str {
        match self {
            VenueRequest::NewOrderSingle(_) => "D",
            VenueRequest::OrderCancelRequest(_) => "F",
            VenueRequest::OrderStatusRequest(_) => "H",
            VenueRequest::MarketDataRequest(_) => "V",
        }
    }
}

// ============================================================================
// Venue -> session
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionReport {
    pub order_id: String,
    pub exec_id: String,
    pub cl_ord_id: String,
    pub exec_type: ExecType,
    pub ord_status: OrdStatus,
    pub symbol: String,
    pub side: Side,
    pub order_qty: u64,
    pub last_qty: Option<u64>,
    pub last_px: Option<Decimal>,
    pub cum_qty: u64,
    pub leaves_qty: u64,
    pub avg_px: Decimal,
    pub text: Option<String>,
    pub transact_time: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderCancelReject {
    pub order_id: String,
    pub cl_ord_id: String,
    pub orig_cl_ord_id: String,
    pub ord_status: OrdStatus,
    pub reason: CxlRejReason,
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MdEntry {
    pub entry_type: MdEntryType,
    pub px: Decimal,
    pub size: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketDataSnapshot {
    pub md_req_id: String,
    pub symbol: String,
    pub entries: Vec<MdEntry>,
}

impl MarketDataSnapshot {
    /// Price of the first entry of the given type.
    pub fn price_of(&self, entry_type: MdEntryType) -> Option<Decimal> {
        self.entries
            .iter()
            .find(|entry| entry.entry_type == entry_type)
            .map(|entry| entry.px)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketDataRequestReject {
    pub md_req_id: String,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Message)]
#[rtype(result = "()")]
pub enum AppMessage {
    ExecutionReport(ExecutionReport),
    OrderCancelReject(OrderCancelReject),
    MarketDataSnapshot(MarketDataSnapshot),
    MarketDataRequestReject(MarketDataRequestReject),
}

impl AppMessage {
    pub fn msg_type(&self) -> &'static str {
        match self {
            AppMessage::ExecutionReport(_) => "8",
            AppMessage::OrderCancelReject(_) => "9",
            AppMessage::MarketDataSnapshot(_) => "W",
            AppMessage::MarketDataRequestReject(_) => "Y",
        }
    }
}
