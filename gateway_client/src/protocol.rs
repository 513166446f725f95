//! Protocol Module
//!
//! Parses console commands of the form `action -tag value ...` (tags are FIX
//! tag numbers) and maps them onto gateway HTTP requests. Also decodes gateway
//! replies and push events.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use thiserror::Error;

pub const TAG_CL_ORD_ID: &str = "11";
pub const TAG_ORDER_QTY: &str = "38";
pub const TAG_ORIG_CL_ORD_ID: &str = "41";
pub const TAG_SIDE: &str = "54";
pub const TAG_SYMBOL: &str = "55";
/// Not a FIX tag: amount to convert for `calc`.
pub const TAG_AMOUNT: &str = "6";

pub const HELP: &str = "\
Available actions:
  start                          log on to the market maker
  stop                           log out
  buy  [-55 symbol] [-38 qty]    market buy
  sell [-55 symbol] [-38 qty]    market sell
  subscribe [-55 symbol]         stream bid/offer snapshots
  unsubscribe                    stop the market data stream
  cancel -41 origClOrdID [-55 symbol] [-54 side]
  status -11 clOrdID [-55 symbol] [-54 side]
  orders                         last execution report per order
  calc -6 amount [-55 USD/BRL|BRL/USD]
  stats                          request latency statistics
  quit";

#[derive(Debug, Error, PartialEq)]
pub enum ProtocolError {
    #[error("Empty command")]
    Empty,

    #[error("Malformed tag '{0}', expected -<tag>")]
    MalformedTag(String),

    #[error("Missing value for tag -{0}")]
    MissingValue(String),

    #[error("Missing required tag -{0}")]
    MissingTag(&'static str),

    #[error("Invalid value for tag -{tag}: {value}")]
    InvalidValue { tag: &'static str, value: String },

    #[error("Invalid action: {0}. Type 'help' for the list of actions")]
    UnknownAction(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// FIX convention: `1` is buy, anything else sell.
    pub fn from_tag(value: &str) -> Self {
        if value == "1" {
            Side::Buy
        } else {
            Side::Sell
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

/// Values used when a command leaves a tag out.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandDefaults {
    pub symbol: String,
    pub quantity: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start,
    Stop,
    Order { side: Side, symbol: String, quantity: u64 },
    Subscribe { symbol: String },
    Unsubscribe,
    Cancel { orig_cl_ord_id: String, symbol: String, side: Side },
    Status { cl_ord_id: String, symbol: String, side: Side },
    Orders,
    Calculate { symbol: String, amount: String },
    Stats,
    Help,
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// One gateway call.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub method: HttpMethod,
    pub path: &'static str,
    pub body: Option<Value>,
}

impl Route {
    fn get(path: &'static str) -> Self {
        Self { method: HttpMethod::Get, path, body: None }
    }

    fn post(path: &'static str, body: Option<Value>) -> Self {
        Self { method: HttpMethod::Post, path, body }
    }
}

/// Split `action -tag value -tag value` into the action and its tags.
pub fn parse_input(input: &str) -> Result<(String, HashMap<String, String>), ProtocolError> {
    let mut parts = input.split_whitespace();
    let action = parts.next().ok_or(ProtocolError::Empty)?.to_lowercase();

    let mut tags = HashMap::new();
    while let Some(raw_tag) = parts.next() {
        let tag = raw_tag
            .strip_prefix('-')
            .filter(|t| !t.is_empty())
            .ok_or_else(|| ProtocolError::MalformedTag(raw_tag.to_string()))?;
        let value = parts
            .next()
            .ok_or_else(|| ProtocolError::MissingValue(tag.to_string()))?;
        tags.insert(tag.to_string(), value.to_string());
    }
    Ok((action, tags))
}

impl Command {
    pub fn parse(input: &str, defaults: &CommandDefaults) -> Result<Self, ProtocolError> {
        let (action, tags) = parse_input(input)?;
        let symbol = || {
            tags.get(TAG_SYMBOL)
                .cloned()
                .unwrap_or_else(|| defaults.symbol.clone())
        };
        let side = || tags.get(TAG_SIDE).map(|v| Side::from_tag(v)).unwrap_or(Side::Buy);
        let required = |tag: &'static str| tags.get(tag).cloned().ok_or(ProtocolError::MissingTag(tag));

        let command = match action.as_str() {
            "start" => Command::Start,
            "stop" => Command::Stop,
            "buy" | "sell" => {
                let quantity = match tags.get(TAG_ORDER_QTY) {
                    None => defaults.quantity,
                    Some(v) => v
                        .parse::<u64>()
                        .ok()
                        .filter(|q| *q > 0)
                        .ok_or_else(|| ProtocolError::InvalidValue {
                            tag: TAG_ORDER_QTY,
                            value: v.clone(),
                        })?,
                };
                let side = if action == "buy" { Side::Buy } else { Side::Sell };
                Command::Order { side, symbol: symbol(), quantity }
            }
            "subscribe" => Command::Subscribe { symbol: symbol() },
            "unsubscribe" => Command::Unsubscribe,
            "cancel" => Command::Cancel {
                orig_cl_ord_id: required(TAG_ORIG_CL_ORD_ID)?,
                symbol: symbol(),
                side: side(),
            },
            "status" => Command::Status {
                cl_ord_id: required(TAG_CL_ORD_ID)?,
                symbol: symbol(),
                side: side(),
            },
            "orders" => Command::Orders,
            "calc" => {
                let amount = required(TAG_AMOUNT)?;
                if !amount.parse::<f64>().is_ok_and(|a| a > 0.0) {
                    return Err(ProtocolError::InvalidValue { tag: TAG_AMOUNT, value: amount });
                }
                Command::Calculate { symbol: symbol(), amount }
            }
            "stats" => Command::Stats,
            "help" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => return Err(ProtocolError::UnknownAction(other.to_string())),
        };
        Ok(command)
    }

    /// Name used for latency bookkeeping.
    pub fn action(&self) -> &'static str {
        match self {
            Command::Start => "start",
            Command::Stop => "stop",
            Command::Order { side, .. } => side.as_str(),
            Command::Subscribe { .. } => "subscribe",
            Command::Unsubscribe => "unsubscribe",
            Command::Cancel { .. } => "cancel",
            Command::Status { .. } => "status",
            Command::Orders => "orders",
            Command::Calculate { .. } => "calc",
            Command::Stats => "stats",
            Command::Help => "help",
            Command::Quit => "quit",
        }
    }

    /// The gateway call for this command, `None` for local commands.
    pub fn route(&self) -> Option<Route> {
        let route = match self {
            Command::Start => Route::get("/start"),
            Command::Stop => Route::post("/stop", None),
            Command::Order { side, symbol, quantity } => Route::post(
                "/order",
                Some(json!({ "action": side.as_str(), "symbol": symbol, "quantity": quantity })),
            ),
            Command::Subscribe { symbol } => Route::post("/subscribe", Some(json!({ "symbol": symbol }))),
            Command::Unsubscribe => Route::post("/unsubscribe", None),
            Command::Cancel { orig_cl_ord_id, symbol, side } => Route::post(
                "/cancel",
                Some(json!({ "orig_cl_ord_id": orig_cl_ord_id, "symbol": symbol, "side": side })),
            ),
            Command::Status { cl_ord_id, symbol, side } => Route::post(
                "/order-status",
                Some(json!({ "cl_ord_id": cl_ord_id, "symbol": symbol, "side": side })),
            ),
            Command::Orders => Route::get("/orders"),
            Command::Calculate { symbol, amount } => Route::post(
                "/calculate",
                Some(json!({ "symbol": symbol, "amount": amount })),
            ),
            Command::Stats | Command::Help | Command::Quit => return None,
        };
        Some(route)
    }
}

/// Error text of a gateway reply, falling back to the raw body.
pub fn error_message(reply: &Value) -> String {
    match reply.get("error").and_then(Value::as_str) {
        Some(error) => error.to_string(),
        None => reply.to_string(),
    }
}

/// One line per reply for the console.
pub fn describe_reply(reply: &Value) -> String {
    if let Some(orders) = reply.as_array() {
        if orders.is_empty() {
            return "No orders".to_string();
        }
        return orders.iter().map(describe_order).collect::<Vec<_>>().join("\n");
    }

    let mut line = reply
        .get("status")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_default();
    for key in ["cl_ord_id", "md_req_id"] {
        if let Some(id) = reply.get(key).and_then(Value::as_str) {
            line.push_str(&format!(" ({}: {})", key, id));
        }
    }
    if let Some(order) = reply.get("order").filter(|o| !o.is_null()) {
        line.push_str(&format!("\n{}", describe_order(order)));
    }
    if let Some(price) = reply.get("price") {
        line = format!(
            "{} {} = {} (rate {})",
            reply["amount"].as_str().unwrap_or_default(),
            reply["symbol"].as_str().unwrap_or_default(),
            price.as_str().unwrap_or_default(),
            reply["rate"].as_str().unwrap_or_default(),
        );
    }
    if line.is_empty() {
        reply.to_string()
    } else {
        line
    }
}

fn describe_order(order: &Value) -> String {
    let mut line = format!(
        "{} {} {} {} {}/{} @ {}",
        order["cl_ord_id"].as_str().unwrap_or("?"),
        order["ord_status"].as_str().unwrap_or("?"),
        order["side"].as_str().unwrap_or("?"),
        order["symbol"].as_str().unwrap_or("?"),
        order["cum_qty"],
        order["order_qty"],
        order["avg_px"].as_str().unwrap_or("?"),
    );
    if let Some(text) = order["text"].as_str() {
        line.push_str(&format!(" - {}", text));
    }
    line
}

/// Event pushed by the gateway over `/ws`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PushEvent {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl PushEvent {
    pub fn summary(&self) -> String {
        match self.event.as_str() {
            "market_data_update" => {
                let px = |kind: &str| {
                    self.data["entries"]
                        .as_array()
                        .and_then(|entries| entries.iter().find(|e| e["entry_type"] == kind))
                        .and_then(|e| e["px"].as_str())
                        .unwrap_or("-")
                        .to_string()
                };
                format!(
                    "[market data] {} bid {} offer {}",
                    self.data["symbol"].as_str().unwrap_or("?"),
                    px("Bid"),
                    px("Offer"),
                )
            }
            "execution_report" => format!("[execution] {}", describe_order(&self.data)),
            "session_status" => format!(
                "[session] {} logged on: {}",
                self.data["session_id"].as_str().unwrap_or("?"),
                self.data["logged_on"]
            ),
            other => format!("[{}] {}", other, self.data),
        }
    }
}

/// Parse an incoming push event
pub fn parse_push(json: &str) -> Result<PushEvent, serde_json::Error> {
    serde_json::from_str(json)
}
