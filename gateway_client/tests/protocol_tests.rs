//! Protocol Module Tests
//!
//! Unit tests and property-based tests for command parsing and routing.

use gateway_client::protocol::{self, Command, CommandDefaults, HttpMethod, ProtocolError, Side};
use proptest::prelude::*;
use serde_json::json;

fn defaults() -> CommandDefaults {
    CommandDefaults {
        symbol: "USD/BRL".to_string(),
        quantity: 100,
    }
}

#[test]
fn test_buy_with_tags() {
    let command = Command::parse("buy -55 BRL/USD -38 25", &defaults()).unwrap();
    assert_eq!(
        command,
        Command::Order {
            side: Side::Buy,
            symbol: "BRL/USD".into(),
            quantity: 25
        }
    );
    assert_eq!(command.action(), "buy");
}

#[test]
fn test_invalid_quantity() {
    for qty in ["0", "-3", "ten", "1.5"] {
        let err = Command::parse(&format!("sell -38 {}", qty), &defaults()).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::InvalidValue {
                tag: "38",
                value: qty.to_string()
            }
        );
    }
}

#[test]
fn test_unknown_action() {
    let err = Command::parse("hold -55 USD/BRL", &defaults()).unwrap_err();
    assert_eq!(err, ProtocolError::UnknownAction("hold".into()));
}

#[test]
fn test_status_route() {
    let command = Command::parse("status -11 123456 -54 2", &defaults()).unwrap();
    let route = command.route().unwrap();
    assert_eq!(route.method, HttpMethod::Post);
    assert_eq!(route.path, "/order-status");
    assert_eq!(
        route.body,
        Some(json!({"cl_ord_id": "123456", "symbol": "USD/BRL", "side": "sell"}))
    );
}

#[test]
fn test_status_requires_cl_ord_id() {
    assert_eq!(
        Command::parse("status -41 123456", &defaults()),
        Err(ProtocolError::MissingTag("11"))
    );
}

#[test]
fn test_session_routes() {
    let start = Command::parse("start", &defaults()).unwrap().route().unwrap();
    assert_eq!((start.method, start.path), (HttpMethod::Get, "/start"));

    let stop = Command::parse("STOP", &defaults()).unwrap().route().unwrap();
    assert_eq!((stop.method, stop.path, stop.body), (HttpMethod::Post, "/stop", None));

    let orders = Command::parse("orders", &defaults()).unwrap().route().unwrap();
    assert_eq!((orders.method, orders.path), (HttpMethod::Get, "/orders"));
}

#[test]
fn test_calc_requires_positive_amount() {
    assert_eq!(
        Command::parse("calc", &defaults()),
        Err(ProtocolError::MissingTag("6"))
    );
    assert!(Command::parse("calc -6 -2", &defaults()).is_err());

    let route = Command::parse("calc -6 2.5 -55 BRL/USD", &defaults())
        .unwrap()
        .route()
        .unwrap();
    assert_eq!(route.path, "/calculate");
    assert_eq!(route.body, Some(json!({"symbol": "BRL/USD", "amount": "2.5"})));
}

#[test]
fn test_error_message_prefers_error_field() {
    assert_eq!(
        protocol::error_message(&json!({"error": "Invalid action"})),
        "Invalid action"
    );
    assert_eq!(protocol::error_message(&json!({"oops": 1})), r#"{"oops":1}"#);
}

#[test]
fn test_describe_orders() {
    let reply = json!([{
        "cl_ord_id": "123456",
        "ord_status": "Rejected",
        "side": "buy",
        "symbol": "EUR/USD",
        "cum_qty": 0,
        "order_qty": 5,
        "avg_px": "0",
        "text": "Unknown symbol EUR/USD"
    }]);
    assert_eq!(
        protocol::describe_reply(&reply),
        "123456 Rejected buy EUR/USD 0/5 @ 0 - Unknown symbol EUR/USD"
    );
}

#[test]
fn test_describe_calculation() {
    let reply = json!({"symbol": "USD/BRL", "amount": "2", "rate": "5.4321", "price": "10.86"});
    assert_eq!(protocol::describe_reply(&reply), "2 USD/BRL = 10.86 (rate 5.4321)");
}

#[test]
fn test_session_status_push() {
    let event = protocol::parse_push(
        r#"{"event":"session_status","data":{"session_id":"FIX.4.4:CLIENT->MARKETMAKER","logged_on":true}}"#,
    )
    .unwrap();
    assert_eq!(
        event.summary(),
        "[session] FIX.4.4:CLIENT->MARKETMAKER logged on: true"
    );
}

#[test]
fn test_unparseable_push_is_an_error() {
    assert!(protocol::parse_push("not json").is_err());
    assert!(protocol::parse_push(r#"{"data":{}}"#).is_err());
}

// ============================================================================
// Property-Based Tests
// ============================================================================

fn symbol_strategy() -> impl Strategy<Value = String> {
    "[A-Z]{3}/[A-Z]{3}"
}

proptest! {
    /// Tags come back exactly as typed, regardless of order.
    #[test]
    fn prop_parse_input_keeps_tag_values(
        symbol in symbol_strategy(),
        qty in 1u64..1_000_000u64,
        symbol_first in any::<bool>()
    ) {
        let line = if symbol_first {
            format!("buy -55 {} -38 {}", symbol, qty)
        } else {
            format!("buy -38 {} -55 {}", qty, symbol)
        };
        let (action, tags) = protocol::parse_input(&line).unwrap();
        prop_assert_eq!(action, "buy");
        prop_assert_eq!(tags.get("55"), Some(&symbol));
        prop_assert_eq!(tags.get("38"), Some(&qty.to_string()));
    }

    /// A dangling tag without a value is always reported.
    #[test]
    fn prop_dangling_tag_is_rejected(tag in "[0-9]{1,3}") {
        let line = format!("sell -{}", tag);
        prop_assert_eq!(protocol::parse_input(&line), Err(ProtocolError::MissingValue(tag)));
    }

    /// Only side `1` is a buy.
    #[test]
    fn prop_side_tag(value in "[0-9]{1,2}") {
        let command = Command::parse(&format!("cancel -41 123456 -54 {}", value), &defaults()).unwrap();
        let expected = if value == "1" { Side::Buy } else { Side::Sell };
        match command {
            Command::Cancel { side, .. } => prop_assert_eq!(side, expected),
            other => prop_assert!(false, "unexpected command {:?}", other),
        }
    }

    /// Orders route to /order with the typed side, symbol and quantity.
    #[test]
    fn prop_order_route_body(
        symbol in symbol_strategy(),
        qty in 1u64..1_000_000u64,
        buy in any::<bool>()
    ) {
        let action = if buy { "buy" } else { "sell" };
        let command = Command::parse(&format!("{} -55 {} -38 {}", action, symbol, qty), &defaults()).unwrap();
        let route = command.route().unwrap();
        prop_assert_eq!(route.path, "/order");
        prop_assert_eq!(route.body, Some(json!({"action": action, "symbol": symbol, "quantity": qty})));
    }
}
