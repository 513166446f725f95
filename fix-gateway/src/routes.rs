//! HTTP API of the gateway.

use actix::MailboxError;
use actix_web::http::StatusCode;
use actix_web::{get, post, web, Error, HttpRequest, HttpResponse, ResponseError};
use actix_web_actors::ws;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::{json, Number};
use thiserror::Error;

use crate::gateway::Gateway;
use crate::messages::Side;
use crate::pricing::{calculate_price, PricingError};
use crate::session::*;
use crate::websocket::WebSocketActor;

const INDEX_HTML: &str = include_str!("../static/index.html");

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Not logged on to any session")]
    NotLoggedOn,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    Session(SessionError),

    #[error("Session unavailable: {0}")]
    Mailbox(#[from] MailboxError),
}

impl From<SessionError> for ApiError {
    fn from(e: SessionError) -> Self {
        match e {
            SessionError::NotLoggedOn => ApiError::NotLoggedOn,
            other => ApiError::Session(other),
        }
    }
}

impl From<PricingError> for ApiError {
    fn from(e: PricingError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotLoggedOn => StatusCode::FORBIDDEN,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Session(_) | ApiError::Mailbox(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let status = self.status_code();
        if status.is_server_error() {
            error!("{}", self);
        } else {
            warn!("{}", self);
        }
        HttpResponse::build(status).json(json!({ "error": self.to_string() }))
    }
}

/// Quantity as sent by forms (string) or API callers (number).
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum QuantityField {
    Number(Number),
    Text(String),
}

impl QuantityField {
    fn positive(&self) -> Option<u64> {
        let quantity = match self {
            QuantityField::Number(n) => n.as_u64(),
            QuantityField::Text(s) => s.trim().parse().ok(),
        };
        quantity.filter(|q| *q > 0)
    }
}

#[derive(Debug, Deserialize)]
pub struct OrderBody {
    pub action: Option<String>,
    pub symbol: Option<String>,
    pub quantity: Option<QuantityField>,
}

#[derive(Debug, Deserialize)]
pub struct SubscribeBody {
    pub symbol: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct CancelBody {
    pub orig_cl_ord_id: Option<String>,
    pub symbol: Option<String>,
    pub side: Option<Side>,
}

#[derive(Debug, Deserialize)]
pub struct OrderStatusBody {
    pub cl_ord_id: Option<String>,
    pub symbol: Option<String>,
    pub side: Option<Side>,
}

#[derive(Debug, Deserialize)]
pub struct CalculateBody {
    pub symbol: String,
    pub amount: Decimal,
}

async fn require_logon(gateway: &Gateway) -> Result<(), ApiError> {
    if gateway.session.send(IsLoggedOn).await? {
        Ok(())
    } else {
        Err(ApiError::NotLoggedOn)
    }
}

fn resolve_symbol(symbol: Option<String>, gateway: &Gateway) -> Result<String, ApiError> {
    let symbol = symbol.unwrap_or_else(|| gateway.orders.default_symbol.clone());
    let trimmed = symbol.trim();
    if trimmed.is_empty() {
        return Err(ApiError::BadRequest("Symbol is required".into()));
    }
    Ok(trimmed.to_string())
}

fn required_id(value: Option<String>, field: &str) -> Result<String, ApiError> {
    match value.as_deref().map(str::trim) {
        Some(id) if !id.is_empty() => Ok(id.to_string()),
        _ => Err(ApiError::BadRequest(format!("{} is required", field))),
    }
}

#[get("/")]
async fn index() -> HttpResponse {
    HttpResponse::Ok()
        .content_type("text/html; charset=utf-8")
        .body(INDEX_HTML)
}

#[get("/start")]
async fn start_client(gateway: web::Data<Gateway>) -> Result<HttpResponse, ApiError> {
    let status = match gateway.session.send(Start).await?? {
        StartOutcome::Started => "Client started successfully",
        StartOutcome::AlreadyRunning => "Client already running",
    };
    Ok(HttpResponse::Ok().json(json!({ "status": status })))
}

#[post("/stop")]
async fn stop_client(gateway: web::Data<Gateway>) -> Result<HttpResponse, ApiError> {
    require_logon(&gateway).await?;
    gateway.session.send(Stop).await??;
    Ok(HttpResponse::Ok().json(json!({ "status": "Client stopped" })))
}

#[post("/order")]
async fn place_order(
    gateway: web::Data<Gateway>,
    body: web::Json<OrderBody>,
) -> Result<HttpResponse, ApiError> {
    require_logon(&gateway).await?;
    let body = body.into_inner();

    let side = match body.action.as_deref() {
        Some("buy") => Side::Buy,
        Some("sell") => Side::Sell,
        _ => return Err(ApiError::BadRequest("Invalid action".into())),
    };
    let symbol = resolve_symbol(body.symbol, &gateway)?;
    let quantity = match &body.quantity {
        None => gateway.orders.default_quantity,
        Some(field) => field
            .positive()
            .ok_or_else(|| ApiError::BadRequest("Quantity must be a positive integer".into()))?,
    };

    let cl_ord_id = gateway
        .session
        .send(PlaceOrder {
            side,
            symbol: symbol.clone(),
            quantity,
        })
        .await??;
    info!("Order placed successfully: {} {} {}", side, quantity, symbol);
    Ok(HttpResponse::Ok().json(json!({
        "status": "Order placed successfully",
        "cl_ord_id": cl_ord_id,
    })))
}

#[post("/subscribe")]
async fn subscribe_market_data(
    gateway: web::Data<Gateway>,
    body: web::Json<SubscribeBody>,
) -> Result<HttpResponse, ApiError> {
    require_logon(&gateway).await?;
    let symbol = resolve_symbol(body.into_inner().symbol, &gateway)?;
    let md_req_id = gateway.session.send(SubscribeMarketData { symbol }).await??;
    Ok(HttpResponse::Ok().json(json!({
        "status": "Subscribed to market data",
        "md_req_id": md_req_id,
    })))
}

#[post("/unsubscribe")]
async fn unsubscribe_market_data(gateway: web::Data<Gateway>) -> Result<HttpResponse, ApiError> {
    require_logon(&gateway).await?;
    gateway.session.send(CancelMarketData).await??;
    Ok(HttpResponse::Ok().json(json!({ "status": "Unsubscribed from market data" })))
}

#[post("/cancel")]
async fn cancel_order(
    gateway: web::Data<Gateway>,
    body: web::Json<CancelBody>,
) -> Result<HttpResponse, ApiError> {
    require_logon(&gateway).await?;
    let body = body.into_inner();
    let orig_cl_ord_id = required_id(body.orig_cl_ord_id, "orig_cl_ord_id")?;
    let symbol = resolve_symbol(body.symbol, &gateway)?;

    let cl_ord_id = gateway
        .session
        .send(CancelOrder {
            orig_cl_ord_id,
            symbol,
            side: body.side.unwrap_or(Side::Buy),
        })
        .await??;
    Ok(HttpResponse::Ok().json(json!({
        "status": "Cancel order request sent",
        "cl_ord_id": cl_ord_id,
    })))
}

#[post("/order-status")]
async fn order_status_request(
    gateway: web::Data<Gateway>,
    body: web::Json<OrderStatusBody>,
) -> Result<HttpResponse, ApiError> {
    require_logon(&gateway).await?;
    let body = body.into_inner();
    let cl_ord_id = required_id(body.cl_ord_id, "cl_ord_id")?;
    let symbol = resolve_symbol(body.symbol, &gateway)?;

    let last_known = gateway
        .session
        .send(RequestOrderStatus {
            cl_ord_id,
            symbol,
            side: body.side.unwrap_or(Side::Buy),
        })
        .await??;
    Ok(HttpResponse::Ok().json(json!({
        "status": "Order status request sent",
        "order": last_known,
    })))
}

#[get("/orders")]
async fn list_orders(gateway: web::Data<Gateway>) -> Result<HttpResponse, ApiError> {
    require_logon(&gateway).await?;
    let orders = gateway.session.send(ListOrders).await?;
    Ok(HttpResponse::Ok().json(orders))
}

#[post("/calculate")]
async fn calculate(
    gateway: web::Data<Gateway>,
    body: web::Json<CalculateBody>,
) -> Result<HttpResponse, ApiError> {
    let body = body.into_inner();
    let rate_symbol = gateway.pricing.rate_symbol.clone();
    let quote = gateway
        .session
        .send(LatestQuote {
            symbol: rate_symbol.clone(),
        })
        .await?
        .ok_or_else(|| ApiError::Conflict(format!("No market data for {}; subscribe first", rate_symbol)))?;

    let rate = quote.mid();
    let price = calculate_price(&body.symbol, body.amount, rate)?;
    Ok(HttpResponse::Ok().json(json!({
        "symbol": body.symbol.trim(),
        "amount": body.amount,
        "rate": rate,
        "price": price,
    })))
}

#[get("/ws")]
async fn ws_index(
    req: HttpRequest,
    stream: web::Payload,
    gateway: web::Data<Gateway>,
) -> Result<HttpResponse, Error> {
    info!("Websocket connection received");
    ws::start(WebSocketActor::new(gateway.hub.clone()), &req, stream)
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _| ApiError::BadRequest(err.to_string()).into()),
    )
    .service(index)
    .service(start_client)
    .service(stop_client)
    .service(place_order)
    .service(subscribe_market_data)
    .service(unsubscribe_market_data)
    .service(cancel_order)
    .service(order_status_request)
    .service(list_orders)
    .service(calculate)
    .service(ws_index);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quantity(json: &str) -> QuantityField {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_quantity_accepts_numbers_and_numeric_strings() {
        assert_eq!(quantity("100").positive(), Some(100));
        assert_eq!(quantity("\"250\"").positive(), Some(250));
        assert_eq!(quantity("\" 7 \"").positive(), Some(7));
    }

    #[test]
    fn test_quantity_rejects_non_positive_or_fractional() {
        assert_eq!(quantity("0").positive(), None);
        assert_eq!(quantity("-5").positive(), None);
        assert_eq!(quantity("1.5").positive(), None);
        assert_eq!(quantity("\"ten\"").positive(), None);
        assert_eq!(quantity("\"\"").positive(), None);
    }

    #[test]
    fn test_required_id() {
        assert_eq!(required_id(Some(" 123456 ".into()), "cl_ord_id").unwrap(), "123456");
        assert!(required_id(Some("  ".into()), "cl_ord_id").is_err());
        assert!(required_id(None, "cl_ord_id").is_err());
    }

    #[test]
    fn test_error_status_codes() {
        assert_eq!(ApiError::NotLoggedOn.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::BadRequest("x".into()).status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::Conflict("x".into()).status_code(), StatusCode::CONFLICT);
        assert_eq!(
            ApiError::from(SessionError::SendFailed { action: "place order", reason: "closed".into() })
                .status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert!(matches!(ApiError::from(SessionError::NotLoggedOn), ApiError::NotLoggedOn));
    }
}
