// KuCoin spot REST client
//
// Requests are signed with HMAC-SHA256 over `timestamp + METHOD + path + body`
// and base64 encoded (API key version 2, passphrase signed the same way).

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use base64::Engine;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::Sha256;
use tracing::{debug, warn};
use uuid::Uuid;

use super::ExchangeGateway;
use crate::config::ExchangeKeys;
use crate::core::types::{Balance, BidAsk, ExchangeOrder, OrderSide, OrderStatus, OrderType, Ticker};
use crate::error::{TradingError, TradingResult};

type HmacSha256 = Hmac<Sha256>;

pub const KUCOIN_REST_URL: &str = "https://api.kucoin.com";
const SUCCESS_CODE: &str = "200000";
const OPEN_ORDERS_PAGE_SIZE: u32 = 500;

pub struct KucoinClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    secret: String,
    passphrase: String,
    rules: Mutex<HashMap<String, SymbolRules>>,
}

/// Size and price increments of a market
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolRules {
    pub base_increment: String,
    pub price_increment: String,
    pub base_min_size: f64,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    code: String,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default = "Option::default")]
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Level1 {
    price: Option<String>,
    best_bid: Option<String>,
    best_ask: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Account {
    currency: String,
    #[serde(rename = "type")]
    account_type: String,
    balance: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOrder {
    id: String,
    symbol: String,
    #[serde(rename = "type")]
    order_type: String,
    side: String,
    #[serde(default)]
    price: Option<String>,
    #[serde(default)]
    size: Option<String>,
    #[serde(default)]
    deal_size: Option<String>,
    is_active: bool,
    #[serde(default)]
    cancel_exist: bool,
}

#[derive(Debug, Deserialize)]
struct OrderPage {
    items: Vec<RawOrder>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatedOrder {
    order_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSymbol {
    base_increment: String,
    price_increment: String,
    base_min_size: String,
}

impl KucoinClient {
    pub fn new(keys: &ExchangeKeys) -> TradingResult<Self> {
        let passphrase = keys
            .password
            .clone()
            .ok_or_else(|| TradingError::ConfigMissing("password (KuCoin API passphrase)".to_string()))?;

        Ok(Self {
            client: reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(15))
                .build()?,
            base_url: KUCOIN_REST_URL.to_string(),
            api_key: keys.api_key.clone(),
            secret: keys.secret.clone(),
            passphrase,
            rules: Mutex::new(HashMap::new()),
        })
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// `BTC/USDT` -> `BTC-USDT`
    pub fn market_symbol(symbol: &str) -> String {
        symbol.replace('/', "-").to_uppercase()
    }

    fn sign(&self, payload: &str) -> TradingResult<String> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| TradingError::ApiAuthentication(format!("Failed to create HMAC: {}", e)))?;
        mac.update(payload.as_bytes());
        Ok(base64::engine::general_purpose::STANDARD.encode(mac.finalize().into_bytes()))
    }

    fn signed_headers(&self, method: &Method, path: &str, body: &str) -> TradingResult<HeaderMap> {
        let timestamp = Utc::now().timestamp_millis().to_string();
        let signature = self.sign(&format!("{}{}{}{}", timestamp, method.as_str(), path, body))?;
        let passphrase = self.sign(&self.passphrase)?;

        let mut headers = HeaderMap::new();
        for (name, value) in [
            ("KC-API-KEY", self.api_key.as_str()),
            ("KC-API-SIGN", signature.as_str()),
            ("KC-API-TIMESTAMP", timestamp.as_str()),
            ("KC-API-PASSPHRASE", passphrase.as_str()),
            ("KC-API-KEY-VERSION", "2"),
        ] {
            let value = HeaderValue::from_str(value)
                .map_err(|e| TradingError::ApiAuthentication(format!("Bad {} header: {}", name, e)))?;
            headers.insert(name, value);
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    /// Send a request and unwrap the `{code, msg, data}` envelope.
    /// `order_id` names the order a not-found answer refers to.
    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        signed: bool,
        order_id: Option<&str>,
    ) -> TradingResult<T> {
        let body = body.map(|b| b.to_string()).unwrap_or_default();
        let url = format!("{}{}", self.base_url, path);

        let mut request = self.client.request(method.clone(), &url);
        if signed {
            request = request.headers(self.signed_headers(&method, path, &body)?);
        }
        if !body.is_empty() {
            request = request.body(body);
        }

        debug!("KuCoin {} {}", method, path);
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        let envelope: Envelope<T> = match serde_json::from_str(&text) {
            Ok(envelope) => envelope,
            Err(e) if status.is_success() => {
                return Err(TradingError::ApiResponse(format!("Unexpected body from {}: {}", path, e)));
            }
            Err(_) => {
                return Err(map_api_error(status, "", &text, order_id));
            }
        };

        if envelope.code != SUCCESS_CODE || !status.is_success() {
            let msg = envelope.msg.unwrap_or_default();
            return Err(map_api_error(status, &envelope.code, &msg, order_id));
        }

        envelope
            .data
            .ok_or_else(|| TradingError::ApiResponse(format!("Empty data from {}", path)))
    }

    pub async fn symbol_rules(&self, symbol: &str) -> TradingResult<SymbolRules> {
        let market = Self::market_symbol(symbol);
        let cached = self.lock_rules().get(&market).cloned();
        if let Some(rules) = cached {
            return Ok(rules);
        }

        let raw: RawSymbol = self
            .request(Method::GET, &format!("/api/v2/symbols/{}", market), None, false, None)
            .await?;
        let rules = SymbolRules {
            base_increment: raw.base_increment,
            price_increment: raw.price_increment,
            base_min_size: parse_num(&raw.base_min_size, "baseMinSize")?,
        };

        self.lock_rules().insert(market, rules.clone());
        Ok(rules)
    }

    fn lock_rules(&self) -> std::sync::MutexGuard<'_, HashMap<String, SymbolRules>> {
        self.rules.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Translate a KuCoin error answer into the crate error
pub fn map_api_error(status: StatusCode, code: &str, msg: &str, order_id: Option<&str>) -> TradingError {
    let lower = msg.to_lowercase();

    if code == "200004" || lower.contains("insufficient") {
        return TradingError::InsufficientFunds(msg.to_string());
    }

    if status == StatusCode::NOT_FOUND
        || lower.contains("order_not_exist")
        || lower.contains("order not exist")
        || lower.contains("does not exist")
    {
        return TradingError::OrderNotFound(order_id.unwrap_or(msg).to_string());
    }

    if status == StatusCode::UNAUTHORIZED || code.starts_with("40000") || code == "411100" {
        return TradingError::ApiAuthentication(format!("{} {}", code, msg));
    }

    if status == StatusCode::TOO_MANY_REQUESTS || code == "429000" {
        return TradingError::ApiRateLimit(msg.to_string());
    }

    if status.is_client_error() || code == "400100" {
        return TradingError::OrderRejected(format!("{} {}", code, msg));
    }

    TradingError::ApiResponse(format!("{} {} {}", status.as_u16(), code, msg))
}

fn parse_num(raw: &str, field: &str) -> TradingResult<f64> {
    raw.parse::<f64>()
        .map_err(|_| TradingError::ApiResponse(format!("Invalid {} '{}'", field, raw)))
}

fn parse_opt(raw: &Option<String>, field: &str) -> TradingResult<f64> {
    match raw.as_deref() {
        Some(s) if !s.is_empty() => parse_num(s, field),
        _ => Ok(0.0),
    }
}

/// Decimal places of an increment such as `0.0001`
fn decimals(increment: &str) -> usize {
    increment
        .split_once('.')
        .map(|(_, frac)| frac.trim_end_matches('0').len())
        .unwrap_or(0)
}

/// Round `value` down to a multiple of `increment`, formatted with its precision
pub fn floor_to_increment(value: f64, increment: &str) -> String {
    let step: f64 = increment.parse().unwrap_or(0.0);
    let places = decimals(increment);
    if step <= 0.0 {
        return format!("{:.*}", places, value);
    }
    let steps = (value / step + 1e-9).floor();
    format!("{:.*}", places, steps * step)
}

/// Round `value` to the nearest multiple of `increment`
pub fn round_to_increment(value: f64, increment: &str) -> String {
    let step: f64 = increment.parse().unwrap_or(0.0);
    let places = decimals(increment);
    if step <= 0.0 {
        return format!("{:.*}", places, value);
    }
    format!("{:.*}", places, (value / step).round() * step)
}

impl RawOrder {
    fn into_exchange_order(self, symbol: &str) -> TradingResult<ExchangeOrder> {
        let side = match self.side.as_str() {
            "buy" => OrderSide::Buy,
            "sell" => OrderSide::Sell,
            other => return Err(TradingError::ApiResponse(format!("Unknown side '{}'", other))),
        };
        let order_type = match self.order_type.as_str() {
            "market" => OrderType::Market,
            _ => OrderType::Limit,
        };
        let status = if self.is_active {
            OrderStatus::Open
        } else if self.cancel_exist {
            OrderStatus::Canceled
        } else {
            OrderStatus::Closed
        };

        if KucoinClient::market_symbol(symbol) != self.symbol {
            warn!("Order {} belongs to {}, expected {}", self.id, self.symbol, symbol);
        }

        Ok(ExchangeOrder {
            amount: parse_opt(&self.size, "size")?,
            filled: parse_opt(&self.deal_size, "dealSize")?,
            price: parse_opt(&self.price, "price")?,
            id: self.id,
            symbol: symbol.to_string(),
            order_type,
            side,
            status,
        })
    }
}

#[async_trait]
impl ExchangeGateway for KucoinClient {
    async fn fetch_ticker(&self, symbol: &str) -> TradingResult<Ticker> {
        let path = format!("/api/v1/market/orderbook/level1?symbol={}", Self::market_symbol(symbol));
        let level1: Level1 = self.request(Method::GET, &path, None, false, None).await?;
        let last = level1
            .price
            .ok_or_else(|| TradingError::ApiResponse(format!("No last price for {}", symbol)))?;
        Ok(Ticker { last: parse_num(&last, "price")? })
    }

    async fn fetch_best_bid_ask(&self, symbol: &str) -> TradingResult<BidAsk> {
        let path = format!("/api/v1/market/orderbook/level1?symbol={}", Self::market_symbol(symbol));
        let level1: Level1 = self.request(Method::GET, &path, None, false, None).await?;
        match (level1.best_bid, level1.best_ask) {
            (Some(bid), Some(ask)) => Ok(BidAsk {
                bid: parse_num(&bid, "bestBid")?,
                ask: parse_num(&ask, "bestAsk")?,
            }),
            _ => Err(TradingError::ApiResponse(format!("Empty order book for {}", symbol))),
        }
    }

    async fn fetch_balance(&self) -> TradingResult<Balance> {
        let accounts: Vec<Account> = self
            .request(Method::GET, "/api/v1/accounts", None, true, None)
            .await?;

        let mut balance = Balance::new();
        for account in accounts.iter().filter(|a| a.account_type == "trade") {
            balance.add(&account.currency, parse_num(&account.balance, "balance")?);
        }
        Ok(balance)
    }

    async fn fetch_order(&self, order_id: &str, symbol: &str) -> TradingResult<ExchangeOrder> {
        let raw: RawOrder = self
            .request(Method::GET, &format!("/api/v1/orders/{}", order_id), None, true, Some(order_id))
            .await?;
        raw.into_exchange_order(symbol)
    }

    async fn fetch_open_orders(&self, symbol: &str) -> TradingResult<Vec<ExchangeOrder>> {
        let path = format!(
            "/api/v1/orders?status=active&symbol={}&pageSize={}",
            Self::market_symbol(symbol),
            OPEN_ORDERS_PAGE_SIZE
        );
        let page: OrderPage = self.request(Method::GET, &path, None, true, None).await?;
        page.items
            .into_iter()
            .map(|raw| raw.into_exchange_order(symbol))
            .collect()
    }

    async fn cancel_order(&self, order_id: &str, _symbol: &str) -> TradingResult<()> {
        let _: Value = self
            .request(Method::DELETE, &format!("/api/v1/orders/{}", order_id), None, true, Some(order_id))
            .await?;
        Ok(())
    }

    async fn create_order(
        &self,
        symbol: &str,
        order_type: OrderType,
        side: OrderSide,
        amount: f64,
        price: f64,
    ) -> TradingResult<ExchangeOrder> {
        let rules = self.symbol_rules(symbol).await?;
        let size = floor_to_increment(amount, &rules.base_increment);
        let size_value = parse_num(&size, "size")?;
        if size_value < rules.base_min_size {
            return Err(TradingError::OrderRejected(format!(
                "size {} below minimum {} for {}",
                size, rules.base_min_size, symbol
            )));
        }

        let mut body = json!({
            "clientOid": Uuid::new_v4().simple().to_string(),
            "side": side.as_str(),
            "symbol": Self::market_symbol(symbol),
            "type": order_type.as_str(),
            "size": size,
        });
        let price_text = round_to_increment(price, &rules.price_increment);
        if order_type == OrderType::Limit {
            body["price"] = Value::String(price_text.clone());
        }

        let created: CreatedOrder = self
            .request(Method::POST, "/api/v1/orders", Some(body), true, None)
            .await?;

        Ok(ExchangeOrder {
            id: created.order_id,
            symbol: symbol.to_string(),
            order_type,
            side,
            status: OrderStatus::Open,
            amount: size_value,
            filled: 0.0,
            price: parse_num(&price_text, "price")?,
        })
    }
}
