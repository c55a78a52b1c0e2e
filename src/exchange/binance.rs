// =============================================================================
// Binance USD-M Futures adapter — HMAC-SHA256 signed requests
// =============================================================================
//
// SECURITY: the secret key is never logged or serialized. All signed requests
// include X-MBX-APIKEY as a header and a recvWindow of 5 000 ms to tolerate
// minor clock drift between the engine and Binance servers.
// =============================================================================

use anyhow::{Context, Result};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, HeaderValue};
use sha2::Sha256;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{debug, instrument, warn};

use super::{ExchangeAdapter, ExchangeError, OrderOutcome};
use crate::types::{AccountSnapshot, PositionSnapshot, Side};

type HmacSha256 = Hmac<Sha256>;

const RECV_WINDOW: u64 = 5000;

/// Binance USD-M futures REST client with HMAC-SHA256 request signing.
#[derive(Clone)]
pub struct BinanceFuturesClient {
    secret: String,
    base_url: String,
    client: reqwest::Client,
}

impl BinanceFuturesClient {
    pub fn new(api_key: impl Into<String>, secret: impl Into<String>) -> Self {
        let api_key = api_key.into();
        let secret = secret.into();

        let mut default_headers = HeaderMap::new();
        if let Ok(val) = HeaderValue::from_str(&api_key) {
            default_headers.insert("X-MBX-APIKEY", val);
        }

        let client = reqwest::Client::builder()
            .default_headers(default_headers)
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("failed to build reqwest client");

        debug!("BinanceFuturesClient initialised (base_url=https://fapi.binance.com)");

        Self {
            secret,
            base_url: "https://fapi.binance.com".to_string(),
            client,
        }
    }

    pub fn sign(&self, query: &str) -> String {
        let mut mac =
            HmacSha256::new_from_slice(self.secret.as_bytes()).expect("HMAC accepts any key size");
        mac.update(query.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    pub fn timestamp_ms() -> u64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("system clock before UNIX epoch")
            .as_millis() as u64
    }

    fn signed_query(&self, params: &str) -> String {
        let ts = Self::timestamp_ms();
        let base = if params.is_empty() {
            format!("timestamp={ts}&recvWindow={RECV_WINDOW}")
        } else {
            format!("{params}&timestamp={ts}&recvWindow={RECV_WINDOW}")
        };
        let sig = self.sign(&base);
        format!("{base}&signature={sig}")
    }

    fn classify_error(status: reqwest::StatusCode, body: &serde_json::Value) -> ExchangeError {
        let msg = body["msg"].as_str().unwrap_or("unknown error").to_string();
        match status.as_u16() {
            401 | 403 => ExchangeError::Auth(msg),
            429 => ExchangeError::RateLimit(msg),
            400 if msg.to_lowercase().contains("margin") => {
                ExchangeError::InsufficientMargin(msg)
            }
            400 if msg.to_lowercase().contains("symbol") => {
                ExchangeError::SymbolNotTradable(msg)
            }
            _ => ExchangeError::Transient(msg),
        }
    }

    async fn fetch_mark_price(&self, symbol: &str) -> Result<f64> {
        let url = format!("{}/fapi/v1/premiumIndex?symbol={symbol}", self.base_url);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .context("GET premiumIndex failed")?;
        let body: serde_json::Value =
            resp.json().await.context("failed to parse premiumIndex response")?;
        let price = Self::parse_str_f64(&body["markPrice"]);
        if price <= 0.0 {
            anyhow::bail!("invalid mark price for {symbol}");
        }
        Ok(price)
    }

    fn parse_str_f64(val: &serde_json::Value) -> f64 {
        if let Some(s) = val.as_str() {
            s.parse::<f64>().unwrap_or(0.0)
        } else {
            val.as_f64().unwrap_or(0.0)
        }
    }
}

#[async_trait]
impl ExchangeAdapter for BinanceFuturesClient {
    #[instrument(skip(self), name = "binance_futures::get_account")]
    async fn get_account(&self) -> Result<AccountSnapshot> {
        let qs = self.signed_query("");
        let url = format!("{}/fapi/v2/account?{}", self.base_url, qs);

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .context("GET /fapi/v2/account request failed")?;

        let status = resp.status();
        let body: serde_json::Value = resp.json().await.context("failed to parse account response")?;
        if !status.is_success() {
            return Err(Self::classify_error(status, &body).into());
        }

        let total_equity = Self::parse_str_f64(&body["totalMarginBalance"]);
        let available_balance = Self::parse_str_f64(&body["availableBalance"]);
        let unrealized_pnl = Self::parse_str_f64(&body["totalUnrealizedProfit"]);
        let margin_used = Self::parse_str_f64(&body["totalPositionInitialMargin"]);
        let position_count = body["positions"]
            .as_array()
            .map(|a| {
                a.iter()
                    .filter(|p| Self::parse_str_f64(&p["positionAmt"]) != 0.0)
                    .count()
            })
            .unwrap_or(0);

        Ok(AccountSnapshot {
            total_equity,
            available_balance,
            pnl_total: unrealized_pnl,
            pnl_total_pct: if total_equity > 0.0 {
                unrealized_pnl / total_equity * 100.0
            } else {
                0.0
            },
            margin_used,
            margin_used_pct: if total_equity > 0.0 {
                margin_used / total_equity * 100.0
            } else {
                0.0
            },
            position_count,
        })
    }

    #[instrument(skip(self), name = "binance_futures::get_positions")]
    async fn get_positions(&self) -> Result<Vec<PositionSnapshot>> {
        let qs = self.signed_query("");
        let url = format!("{}/fapi/v2/positionRisk?{}", self.base_url, qs);

        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .context("GET /fapi/v2/positionRisk request failed")?;

        let status = resp.status();
        let body: serde_json::Value = resp.json().await.context("failed to parse positionRisk response")?;
        if !status.is_success() {
            return Err(Self::classify_error(status, &body).into());
        }

        let raw = body.as_array().context("positionRisk response is not an array")?;
        let mut positions = Vec::new();
        for p in raw {
            let quantity = Self::parse_str_f64(&p["positionAmt"]);
            if quantity == 0.0 {
                continue;
            }
            let side = if quantity > 0.0 { Side::Long } else { Side::Short };
            let entry_price = Self::parse_str_f64(&p["entryPrice"]);
            let mark_price = Self::parse_str_f64(&p["markPrice"]);
            let leverage = p["leverage"]
                .as_str()
                .and_then(|s| s.parse::<u32>().ok())
                .unwrap_or(1);
            let unrealized_pnl = Self::parse_str_f64(&p["unRealizedProfit"]);
            let margin_used = Self::parse_str_f64(&p["isolatedMargin"]);

            positions.push(PositionSnapshot {
                symbol: p["symbol"].as_str().unwrap_or_default().to_string(),
                side,
                entry_price,
                mark_price,
                quantity: quantity.abs(),
                leverage,
                unrealized_pnl,
                unrealized_pnl_pct: if entry_price > 0.0 {
                    unrealized_pnl / (entry_price * quantity.abs()) * 100.0
                } else {
                    0.0
                },
                liquidation_price: Self::parse_str_f64(&p["liquidationPrice"]),
                margin_used,
                opened_at: chrono::Utc::now().to_rfc3339(),
            });
        }
        Ok(positions)
    }

    #[instrument(skip(self), name = "binance_futures::open_position")]
    async fn open_position(
        &self,
        symbol: &str,
        side: Side,
        leverage: u32,
        size_usd: f64,
        stop_loss: Option<f64>,
        take_profit: Option<f64>,
    ) -> Result<OrderOutcome> {
        // Set leverage first; Binance treats this as a distinct, idempotent call.
        let lev_params = format!("symbol={symbol}&leverage={leverage}");
        let lev_qs = self.signed_query(&lev_params);
        let lev_url = format!("{}/fapi/v1/leverage?{}", self.base_url, lev_qs);
        match self.client.post(&lev_url).send().await {
            Ok(resp) if !resp.status().is_success() => {
                warn!(symbol, leverage, status = %resp.status(), "failed to set leverage before order");
            }
            Err(e) => warn!(symbol, leverage, error = %e, "failed to set leverage before order"),
            _ => {}
        }

        let order_side = match side {
            Side::Long => "BUY",
            Side::Short => "SELL",
        };
        let mark_price = self.fetch_mark_price(symbol).await?;
        let quantity = size_usd / mark_price; // size_usd is quote-asset notional
        let params = format!("symbol={symbol}&side={order_side}&type=MARKET&quantity={quantity}");
        let qs = self.signed_query(&params);
        let url = format!("{}/fapi/v1/order?{}", self.base_url, qs);

        let resp = self
            .client
            .post(&url)
            .send()
            .await
            .context("POST /fapi/v1/order request failed")?;

        let status = resp.status();
        let body: serde_json::Value = resp.json().await.context("failed to parse order response")?;
        if !status.is_success() {
            return Err(Self::classify_error(status, &body).into());
        }

        debug!(symbol, %side, leverage, ?stop_loss, ?take_profit, "position opened");

        Ok(OrderOutcome {
            order_id: body["orderId"].to_string(),
            filled: body["status"].as_str() == Some("FILLED"),
        })
    }

    #[instrument(skip(self), name = "binance_futures::close_position")]
    async fn close_position(&self, symbol: &str, side: Side) -> Result<OrderOutcome> {
        // Reduce-only order in the opposite direction of the held side.
        let order_side = match side {
            Side::Long => "SELL",
            Side::Short => "BUY",
        };
        // closePosition=true closes the entire position at market and cannot
        // be combined with reduceOnly or an explicit quantity.
        let params = format!("symbol={symbol}&side={order_side}&type=MARKET&closePosition=true");
        let qs = self.signed_query(&params);
        let url = format!("{}/fapi/v1/order?{}", self.base_url, qs);

        let resp = self
            .client
            .post(&url)
            .send()
            .await
            .context("POST /fapi/v1/order (close) request failed")?;

        let status = resp.status();
        let body: serde_json::Value = resp.json().await.context("failed to parse close response")?;
        if !status.is_success() {
            return Err(Self::classify_error(status, &body).into());
        }

        Ok(OrderOutcome {
            order_id: body["orderId"].to_string(),
            filled: true,
        })
    }
}

impl std::fmt::Debug for BinanceFuturesClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BinanceFuturesClient")
            .field("secret", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}
