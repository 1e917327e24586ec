//! Signed REST client for the CoinDCX derivatives API.

use super::parse::{parse_instrument, parse_string_list, parse_wallet_list};
use super::signing::sign_payload;
use super::{
    snippet, ExchangeError, MarketSource, OrderReceipt, OrderVenue, SubmitPayload, WalletSource,
};
use crate::config::GatewayConfig;
use crate::model::{InstrumentSpec, MarginCurrency, Wallet};
use async_trait::async_trait;
use chrono::Utc;
use log::debug;
use reqwest::header::CONTENT_TYPE;
use serde_json::Value;
use std::time::Duration;

const HEADER_API_KEY: &str = "X-AUTH-APIKEY";
const HEADER_SIGNATURE: &str = "X-AUTH-SIGNATURE";

const TICKER_PATH: &str = "/exchange/ticker";
const ACTIVE_INSTRUMENTS_PATH: &str = "/exchange/v1/derivatives/futures/data/active_instruments";
const INSTRUMENT_PATH: &str = "/exchange/v1/derivatives/futures/data/instrument";
const WALLETS_PATH: &str = "/exchange/v1/derivatives/futures/wallets";
const CREATE_ORDER_PATH: &str = "/exchange/v1/derivatives/futures/orders/create";

struct Credentials {
    key: String,
    secret: String,
}

/// One client instance is shared by every component; `reqwest::Client`
/// pools connections internally.
pub struct DerivativesClient {
    base_url: String,
    credentials: Option<Credentials>,
    http: reqwest::Client,
}

impl DerivativesClient {
    pub fn new(config: &GatewayConfig) -> Result<Self, ExchangeError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_secs))
            .build()?;
        let credentials = if config.has_credentials() {
            Some(Credentials {
                key: config.api_key.clone(),
                secret: config.api_secret.clone(),
            })
        } else {
            None
        };
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            credentials,
            http,
        })
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }

    fn credentials(&self) -> Result<&Credentials, ExchangeError> {
        self.credentials
            .as_ref()
            .ok_or(ExchangeError::MissingCredentials)
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Unsigned GET returning the decoded JSON body.
    async fn get_json(
        &self,
        endpoint: &'static str,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Value, ExchangeError> {
        let url = self.url(path);
        debug!("GET {url}");
        let mut req = self.http.get(&url);
        if !query.is_empty() {
            req = req.query(query);
        }
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ExchangeError::Status {
                endpoint,
                status: status.as_u16(),
                body: snippet(&body),
            });
        }
        Ok(resp.json().await?)
    }
}

#[async_trait]
impl MarketSource for DerivativesClient {
    async fn fetch_tickers(&self) -> Result<Vec<Value>, ExchangeError> {
        let value = self.get_json("ticker", TICKER_PATH, &[]).await?;
        match value {
            Value::Array(items) => Ok(items),
            _ => Err(ExchangeError::Shape {
                endpoint: "ticker",
                detail: "expected a JSON array".to_string(),
            }),
        }
    }

    async fn fetch_active_instruments(
        &self,
        margin_currency: MarginCurrency,
    ) -> Result<Vec<String>, ExchangeError> {
        let value = self
            .get_json(
                "active_instruments",
                ACTIVE_INSTRUMENTS_PATH,
                &[("margin_currency_short_name[]", margin_currency.as_str())],
            )
            .await?;
        Ok(parse_string_list(&value))
    }

    async fn fetch_instrument(
        &self,
        pair: &str,
        margin_currency: MarginCurrency,
    ) -> Result<InstrumentSpec, ExchangeError> {
        let value = self
            .get_json(
                "instrument",
                INSTRUMENT_PATH,
                &[
                    ("pair", pair),
                    ("margin_currency_short_name", margin_currency.as_str()),
                ],
            )
            .await?;
        Ok(parse_instrument(&value))
    }
}

#[async_trait]
impl WalletSource for DerivativesClient {
    async fn fetch_wallets(&self) -> Result<Vec<Wallet>, ExchangeError> {
        let creds = self.credentials()?;
        let body = serde_json::json!({"timestamp": Utc::now().timestamp_millis()}).to_string();
        let signature = sign_payload(&creds.secret, &body);
        let url = self.url(WALLETS_PATH);
        debug!("GET {url} (signed)");
        let resp = self
            .http
            .get(&url)
            .header(CONTENT_TYPE, "application/json")
            .header(HEADER_API_KEY, &creds.key)
            .header(HEADER_SIGNATURE, signature)
            .body(body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ExchangeError::Status {
                endpoint: "wallets",
                status: status.as_u16(),
                body: snippet(&text),
            });
        }
        let value: Value = resp.json().await?;
        Ok(parse_wallet_list(&value))
    }
}

#[async_trait]
impl OrderVenue for DerivativesClient {
    /// Submits one order. Transport failures are errors; any HTTP status
    /// comes back as a receipt for the caller to interpret.
    async fn submit_order(&self, payload: &SubmitPayload) -> Result<OrderReceipt, ExchangeError> {
        let creds = self.credentials()?;
        let body = serde_json::to_string(payload)?;
        let signature = sign_payload(&creds.secret, &body);
        let url = self.url(CREATE_ORDER_PATH);
        debug!("POST {url} client_order_id={}", payload.order.client_order_id);
        let resp = self
            .http
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .header(HEADER_API_KEY, &creds.key)
            .header(HEADER_SIGNATURE, signature)
            .body(body)
            .send()
            .await?;
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        Ok(OrderReceipt { status, body })
    }
}
