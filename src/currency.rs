//! Foreign-exchange lookup with ordered provider fallback.
//!
//! Providers are tried strictly in configuration order. A provider that times out,
//! fails at the transport level, answers with a non-2xx status or omits the requested
//! rate is skipped; the first usable rate wins and later providers are never contacted.

use std::{collections::HashMap, sync::Arc, time::Duration};

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;

use crate::config::AppConfig;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum FxError {
    #[error("invalid currency code '{0}'")]
    InvalidCurrency(String),

    #[error("{provider} timed out")]
    Timeout { provider: String },

    #[error("{provider} request failed: {reason}")]
    Transport { provider: String, reason: String },

    #[error("{provider} answered with status {status}")]
    Status { provider: String, status: u16 },

    #[error("{provider} returned an unreadable body: {reason}")]
    Decode { provider: String, reason: String },

    #[error("{provider} has no rate for {currency}")]
    MissingRate { provider: String, currency: String },

    #[error("no exchange-rate provider could answer ({} tried)", .0.len())]
    Exhausted(Vec<FxError>),
}

/// A source of exchange rates, e.g. one public HTTP API.
#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Name used in logs and in the conversion result.
    fn name(&self) -> &str;

    /// Units of `to` for one unit of `from`. Codes are already upper-case ISO 4217.
    async fn rate(&self, from: &str, to: &str) -> Result<f64, FxError>;
}

/// Outcome of a successful conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct Conversion {
    pub amount: f64,
    pub from: String,
    pub to: String,
    pub rate: f64,
    pub converted: f64,
    pub provider: String,
}

/// Upper-cases a currency code and checks it is three ASCII letters.
pub fn normalize_currency(code: &str) -> Result<String, FxError> {
    let code = code.trim().to_ascii_uppercase();
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        Ok(code)
    } else {
        Err(FxError::InvalidCurrency(code))
    }
}

pub struct CurrencyConverter {
    providers: Vec<Arc<dyn RateProvider>>,
    timeout: Duration,
}

impl CurrencyConverter {
    pub fn new(providers: Vec<Arc<dyn RateProvider>>, timeout: Duration) -> Self {
        Self { providers, timeout }
    }

    /// Builds one `HttpRateProvider` per configured URL template.
    ///
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn from_config(config: &AppConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.fx_timeout).build()?;
        let providers = config
            .fx_provider_urls
            .iter()
            .map(|template| Arc::new(HttpRateProvider::with_client(client.clone(), template)) as Arc<dyn RateProvider>)
            .collect();
        Ok(Self::new(providers, config.fx_timeout))
    }

    pub fn provider_names(&self) -> Vec<String> {
        self.providers.iter().map(|p| p.name().to_string()).collect()
    }

    /// convert
    ///
    /// Converts `amount` from `from` into `to`, rounded to cents. Same-currency requests
    /// short-circuit with rate 1 and contact no provider.
    pub async fn convert(&self, amount: f64, from: &str, to: &str) -> Result<Conversion, FxError> {
        let from = normalize_currency(from)?;
        let to = normalize_currency(to)?;

        if from == to {
            return Ok(Conversion {
                amount,
                converted: round_cents(amount),
                from,
                to,
                rate: 1.0,
                provider: "identity".to_string(),
            });
        }

        let mut failures = Vec::with_capacity(self.providers.len());
        for provider in &self.providers {
            let attempt = match tokio::time::timeout(self.timeout, provider.rate(&from, &to)).await {
                Ok(result) => result,
                Err(_) => Err(FxError::Timeout {
                    provider: provider.name().to_string(),
                }),
            };

            match attempt {
                Ok(rate) if rate.is_finite() && rate > 0.0 => {
                    tracing::debug!(provider = provider.name(), %from, %to, rate, "exchange rate resolved");
                    return Ok(Conversion {
                        amount,
                        converted: round_cents(amount * rate),
                        from,
                        to,
                        rate,
                        provider: provider.name().to_string(),
                    });
                }
                Ok(rate) => {
                    tracing::warn!(provider = provider.name(), rate, "discarding non-positive rate");
                    failures.push(FxError::MissingRate {
                        provider: provider.name().to_string(),
                        currency: to.clone(),
                    });
                }
                Err(e) => {
                    tracing::warn!(provider = provider.name(), error = %e, "exchange-rate provider failed");
                    failures.push(e);
                }
            }
        }

        Err(FxError::Exhausted(failures))
    }
}

fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[derive(Debug, Deserialize)]
struct RatesDto {
    rates: HashMap<String, f64>,
}

/// HttpRateProvider
///
/// Fetches `GET <template>` with `{from}`/`{to}` substituted and reads `rates[<to>]` from
/// the JSON body. Works with open.er-api.com and frankfurter.app style responses.
pub struct HttpRateProvider {
    client: Client,
    url_template: String,
}

impl HttpRateProvider {
    /// # Errors
    ///
    /// Returns an error when the reqwest client cannot be constructed.
    pub fn new(url_template: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client, url_template))
    }

    pub fn with_client(client: Client, url_template: &str) -> Self {
        Self {
            client,
            url_template: url_template.to_string(),
        }
    }

    fn url_for(&self, from: &str, to: &str) -> String {
        self.url_template.replace("{from}", from).replace("{to}", to)
    }
}

#[async_trait]
impl RateProvider for HttpRateProvider {
    fn name(&self) -> &str {
        &self.url_template
    }

    async fn rate(&self, from: &str, to: &str) -> Result<f64, FxError> {
        let provider = self.name().to_string();
        let response = self
            .client
            .get(self.url_for(from, to))
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FxError::Timeout {
                        provider: provider.clone(),
                    }
                } else {
                    FxError::Transport {
                        provider: provider.clone(),
                        reason: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FxError::Status {
                provider,
                status: status.as_u16(),
            });
        }

        let body: RatesDto = response.json().await.map_err(|e| FxError::Decode {
            provider: provider.clone(),
            reason: e.to_string(),
        })?;

        body.rates.get(to).copied().ok_or(FxError::MissingRate {
            provider,
            currency: to.to_string(),
        })
    }
}
