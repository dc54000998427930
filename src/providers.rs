//! External signal providers. Each exposes one "fetch latest reading"
//! operation; a failure marks the source inactive for this refresh rather
//! than surfacing an error.

use async_trait::async_trait;
use log::warn;
use serde_json::Value;

use crate::glitch::{IndexQuote, PriceReading, WeatherReading};

/// Index symbols the market source keeps from the quote list.
const TARGET_SYMBOLS: &[&str] = &["^SPX", "^DJI", "^IXIC", "^RUT", "^NYA"];

#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn latest(&self) -> anyhow::Result<PriceReading>;
}

#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn latest(&self) -> anyhow::Result<WeatherReading>;
}

#[async_trait]
pub trait MarketSource: Send + Sync {
    async fn latest(&self) -> anyhow::Result<Vec<IndexQuote>>;
}

/// The provider set backing a `SignalAggregator`. Any source may be absent;
/// absent and failing sources both count as inactive.
#[derive(Default)]
pub struct SignalProviders {
    pub price: Option<Box<dyn PriceSource>>,
    pub weather: Option<Box<dyn WeatherSource>>,
    pub market: Option<Box<dyn MarketSource>>,
}

impl SignalProviders {
    pub async fn fetch_price(&self) -> Option<PriceReading> {
        match &self.price {
            Some(source) => match source.latest().await {
                Ok(reading) => Some(reading),
                Err(e) => {
                    warn!("price source inactive: {e:#}");
                    None
                }
            },
            None => None,
        }
    }

    pub async fn fetch_weather(&self) -> Option<WeatherReading> {
        match &self.weather {
            Some(source) => match source.latest().await {
                Ok(reading) => Some(reading),
                Err(e) => {
                    warn!("weather source inactive: {e:#}");
                    None
                }
            },
            None => None,
        }
    }

    pub async fn fetch_indices(&self) -> Vec<IndexQuote> {
        match &self.market {
            Some(source) => match source.latest().await {
                Ok(quotes) => quotes,
                Err(e) => {
                    warn!("market source inactive: {e:#}");
                    Vec::new()
                }
            },
            None => Vec::new(),
        }
    }
}

/// CoinMarketCap-style quote endpoint for the crypto price signal.
pub struct CoinMarketCapClient {
    http: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl CoinMarketCapClient {
    pub fn new(api_key: String, endpoint: String) -> Self {
        CoinMarketCapClient {
            http: reqwest::Client::new(),
            api_key,
            endpoint,
        }
    }
}

#[async_trait]
impl PriceSource for CoinMarketCapClient {
    async fn latest(&self) -> anyhow::Result<PriceReading> {
        let body: Value = self
            .http
            .get(&self.endpoint)
            .query(&[("slug", "bitcoin"), ("convert", "USD")])
            .header("X-CMC_PRO_API_KEY", &self.api_key)
            .header("Accept", "application/json")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let quote = &body["data"]["1"]["quote"]["USD"];
        let field = |name: &str| {
            quote[name]
                .as_f64()
                .ok_or_else(|| anyhow::anyhow!("missing field {name} in price quote"))
        };
        Ok(PriceReading {
            price_usd: field("price")?,
            percent_change_1h: field("percent_change_1h")?,
            percent_change_24h: field("percent_change_24h")?,
        })
    }
}

/// Current-conditions endpoint for the weather signal.
pub struct WeatherClient {
    http: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl WeatherClient {
    pub fn new(api_key: String, endpoint: String) -> Self {
        WeatherClient {
            http: reqwest::Client::new(),
            api_key,
            endpoint,
        }
    }
}

#[async_trait]
impl WeatherSource for WeatherClient {
    async fn latest(&self) -> anyhow::Result<WeatherReading> {
        let body: Value = self
            .http
            .get(&self.endpoint)
            .query(&[("key", &self.api_key)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let current = &body["current"];
        let temperature_c = current["temp_c"]
            .as_f64()
            .ok_or_else(|| anyhow::anyhow!("missing temp_c in weather reading"))?;
        Ok(WeatherReading {
            temperature_c,
            humidity: current["humidity"].as_f64(),
            wind_kph: current["wind_kph"].as_f64(),
        })
    }
}

/// Financial-Modeling-Prep-style index quote list for the market signal.
pub struct MarketIndexClient {
    http: reqwest::Client,
    api_key: String,
    endpoint: String,
}

impl MarketIndexClient {
    pub fn new(api_key: String, endpoint: String) -> Self {
        MarketIndexClient {
            http: reqwest::Client::new(),
            api_key,
            endpoint,
        }
    }
}

#[async_trait]
impl MarketSource for MarketIndexClient {
    async fn latest(&self) -> anyhow::Result<Vec<IndexQuote>> {
        let body: Value = self
            .http
            .get(&self.endpoint)
            .query(&[("apikey", &self.api_key)])
            .header("Accept", "application/json")
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let quotes = body
            .as_array()
            .ok_or_else(|| anyhow::anyhow!("index quote response is not a list"))?
            .iter()
            .filter_map(|entry| {
                let symbol = entry["symbol"].as_str()?;
                if !TARGET_SYMBOLS.contains(&symbol) {
                    return None;
                }
                Some(IndexQuote {
                    symbol: symbol.to_string(),
                    price: entry["price"].as_f64()?,
                    change: entry["change"].as_f64()?,
                })
            })
            .collect();
        Ok(quotes)
    }
}
