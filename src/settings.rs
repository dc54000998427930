use serde::{Deserialize, Serialize};
use std::fs;
use std::io;

use crate::providers::{
    CoinMarketCapClient, MarketIndexClient, SignalProviders, WeatherClient,
};

// Define a structure to hold application settings with serialization and
// deserialization capabilities.
#[derive(Serialize, Deserialize, Clone)]
pub struct Settings {
    pub openai_api_key: Option<String>, // API key for the generation service.
    pub model: String,                  // Chat model used for story and summary turns.
    pub coinmarketcap_api_key: Option<String>,
    pub coinmarketcap_endpoint: Option<String>,
    pub weather_api_key: Option<String>,
    pub weather_endpoint: Option<String>,
    pub fmp_api_key: Option<String>,
    pub fmp_endpoint: Option<String>,
    pub debug_mode: bool, // Flag to enable or disable debug mode.
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            openai_api_key: None,
            model: "gpt-4o-mini".to_string(),
            coinmarketcap_api_key: None,
            coinmarketcap_endpoint: None,
            weather_api_key: None,
            weather_endpoint: None,
            fmp_api_key: None,
            fmp_endpoint: None,
            debug_mode: false,
        }
    }
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    // Load settings from the default file path.
    pub fn load() -> io::Result<Self> {
        Self::load_settings_from_file("./data/settings.json")
    }

    // Save current settings to the default file path.
    pub fn save(&self) -> io::Result<()> {
        std::fs::create_dir_all("./data")?; // Ensure the data directory exists.
        self.save_to_file("./data/settings.json")
    }

    pub fn load_settings_from_file(path: &str) -> io::Result<Self> {
        let data = fs::read_to_string(path)?;
        let settings = serde_json::from_str(&data)?;
        Ok(settings)
    }

    pub fn save_to_file(&self, path: &str) -> io::Result<()> {
        let data = serde_json::to_string_pretty(self)?;
        if let Some(parent) = std::path::Path::new(path).parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, data)?;
        Ok(())
    }

    /// Builds the signal provider set from whichever sources are fully
    /// configured. A source missing its key or endpoint is simply absent.
    pub fn signal_providers(&self) -> SignalProviders {
        let mut providers = SignalProviders::default();

        if let (Some(key), Some(endpoint)) =
            (&self.coinmarketcap_api_key, &self.coinmarketcap_endpoint)
        {
            providers.price = Some(Box::new(CoinMarketCapClient::new(
                key.clone(),
                endpoint.clone(),
            )));
        }
        if let (Some(key), Some(endpoint)) = (&self.weather_api_key, &self.weather_endpoint) {
            providers.weather = Some(Box::new(WeatherClient::new(key.clone(), endpoint.clone())));
        }
        if let (Some(key), Some(endpoint)) = (&self.fmp_api_key, &self.fmp_endpoint) {
            providers.market = Some(Box::new(MarketIndexClient::new(
                key.clone(),
                endpoint.clone(),
            )));
        }

        providers
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn settings_round_trip_through_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("settings.json");
        let path = path.to_str().unwrap();

        let mut settings = Settings::new();
        settings.openai_api_key = Some("sk-test".to_string());
        settings.model = "gpt-4o".to_string();
        settings.save_to_file(path).unwrap();

        let loaded = Settings::load_settings_from_file(path).unwrap();
        assert_eq!(loaded.openai_api_key.as_deref(), Some("sk-test"));
        assert_eq!(loaded.model, "gpt-4o");
        assert!(!loaded.debug_mode);
    }

    #[test]
    fn unconfigured_sources_are_absent_from_the_provider_set() {
        let providers = Settings::new().signal_providers();
        assert!(providers.price.is_none());
        assert!(providers.weather.is_none());
        assert!(providers.market.is_none());
    }
}
