//! Reality glitches: deterministic mapping from cached external signal
//! readings (crypto price, weather, market indices) to the categorical
//! profile that perturbs the narrative tone.
//!
//! `profile_from_snapshot` is a pure function of a snapshot and an RNG;
//! randomness is confined to the mood tie-break and the extra-anomaly
//! sampling, so tests can pin a seed and get identical profiles.

use std::fmt;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use log::warn;
use rand::Rng;
use rand::seq::{IndexedRandom, index};
use serde::{Deserialize, Serialize};

use crate::providers::SignalProviders;

/// Cached readings older than this are refreshed before profiling.
pub const STALE_AFTER_SECS: i64 = 600;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PriceReading {
    pub price_usd: f64,
    pub percent_change_1h: f64,
    pub percent_change_24h: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WeatherReading {
    pub temperature_c: f64,
    pub humidity: Option<f64>,
    pub wind_kph: Option<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IndexQuote {
    pub symbol: String,
    pub price: f64,
    pub change: f64,
}

/// Fully-formed reading set, published as a unit on every refresh so readers
/// never observe a half-updated cache.
#[derive(Clone, Debug, Default)]
pub struct SignalSnapshot {
    pub price: Option<PriceReading>,
    pub weather: Option<WeatherReading>,
    pub indices: Vec<IndexQuote>,
    pub fetched_at: Option<DateTime<Utc>>,
}

impl SignalSnapshot {
    pub fn active_sources(&self) -> usize {
        self.price.is_some() as usize
            + self.weather.is_some() as usize
            + !self.indices.is_empty() as usize
    }

    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        match self.fetched_at {
            Some(at) => (now - at).num_seconds() > STALE_AFTER_SECS,
            None => true,
        }
    }
}

/// Count of active signal sources, 0 through 3.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum GlitchIntensity {
    None,
    Slight,
    Moderate,
    Strong,
}

impl fmt::Display for GlitchIntensity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            GlitchIntensity::None => "none",
            GlitchIntensity::Slight => "slight",
            GlitchIntensity::Moderate => "moderate",
            GlitchIntensity::Strong => "strong",
        };
        f.write_str(s)
    }
}

/// Derived, never stored: recomputed on demand from the signal cache.
#[derive(Clone, Debug, PartialEq)]
pub struct GlitchProfile {
    pub intensity: GlitchIntensity,
    pub mood: String,
    pub descriptors: Vec<String>,
    pub anomalies: Vec<String>,
}

/// One source's contribution: a single mood vote plus descriptors.
struct Influence {
    moods: Vec<&'static str>,
    descriptors: Vec<&'static str>,
}

fn price_influence(p: &PriceReading) -> Influence {
    let (mood, descriptors): (&str, &[&str]) = match p.percent_change_1h {
        c if c < -5.0 => (
            "anxious",
            &["unstable", "chaotic", "deteriorating", "collapsing", "shattering", "fragmenting"],
        ),
        c if c < -2.0 => ("uneasy", &["uncertain", "wavering", "faltering", "fading"]),
        c if c < 2.0 => ("balanced", &["steady", "consistent", "regular", "balanced"]),
        c if c < 5.0 => ("optimistic", &["energetic", "vibrant", "expanding", "brightening"]),
        _ => (
            "euphoric",
            &["electric", "charged", "intense", "luminous", "brilliant", "pulsating"],
        ),
    };
    Influence {
        moods: vec![mood],
        descriptors: descriptors.to_vec(),
    }
}

fn weather_influence(w: &WeatherReading) -> Influence {
    let (mood, base): (&str, &[&str]) = match w.temperature_c {
        t if t < 0.0 => (
            "stark",
            &["frost-covered", "ice-cold", "frigid", "frozen", "glacial", "wintry", "crystalline"],
        ),
        t if t < 10.0 => ("somber", &["chilly", "brisk", "cold", "cool", "nippy"]),
        t if t < 20.0 => ("neutral", &["pleasant", "mild", "comfortable", "temperate"]),
        t if t < 30.0 => ("pleasant", &["warm", "balmy", "summery", "pleasant"]),
        _ => (
            "intense",
            &["scorching", "searing", "sweltering", "blistering", "blazing", "sultry", "torrid"],
        ),
    };
    let mut descriptors = base.to_vec();

    if let Some(humidity) = w.humidity {
        if humidity > 80.0 {
            descriptors.extend(["humid", "muggy", "sticky", "damp"]);
        } else if humidity < 30.0 {
            descriptors.extend(["dry", "arid", "parched"]);
        }
    }
    if let Some(wind) = w.wind_kph {
        if wind > 30.0 {
            descriptors.extend(["windy", "gusty", "blustery"]);
        } else if wind > 10.0 {
            descriptors.push("breezy");
        }
    }

    Influence {
        moods: vec![mood],
        descriptors,
    }
}

/// Mean percent change across index quotes, ignoring quotes without a price.
fn average_index_change(indices: &[IndexQuote]) -> Option<f64> {
    let changes: Vec<f64> = indices
        .iter()
        .filter(|q| q.price != 0.0)
        .map(|q| q.change / q.price * 100.0)
        .collect();
    if changes.is_empty() {
        return None;
    }
    Some(changes.iter().sum::<f64>() / changes.len() as f64)
}

fn index_change_stddev(indices: &[IndexQuote]) -> Option<f64> {
    let changes: Vec<f64> = indices
        .iter()
        .filter(|q| q.price != 0.0)
        .map(|q| q.change / q.price * 100.0)
        .collect();
    if changes.len() < 2 {
        return None;
    }
    let mean = changes.iter().sum::<f64>() / changes.len() as f64;
    let variance = changes.iter().map(|c| (c - mean).powi(2)).sum::<f64>() / changes.len() as f64;
    Some(variance.sqrt())
}

fn market_influence(indices: &[IndexQuote]) -> Influence {
    let mut moods = Vec::new();
    let mut descriptors: Vec<&'static str> = Vec::new();

    if let Some(avg) = average_index_change(indices) {
        let (mood, base): (&str, &[&str]) = match avg {
            a if a < -1.5 => ("pessimistic", &["descending", "sinking", "diminishing", "contracting"]),
            a if a < -0.5 => ("concerned", &["cautious", "restrained", "subdued", "muted"]),
            a if a <= 0.5 => ("steady", &["balanced", "steady", "unchanging", "consistent"]),
            a if a < 1.5 => ("hopeful", &["improving", "rising", "ascending", "elevating"]),
            _ => ("enthusiastic", &["soaring", "climbing", "accelerating", "amplifying"]),
        };
        moods.push(mood);
        descriptors.extend(base);
    }

    if let Some(std_dev) = index_change_stddev(indices) {
        if std_dev < 0.5 {
            descriptors.extend(["stable", "predictable", "reliable", "constant"]);
        } else if std_dev < 1.5 {
            moods.push("dynamic");
            descriptors.extend(["fluctuating", "shifting", "variable", "uneven"]);
        } else {
            moods.push("unstable");
            descriptors.extend(["erratic", "turbulent", "unpredictable", "chaotic", "fractured"]);
        }
    }

    Influence { moods, descriptors }
}

const PRICE_CRASH_ANOMALIES: &[&str] = &[
    "Digital displays momentarily show cascading numbers",
    "Electronics briefly malfunction, showing error codes",
    "The air feels charged with a sense of digital panic",
    "Shadows seem to darken and stretch in impossible ways",
    "Lights flicker in patterns that somehow feel mathematical",
];

const PRICE_SURGE_ANOMALIES: &[&str] = &[
    "Electronic devices emit a subtle green glow",
    "The air crackles with unexpected static electricity",
    "Digital displays briefly show rapidly increasing numbers",
    "Light sources seem unusually bright and oversaturated",
    "Objects appear to vibrate with a strange energy",
];

const HEAT_ANOMALIES: &[&str] = &[
    "The air wavers with visible heat distortion",
    "Surfaces appear to shimmer at the edges",
    "Colors become unnaturally vivid and intense",
    "A sense of time dilation makes movements seem slower",
    "Objects cast multiple overlapping shadows",
];

const COLD_ANOMALIES: &[&str] = &[
    "Breath freezes in mid-air, hanging like crystalline sculptures",
    "Sounds become muffled and distant",
    "Colors desaturate to near monochrome",
    "Surfaces develop intricate frost patterns that form and reform",
    "Time seems to slow as the cold intensifies",
];

const MARKET_CRASH_ANOMALIES: &[&str] = &[
    "Objects appear slightly heavier, as if gravity increased",
    "Colors drain from the environment in pulses",
    "A distant sound of breaking glass occasionally echoes",
    "Vertical lines in the environment appear to bend downward",
    "Reflective surfaces momentarily show distorted versions of reality",
];

const MARKET_BOOM_ANOMALIES: &[&str] = &[
    "Objects seem lighter, almost buoyant",
    "Colors appear unnaturally vibrant in waves",
    "A subtle upward motion appears in peripheral vision",
    "Light sources create halos that weren't there before",
    "Reflective surfaces briefly show idealized versions of reality",
];

/// Intensity-scaled extras, sampled without replacement.
const RANDOM_ANOMALY_POOL: &[&str] = &[
    "Objects briefly cast shadows in impossible directions",
    "Sounds occasionally play in reverse",
    "Peripheral vision reveals movement that disappears when looked at directly",
    "Reflective surfaces show a slight delay in movements",
    "Time briefly dilates, making moments stretch or compress",
    "Colors shift subtly toward unusual spectrums",
    "The taste of metal briefly appears in the mouth",
    "Static electricity affects objects in unusual ways",
    "Words spoken seem to have a subtle echo that wasn't there before",
    "Familiar objects momentarily appear foreign or wrong",
];

fn push_unique(dest: &mut Vec<String>, items: &[&str]) {
    for item in items {
        if !dest.iter().any(|d| d == item) {
            dest.push((*item).to_string());
        }
    }
}

fn triggered_anomalies(snapshot: &SignalSnapshot) -> Vec<String> {
    let mut anomalies = Vec::new();

    if let Some(price) = &snapshot.price {
        if price.percent_change_1h < -7.0 {
            push_unique(&mut anomalies, PRICE_CRASH_ANOMALIES);
        } else if price.percent_change_1h > 7.0 {
            push_unique(&mut anomalies, PRICE_SURGE_ANOMALIES);
        }
    }

    if let Some(weather) = &snapshot.weather {
        if weather.temperature_c > 35.0 {
            push_unique(&mut anomalies, HEAT_ANOMALIES);
        } else if weather.temperature_c < -10.0 {
            push_unique(&mut anomalies, COLD_ANOMALIES);
        }
    }

    if let Some(avg) = average_index_change(&snapshot.indices) {
        if avg < -3.0 {
            push_unique(&mut anomalies, MARKET_CRASH_ANOMALIES);
        } else if avg > 3.0 {
            push_unique(&mut anomalies, MARKET_BOOM_ANOMALIES);
        }
    }

    anomalies
}

/// Derives the glitch profile from a snapshot. Deterministic for a fixed
/// snapshot and RNG seed.
pub fn profile_from_snapshot(snapshot: &SignalSnapshot, rng: &mut impl Rng) -> GlitchProfile {
    let intensity = match snapshot.active_sources() {
        0 => GlitchIntensity::None,
        1 => GlitchIntensity::Slight,
        2 => GlitchIntensity::Moderate,
        _ => GlitchIntensity::Strong,
    };

    if intensity == GlitchIntensity::None {
        return GlitchProfile {
            intensity,
            mood: "neutral".to_string(),
            descriptors: ["normal", "ordinary", "standard", "usual"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            anomalies: Vec::new(),
        };
    }

    let mut votes: Vec<&'static str> = Vec::new();
    let mut descriptors: Vec<String> = Vec::new();

    let influences = [
        snapshot.price.as_ref().map(price_influence),
        snapshot.weather.as_ref().map(weather_influence),
        (!snapshot.indices.is_empty()).then(|| market_influence(&snapshot.indices)),
    ];
    for influence in influences.into_iter().flatten() {
        votes.extend(influence.moods);
        push_unique(&mut descriptors, &influence.descriptors);
    }

    // Most frequent vote wins; ties break uniformly at random.
    let mood = {
        let mut candidates: Vec<(&str, usize)> = Vec::new();
        for vote in &votes {
            match candidates.iter_mut().find(|(m, _)| m == vote) {
                Some((_, n)) => *n += 1,
                None => candidates.push((vote, 1)),
            }
        }
        let top = candidates.iter().map(|(_, n)| *n).max().unwrap_or(0);
        let tied: Vec<&str> = candidates
            .iter()
            .filter(|(_, n)| *n == top)
            .map(|(m, _)| *m)
            .collect();
        tied.choose(rng).copied().unwrap_or("neutral").to_string()
    };

    let mut anomalies = triggered_anomalies(snapshot);

    let extras = match intensity {
        GlitchIntensity::Moderate => rng.random_range(1..=2),
        GlitchIntensity::Strong => rng.random_range(2..=4),
        _ => 0,
    };
    if extras > 0 {
        let picks = index::sample(rng, RANDOM_ANOMALY_POOL.len(), extras);
        let chosen: Vec<&str> = picks.into_iter().map(|i| RANDOM_ANOMALY_POOL[i]).collect();
        push_unique(&mut anomalies, &chosen);
    }

    GlitchProfile {
        intensity,
        mood,
        descriptors,
        anomalies,
    }
}

/// Owns the read-mostly signal cache and the provider set behind it.
///
/// Refresh builds a complete snapshot and replaces the cache in one store
/// (last refresh wins); readers always see a coherent snapshot.
pub struct SignalAggregator {
    providers: SignalProviders,
    cache: RwLock<SignalSnapshot>,
}

impl SignalAggregator {
    pub fn new(providers: SignalProviders) -> Self {
        SignalAggregator {
            providers,
            cache: RwLock::new(SignalSnapshot::default()),
        }
    }

    /// Re-fetches every source. A failed or absent source is simply inactive.
    pub async fn refresh(&self) {
        let snapshot = SignalSnapshot {
            price: self.providers.fetch_price().await,
            weather: self.providers.fetch_weather().await,
            indices: self.providers.fetch_indices().await,
            fetched_at: Some(Utc::now()),
        };
        match self.cache.write() {
            Ok(mut cache) => *cache = snapshot,
            Err(e) => warn!("signal cache poisoned, refresh dropped: {e}"),
        }
    }

    pub fn snapshot(&self) -> SignalSnapshot {
        self.cache
            .read()
            .map(|c| c.clone())
            .unwrap_or_default()
    }

    /// Current profile, refreshing first if the cache is stale.
    pub async fn get_profile(&self) -> GlitchProfile {
        if self.snapshot().is_stale(Utc::now()) {
            self.refresh().await;
        }
        profile_from_snapshot(&self.snapshot(), &mut rand::rng())
    }
}
