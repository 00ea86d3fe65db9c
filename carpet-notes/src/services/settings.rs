//! Settings service
//!
//! Owns the pricing settings and persists them as a JSON value in the
//! key-value store. Reads and writes are fail-soft: the in-memory copy is
//! authoritative for the session whatever storage does.

use crate::config::{SETTINGS_FORMAT_VERSION, SETTINGS_KEY};
use crate::database::{Currency, Repository, Settings};
use crate::error::{AppError, Result, ValidationError};
use serde::Serialize;
use serde_json::{Map, Value};

/// On-disk envelope: the settings fields plus a format version
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StoredSettings {
    format_version: u32,
    #[serde(flatten)]
    settings: Settings,
}

/// Service for managing pricing settings
pub struct SettingsService {
    repo: Repository,
    settings: Settings,
}

impl SettingsService {
    /// Open the service, loading persisted settings or defaults
    pub async fn open(repo: Repository) -> Self {
        let mut service = Self {
            repo,
            settings: Settings::default(),
        };
        service.settings = service.load_settings().await;
        service
    }

    /// Settings in effect for this session
    pub fn current(&self) -> Settings {
        self.settings
    }

    /// Read settings from storage.
    ///
    /// Missing data yields defaults. Each valid key overrides its default;
    /// invalid keys are ignored. Never fails.
    pub async fn load_settings(&self) -> Settings {
        match self.repo.get_value(SETTINGS_KEY).await {
            Ok(Some(raw)) => decode_settings(&raw),
            Ok(None) => {
                tracing::info!("No stored settings, using defaults");
                Settings::default()
            }
            Err(e) => {
                tracing::warn!("Failed to read settings, using defaults: {}", e);
                Settings::default()
            }
        }
    }

    /// Replace the settings and persist them.
    ///
    /// Returns whether the write reached storage. On failure the new
    /// settings still apply for this session.
    pub async fn save_settings(&mut self, settings: Settings) -> bool {
        self.settings = settings;

        match self.write(&settings).await {
            Ok(()) => {
                tracing::info!(
                    "Settings saved: rate {} {}",
                    settings.rate_per_sq_m,
                    settings.currency
                );
                true
            }
            Err(e) => {
                tracing::error!("Failed to save settings: {}", e);
                false
            }
        }
    }

    /// Validate user input and save it.
    ///
    /// A non-numeric or non-positive rate is rejected and leaves the
    /// settings unchanged. On success returns whether the write persisted.
    pub async fn update_settings(&mut self, rate_input: &str, currency: Currency) -> Result<bool> {
        let rate_per_sq_m = parse_rate(rate_input).map_err(AppError::from)?;
        let persisted = self
            .save_settings(Settings {
                rate_per_sq_m,
                currency,
            })
            .await;
        Ok(persisted)
    }

    async fn write(&self, settings: &Settings) -> Result<()> {
        let stored = StoredSettings {
            format_version: SETTINGS_FORMAT_VERSION,
            settings: *settings,
        };
        let content = serde_json::to_string(&stored)?;
        self.repo.set_value(SETTINGS_KEY, &content).await
    }
}

/// Parse a user-entered rate, accepting a decimal comma
pub fn parse_rate(input: &str) -> std::result::Result<f64, ValidationError> {
    input
        .trim()
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|rate| rate.is_finite() && *rate > 0.0)
        .ok_or(ValidationError::InvalidRate)
}

fn decode_settings(raw: &str) -> Settings {
    let defaults = Settings::default();

    let fields: Map<String, Value> = match serde_json::from_str(raw) {
        Ok(Value::Object(fields)) => fields,
        Ok(_) => {
            tracing::warn!("Stored settings are not an object, using defaults");
            return defaults;
        }
        Err(e) => {
            tracing::warn!("Failed to parse settings, using defaults: {}", e);
            return defaults;
        }
    };

    let version = fields
        .get("formatVersion")
        .and_then(Value::as_u64)
        .unwrap_or(1);
    if version > u64::from(SETTINGS_FORMAT_VERSION) {
        tracing::warn!("Unsupported settings format {}, using defaults", version);
        return defaults;
    }

    let rate_per_sq_m = match fields.get("ratePerSqM") {
        None => defaults.rate_per_sq_m,
        Some(value) => match rate_from_value(value) {
            Some(rate) => rate,
            None => {
                tracing::warn!("Ignoring invalid stored rate: {}", value);
                defaults.rate_per_sq_m
            }
        },
    };

    let currency = match fields.get("currency") {
        None => defaults.currency,
        Some(value) => serde_json::from_value::<Currency>(value.clone()).unwrap_or_else(|_| {
            tracing::warn!("Ignoring invalid stored currency: {}", value);
            defaults.currency
        }),
    };

    Settings {
        rate_per_sq_m,
        currency,
    }
}

fn rate_from_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64().filter(|r| r.is_finite() && *r > 0.0),
        Value::String(s) => parse_rate(s).ok(),
        _ => None,
    }
}
