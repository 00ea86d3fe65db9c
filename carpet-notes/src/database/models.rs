//! Database models
//!
//! Rust structs representing the persisted entities.
//! Field names serialize in camelCase to keep the stored JSON shape stable.

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::config::DEFAULT_RATE_PER_SQ_M;

/// Display currency for prices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Currency {
    #[default]
    KZT,
    RUB,
    USD,
}

impl Currency {
    pub const ALL: [Currency; 3] = [Currency::KZT, Currency::RUB, Currency::USD];

    /// Symbol shown in front of prices
    pub fn symbol(self) -> &'static str {
        match self {
            Currency::KZT => "₸",
            Currency::RUB => "₽",
            Currency::USD => "$",
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            Currency::KZT => "KZT",
            Currency::RUB => "RUB",
            Currency::USD => "USD",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let wanted = s.trim();
        Currency::ALL
            .into_iter()
            .find(|c| c.code().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| format!("unknown currency: {}", s))
    }
}

/// Pricing settings, a process-wide singleton
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub rate_per_sq_m: f64,
    pub currency: Currency,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            rate_per_sq_m: DEFAULT_RATE_PER_SQ_M,
            currency: Currency::default(),
        }
    }
}

/// One width x length measurement, in meters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Carpet {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub width: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub length: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub area: f64,
}

impl Carpet {
    /// Builds a carpet with its area derived from the clamped dimensions
    pub fn new(width: f64, length: f64) -> Self {
        let width = non_negative(width);
        let length = non_negative(length);
        Self {
            width,
            length,
            area: width * length,
        }
    }
}

/// One cleaning job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub id: String,
    #[serde(default)]
    pub address: String,
    pub date: NaiveDate,
    #[serde(default, deserialize_with = "lenient_date")]
    pub deadline: Option<NaiveDate>,
    #[serde(default)]
    pub is_done: bool,
    #[serde(default)]
    pub carpets: Vec<Carpet>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub total_area: f64,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub total_price: f64,
}

impl Record {
    /// Builds a fresh record from an update payload; absent fields take defaults
    pub fn from_update(id: String, update: RecordUpdate, fallback_date: NaiveDate) -> Self {
        let mut record = Self {
            id,
            address: String::new(),
            date: fallback_date,
            deadline: None,
            is_done: false,
            carpets: Vec::new(),
            total_area: 0.0,
            total_price: 0.0,
        };
        update.apply_to(&mut record);
        record
    }
}

/// Carpets and the totals derived from them.
///
/// Kept as one unit so an update cannot replace the carpets without
/// replacing the totals.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Measurements {
    pub carpets: Vec<Carpet>,
    pub total_area: f64,
    pub total_price: f64,
}

/// Sparse update where each `Some` field overwrites the record value
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RecordUpdate {
    /// Target record; `None` or an unknown id creates a new record
    pub id: Option<String>,
    pub address: Option<String>,
    pub date: Option<NaiveDate>,
    pub deadline: Option<Option<NaiveDate>>,
    pub is_done: Option<bool>,
    pub measurements: Option<Measurements>,
}

impl RecordUpdate {
    /// Applies this update in place to `rec`. The id is never touched.
    pub fn apply_to(&self, rec: &mut Record) {
        if let Some(v) = &self.address {
            rec.address = v.clone();
        }
        if let Some(v) = self.date {
            rec.date = v;
        }
        if let Some(v) = self.deadline {
            rec.deadline = v;
        }
        if let Some(v) = self.is_done {
            rec.is_done = v;
        }
        if let Some(m) = &self.measurements {
            rec.carpets = m.carpets.clone();
            rec.total_area = m.total_area;
            rec.total_price = m.total_price;
        }
    }
}

/// Clamps negatives and NaN to zero
pub(crate) fn non_negative(v: f64) -> f64 {
    if v.is_finite() && v > 0.0 {
        v
    } else {
        0.0
    }
}

/// Accepts numbers, numeric strings and null; anything else becomes 0.
fn lenient_f64<'de, D>(deserializer: D) -> std::result::Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let parsed = match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    Ok(parsed.filter(|v| v.is_finite()).unwrap_or(0.0))
}

/// Accepts `YYYY-MM-DD`, an empty string or null.
fn lenient_date<'de, D>(deserializer: D) -> std::result::Result<Option<NaiveDate>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.and_then(|s| NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_settings_json_shape() {
        let json = serde_json::to_value(Settings::default()).unwrap();
        assert_eq!(json["ratePerSqM"], 1000.0);
        assert_eq!(json["currency"], "KZT");
    }

    #[test]
    fn test_record_json_shape() {
        let record = Record {
            id: "1".to_string(),
            address: "Main St 5".to_string(),
            date: date("2024-01-10"),
            deadline: None,
            is_done: true,
            carpets: vec![Carpet::new(2.0, 3.0)],
            total_area: 6.0,
            total_price: 6000.0,
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["date"], "2024-01-10");
        assert!(json["deadline"].is_null());
        assert_eq!(json["isDone"], true);
        assert_eq!(json["carpets"][0]["area"], 6.0);
        assert_eq!(json["totalArea"], 6.0);
        assert_eq!(json["totalPrice"], 6000.0);
    }

    #[test]
    fn test_lenient_carpet_fields() {
        let carpet: Carpet = serde_json::from_str(r#"{"width":"2.5","length":null}"#).unwrap();
        assert_eq!(carpet.width, 2.5);
        assert_eq!(carpet.length, 0.0);
        assert_eq!(carpet.area, 0.0);

        let carpet: Carpet = serde_json::from_str(r#"{"width":true}"#).unwrap();
        assert_eq!(carpet.width, 0.0);
    }

    #[test]
    fn test_empty_deadline_reads_as_none() {
        let record: Record =
            serde_json::from_str(r#"{"id":"x","address":"a","date":"2024-01-10","deadline":""}"#)
                .unwrap();
        assert_eq!(record.deadline, None);
        assert!(record.carpets.is_empty());
        assert!(!record.is_done);
    }

    #[test]
    fn test_carpet_new_clamps_negative() {
        let carpet = Carpet::new(-2.0, 3.0);
        assert_eq!(carpet.width, 0.0);
        assert_eq!(carpet.area, 0.0);
        assert_eq!(Carpet::new(f64::NAN, 3.0).area, 0.0);
    }

    #[test]
    fn test_currency_parse() {
        assert_eq!("usd".parse::<Currency>().unwrap(), Currency::USD);
        assert_eq!(" RUB ".parse::<Currency>().unwrap(), Currency::RUB);
        assert!("EUR".parse::<Currency>().is_err());
        assert_eq!(Currency::KZT.symbol(), "₸");
    }

    #[test]
    fn test_update_preserves_absent_fields() {
        let mut record = Record::from_update(
            "1".to_string(),
            RecordUpdate {
                address: Some("Old".to_string()),
                deadline: Some(Some(date("2024-02-01"))),
                ..RecordUpdate::default()
            },
            date("2024-01-10"),
        );

        RecordUpdate {
            is_done: Some(true),
            ..RecordUpdate::default()
        }
        .apply_to(&mut record);

        assert_eq!(record.address, "Old");
        assert_eq!(record.deadline, Some(date("2024-02-01")));
        assert!(record.is_done);
    }
}
