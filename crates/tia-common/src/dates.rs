//! Date parsing shared by the repository drivers and the wire models.
//!
//! Publication dates travel as `yyyy-MM-dd`. Older producers emit epoch
//! milliseconds, so the deserializers accept both.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serializer};

const DATE_FORMATS: [&str; 2] = ["%Y/%m/%d", "%Y-%m-%d"];
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse `yyyy/MM/dd` or `yyyy-MM-dd`, or a full ISO date-time whose day
/// is kept. Anything else, including trailing garbage, is rejected.
pub fn parse_date(value: &str) -> Option<NaiveDate> {
    let value = value.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(value, fmt).ok())
        .or_else(|| DateTime::parse_from_rfc3339(value).ok().map(|dt| dt.date_naive()))
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
                .map(|dt| dt.date())
        })
}

pub fn format_date(date: Option<NaiveDate>) -> String {
    match date {
        Some(d) => d.format("%Y-%m-%d").to_string(),
        None => "null".to_string(),
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawDate {
    Millis(i64),
    Text(String),
}

fn from_raw(raw: RawDate) -> Option<NaiveDate> {
    match raw {
        RawDate::Millis(ms) => DateTime::from_timestamp_millis(ms).map(|dt| dt.date_naive()),
        RawDate::Text(s) => DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.date_naive())
            .ok()
            .or_else(|| parse_date(&s)),
    }
}

/// `#[serde(with = "tia_common::dates::optional")]` for `Option<NaiveDate>`.
pub mod optional {
    use super::*;

    pub fn serialize<S: Serializer>(date: &Option<NaiveDate>, s: S) -> Result<S::Ok, S::Error> {
        match date {
            Some(d) => s.serialize_str(&d.format("%Y-%m-%d").to_string()),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
        let raw: Option<RawDate> = Option::deserialize(d)?;
        Ok(raw.and_then(from_raw))
    }
}

/// `#[serde(with = "tia_common::dates::required")]` for `NaiveDate`.
pub mod required {
    use super::*;
    use serde::de::Error;

    pub fn serialize<S: Serializer>(date: &NaiveDate, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&date.format("%Y-%m-%d").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDate, D::Error> {
        let raw = RawDate::deserialize(d)?;
        from_raw(raw).ok_or_else(|| D::Error::custom("unrecognised date value"))
    }
}
