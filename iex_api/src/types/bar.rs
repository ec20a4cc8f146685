//! Chart (OHLCV bar) types returned by the `/stock/market/batch` endpoint.

use std::collections::HashMap;

use chrono::{DateTime, LocalResult, NaiveDate, NaiveDateTime, TimeZone};
use chrono_tz::{America::New_York, Tz};
use serde::{Deserialize, Deserializer, Serialize};

use crate::Error;

/// Exchange timezone every `date`/`minute` pair is reported in.
pub const EXCHANGE_TZ: Tz = New_York;

const DAILY_FORMAT: &str = "%Y-%m-%d";
const INTRADAY_FORMATS: [&str; 2] = ["%Y%m%d %H:%M", "%Y-%m-%d %H:%M"];

/// Batch response: one [`ChartResponse`] per requested symbol.
pub type BarsResponse = HashMap<String, ChartResponse>;

/// Per-symbol wrapper around the `chart` array.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartResponse {
    /// Bars in the order the upstream returned them (chronological).
    #[serde(default)]
    pub chart: Vec<Bar>,
}

/// A single price/volume observation for one symbol.
///
/// Plain fields are the primary-exchange (IEX) figures; the `market_*`
/// fields are the consolidated-market equivalents. Missing keys and `null`
/// numerics decode as zero.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Bar {
    /// Calendar date, `YYYY-MM-DD` (daily) or `YYYYMMDD` (intraday).
    #[serde(deserialize_with = "null_as_default")]
    pub date: String,

    /// Minute of day, `HH:MM`. Empty for daily bars.
    #[serde(deserialize_with = "null_as_default")]
    pub minute: String,

    #[serde(deserialize_with = "null_as_default")]
    pub label: String,

    #[serde(deserialize_with = "null_as_default")]
    pub open: f32,
    #[serde(deserialize_with = "null_as_default")]
    pub high: f32,
    #[serde(deserialize_with = "null_as_default")]
    pub low: f32,
    #[serde(deserialize_with = "null_as_default")]
    pub close: f32,
    #[serde(deserialize_with = "null_as_default")]
    pub volume: i32,

    #[serde(deserialize_with = "null_as_default")]
    pub average: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub notional: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub number_of_trades: i64,

    #[serde(deserialize_with = "null_as_default")]
    pub market_high: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub market_low: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub market_average: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub market_volume: i64,
    #[serde(deserialize_with = "null_as_default")]
    pub market_notional: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub market_number_of_trades: i64,

    /// Consolidated open. Absent outside intraday payloads.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_open: Option<f64>,
    /// Consolidated close. Absent outside intraday payloads.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_close: Option<f64>,

    /// Percent change relative to the first bar of the range.
    #[serde(deserialize_with = "null_as_default")]
    pub change_over_time: f64,
    #[serde(deserialize_with = "null_as_default")]
    pub market_change_over_time: f64,
}

impl Bar {
    /// True when the bar covers a single minute rather than a whole session.
    pub fn is_intraday(&self) -> bool {
        !self.minute.is_empty()
    }

    /// Absolute start of the bar in exchange time.
    ///
    /// Daily bars resolve to midnight New York time on `date`; only the date
    /// component is meaningful. Intraday bars combine `date` and `minute`.
    /// A wall-clock minute that falls in a DST gap is an error; one that is
    /// ambiguous resolves to the earlier instant.
    pub fn timestamp(&self) -> Result<DateTime<Tz>, Error> {
        let (value, naive) = if self.is_intraday() {
            let value = format!("{} {}", self.date, self.minute);
            let naive = parse_intraday(&value)?;
            (value, naive)
        } else {
            let naive = parse_date(&self.date)?.and_hms_opt(0, 0, 0).ok_or_else(|| {
                Error::Timestamp {
                    value: self.date.clone(),
                    reason: "midnight out of range".to_string(),
                }
            })?;
            (self.date.clone(), naive)
        };

        match EXCHANGE_TZ.from_local_datetime(&naive) {
            LocalResult::Single(ts) => Ok(ts),
            LocalResult::Ambiguous(earliest, _) => Ok(earliest),
            LocalResult::None => Err(Error::Timestamp {
                value,
                reason: "local time does not exist in America/New_York".to_string(),
            }),
        }
    }

    /// Exchange-local calendar date the bar belongs to.
    pub fn trading_date(&self) -> Result<NaiveDate, Error> {
        if self.is_intraday() {
            Ok(parse_intraday(&format!("{} {}", self.date, self.minute))?.date())
        } else {
            parse_date(&self.date)
        }
    }
}

fn parse_date(value: &str) -> Result<NaiveDate, Error> {
    NaiveDate::parse_from_str(value, DAILY_FORMAT).map_err(|e| Error::Timestamp {
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn parse_intraday(value: &str) -> Result<NaiveDateTime, Error> {
    let mut last_err = None;
    for format in INTRADAY_FORMATS {
        match NaiveDateTime::parse_from_str(value, format) {
            Ok(naive) => return Ok(naive),
            Err(e) => last_err = Some(e),
        }
    }
    Err(Error::Timestamp {
        value: value.to_string(),
        reason: last_err.map_or_else(|| "unparseable".to_string(), |e| e.to_string()),
    })
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
