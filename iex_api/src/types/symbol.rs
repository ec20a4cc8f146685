//! Reference-data types returned by the `/ref-data/symbols` endpoint.

use serde::{de, Deserialize, Deserializer, Serialize};

/// Full symbol universe, in the order the upstream listed it.
pub type SymbolsResponse = Vec<SymbolRecord>;

/// One tradable symbol. Decoded from CSV by header name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolRecord {
    /// Ticker symbol, e.g. `AAPL`.
    pub symbol: String,

    /// Company or fund name.
    pub name: String,

    /// Date the record was generated, as sent by the upstream.
    pub date: String,

    /// Whether IEX currently supports trading the symbol.
    #[serde(deserialize_with = "lenient_bool")]
    pub is_enabled: bool,

    /// Instrument type code (`cs`, `et`, `ps`, ...).
    #[serde(rename = "type")]
    pub instrument_type: String,

    /// IEX-internal numeric identifier.
    pub iex_id: i64,
}

/// Accepts `1/t/T/TRUE/true/True` and `0/f/F/FALSE/false/False`.
fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = String::deserialize(deserializer)?;
    match value.as_str() {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
        other => Err(de::Error::invalid_value(
            de::Unexpected::Str(other),
            &"a boolean such as true, false, 1 or 0",
        )),
    }
}
