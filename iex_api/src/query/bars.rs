use std::str::FromStr;

use url::Url;

use crate::Error;

use super::common::Query;

/// Maximum number of symbols the batch endpoint accepts in one request.
///
/// Not enforced: callers with larger universes split them themselves.
pub const BATCH_SIZE: usize = 100;

/// Time span of chart data requested from the batch endpoint.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BarRange {
    FiveYears,
    TwoYears,
    OneYear,
    YearToDate,
    SixMonths,
    ThreeMonths,
    #[default]
    OneMonth,
    /// Intraday one-minute bars for the latest session.
    OneDay,
    /// A specific day, selected upstream with an additional date parameter.
    Date,
    /// `1d` if the market is open, otherwise `1m`, decided upstream.
    Dynamic,
}

impl BarRange {
    pub const ALL: [BarRange; 10] = [
        BarRange::FiveYears,
        BarRange::TwoYears,
        BarRange::OneYear,
        BarRange::YearToDate,
        BarRange::SixMonths,
        BarRange::ThreeMonths,
        BarRange::OneMonth,
        BarRange::OneDay,
        BarRange::Date,
        BarRange::Dynamic,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BarRange::FiveYears => "5y",
            BarRange::TwoYears => "2y",
            BarRange::OneYear => "1y",
            BarRange::YearToDate => "ytd",
            BarRange::SixMonths => "6m",
            BarRange::ThreeMonths => "3m",
            BarRange::OneMonth => "1m",
            BarRange::OneDay => "1d",
            BarRange::Date => "date",
            BarRange::Dynamic => "dynamic",
        }
    }
}

impl std::fmt::Display for BarRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BarRange {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BarRange::ALL
            .into_iter()
            .find(|range| range.as_str() == s)
            .ok_or_else(|| Error::InvalidRange(s.to_string()))
    }
}

/// Returns true if `range` is a value the batch endpoint accepts.
pub fn is_supported_range(range: &str) -> bool {
    range.parse::<BarRange>().is_ok()
}

/// Query for `/stock/market/batch` restricted to chart data.
#[derive(Clone, Debug, Default)]
pub struct BarsQuery {
    pub symbols: Vec<String>,
    pub range: BarRange,
    /// Only the most recent N bars per symbol. `None` or zero sends no limit.
    pub chart_last: Option<u32>,
}

impl BarsQuery {
    pub fn new<I, S>(symbols: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            symbols: symbols.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn with_symbol(mut self, symbol: &str) -> Self {
        self.symbols.push(symbol.to_string());
        self
    }

    pub fn with_range(mut self, range: BarRange) -> Self {
        self.range = range;
        self
    }

    pub fn with_chart_last(mut self, chart_last: u32) -> Self {
        self.chart_last = Some(chart_last);
        self
    }
}

impl Query for BarsQuery {
    fn add_to_url(&self, url: &Url) -> Url {
        let mut url = url.clone();
        url.query_pairs_mut()
            .append_pair("symbols", &self.symbols.join(","))
            .append_pair("types", "chart")
            .append_pair("range", self.range.as_str());
        if let Some(chart_last) = self.chart_last.filter(|n| *n > 0) {
            url.query_pairs_mut()
                .append_pair("chartLast", &chart_last.to_string());
        }
        url
    }
}
