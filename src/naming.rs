//! Canonical file and entry names for dated market-data series.
//!
//! These names double as storage keys for downstream lookups, so both
//! functions are total and deterministic: the same inputs always give the same
//! string, and no input is rejected.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Asset class of a traded symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityType {
    Base,
    Equity,
    Option,
    Commodity,
    Forex,
    Future,
    Cfd,
    Crypto,
    FutureOption,
    Index,
    IndexOption,
    CryptoFuture,
}

impl SecurityType {
    pub const ALL: [SecurityType; 12] = [
        SecurityType::Base,
        SecurityType::Equity,
        SecurityType::Option,
        SecurityType::Commodity,
        SecurityType::Forex,
        SecurityType::Future,
        SecurityType::Cfd,
        SecurityType::Crypto,
        SecurityType::FutureOption,
        SecurityType::Index,
        SecurityType::IndexOption,
        SecurityType::CryptoFuture,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityType::Base => "base",
            SecurityType::Equity => "equity",
            SecurityType::Option => "option",
            SecurityType::Commodity => "commodity",
            SecurityType::Forex => "forex",
            SecurityType::Future => "future",
            SecurityType::Cfd => "cfd",
            SecurityType::Crypto => "crypto",
            SecurityType::FutureOption => "futureoption",
            SecurityType::Index => "index",
            SecurityType::IndexOption => "indexoption",
            SecurityType::CryptoFuture => "cryptofuture",
        }
    }
}

impl fmt::Display for SecurityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SecurityType {
    type Err = ParseNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        SecurityType::ALL
            .into_iter()
            .find(|t| t.as_str() == lower)
            .ok_or_else(|| ParseNameError::SecurityType(s.to_string()))
    }
}

/// Sampling granularity of a data series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resolution {
    Tick,
    Second,
    Minute,
    Hour,
    Daily,
}

impl Resolution {
    pub const ALL: [Resolution; 5] = [
        Resolution::Tick,
        Resolution::Second,
        Resolution::Minute,
        Resolution::Hour,
        Resolution::Daily,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::Tick => "tick",
            Resolution::Second => "second",
            Resolution::Minute => "minute",
            Resolution::Hour => "hour",
            Resolution::Daily => "daily",
        }
    }

    /// Hour and daily series keep their whole history in one file per symbol.
    pub fn is_low_frequency(&self) -> bool {
        matches!(self, Resolution::Hour | Resolution::Daily)
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Resolution {
    type Err = ParseNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_lowercase();
        Resolution::ALL
            .into_iter()
            .find(|r| r.as_str() == lower)
            .ok_or_else(|| ParseNameError::Resolution(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseNameError {
    #[error("unknown security type: {0:?}")]
    SecurityType(String),
    #[error("unknown resolution: {0:?}")]
    Resolution(String),
}

fn tick_type(security_type: SecurityType) -> &'static str {
    match security_type {
        SecurityType::Forex => "quote",
        _ => "trade",
    }
}

/// Name of the csv entry holding one series inside its zip.
pub fn entry_name(
    symbol: &str,
    security_type: SecurityType,
    date: NaiveDate,
    resolution: Resolution,
) -> String {
    if resolution.is_low_frequency() {
        return format!("{symbol}.csv");
    }
    format!(
        "{}_{}_{}_{}.csv",
        date.format("%Y%m%d"),
        symbol.to_lowercase(),
        resolution,
        tick_type(security_type)
    )
}

/// Name of the zip file holding one series.
pub fn file_name(
    symbol: &str,
    security_type: SecurityType,
    date: NaiveDate,
    resolution: Resolution,
) -> String {
    if resolution.is_low_frequency() {
        return format!("{symbol}.zip");
    }
    format!("{}_{}.zip", date.format("%Y%m%d"), tick_type(security_type))
}

/// Identity of one dated series
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NamingKey {
    pub symbol: String,
    pub security_type: SecurityType,
    pub date: NaiveDate,
    pub resolution: Resolution,
}

impl NamingKey {
    pub fn new(
        symbol: impl Into<String>,
        security_type: SecurityType,
        date: NaiveDate,
        resolution: Resolution,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            security_type,
            date,
            resolution,
        }
    }

    pub fn entry_name(&self) -> String {
        entry_name(&self.symbol, self.security_type, self.date, self.resolution)
    }

    pub fn file_name(&self) -> String {
        file_name(&self.symbol, self.security_type, self.date, self.resolution)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn may_first() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 5, 1).unwrap()
    }

    #[test]
    fn test_forex_minute_entry_is_quote() {
        assert_eq!(
            entry_name("EURUSD", SecurityType::Forex, may_first(), Resolution::Minute),
            "20230501_eurusd_minute_quote.csv"
        );
        assert_eq!(
            file_name("EURUSD", SecurityType::Forex, may_first(), Resolution::Minute),
            "20230501_quote.zip"
        );
    }

    #[test]
    fn test_equity_tick_entry_is_trade() {
        assert_eq!(
            entry_name("AAPL", SecurityType::Equity, may_first(), Resolution::Tick),
            "20230501_aapl_tick_trade.csv"
        );
        assert_eq!(
            file_name("AAPL", SecurityType::Equity, may_first(), Resolution::Second),
            "20230501_trade.zip"
        );
    }

    #[test]
    fn test_low_frequency_keeps_symbol_case() {
        assert_eq!(
            entry_name("AAPL", SecurityType::Equity, may_first(), Resolution::Daily),
            "AAPL.csv"
        );
        assert_eq!(
            file_name("EURUSD", SecurityType::Forex, may_first(), Resolution::Hour),
            "EURUSD.zip"
        );
    }

    #[test]
    fn test_date_is_zero_padded() {
        let date = NaiveDate::from_ymd_opt(999, 1, 2).unwrap();
        assert_eq!(
            file_name("X", SecurityType::Future, date, Resolution::Minute),
            "09990102_trade.zip"
        );
    }

    #[test]
    fn test_naming_key_matches_free_functions() {
        let key = NamingKey::new("BTCUSD", SecurityType::Crypto, may_first(), Resolution::Second);
        assert_eq!(key.entry_name(), "20230501_btcusd_second_trade.csv");
        assert_eq!(key.file_name(), "20230501_trade.zip");
        assert_eq!(key.entry_name(), key.clone().entry_name());
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        assert_eq!("Forex".parse::<SecurityType>(), Ok(SecurityType::Forex));
        assert_eq!(
            "FUTUREOPTION".parse::<SecurityType>(),
            Ok(SecurityType::FutureOption)
        );
        assert_eq!("Minute".parse::<Resolution>(), Ok(Resolution::Minute));
        assert!("weekly".parse::<Resolution>().is_err());
        assert!("bond".parse::<SecurityType>().is_err());
    }

    #[test]
    fn test_display_round_trips_through_parse() {
        for resolution in Resolution::ALL {
            assert_eq!(resolution.to_string().parse::<Resolution>(), Ok(resolution));
        }
        for security_type in SecurityType::ALL {
            assert_eq!(
                security_type.to_string().parse::<SecurityType>(),
                Ok(security_type)
            );
        }
    }
}
