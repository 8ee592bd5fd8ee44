//! Market data type discriminator

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of market data carried by a record. Each kind has its own hot-cache
/// buffer, flush policy and table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataType {
    Orderbook,
    Trade,
    FundingRate,
    OpenInterest,
    Liquidation,
    LsrTopPosition,
    LsrAllAccount,
    VolatilityIndex,
}

impl DataType {
    /// Every data type, in a stable order (used for registries and reports).
    pub const ALL: [DataType; 8] = [
        DataType::Orderbook,
        DataType::Trade,
        DataType::FundingRate,
        DataType::OpenInterest,
        DataType::Liquidation,
        DataType::LsrTopPosition,
        DataType::LsrAllAccount,
        DataType::VolatilityIndex,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Orderbook => "orderbook",
            Self::Trade => "trade",
            Self::FundingRate => "funding_rate",
            Self::OpenInterest => "open_interest",
            Self::Liquidation => "liquidation",
            Self::LsrTopPosition => "lsr_top_position",
            Self::LsrAllAccount => "lsr_all_account",
            Self::VolatilityIndex => "volatility_index",
        }
    }

    /// Default table the data type is persisted to.
    pub fn table(&self) -> &'static str {
        match self {
            Self::Orderbook => "orderbooks",
            Self::Trade => "trades",
            Self::FundingRate => "funding_rates",
            Self::OpenInterest => "open_interest",
            Self::Liquidation => "liquidations",
            Self::LsrTopPosition => "lsr_top_positions",
            Self::LsrAllAccount => "lsr_all_accounts",
            Self::VolatilityIndex => "volatility_index",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DataType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace('-', "_");
        DataType::ALL
            .into_iter()
            .find(|dt| dt.as_str() == normalized)
            .ok_or_else(|| anyhow::anyhow!("Invalid data type: {}", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_round_trips_names() {
        for dt in DataType::ALL {
            assert_eq!(dt.as_str().parse::<DataType>().unwrap(), dt);
        }
    }

    #[test]
    fn test_parse_accepts_dashes_and_case() {
        assert_eq!("LSR-Top-Position".parse::<DataType>().unwrap(), DataType::LsrTopPosition);
        assert!("candles".parse::<DataType>().is_err());
    }

    #[test]
    fn test_tables_are_unique() {
        let mut tables: Vec<_> = DataType::ALL.iter().map(|dt| dt.table()).collect();
        tables.sort();
        tables.dedup();
        assert_eq!(tables.len(), DataType::ALL.len());
    }

    #[test]
    fn test_serde_uses_snake_case() {
        let json = serde_json::to_string(&DataType::FundingRate).unwrap();
        assert_eq!(json, "\"funding_rate\"");
    }
}
