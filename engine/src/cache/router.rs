//! Topic to data type resolution
//!
//! Topics look like `<prefix>-data.<exchange>.<market_type>.<symbol>`; the
//! two long/short ratio variants carry `top-position` or `all-account` as an
//! extra segment.

use strata_shared::DataType;

const LSR_PREFIX: &str = "lsr-data";
const TOP_POSITION: &str = "top-position";
const ALL_ACCOUNT: &str = "all-account";

const PREFIXES: &[(&str, DataType)] = &[
    ("orderbook-data", DataType::Orderbook),
    ("trade-data", DataType::Trade),
    ("trades-data", DataType::Trade),
    ("funding-rate-data", DataType::FundingRate),
    ("open-interest-data", DataType::OpenInterest),
    ("liquidation-data", DataType::Liquidation),
    ("liquidations-data", DataType::Liquidation),
    ("volatility-index-data", DataType::VolatilityIndex),
];

/// What a topic says about its records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicInfo {
    pub data_type: DataType,
    pub exchange: Option<String>,
    pub market_type: Option<String>,
    pub symbol: Option<String>,
}

/// Resolve `topic` to exactly one data type, or `None` if unrecognized.
pub fn resolve_topic(topic: &str) -> Option<TopicInfo> {
    let data_type = if topic.starts_with(LSR_PREFIX) {
        if topic.contains(TOP_POSITION) {
            DataType::LsrTopPosition
        } else if topic.contains(ALL_ACCOUNT) {
            DataType::LsrAllAccount
        } else {
            return None;
        }
    } else {
        PREFIXES
            .iter()
            .find(|(prefix, _)| topic.starts_with(prefix))
            .map(|(_, data_type)| *data_type)?
    };

    let mut segments = topic
        .split('.')
        .skip(1)
        .filter(|s| !s.is_empty() && *s != TOP_POSITION && *s != ALL_ACCOUNT)
        .map(str::to_string);

    Some(TopicInfo {
        data_type,
        exchange: segments.next(),
        market_type: segments.next(),
        symbol: segments.next(),
    })
}
