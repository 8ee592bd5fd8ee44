//! Table catalog
//!
//! Fixed schema knowledge for the eight market data tables: the allowed-field
//! list each insert is projected onto, how each column is coerced, the natural
//! key used for deduplication and delete confirmation, and which migration
//! strategy a table uses.

use crate::error::ConfigError;
use std::collections::BTreeMap;
use strata_shared::DataType;

/// Literal written when a record has no `data_source` field.
pub const DEFAULT_DATA_SOURCE: &str = "'realtime'";

/// Column holding the event time every migration window filters on.
pub const TIMESTAMP_COLUMN: &str = "timestamp";

/// How a record field is rendered into SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Text,
    /// Rendered from its textual form, never through a float
    Decimal,
    Integer,
    Bool,
    /// `DateTime64(3)`, UTC
    Timestamp,
    /// Nested structure (book levels, arrays) stored as JSON text
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Column {
    pub name: String,
    pub kind: ColumnKind,
    /// SQL literal used when the field is missing; `NULL` otherwise.
    pub default: Option<&'static str>,
}

impl Column {
    pub fn new(name: &str, kind: ColumnKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            default: None,
        }
    }

    pub fn with_default(mut self, literal: &'static str) -> Self {
        self.default = Some(literal);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    pub name: String,
    pub data_type: DataType,
    /// Allowed fields, in insert order
    pub columns: Vec<Column>,
    /// Columns identifying one logical row
    pub natural_key: Vec<String>,
    /// Use the anti-join (complex) migration strategy
    pub dedup: bool,
}

impl TableSpec {
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// Registry of table specs, one per data type.
#[derive(Debug, Clone)]
pub struct Catalog {
    tables: Vec<TableSpec>,
}

impl Catalog {
    /// Built-in schema for all eight data types.
    pub fn standard() -> Self {
        use ColumnKind::*;

        let table = |data_type: DataType, extra: Vec<Column>, key_extra: &[&str], dedup: bool| {
            let mut columns = vec![
                Column::new("exchange", Text),
                Column::new("market_type", Text),
                Column::new("symbol", Text),
                Column::new(TIMESTAMP_COLUMN, Timestamp),
            ];
            columns.extend(extra);
            columns.push(Column::new("data_source", Text).with_default(DEFAULT_DATA_SOURCE));

            let mut natural_key: Vec<String> = ["exchange", "market_type", "symbol", TIMESTAMP_COLUMN]
                .iter()
                .map(|s| s.to_string())
                .collect();
            natural_key.extend(key_extra.iter().map(|s| s.to_string()));

            TableSpec {
                name: data_type.table().to_string(),
                data_type,
                columns,
                natural_key,
                dedup,
            }
        };

        let tables = vec![
            table(
                DataType::Orderbook,
                vec![
                    Column::new("last_update_id", Integer),
                    Column::new("bids", Json),
                    Column::new("asks", Json),
                ],
                &[],
                false,
            ),
            table(
                DataType::Trade,
                vec![
                    Column::new("trade_id", Text),
                    Column::new("price", Decimal),
                    Column::new("quantity", Decimal),
                    Column::new("side", Text),
                    Column::new("is_maker", Bool).with_default("false"),
                ],
                &["trade_id"],
                false,
            ),
            table(
                DataType::FundingRate,
                vec![
                    Column::new("funding_rate", Decimal),
                    Column::new("funding_time", Timestamp),
                    Column::new("next_funding_time", Timestamp),
                    Column::new("mark_price", Decimal),
                    Column::new("index_price", Decimal),
                ],
                &[],
                true,
            ),
            table(
                DataType::OpenInterest,
                vec![
                    Column::new("open_interest", Decimal),
                    Column::new("open_interest_value", Decimal),
                ],
                &[],
                true,
            ),
            table(
                DataType::Liquidation,
                vec![
                    Column::new("side", Text),
                    Column::new("price", Decimal),
                    Column::new("quantity", Decimal),
                    Column::new("order_status", Text),
                ],
                &["side", "price", "quantity"],
                false,
            ),
            table(
                DataType::LsrTopPosition,
                vec![
                    Column::new("period", Text),
                    Column::new("long_position_ratio", Decimal),
                    Column::new("short_position_ratio", Decimal),
                    Column::new("long_short_ratio", Decimal),
                ],
                &["period"],
                true,
            ),
            table(
                DataType::LsrAllAccount,
                vec![
                    Column::new("period", Text),
                    Column::new("long_account_ratio", Decimal),
                    Column::new("short_account_ratio", Decimal),
                    Column::new("long_short_ratio", Decimal),
                ],
                &["period"],
                true,
            ),
            table(
                DataType::VolatilityIndex,
                vec![
                    Column::new("index_name", Text),
                    Column::new("volatility_value", Decimal),
                ],
                &[],
                false,
            ),
        ];

        Self { tables }
    }

    /// Narrow each named table to the configured allowed-field list. Column
    /// order follows the override; natural-key columns cannot be dropped.
    pub fn with_allowed_fields(
        mut self,
        overrides: &BTreeMap<String, Vec<String>>,
    ) -> Result<Self, ConfigError> {
        for (table_name, fields) in overrides {
            let spec = self
                .tables
                .iter_mut()
                .find(|t| &t.name == table_name)
                .ok_or_else(|| ConfigError::UnknownTable(table_name.clone()))?;

            let mut columns = Vec::with_capacity(fields.len());
            for field in fields {
                let column = spec.column(field).ok_or_else(|| ConfigError::UnknownColumn {
                    table: table_name.clone(),
                    column: field.clone(),
                })?;
                columns.push(column.clone());
            }
            if let Some(missing) = spec
                .natural_key
                .iter()
                .find(|k| !fields.iter().any(|f| f == *k))
            {
                return Err(ConfigError::MissingKeyColumn {
                    table: table_name.clone(),
                    column: missing.clone(),
                });
            }
            spec.columns = columns;
        }
        Ok(self)
    }

    pub fn tables(&self) -> &[TableSpec] {
        &self.tables
    }

    pub fn for_type(&self, data_type: DataType) -> Option<&TableSpec> {
        self.tables.iter().find(|t| t.data_type == data_type)
    }

    pub fn get(&self, name: &str) -> Option<&TableSpec> {
        self.tables.iter().find(|t| t.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_one_table_per_data_type() {
        let catalog = Catalog::standard();
        assert_eq!(catalog.tables().len(), DataType::ALL.len());
        for dt in DataType::ALL {
            let spec = catalog.for_type(dt).unwrap();
            assert_eq!(spec.name, dt.table());
        }
    }

    #[test]
    fn test_natural_keys_are_columns() {
        for spec in Catalog::standard().tables() {
            for key in &spec.natural_key {
                assert!(spec.column(key).is_some(), "{}: key {} not a column", spec.name, key);
            }
            assert!(spec.column(TIMESTAMP_COLUMN).is_some());
        }
    }

    #[test]
    fn test_lsr_tables_dedup_on_period() {
        let catalog = Catalog::standard();
        let lsr = catalog.get("lsr_top_positions").unwrap();
        assert!(lsr.dedup);
        assert!(lsr.natural_key.iter().any(|k| k == "period"));
        assert!(!catalog.get("trades").unwrap().dedup);
    }

    #[test]
    fn test_defaults() {
        let catalog = Catalog::standard();
        let trades = catalog.get("trades").unwrap();
        assert_eq!(trades.column("is_maker").unwrap().default, Some("false"));
        assert_eq!(
            trades.column("data_source").unwrap().default,
            Some(DEFAULT_DATA_SOURCE)
        );
    }

    #[test]
    fn test_allowed_fields_override() {
        let overrides = BTreeMap::from([(
            "open_interest".to_string(),
            vec![
                "exchange".to_string(),
                "market_type".to_string(),
                "symbol".to_string(),
                "timestamp".to_string(),
                "open_interest".to_string(),
            ],
        )]);
        let catalog = Catalog::standard().with_allowed_fields(&overrides).unwrap();
        let names: Vec<_> = catalog.get("open_interest").unwrap().column_names().collect();
        assert_eq!(names, vec!["exchange", "market_type", "symbol", "timestamp", "open_interest"]);
    }

    #[test]
    fn test_allowed_fields_errors() {
        let unknown_table = BTreeMap::from([("candles".to_string(), vec![])]);
        assert!(matches!(
            Catalog::standard().with_allowed_fields(&unknown_table),
            Err(ConfigError::UnknownTable(_))
        ));

        let unknown_column = BTreeMap::from([("trades".to_string(), vec!["fee".to_string()])]);
        assert!(matches!(
            Catalog::standard().with_allowed_fields(&unknown_column),
            Err(ConfigError::UnknownColumn { .. })
        ));

        let drops_key = BTreeMap::from([(
            "trades".to_string(),
            vec!["exchange".to_string(), "price".to_string()],
        )]);
        assert!(matches!(
            Catalog::standard().with_allowed_fields(&drops_key),
            Err(ConfigError::MissingKeyColumn { .. })
        ));
    }
}
