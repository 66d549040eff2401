//! The mirrored account collections.

use crate::schema::tables::{self, canonical_models};

use super::{CollectionDescriptor, CollectionSchemaRegistry, SortDirection, stringify_field};

/// Start-date override key for public trades.
pub const PUBLIC_TRADES_CONF: &str = "publicTradesConf";
/// Start-date override key for ticker history.
pub const TICKERS_HISTORY_CONF: &str = "tickersHistoryConf";
/// Start-date override key for status messages.
pub const STATUS_MESSAGES_CONF: &str = "statusMessagesConf";
/// Start-date override key for candles.
pub const CANDLES_CONF: &str = "candlesConf";

/// Registry over the canonical models.
///
/// Fails when a canonical model or descriptor is malformed; callers treat that
/// as fatal at startup.
pub fn default_registry() -> anyhow::Result<CollectionSchemaRegistry> {
    let models = canonical_models()?;
    let m = |name: &str| -> anyhow::Result<_> {
        models
            .get(name)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no canonical model for {name}"))
    };

    let descriptors = vec![
        CollectionDescriptor::new(tables::LEDGERS, "getLedgers", m(tables::LEDGERS)?, 2500)
            .dated("mts")
            .symbol_field("currency"),
        CollectionDescriptor::new(tables::TRADES, "getTrades", m(tables::TRADES)?, 2500)
            .dated("mtsCreate")
            .symbol_field("symbol"),
        CollectionDescriptor::new(tables::FUNDING_TRADES, "getFundingTrades", m(tables::FUNDING_TRADES)?, 1000)
            .dated("mtsCreate")
            .symbol_field("symbol"),
        CollectionDescriptor::new(tables::ORDERS, "getOrders", m(tables::ORDERS)?, 2500)
            .dated("mtsUpdate")
            .symbol_field("symbol"),
        CollectionDescriptor::new(tables::MOVEMENTS, "getMovements", m(tables::MOVEMENTS)?, 25)
            .dated("mtsUpdated")
            .symbol_field("currency"),
        CollectionDescriptor::new(
            tables::FUNDING_OFFER_HISTORY,
            "getFundingOfferHistory",
            m(tables::FUNDING_OFFER_HISTORY)?,
            500,
        )
        .dated("mtsUpdate")
        .symbol_field("symbol"),
        CollectionDescriptor::new(
            tables::FUNDING_LOAN_HISTORY,
            "getFundingLoanHistory",
            m(tables::FUNDING_LOAN_HISTORY)?,
            500,
        )
        .dated("mtsUpdate")
        .symbol_field("symbol"),
        CollectionDescriptor::new(
            tables::FUNDING_CREDIT_HISTORY,
            "getFundingCreditHistory",
            m(tables::FUNDING_CREDIT_HISTORY)?,
            500,
        )
        .dated("mtsUpdate")
        .symbol_field("symbol"),
        CollectionDescriptor::new(
            tables::POSITIONS_HISTORY,
            "getPositionsHistory",
            m(tables::POSITIONS_HISTORY)?,
            500,
        )
        .dated("mtsUpdate")
        .symbol_field("symbol")
        .updatable(),
        CollectionDescriptor::new(tables::LOGINS, "getLogins", m(tables::LOGINS)?, 250)
            .dated("time")
            .row_transformer(stringify_field("extraData")),
        CollectionDescriptor::new(tables::CHANGE_LOGS, "getChangeLogs", m(tables::CHANGE_LOGS)?, 500)
            .dated("mtsCreate"),
        CollectionDescriptor::new(tables::PUBLIC_TRADES, "getPublicTrades", m(tables::PUBLIC_TRADES)?, 5000)
            .dated("mts")
            .symbol_field("_symbol")
            .conf_name(PUBLIC_TRADES_CONF)
            .public(),
        CollectionDescriptor::new(
            tables::TICKERS_HISTORY,
            "getTickersHistory",
            m(tables::TICKERS_HISTORY)?,
            250,
        )
        .dated("mtsUpdate")
        .symbol_field("symbol")
        .conf_name(TICKERS_HISTORY_CONF)
        .public(),
        CollectionDescriptor::new(
            tables::STATUS_MESSAGES,
            "getStatusMessages",
            m(tables::STATUS_MESSAGES)?,
            5000,
        )
        .dated("timestamp")
        .symbol_field("key")
        .conf_name(STATUS_MESSAGES_CONF)
        .updatable()
        .public(),
        CollectionDescriptor::new(tables::CANDLES, "getCandles", m(tables::CANDLES)?, 10000)
            .dated("mts")
            .symbol_field("_symbol")
            .timeframe_field("_timeframe")
            .conf_name(CANDLES_CONF)
            .public(),
        CollectionDescriptor::new(tables::CURRENCIES, "getCurrencies", m(tables::CURRENCIES)?, 1000)
            .sort(&[("id", SortDirection::Asc)])
            .updatable()
            .sync_required_at_least_once()
            .public(),
        CollectionDescriptor::new("wallets", "getWallets", m(tables::LEDGERS)?, 0)
            .dated("mts")
            .symbol_field("currency")
            .hidden_from(tables::LEDGERS),
    ];

    Ok(CollectionSchemaRegistry::new(descriptors)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collections::{Mutability, Visibility, filter_by_visibility_and_freshness};

    #[test]
    fn default_registry_is_valid() {
        let r = default_registry().unwrap();
        assert_eq!(r.len(), 17);

        let candles = r.get(tables::CANDLES).unwrap();
        assert_eq!(candles.timeframe_field_name.as_deref(), Some("_timeframe"));
        assert_eq!(candles.conf_name.as_deref(), Some(CANDLES_CONF));

        assert_eq!(r.get(tables::POSITIONS_HISTORY).unwrap().mutability, Mutability::Updatable);
        assert!(r.get(tables::CURRENCIES).unwrap().date_field_name.is_none());
        assert_eq!(r.get("wallets").unwrap().visibility, Visibility::Hidden);
    }

    #[test]
    fn every_physical_table_except_service_ones_is_a_collection() {
        let r = default_registry().unwrap();
        let collection_tables: Vec<&str> = r.table_models().map(|(n, _)| n).collect();
        let service = [tables::USERS, tables::SUB_ACCOUNTS, tables::SYNC_RANGE_CHECKPOINTS];
        for (name, _) in canonical_models().unwrap() {
            assert_eq!(collection_tables.contains(&name), !service.contains(&name), "{name}");
        }
    }

    #[test]
    fn fresh_private_collections_exclude_hidden_views() {
        let r = default_registry().unwrap();
        let mut map = r.cloned_descriptor_map(&[]);
        for d in map.values_mut() {
            d.has_new_data = true;
        }
        let private = filter_by_visibility_and_freshness(&map, false);
        assert_eq!(private.len(), 11);
        assert!(private.iter().all(|d| d.name != "wallets"));
        assert_eq!(filter_by_visibility_and_freshness(&map, true).len(), 5);
    }
}
