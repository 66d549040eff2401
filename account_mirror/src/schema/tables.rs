//! Canonical table models mirrored from the exchange account.
//!
//! Models are declared once here and shared (`Arc`) by the collection registry,
//! the migration runner and schema validation.

use std::sync::Arc;

use indexmap::IndexMap;

use super::{ModelOptions, SchemaDefinitionError, SchemaModel, SchemaModelBuilder, SqlType};

/// Schema version the canonical models describe (`PRAGMA user_version`).
pub const SUPPORTED_DB_VERSION: u32 = 4;

/// Owning user column on every private table.
pub const USER_ID_FIELD: &str = "user_id";
/// Sub-account column on every private table.
pub const SUB_USER_ID_FIELD: &str = "subUserId";

/// `users` table.
pub const USERS: &str = "users";
/// `subAccounts` table.
pub const SUB_ACCOUNTS: &str = "subAccounts";
/// `syncRangeCheckpoints` table.
pub const SYNC_RANGE_CHECKPOINTS: &str = "syncRangeCheckpoints";
/// `ledgers` table.
pub const LEDGERS: &str = "ledgers";
/// `trades` table.
pub const TRADES: &str = "trades";
/// `fundingTrades` table.
pub const FUNDING_TRADES: &str = "fundingTrades";
/// `orders` table.
pub const ORDERS: &str = "orders";
/// `movements` table.
pub const MOVEMENTS: &str = "movements";
/// `fundingOfferHistory` table.
pub const FUNDING_OFFER_HISTORY: &str = "fundingOfferHistory";
/// `fundingLoanHistory` table.
pub const FUNDING_LOAN_HISTORY: &str = "fundingLoanHistory";
/// `fundingCreditHistory` table.
pub const FUNDING_CREDIT_HISTORY: &str = "fundingCreditHistory";
/// `positionsHistory` table.
pub const POSITIONS_HISTORY: &str = "positionsHistory";
/// `logins` table.
pub const LOGINS: &str = "logins";
/// `changeLogs` table.
pub const CHANGE_LOGS: &str = "changeLogs";
/// `publicTrades` table.
pub const PUBLIC_TRADES: &str = "publicTrades";
/// `tickersHistory` table.
pub const TICKERS_HISTORY: &str = "tickersHistory";
/// `statusMessages` table.
pub const STATUS_MESSAGES: &str = "statusMessages";
/// `candles` table.
pub const CANDLES: &str = "candles";
/// `currencies` table.
pub const CURRENCIES: &str = "currencies";

const USER_FK: &str = "CONSTRAINT #{tableName}_fk_user_id FOREIGN KEY (user_id) \
    REFERENCES users(_id) ON UPDATE CASCADE ON DELETE CASCADE";
const SUB_USER_FK: &str = "CONSTRAINT #{tableName}_fk_subUserId FOREIGN KEY (subUserId) \
    REFERENCES users(_id) ON UPDATE CASCADE ON DELETE CASCADE";
const MASTER_USER_FK: &str = "CONSTRAINT #{tableName}_fk_masterUserId FOREIGN KEY (masterUserId) \
    REFERENCES users(_id) ON UPDATE CASCADE ON DELETE CASCADE";

// Recursive triggers are off in SQLite, so the inner UPDATE does not re-fire.
const UPDATED_AT_TRIGGER: &str = "CREATE TRIGGER IF NOT EXISTS #{tableName}_updatedAt \
    AFTER UPDATE ON #{tableName} FOR EACH ROW WHEN NEW.updatedAt IS OLD.updatedAt \
    BEGIN UPDATE #{tableName} SET updatedAt = CAST((julianday('now') - 2440587.5) * 86400000 AS INTEGER) \
    WHERE _id = NEW._id; END";

const SUB_USER_PREDICATE: &str = "WHERE subUserId IS NOT NULL";

fn timestamped() -> SchemaModelBuilder {
    SchemaModel::builder().options(ModelOptions {
        with_id: true,
        with_timestamps: true,
    })
}

/// Owner columns, FKs, and the per-owner date indexes every private table carries.
fn user_scoped(b: SchemaModelBuilder, date_field: &str) -> SchemaModelBuilder {
    b.field(SUB_USER_ID_FIELD, SqlType::Integer)
        .field(USER_ID_FIELD, SqlType::IntegerNotNull)
        .constraint(USER_FK)
        .constraint(SUB_USER_FK)
        .index(&[USER_ID_FIELD, date_field])
        .index(&[USER_ID_FIELD, SUB_USER_ID_FIELD, date_field, SUB_USER_PREDICATE])
}

fn users() -> SchemaModelBuilder {
    timestamped()
        .field("id", SqlType::Bigint)
        .field("email", SqlType::VarcharNotNull)
        .field("username", SqlType::VarcharNotNull)
        .field("timezone", SqlType::Varchar)
        .field("isSubAccount", SqlType::IntegerNotNull)
        .field("isNotProtected", SqlType::Integer)
        .trigger(UPDATED_AT_TRIGGER)
        .unique_index(&["email", "username"])
}

fn sub_accounts() -> SchemaModelBuilder {
    SchemaModel::builder()
        .field("masterUserId", SqlType::IntegerNotNull)
        .field(SUB_USER_ID_FIELD, SqlType::IntegerNotNull)
        .constraint(MASTER_USER_FK)
        .constraint(SUB_USER_FK)
        .unique_index(&["masterUserId", SUB_USER_ID_FIELD])
}

fn sync_range_checkpoints() -> SchemaModelBuilder {
    timestamped()
        .field(USER_ID_FIELD, SqlType::Integer)
        .field(SUB_USER_ID_FIELD, SqlType::Integer)
        .field("collName", SqlType::VarcharNotNull)
        .field("symbol", SqlType::VarcharNotNull)
        .field("timeframe", SqlType::VarcharNotNull)
        .field("baseStartFrom", SqlType::Bigint)
        .field("baseStartTo", SqlType::Bigint)
        .field("currStart", SqlType::Bigint)
        .field("currEnd", SqlType::Bigint)
        .constraint(USER_FK)
        .constraint(SUB_USER_FK)
        .constraint(
            "CONSTRAINT #{tableName}_base_envelope CHECK \
             (baseStartFrom IS NULL OR baseStartTo IS NULL OR baseStartFrom <= baseStartTo)",
        )
        .constraint(
            "CONSTRAINT #{tableName}_curr_envelope CHECK \
             (currStart IS NULL OR currEnd IS NULL OR currStart <= currEnd)",
        )
        .trigger(UPDATED_AT_TRIGGER)
        .unique_index(&["collName", "symbol", "timeframe", "WHERE user_id IS NULL"])
        .unique_index(&[
            USER_ID_FIELD,
            "collName",
            "symbol",
            "timeframe",
            "WHERE user_id IS NOT NULL AND subUserId IS NULL",
        ])
        .unique_index(&[
            USER_ID_FIELD,
            SUB_USER_ID_FIELD,
            "collName",
            "symbol",
            "timeframe",
            SUB_USER_PREDICATE,
        ])
}

fn ledgers() -> SchemaModelBuilder {
    let b = SchemaModel::builder()
        .field("id", SqlType::Bigint)
        .field("currency", SqlType::Varchar)
        .field("mts", SqlType::Bigint)
        .field("amount", SqlType::Decimal)
        .field("amountUsd", SqlType::Decimal)
        .field("balance", SqlType::Decimal)
        .field("balanceUsd", SqlType::Decimal)
        .field("description", SqlType::Text)
        .field("wallet", SqlType::Varchar)
        .index(&[USER_ID_FIELD, "wallet", "currency", "mts"])
        .index(&[USER_ID_FIELD, "currency", "mts"])
        .unique_index(&["id", USER_ID_FIELD]);
    user_scoped(b, "mts")
}

fn trades() -> SchemaModelBuilder {
    let b = SchemaModel::builder()
        .field("id", SqlType::Bigint)
        .field("symbol", SqlType::Varchar)
        .field("mtsCreate", SqlType::Bigint)
        .field("orderID", SqlType::Bigint)
        .field("execAmount", SqlType::Decimal)
        .field("execPrice", SqlType::Decimal)
        .field("orderType", SqlType::Varchar)
        .field("orderPrice", SqlType::Decimal)
        .field("maker", SqlType::Integer)
        .field("fee", SqlType::Decimal)
        .field("feeCurrency", SqlType::Varchar)
        .index(&[USER_ID_FIELD, "symbol", "mtsCreate"])
        .index(&[USER_ID_FIELD, "orderID"])
        .unique_index(&["id", "symbol", USER_ID_FIELD]);
    user_scoped(b, "mtsCreate")
}

fn funding_trades() -> SchemaModelBuilder {
    let b = SchemaModel::builder()
        .field("id", SqlType::Bigint)
        .field("symbol", SqlType::Varchar)
        .field("mtsCreate", SqlType::Bigint)
        .field("offerID", SqlType::Bigint)
        .field("amount", SqlType::Decimal)
        .field("rate", SqlType::Decimal)
        .field("period", SqlType::Bigint)
        .field("maker", SqlType::Integer)
        .index(&[USER_ID_FIELD, "symbol", "mtsCreate"])
        .unique_index(&["id", USER_ID_FIELD]);
    user_scoped(b, "mtsCreate")
}

fn orders() -> SchemaModelBuilder {
    let b = SchemaModel::builder()
        .field("id", SqlType::Bigint)
        .field("gid", SqlType::Bigint)
        .field("cid", SqlType::Bigint)
        .field("symbol", SqlType::Varchar)
        .field("mtsCreate", SqlType::Bigint)
        .field("mtsUpdate", SqlType::Bigint)
        .field("amount", SqlType::Decimal)
        .field("amountOrig", SqlType::Decimal)
        .field("amountExecuted", SqlType::Decimal)
        .field("type", SqlType::Varchar)
        .field("typePrev", SqlType::Varchar)
        .field("flags", SqlType::Integer)
        .field("status", SqlType::Text)
        .field("price", SqlType::Decimal)
        .field("priceAvg", SqlType::Decimal)
        .field("priceTrailing", SqlType::Decimal)
        .field("priceAuxLimit", SqlType::Decimal)
        .field("notify", SqlType::Integer)
        .field("placedId", SqlType::Bigint)
        .index(&[USER_ID_FIELD, "symbol", "mtsUpdate"])
        .index(&[USER_ID_FIELD, "type", "mtsUpdate"])
        .unique_index(&["id", USER_ID_FIELD]);
    user_scoped(b, "mtsUpdate")
}

fn movements() -> SchemaModelBuilder {
    let b = SchemaModel::builder()
        .field("id", SqlType::Bigint)
        .field("currency", SqlType::Varchar)
        .field("currencyName", SqlType::Varchar)
        .field("mtsStarted", SqlType::Bigint)
        .field("mtsUpdated", SqlType::Bigint)
        .field("status", SqlType::Varchar)
        .field("amount", SqlType::Decimal)
        .field("fees", SqlType::Decimal)
        .field("destinationAddress", SqlType::Varchar)
        .field("transactionId", SqlType::Varchar)
        .field("note", SqlType::Text)
        .index(&[USER_ID_FIELD, "currency", "mtsUpdated"])
        .unique_index(&["id", USER_ID_FIELD]);
    user_scoped(b, "mtsUpdated")
}

fn funding_offer_history() -> SchemaModelBuilder {
    let b = SchemaModel::builder()
        .field("id", SqlType::Bigint)
        .field("symbol", SqlType::Varchar)
        .field("mtsCreate", SqlType::Bigint)
        .field("mtsUpdate", SqlType::Bigint)
        .field("amount", SqlType::Decimal)
        .field("amountOrig", SqlType::Decimal)
        .field("type", SqlType::Varchar)
        .field("flags", SqlType::Text)
        .field("status", SqlType::Text)
        .field("rate", SqlType::Decimal)
        .field("period", SqlType::Integer)
        .field("notify", SqlType::Integer)
        .field("hidden", SqlType::Integer)
        .field("renew", SqlType::Integer)
        .field("rateReal", SqlType::Decimal)
        .index(&[USER_ID_FIELD, "symbol", "mtsUpdate"])
        .unique_index(&["id", USER_ID_FIELD]);
    user_scoped(b, "mtsUpdate")
}

/// Loan and credit history share their contract columns.
fn funding_contract() -> SchemaModelBuilder {
    SchemaModel::builder()
        .field("id", SqlType::Bigint)
        .field("symbol", SqlType::Varchar)
        .field("side", SqlType::Integer)
        .field("mtsCreate", SqlType::Bigint)
        .field("mtsUpdate", SqlType::Bigint)
        .field("amount", SqlType::Decimal)
        .field("flags", SqlType::Text)
        .field("status", SqlType::Text)
        .field("rate", SqlType::Decimal)
        .field("period", SqlType::Integer)
        .field("mtsOpening", SqlType::Bigint)
        .field("mtsLastPayout", SqlType::Bigint)
        .field("notify", SqlType::Integer)
        .field("hidden", SqlType::Integer)
        .field("renew", SqlType::Integer)
        .field("rateReal", SqlType::Decimal)
        .field("noClose", SqlType::Integer)
        .index(&[USER_ID_FIELD, "symbol", "mtsUpdate"])
        .unique_index(&["id", USER_ID_FIELD])
}

fn funding_loan_history() -> SchemaModelBuilder {
    user_scoped(funding_contract(), "mtsUpdate")
}

fn funding_credit_history() -> SchemaModelBuilder {
    user_scoped(funding_contract().field("positionPair", SqlType::Varchar), "mtsUpdate")
}

fn positions_history() -> SchemaModelBuilder {
    let b = SchemaModel::builder()
        .field("id", SqlType::Bigint)
        .field("symbol", SqlType::Varchar)
        .field("status", SqlType::Varchar)
        .field("amount", SqlType::Decimal)
        .field("basePrice", SqlType::Decimal)
        .field("closePrice", SqlType::Decimal)
        .field("marginFunding", SqlType::Decimal)
        .field("marginFundingType", SqlType::Integer)
        .field("pl", SqlType::Decimal)
        .field("plPerc", SqlType::Decimal)
        .field("liquidationPrice", SqlType::Decimal)
        .field("leverage", SqlType::Decimal)
        .field("mtsCreate", SqlType::Bigint)
        .field("mtsUpdate", SqlType::Bigint)
        .index(&[USER_ID_FIELD, "symbol", "mtsUpdate"])
        .unique_index(&["id", USER_ID_FIELD]);
    user_scoped(b, "mtsUpdate")
}

fn logins() -> SchemaModelBuilder {
    let b = SchemaModel::builder()
        .field("id", SqlType::Bigint)
        .field("time", SqlType::Bigint)
        .field("ip", SqlType::Varchar)
        .field("extraData", SqlType::Text)
        .unique_index(&["id", USER_ID_FIELD]);
    user_scoped(b, "time")
}

fn change_logs() -> SchemaModelBuilder {
    let b = SchemaModel::builder()
        .field("mtsCreate", SqlType::Bigint)
        .field("log", SqlType::Varchar)
        .field("ip", SqlType::Varchar)
        .field("userAgent", SqlType::Text)
        .unique_index(&["mtsCreate", "log", USER_ID_FIELD]);
    user_scoped(b, "mtsCreate")
}

fn public_trades() -> SchemaModelBuilder {
    SchemaModel::builder()
        .field("id", SqlType::Bigint)
        .field("mts", SqlType::Bigint)
        .field("rate", SqlType::Decimal)
        .field("period", SqlType::Bigint)
        .field("amount", SqlType::Decimal)
        .field("price", SqlType::Decimal)
        .field("_symbol", SqlType::Varchar)
        .index(&["_symbol", "mts"])
        .unique_index(&["id", "_symbol"])
}

fn tickers_history() -> SchemaModelBuilder {
    SchemaModel::builder()
        .field("symbol", SqlType::Varchar)
        .field("bid", SqlType::Decimal)
        .field("bidPeriod", SqlType::Integer)
        .field("ask", SqlType::Decimal)
        .field("mtsUpdate", SqlType::Bigint)
        .unique_index(&["symbol", "mtsUpdate"])
}

fn status_messages() -> SchemaModelBuilder {
    SchemaModel::builder()
        .field("key", SqlType::Varchar)
        .field("timestamp", SqlType::Bigint)
        .field("price", SqlType::Decimal)
        .field("priceSpot", SqlType::Decimal)
        .field("fundBal", SqlType::Decimal)
        .field("fundingAccrued", SqlType::Decimal)
        .field("fundingStep", SqlType::Decimal)
        .field("nextFundingEvtTimestampMs", SqlType::Bigint)
        .field("nextFundingAccrued", SqlType::Decimal)
        .field("nextFundingStep", SqlType::Decimal)
        .field("currentFunding", SqlType::Decimal)
        .field("markPrice", SqlType::Decimal)
        .field("openInterest", SqlType::Decimal)
        .field("clampMin", SqlType::Decimal)
        .field("clampMax", SqlType::Decimal)
        .field("_type", SqlType::Varchar)
        .index(&["_type", "timestamp"])
        .unique_index(&["key", "_type"])
}

fn candles() -> SchemaModelBuilder {
    SchemaModel::builder()
        .field("mts", SqlType::Bigint)
        .field("open", SqlType::Decimal)
        .field("close", SqlType::Decimal)
        .field("high", SqlType::Decimal)
        .field("low", SqlType::Decimal)
        .field("volume", SqlType::Decimal)
        .field("_symbol", SqlType::Varchar)
        .field("_timeframe", SqlType::Varchar)
        .index(&["_timeframe", "mts"])
        .unique_index(&["_symbol", "_timeframe", "mts"])
}

fn currencies() -> SchemaModelBuilder {
    SchemaModel::builder()
        .field("id", SqlType::VarcharNotNull)
        .field("name", SqlType::Varchar)
        .field("pool", SqlType::Varchar)
        .field("explorer", SqlType::Text)
        .field("symbol", SqlType::Varchar)
        .field("walletFx", SqlType::Text)
        .unique_index(&["id"])
}

/// Every canonical table in creation order (referenced tables first).
pub fn canonical_models() -> Result<IndexMap<&'static str, Arc<SchemaModel>>, SchemaDefinitionError> {
    let builders = vec![
        (USERS, users()),
        (SUB_ACCOUNTS, sub_accounts()),
        (SYNC_RANGE_CHECKPOINTS, sync_range_checkpoints()),
        (LEDGERS, ledgers()),
        (TRADES, trades()),
        (FUNDING_TRADES, funding_trades()),
        (ORDERS, orders()),
        (MOVEMENTS, movements()),
        (FUNDING_OFFER_HISTORY, funding_offer_history()),
        (FUNDING_LOAN_HISTORY, funding_loan_history()),
        (FUNDING_CREDIT_HISTORY, funding_credit_history()),
        (POSITIONS_HISTORY, positions_history()),
        (LOGINS, logins()),
        (CHANGE_LOGS, change_logs()),
        (PUBLIC_TRADES, public_trades()),
        (TICKERS_HISTORY, tickers_history()),
        (STATUS_MESSAGES, status_messages()),
        (CANDLES, candles()),
        (CURRENCIES, currencies()),
    ];

    let mut out = IndexMap::with_capacity(builders.len());
    for (name, builder) in builders {
        out.insert(name, Arc::new(builder.build()?));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_models_build() {
        let models = canonical_models().unwrap();
        assert_eq!(models.len(), 19);
        assert_eq!(models.get_index(0).map(|(n, _)| *n), Some(USERS));
        for (name, model) in &models {
            assert_eq!(model.primary_key(), Some("_id"), "{name}");
        }
    }

    #[test]
    fn private_tables_are_user_scoped_and_public_ones_are_not() {
        let models = canonical_models().unwrap();
        for name in [LEDGERS, TRADES, ORDERS, POSITIONS_HISTORY, LOGINS, CHANGE_LOGS] {
            let m = &models[name];
            assert!(m.has_field(USER_ID_FIELD), "{name}");
            assert_eq!(m.constraints().len(), 2, "{name}");
        }
        for name in [PUBLIC_TRADES, TICKERS_HISTORY, STATUS_MESSAGES, CANDLES, CURRENCIES] {
            assert!(!models[name].has_field(USER_ID_FIELD), "{name}");
        }
    }

    #[test]
    fn checkpoint_table_carries_scoped_unique_indexes() {
        let models = canonical_models().unwrap();
        let m = &models[SYNC_RANGE_CHECKPOINTS];
        assert_eq!(m.unique_indexes().len(), 3);
        assert!(m.unique_indexes().iter().all(|i| i.predicate().is_some()));
        assert_eq!(m.triggers().len(), 1);
    }

    #[test]
    fn checkpoint_table_ddl() {
        let models = canonical_models().unwrap();
        let statements =
            crate::schema::ddl::create_table_statements(SYNC_RANGE_CHECKPOINTS, &models[SYNC_RANGE_CHECKPOINTS]).unwrap();
        insta::assert_snapshot!("sync_range_checkpoints_ddl", statements.join("\n"));
    }
}
