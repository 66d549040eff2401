//! The fixed set of primitive column types a [`SchemaModel`](super::SchemaModel) may declare.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

/// Column type of a true data field.
///
/// Only these exact type strings are accepted when a model is defined from raw
/// (string) input; anything else is a [`SchemaDefinitionError::UnknownType`](super::SchemaDefinitionError::UnknownType).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum SqlType {
    /// `INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT`
    IdPrimaryKey,
    /// `INTEGER PRIMARY KEY AUTOINCREMENT`
    IntegerPrimaryKey,
    /// `INTEGER`
    Integer,
    /// `INTEGER NOT NULL`
    IntegerNotNull,
    /// `BIGINT`
    Bigint,
    /// `BIGINT NOT NULL`
    BigintNotNull,
    /// `DECIMAL(22,12)`
    Decimal,
    /// `DECIMAL(22,12) NOT NULL`
    DecimalNotNull,
    /// `VARCHAR(255)`
    Varchar,
    /// `VARCHAR(255) NOT NULL`
    VarcharNotNull,
    /// `TEXT`
    Text,
    /// `TEXT NOT NULL`
    TextNotNull,
}

impl SqlType {
    /// Every accepted type, in declaration order.
    pub const ALL: [SqlType; 12] = [
        SqlType::IdPrimaryKey,
        SqlType::IntegerPrimaryKey,
        SqlType::Integer,
        SqlType::IntegerNotNull,
        SqlType::Bigint,
        SqlType::BigintNotNull,
        SqlType::Decimal,
        SqlType::DecimalNotNull,
        SqlType::Varchar,
        SqlType::VarcharNotNull,
        SqlType::Text,
        SqlType::TextNotNull,
    ];

    /// DDL spelling of the type.
    pub const fn as_sql(self) -> &'static str {
        match self {
            SqlType::IdPrimaryKey => "INTEGER NOT NULL PRIMARY KEY AUTOINCREMENT",
            SqlType::IntegerPrimaryKey => "INTEGER PRIMARY KEY AUTOINCREMENT",
            SqlType::Integer => "INTEGER",
            SqlType::IntegerNotNull => "INTEGER NOT NULL",
            SqlType::Bigint => "BIGINT",
            SqlType::BigintNotNull => "BIGINT NOT NULL",
            SqlType::Decimal => "DECIMAL(22,12)",
            SqlType::DecimalNotNull => "DECIMAL(22,12) NOT NULL",
            SqlType::Varchar => "VARCHAR(255)",
            SqlType::VarcharNotNull => "VARCHAR(255) NOT NULL",
            SqlType::Text => "TEXT",
            SqlType::TextNotNull => "TEXT NOT NULL",
        }
    }

    /// True for the two auto-increment primary key spellings.
    pub const fn is_primary_key(self) -> bool {
        matches!(self, SqlType::IdPrimaryKey | SqlType::IntegerPrimaryKey)
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Raised by [`SqlType::from_str`] for strings outside the fixed set.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized SQL type: {0:?}")]
pub struct UnknownSqlType(pub String);

impl FromStr for SqlType {
    type Err = UnknownSqlType;

    /// Case-insensitive, whitespace-tolerant (`"bigint  not null"` parses).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let norm = s
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
            .to_uppercase();
        SqlType::ALL
            .into_iter()
            .find(|t| t.as_sql() == norm)
            .ok_or_else(|| UnknownSqlType(s.to_string()))
    }
}

impl TryFrom<String> for SqlType {
    type Error = UnknownSqlType;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<SqlType> for String {
    fn from(value: SqlType) -> Self {
        value.as_sql().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_every_spelling_back() {
        for t in SqlType::ALL {
            assert_eq!(t.as_sql().parse::<SqlType>().unwrap(), t);
        }
    }

    #[test]
    fn parse_is_whitespace_and_case_tolerant() {
        assert_eq!(
            " bigint   not null ".parse::<SqlType>().unwrap(),
            SqlType::BigintNotNull
        );
        assert_eq!("decimal(22,12)".parse::<SqlType>().unwrap(), SqlType::Decimal);
    }

    #[test]
    fn rejects_unknown_types() {
        assert!("BLOB".parse::<SqlType>().is_err());
        assert!("VARCHAR(10)".parse::<SqlType>().is_err());
        assert!("".parse::<SqlType>().is_err());
    }
}
