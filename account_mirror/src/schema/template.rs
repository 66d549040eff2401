//! DDL fragments with `#{name}` placeholders.
//!
//! Constraint and trigger bodies are authored once and rendered per physical
//! table, so the same text serves both the create and the rebuild paths.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::TemplateError;

/// Placeholder substituted with the physical table name.
pub const TABLE_NAME_PARAM: &str = "tableName";

const OPEN: &str = "#{";
const CLOSE: char = '}';

/// A parameterized SQL fragment.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SqlTemplate(String);

impl SqlTemplate {
    /// Parse a template, checking every placeholder is closed and named.
    pub fn parse(raw: impl Into<String>) -> Result<Self, TemplateError> {
        let raw = raw.into();
        if raw.trim().is_empty() {
            return Err(TemplateError::Empty);
        }
        // walk once to surface malformed placeholders early
        placeholders(&raw)?;
        Ok(Self(raw))
    }

    /// Raw template text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Names of all placeholders in order of appearance.
    pub fn params(&self) -> Vec<&str> {
        // parse() already validated the text
        placeholders(&self.0).unwrap_or_default()
    }

    /// Substitute every placeholder using `lookup`.
    pub fn render_with<'a>(
        &self,
        lookup: impl Fn(&str) -> Option<&'a str>,
    ) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(self.0.len());
        let mut rest = self.0.as_str();
        while let Some(pos) = rest.find(OPEN) {
            out.push_str(&rest[..pos]);
            let after = &rest[pos + OPEN.len()..];
            let end = after
                .find(CLOSE)
                .ok_or_else(|| TemplateError::Unclosed(self.0.clone()))?;
            let name = &after[..end];
            let value = lookup(name).ok_or_else(|| TemplateError::UnknownParam {
                param: name.to_string(),
                template: self.0.clone(),
            })?;
            out.push_str(value);
            rest = &after[end + 1..];
        }
        out.push_str(rest);
        Ok(out)
    }

    /// Substitute `#{tableName}`.
    pub fn render_for_table(&self, table_name: &str) -> Result<String, TemplateError> {
        self.render_with(|name| (name == TABLE_NAME_PARAM).then_some(table_name))
    }
}

impl fmt::Display for SqlTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn placeholders(raw: &str) -> Result<Vec<&str>, TemplateError> {
    let mut out = Vec::new();
    let mut rest = raw;
    while let Some(pos) = rest.find(OPEN) {
        let after = &rest[pos + OPEN.len()..];
        let end = after
            .find(CLOSE)
            .ok_or_else(|| TemplateError::Unclosed(raw.to_string()))?;
        let name = &after[..end];
        let valid = !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(TemplateError::BadParamName {
                param: name.to_string(),
                template: raw.to_string(),
            });
        }
        out.push(name);
        rest = &after[end + 1..];
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_table_name_everywhere() {
        let t = SqlTemplate::parse(
            "CONSTRAINT #{tableName}_fk_user_id FOREIGN KEY (user_id) REFERENCES users(_id)",
        )
        .unwrap();
        assert_eq!(t.params(), vec!["tableName"]);
        assert_eq!(
            t.render_for_table("ledgers").unwrap(),
            "CONSTRAINT ledgers_fk_user_id FOREIGN KEY (user_id) REFERENCES users(_id)"
        );
    }

    #[test]
    fn text_without_placeholders_is_unchanged() {
        let t = SqlTemplate::parse("CHECK (amount >= 0)").unwrap();
        assert_eq!(t.render_for_table("x").unwrap(), "CHECK (amount >= 0)");
    }

    #[test]
    fn unknown_param_fails_to_render() {
        let t = SqlTemplate::parse("#{tableName}_#{other}").unwrap();
        let err = t.render_for_table("t").unwrap_err();
        assert!(matches!(err, TemplateError::UnknownParam { ref param, .. } if param == "other"));
    }

    #[test]
    fn malformed_templates_are_rejected() {
        assert!(matches!(SqlTemplate::parse("#{tableName"), Err(TemplateError::Unclosed(_))));
        assert!(matches!(
            SqlTemplate::parse("#{table name}"),
            Err(TemplateError::BadParamName { .. })
        ));
        assert!(matches!(SqlTemplate::parse("  "), Err(TemplateError::Empty)));
    }
}
