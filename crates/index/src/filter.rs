use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{IndexError, StoredRecord};

/// String fields a filter may test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterField {
    TenantId,
    Text,
}

impl FilterField {
    pub fn name(&self) -> &'static str {
        match self {
            FilterField::TenantId => "tenant_id",
            FilterField::Text => "text",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name {
            "tenant_id" | "user_id" => Some(FilterField::TenantId),
            "text" => Some(FilterField::Text),
            _ => None,
        }
    }
}

/// Single-equality predicate: `field == "value"`.
///
/// ```
/// use index::{Filter, FilterField};
///
/// let filter = Filter::parse(r#"tenant_id == "acme""#).unwrap();
/// assert_eq!(filter, Filter::tenant("acme"));
/// assert_eq!(filter.to_string(), r#"tenant_id == "acme""#);
/// assert!(Filter::parse("owner == \"x\"").is_err());
/// # let _ = FilterField::Text;
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Filter {
    Eq { field: FilterField, value: String },
}

impl Filter {
    pub fn eq(field: FilterField, value: impl Into<String>) -> Self {
        Filter::Eq {
            field,
            value: value.into(),
        }
    }

    pub fn tenant(tenant_id: impl Into<String>) -> Self {
        Self::eq(FilterField::TenantId, tenant_id)
    }

    pub fn parse(expr: &str) -> Result<Self, IndexError> {
        let (lhs, rhs) = expr
            .split_once("==")
            .ok_or_else(|| IndexError::Filter(format!("expected `field == \"value\"`, got `{expr}`")))?;

        let name = lhs.trim();
        let field = FilterField::from_name(name)
            .ok_or_else(|| IndexError::Filter(format!("unknown filter field `{name}`")))?;

        let quoted = rhs.trim();
        let inner = quoted
            .strip_prefix('"')
            .and_then(|s| s.strip_suffix('"'))
            .filter(|_| quoted.len() >= 2)
            .ok_or_else(|| IndexError::Filter(format!("value must be double-quoted: `{quoted}`")))?;

        Ok(Self::eq(field, unescape(inner)?))
    }

    /// Exact string equality. A tenant filter never matches an untenanted record.
    pub fn matches(&self, record: &StoredRecord) -> bool {
        match self {
            Filter::Eq { field, value } => match field {
                FilterField::TenantId => record.tenant_id.as_deref() == Some(value.as_str()),
                FilterField::Text => record.text == *value,
            },
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Filter::Eq { field, value } => {
                write!(f, "{} == \"", field.name())?;
                for c in value.chars() {
                    if c == '"' || c == '\\' {
                        write!(f, "\\")?;
                    }
                    write!(f, "{c}")?;
                }
                write!(f, "\"")
            }
        }
    }
}

impl FromStr for Filter {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Filter::parse(s)
    }
}

fn unescape(inner: &str) -> Result<String, IndexError> {
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => match chars.next() {
                Some(escaped @ ('"' | '\\')) => out.push(escaped),
                Some(other) => {
                    return Err(IndexError::Filter(format!("unsupported escape `\\{other}`")))
                }
                None => return Err(IndexError::Filter("unterminated string value".into())),
            },
            '"' => return Err(IndexError::Filter("unescaped quote inside value".into())),
            c => out.push(c),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SparseVector, INDEX_SCHEMA_VERSION};

    fn stored(text: &str, tenant: Option<&str>) -> StoredRecord {
        StoredRecord {
            schema_version: INDEX_SCHEMA_VERSION,
            id: "id".into(),
            seq: 0,
            text: text.into(),
            tenant_id: tenant.map(str::to_string),
            sparse_vector: SparseVector::new(),
            dense_vector: vec![],
        }
    }

    #[test]
    fn parses_with_loose_whitespace_and_alias() {
        assert_eq!(Filter::parse("  user_id==\"U1\" ").unwrap(), Filter::tenant("U1"));
        assert_eq!(
            "text == \"a == b\"".parse::<Filter>().unwrap(),
            Filter::eq(FilterField::Text, "a == b")
        );
    }

    #[test]
    fn display_round_trips_escapes() {
        let filter = Filter::tenant(r#"we "quote" \ things"#);
        let rendered = filter.to_string();
        assert_eq!(rendered, r#"tenant_id == "we \"quote\" \\ things""#);
        assert_eq!(Filter::parse(&rendered).unwrap(), filter);
    }

    #[test]
    fn malformed_expressions_are_rejected() {
        for bad in [
            "tenant_id = \"a\"",
            "tenant_id == a",
            "tenant_id == \"",
            "tenant_id == \"a\\\"",
            "tenant_id == \"a\"b\"",
            "tenant_id == \"\\n\"",
            "owner == \"a\"",
        ] {
            assert!(
                matches!(Filter::parse(bad), Err(IndexError::Filter(_))),
                "accepted {bad:?}"
            );
        }
    }

    #[test]
    fn tenant_match_is_exact() {
        let filter = Filter::tenant("A");
        assert!(filter.matches(&stored("x", Some("A"))));
        assert!(!filter.matches(&stored("x", Some("a"))));
        assert!(!filter.matches(&stored("x", Some("AB"))));
        assert!(!filter.matches(&stored("x", None)));
        assert!(Filter::tenant("").matches(&stored("x", Some(""))));
    }

    #[test]
    fn empty_value_parses() {
        assert_eq!(Filter::parse("tenant_id == \"\"").unwrap(), Filter::tenant(""));
    }
}
