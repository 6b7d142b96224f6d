//! Input guard for everything that ends up in SQL text.
//!
//! Database and table names cannot be bound as parameters, so they are only
//! allowed into statement text as [`Identifier`] values, which exist solely
//! after passing the allow-list check. Paging values are coerced into
//! integers here and later bound by the driver. Caller-authored queries must
//! pass the read-only prefix check to become a [`ReadOnlyQuery`].
//!
//! The read-only check is a prefix test on the trimmed, lowercased text. It
//! does not parse SQL: a `SELECT` that smuggles a write through a function
//! call, comment tricks or driver-level multi statements is not caught here.

use std::fmt;

use thiserror::Error;

/// MySQL rejects identifiers longer than this.
pub const MAX_IDENTIFIER_LEN: usize = 64;

pub const DEFAULT_PAGE_LIMIT: u64 = 100;
pub const DEFAULT_PAGE_OFFSET: u64 = 0;

/// Validation failures. Nothing has been sent to the database when one of
/// these is returned.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum GuardError {
    #[error("invalid identifier '{0}': only letters, digits, '_' and '$' are allowed (1-64 characters)")]
    InvalidIdentifier(String),
    #[error("query is required")]
    EmptyQuery,
    #[error("only SELECT queries are allowed")]
    NotReadOnly,
}

/// A database or table name that passed the allow-list.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identifier(String);

impl Identifier {
    pub fn parse(raw: &str) -> Result<Self, GuardError> {
        let valid = !raw.is_empty()
            && raw.len() <= MAX_IDENTIFIER_LEN
            && raw
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'$');
        if valid {
            Ok(Self(raw.to_owned()))
        } else {
            Err(GuardError::InvalidIdentifier(raw.to_owned()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Backtick-quoted form for statement text. The allow-list already
    /// excludes backticks; doubling them keeps the quoting correct anyway.
    pub fn quoted(&self) -> String {
        format!("`{}`", self.0.replace('`', "``"))
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Table locator. Without a database the connection's default schema is used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRef {
    pub database: Option<Identifier>,
    pub table: Identifier,
}

impl TableRef {
    /// Validates both parts of a locator taken straight from a request path.
    pub fn parse(database: Option<&str>, table: &str) -> Result<Self, GuardError> {
        let database = database.map(Identifier::parse).transpose()?;
        let table = Identifier::parse(table)?;
        Ok(Self { database, table })
    }

    pub fn qualified(&self) -> String {
        match &self.database {
            Some(database) => format!("{}.{}", database.quoted(), self.table.quoted()),
            None => self.table.quoted(),
        }
    }
}

/// Effective paging window, always bound as integer parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub limit: u64,
    pub offset: u64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            limit: DEFAULT_PAGE_LIMIT,
            offset: DEFAULT_PAGE_OFFSET,
        }
    }
}

impl Page {
    /// Coerces raw query-string values. Missing or non-numeric input falls
    /// back to the defaults, fractions truncate and negatives clamp to zero.
    pub fn from_raw(limit: Option<&str>, offset: Option<&str>) -> Self {
        Self {
            limit: coerce_count(limit, DEFAULT_PAGE_LIMIT),
            offset: coerce_count(offset, DEFAULT_PAGE_OFFSET),
        }
    }
}

/// Integer parse in the style of a leading-digits scan: `"12abc"` is 12,
/// `"3.9"` is 3, `"-4"` clamps to 0 and values past `u64::MAX` saturate.
pub fn coerce_count(raw: Option<&str>, default: u64) -> u64 {
    let Some(raw) = raw else {
        return default;
    };
    let trimmed = raw.trim();
    let (negative, digits) = match trimmed.as_bytes().first() {
        Some(b'-') => (true, &trimmed[1..]),
        Some(b'+') => (false, &trimmed[1..]),
        _ => (false, trimmed),
    };

    let mut value: u64 = 0;
    let mut seen_digit = false;
    for byte in digits.bytes() {
        if !byte.is_ascii_digit() {
            break;
        }
        seen_digit = true;
        value = value
            .saturating_mul(10)
            .saturating_add(u64::from(byte - b'0'));
    }

    if !seen_digit {
        default
    } else if negative {
        0
    } else {
        value
    }
}

/// Caller-authored statement that passed the read-only check. The text is
/// kept exactly as supplied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadOnlyQuery(String);

impl ReadOnlyQuery {
    pub fn parse(raw: &str) -> Result<Self, GuardError> {
        let inspected = raw.trim().to_lowercase();
        if inspected.is_empty() {
            return Err(GuardError::EmptyQuery);
        }
        if !inspected.starts_with("select") {
            return Err(GuardError::NotReadOnly);
        }
        Ok(Self(raw.to_owned()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_plain_identifiers() {
        for name in ["orders", "Orders_2024", "_tmp", "a", "schema$1"] {
            assert!(Identifier::parse(name).is_ok(), "{name} should be accepted");
        }
        let longest = "x".repeat(MAX_IDENTIFIER_LEN);
        assert!(Identifier::parse(&longest).is_ok());
    }

    #[test]
    fn rejects_identifiers_outside_allow_list() {
        let too_long = "x".repeat(MAX_IDENTIFIER_LEN + 1);
        for name in [
            "",
            "../../etc",
            "shop.orders",
            "orders`; DROP TABLE x; --",
            "orders table",
            "orders;",
            "naïve",
            "a-b",
            too_long.as_str(),
        ] {
            assert_eq!(
                Identifier::parse(name),
                Err(GuardError::InvalidIdentifier(name.to_string()))
            );
        }
    }

    #[test]
    fn qualified_table_is_backtick_quoted() {
        let scoped = TableRef::parse(Some("shop"), "orders").unwrap();
        assert_eq!(scoped.qualified(), "`shop`.`orders`");

        let unscoped = TableRef::parse(None, "orders").unwrap();
        assert_eq!(unscoped.qualified(), "`orders`");
    }

    #[test]
    fn table_ref_rejects_bad_database_part() {
        let err = TableRef::parse(Some("shop/.."), "orders").unwrap_err();
        assert_eq!(err, GuardError::InvalidIdentifier("shop/..".into()));
    }

    #[test]
    fn page_defaults_when_missing_or_non_numeric() {
        assert_eq!(Page::from_raw(None, None), Page::default());
        assert_eq!(
            Page::from_raw(Some("abc"), Some("")),
            Page {
                limit: 100,
                offset: 0
            }
        );
        assert_eq!(Page::from_raw(Some("-"), Some("  ")), Page::default());
    }

    #[test]
    fn page_truncates_and_clamps() {
        assert_eq!(
            Page::from_raw(Some("3.9"), Some("12abc")),
            Page {
                limit: 3,
                offset: 12
            }
        );
        assert_eq!(
            Page::from_raw(Some("-5"), Some("-0")),
            Page {
                limit: 0,
                offset: 0
            }
        );
        assert_eq!(coerce_count(Some(" +7 "), 1), 7);
        assert_eq!(coerce_count(Some("0"), 100), 0);
        assert_eq!(coerce_count(Some("99999999999999999999999"), 0), u64::MAX);
    }

    #[test]
    fn read_only_accepts_select_prefix() {
        for query in [
            "SELECT * FROM orders",
            "  select 1  ",
            "\n\tSeLeCt id FROM t",
            "select\n*\nfrom t",
        ] {
            let parsed = ReadOnlyQuery::parse(query).expect("select accepted");
            assert_eq!(parsed.as_str(), query);
        }
    }

    #[test]
    fn read_only_rejects_other_statements() {
        for query in [
            "DROP TABLE orders",
            "delete from orders",
            "WITH x AS (SELECT 1) SELECT * FROM x",
            "update t set a = (select 1)",
            "-- select\nDROP TABLE orders",
            "(SELECT 1)",
        ] {
            assert_eq!(ReadOnlyQuery::parse(query), Err(GuardError::NotReadOnly));
        }
    }

    #[test]
    fn read_only_rejects_blank_text() {
        assert_eq!(ReadOnlyQuery::parse(""), Err(GuardError::EmptyQuery));
        assert_eq!(ReadOnlyQuery::parse(" \n\t"), Err(GuardError::EmptyQuery));
    }
}
