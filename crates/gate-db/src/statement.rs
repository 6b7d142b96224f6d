//! Statement templates.
//!
//! Statement text only ever receives [`Identifier`]s (validated, quoted);
//! every value travels as a [`Param`] bound by the driver. The only text a
//! caller controls verbatim is a [`ReadOnlyQuery`].

use crate::guard::{Identifier, Page, ReadOnlyQuery, TableRef};

/// Bound value slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Param {
    Unsigned(u64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statement {
    sql: String,
    params: Vec<Param>,
    persistent: bool,
}

impl Statement {
    fn fixed(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
            persistent: true,
        }
    }

    fn with_params(sql: impl Into<String>, params: Vec<Param>) -> Self {
        Self {
            sql: sql.into(),
            params,
            persistent: true,
        }
    }

    pub fn ping() -> Self {
        Self::fixed("SELECT 1")
    }

    pub fn list_databases() -> Self {
        Self::fixed("SHOW DATABASES")
    }

    pub fn list_tables(database: Option<&Identifier>) -> Self {
        match database {
            Some(database) => Self::fixed(format!("SHOW TABLES FROM {}", database.quoted())),
            None => Self::fixed("SHOW TABLES"),
        }
    }

    pub fn describe_table(table: &TableRef) -> Self {
        Self::fixed(format!("SHOW COLUMNS FROM {}", table.qualified()))
    }

    pub fn select_page(table: &TableRef, page: Page) -> Self {
        Self::with_params(
            format!("SELECT * FROM {} LIMIT ? OFFSET ?", table.qualified()),
            vec![Param::Unsigned(page.limit), Param::Unsigned(page.offset)],
        )
    }

    pub fn count_rows(table: &TableRef) -> Self {
        Self::fixed(format!(
            "SELECT COUNT(*) AS total FROM {}",
            table.qualified()
        ))
    }

    pub fn select_limited(table: &TableRef, limit: u64) -> Self {
        Self::with_params(
            format!("SELECT * FROM {} LIMIT ?", table.qualified()),
            vec![Param::Unsigned(limit)],
        )
    }

    /// Caller-authored text goes out untouched and is not kept in the
    /// connection's prepared statement cache.
    pub fn read_only(query: ReadOnlyQuery) -> Self {
        Self {
            sql: query.into_inner(),
            params: Vec::new(),
            persistent: false,
        }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn params(&self) -> &[Param] {
        &self.params
    }

    pub fn is_persistent(&self) -> bool {
        self.persistent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orders() -> TableRef {
        TableRef::parse(Some("shop"), "orders").unwrap()
    }

    #[test]
    fn page_values_are_bound_not_interpolated() {
        let statement = Statement::select_page(
            &orders(),
            Page {
                limit: 25,
                offset: 50,
            },
        );
        assert_eq!(
            statement.sql(),
            "SELECT * FROM `shop`.`orders` LIMIT ? OFFSET ?"
        );
        assert_eq!(
            statement.params(),
            &[Param::Unsigned(25), Param::Unsigned(50)]
        );
        assert!(!statement.sql().contains("25"));
    }

    #[test]
    fn count_targets_same_table_as_page() {
        let table = TableRef::parse(None, "orders").unwrap();
        let page = Statement::select_page(&table, Page::default());
        let count = Statement::count_rows(&table);
        assert!(page.sql().contains("FROM `orders` "));
        assert_eq!(count.sql(), "SELECT COUNT(*) AS total FROM `orders`");
        assert!(count.params().is_empty());
    }

    #[test]
    fn catalog_statements() {
        let shop = Identifier::parse("shop").unwrap();
        assert_eq!(Statement::list_databases().sql(), "SHOW DATABASES");
        assert_eq!(Statement::list_tables(None).sql(), "SHOW TABLES");
        assert_eq!(
            Statement::list_tables(Some(&shop)).sql(),
            "SHOW TABLES FROM `shop`"
        );
        assert_eq!(
            Statement::describe_table(&orders()).sql(),
            "SHOW COLUMNS FROM `shop`.`orders`"
        );
    }

    #[test]
    fn shortcut_select_binds_limit() {
        let deals = TableRef::parse(None, "deals").unwrap();
        let statement = Statement::select_limited(&deals, 10);
        assert_eq!(statement.sql(), "SELECT * FROM `deals` LIMIT ?");
        assert_eq!(statement.params(), &[Param::Unsigned(10)]);
    }

    #[test]
    fn read_only_text_is_forwarded_verbatim() {
        let raw = "  SELECT id FROM orders  ";
        let statement = Statement::read_only(ReadOnlyQuery::parse(raw).unwrap());
        assert_eq!(statement.sql(), raw);
        assert!(statement.params().is_empty());
        assert!(!statement.is_persistent());
        assert!(Statement::ping().is_persistent());
    }
}
