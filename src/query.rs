//! User listing queries as seen by the cache.

use crate::value::SiteId;

/// What the query selects.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FieldSelection {
    /// One column per row, e.g. `fields = ids`.
    #[default]
    Column,
    /// Whole rows, e.g. `fields = all` or an explicit field list.
    Full,
}

/// Inputs that decide a query's scope and result shape.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct QueryDescriptor {
    /// Site the query is restricted to; `None` for a global listing.
    pub site_id: Option<SiteId>,
    /// Result depends on the site's published posts.
    pub has_published_posts: bool,
    /// Caller wants the `FOUND_ROWS` total.
    pub count_total: bool,
    pub fields: FieldSelection,
}

impl QueryDescriptor {
    pub fn global() -> Self {
        Self::default()
    }

    pub fn for_site(site_id: SiteId) -> Self {
        QueryDescriptor {
            site_id: Some(site_id).filter(|id| *id != 0),
            ..Self::default()
        }
    }

    pub fn with_count_total(mut self, count_total: bool) -> Self {
        self.count_total = count_total;
        self
    }

    pub fn with_published_posts(mut self, has_published_posts: bool) -> Self {
        self.has_published_posts = has_published_posts;
        self
    }

    pub fn with_fields(mut self, fields: FieldSelection) -> Self {
        self.fields = fields;
        self
    }
}

/// Clause parts of a generated user listing query.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SelectClauses {
    pub fields: String,
    pub from: String,
    pub where_clause: String,
    pub orderby: String,
    pub limit: String,
}

impl SelectClauses {
    /// `SELECT {fields} {from} {where} {orderby} {limit}`.
    pub fn to_sql(&self) -> String {
        format!(
            "SELECT {} {} {} {} {}",
            self.fields, self.from, self.where_clause, self.orderby, self.limit
        )
    }
}

/// A user listing request: SQL text plus its descriptor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UserQuery {
    pub sql: String,
    pub descriptor: QueryDescriptor,
}

impl UserQuery {
    pub fn new(sql: impl Into<String>, descriptor: QueryDescriptor) -> Self {
        UserQuery {
            sql: sql.into(),
            descriptor,
        }
    }

    pub fn from_clauses(clauses: &SelectClauses, descriptor: QueryDescriptor) -> Self {
        Self::new(clauses.to_sql(), descriptor)
    }
}
