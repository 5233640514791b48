//! Pagination and sorting for list endpoints.
//!
//! Raw query values are validated once, at the boundary, into a [`Filters`]
//! whose sort key is an enum. Turning that enum into a column name is a
//! total function, so no unchecked string ever reaches an `ORDER BY`.

use serde::{Deserialize, Serialize};

use crate::ValidationErrors;

pub const MAX_PAGE: u32 = 10_000_000;
pub const MAX_PAGE_SIZE: u32 = 100;
pub const DEFAULT_PAGE_SIZE: u32 = 20;

/// A resource-specific set of sortable columns.
pub trait SortKey: Copy + Eq + std::fmt::Debug + Send + Sync + 'static {
    /// Used when the request names no sort.
    const DEFAULT: Self;

    /// Accepted query spellings (without the `-` prefix).
    const ALLOWED: &'static [(&'static str, Self)];

    /// Column this key orders by.
    fn column(self) -> &'static str;
}

macro_rules! sort_keys {
    (
        $(#[$meta:meta])* $name:ident,
        default = $default:ident,
        { $($variant:ident => $text:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $($variant),+
        }

        impl SortKey for $name {
            const DEFAULT: Self = Self::$default;
            const ALLOWED: &'static [(&'static str, Self)] = &[$(($text, Self::$variant)),+];

            fn column(self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }
    };
}

sort_keys!(
    /// Sortable product columns.
    ProductSort, default = Id, { Id => "id", Title => "title", Price => "price" }
);

sort_keys!(
    /// Sortable order columns.
    OrderSort, default = Id, {
        Id => "id",
        TotalPrice => "total_price",
        Status => "status",
        CreatedAt => "created_at",
    }
);

sort_keys!(
    /// Sortable invoice columns.
    InvoiceSort, default = Id, { Id => "id", Status => "status", CreatedAt => "created_at" }
);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    #[must_use]
    pub const fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Raw pagination parameters as they arrive in a query string.
///
/// Values stay strings so a non-numeric page becomes a field error rather
/// than a rejected request.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct PageQuery {
    pub page: Option<String>,
    pub page_size: Option<String>,
    pub sort: Option<String>,
}

/// Validated page, page size and sort for a list query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Filters<K> {
    page: u32,
    page_size: u32,
    sort: K,
    direction: SortDirection,
}

impl<K: SortKey> Default for Filters<K> {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            sort: K::DEFAULT,
            direction: SortDirection::Asc,
        }
    }
}

impl<K: SortKey> Filters<K> {
    /// Validates raw parameters, collecting every failure.
    ///
    /// # Errors
    ///
    /// Returns `page`, `page_size` and `sort` field errors.
    pub fn parse(query: &PageQuery) -> Result<Self, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let mut filters = Self::default();

        if let Some(page) = parse_bounded(
            &mut errors,
            "page",
            query.page.as_deref(),
            MAX_PAGE,
            "10 million",
        ) {
            filters.page = page;
        }
        if let Some(size) = parse_bounded(
            &mut errors,
            "page_size",
            query.page_size.as_deref(),
            MAX_PAGE_SIZE,
            "100",
        ) {
            filters.page_size = size;
        }

        if let Some(raw) = query.sort.as_deref().filter(|s| !s.is_empty()) {
            let (direction, name) = raw
                .strip_prefix('-')
                .map_or((SortDirection::Asc, raw), |rest| (SortDirection::Desc, rest));
            match K::ALLOWED.iter().find(|(text, _)| *text == name) {
                Some((_, key)) => {
                    filters.sort = *key;
                    filters.direction = direction;
                }
                None => errors.add("sort", "invalid sort value"),
            }
        }

        errors.into_result()?;
        Ok(filters)
    }

    #[must_use]
    pub const fn page(&self) -> u32 {
        self.page
    }

    #[must_use]
    pub const fn page_size(&self) -> u32 {
        self.page_size
    }

    #[must_use]
    pub const fn sort(&self) -> K {
        self.sort
    }

    #[must_use]
    pub const fn direction(&self) -> SortDirection {
        self.direction
    }

    #[must_use]
    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }

    #[must_use]
    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.page_size)
    }

    /// `ORDER BY` body with `id` as the tie-breaker.
    #[must_use]
    pub fn order_by(&self) -> String {
        format!(
            "{} {}, id ASC",
            self.sort.column(),
            self.direction.as_sql()
        )
    }
}

fn parse_bounded(
    errors: &mut ValidationErrors,
    field: &str,
    raw: Option<&str>,
    max: u32,
    max_text: &str,
) -> Option<u32> {
    let raw = raw.filter(|s| !s.is_empty())?;
    let Ok(value) = raw.parse::<i64>() else {
        errors.add(field, "must be an integer value");
        return None;
    };
    if value < 1 {
        errors.add(field, "must be greater than zero");
        return None;
    }
    match u32::try_from(value) {
        Ok(v) if v <= max => Some(v),
        _ => {
            errors.add(field, format!("must be a maximum of {max_text}"));
            None
        }
    }
}

/// Pagination details returned alongside a page of results.
///
/// All fields are zero, and therefore omitted, when nothing matched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Metadata {
    #[serde(skip_serializing_if = "is_zero")]
    pub current_page: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub page_size: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub first_page: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub last_page: i64,
    #[serde(skip_serializing_if = "is_zero")]
    pub total_records: i64,
}

#[allow(clippy::trivially_copy_pass_by_ref)]
const fn is_zero(n: &i64) -> bool {
    *n == 0
}

impl Metadata {
    #[must_use]
    pub fn new(total_records: i64, page: u32, page_size: u32) -> Self {
        if total_records <= 0 || page_size == 0 {
            return Self::default();
        }
        let size = i64::from(page_size);
        Self {
            current_page: i64::from(page),
            page_size: size,
            first_page: 1,
            last_page: (total_records + size - 1) / size,
            total_records,
        }
    }

    #[must_use]
    pub fn for_filters<K: SortKey>(total_records: i64, filters: &Filters<K>) -> Self {
        Self::new(total_records, filters.page(), filters.page_size())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn query(page: Option<&str>, size: Option<&str>, sort: Option<&str>) -> PageQuery {
        PageQuery {
            page: page.map(Into::into),
            page_size: size.map(Into::into),
            sort: sort.map(Into::into),
        }
    }

    #[test]
    fn test_defaults() {
        let filters = Filters::<ProductSort>::parse(&PageQuery::default()).unwrap();
        assert_eq!(filters.page(), 1);
        assert_eq!(filters.page_size(), DEFAULT_PAGE_SIZE);
        assert_eq!(filters.sort(), ProductSort::Id);
        assert_eq!(filters.offset(), 0);
        assert_eq!(filters.order_by(), "id ASC, id ASC");
    }

    #[test]
    fn test_descending_sort() {
        let filters =
            Filters::<ProductSort>::parse(&query(Some("3"), Some("10"), Some("-price"))).unwrap();
        assert_eq!(filters.sort(), ProductSort::Price);
        assert_eq!(filters.direction(), SortDirection::Desc);
        assert_eq!(filters.limit(), 10);
        assert_eq!(filters.offset(), 20);
        assert_eq!(filters.order_by(), "price DESC, id ASC");
    }

    #[test]
    fn test_sort_outside_allow_list_is_rejected() {
        let errors =
            Filters::<ProductSort>::parse(&query(None, None, Some("password_hash"))).unwrap_err();
        assert_eq!(errors.get("sort"), Some("invalid sort value"));

        let errors =
            Filters::<InvoiceSort>::parse(&query(None, None, Some("total_price"))).unwrap_err();
        assert_eq!(errors.get("sort"), Some("invalid sort value"));
        assert!(Filters::<OrderSort>::parse(&query(None, None, Some("-total_price"))).is_ok());
    }

    #[test]
    fn test_bounds_are_aggregated() {
        let errors =
            Filters::<OrderSort>::parse(&query(Some("0"), Some("101"), Some("nope"))).unwrap_err();
        assert_eq!(errors.get("page"), Some("must be greater than zero"));
        assert_eq!(errors.get("page_size"), Some("must be a maximum of 100"));
        assert_eq!(errors.get("sort"), Some("invalid sort value"));

        let errors =
            Filters::<OrderSort>::parse(&query(Some("10000001"), Some("x"), None)).unwrap_err();
        assert_eq!(errors.get("page"), Some("must be a maximum of 10 million"));
        assert_eq!(errors.get("page_size"), Some("must be an integer value"));
    }

    #[test]
    fn test_upper_bounds_are_inclusive() {
        let filters =
            Filters::<ProductSort>::parse(&query(Some("10000000"), Some("100"), None)).unwrap();
        assert_eq!(filters.offset(), 9_999_999 * 100);
    }

    #[test]
    fn test_metadata_for_empty_result() {
        let metadata = Metadata::new(0, 1, 20);
        assert_eq!(metadata, Metadata::default());
        assert_eq!(serde_json::to_value(metadata).unwrap(), serde_json::json!({}));
    }

    #[test]
    fn test_metadata_for_partial_last_page() {
        let metadata = Metadata::new(57, 2, 20);
        assert_eq!(metadata.first_page, 1);
        assert_eq!(metadata.last_page, 3);
        assert_eq!(metadata.current_page, 2);
        assert_eq!(metadata.page_size, 20);
        assert_eq!(metadata.total_records, 57);
    }

    proptest! {
        #[test]
        fn prop_last_page_covers_every_record(total in 1i64..1_000_000, size in 1u32..=100) {
            let metadata = Metadata::new(total, 1, size);
            let size = i64::from(size);
            prop_assert!(metadata.last_page * size >= total);
            prop_assert!((metadata.last_page - 1) * size < total);
        }

        #[test]
        fn prop_valid_pages_round_trip(page in 1u32..=MAX_PAGE, size in 1u32..=MAX_PAGE_SIZE) {
            let q = query(Some(&page.to_string()), Some(&size.to_string()), None);
            let filters = Filters::<ProductSort>::parse(&q).unwrap();
            prop_assert_eq!(filters.offset(), i64::from(page - 1) * i64::from(size));
        }
    }
}
