//! Status enums for orders and invoices.
//!
//! Both are stored as `TEXT` columns constrained by a `CHECK`, so the wire
//! and storage spellings are the same kebab-case string.

use serde::{Deserialize, Serialize};

/// Error returned when a status string is not one of the fixed set.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("must be one of: {allowed}")]
pub struct UnknownStatus {
    /// Comma-separated list of accepted values.
    pub allowed: &'static str,
}

macro_rules! text_status {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        impl $name {
            /// Every accepted spelling, in declaration order.
            pub const ALLOWED: &'static str = concat!($($text, ", "),+);

            /// The canonical string form.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = UnknownStatus;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($text => Ok(Self::$variant),)+
                    _ => Err(UnknownStatus {
                        allowed: Self::ALLOWED.trim_end_matches([',', ' ']),
                    }),
                }
            }
        }

        #[cfg(feature = "postgres")]
        impl sqlx::Type<sqlx::Postgres> for $name {
            fn type_info() -> sqlx::postgres::PgTypeInfo {
                <String as sqlx::Type<sqlx::Postgres>>::type_info()
            }

            fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
                <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
            }
        }

        #[cfg(feature = "postgres")]
        impl sqlx::Encode<'_, sqlx::Postgres> for $name {
            fn encode_by_ref(
                &self,
                buf: &mut sqlx::postgres::PgArgumentBuffer,
            ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
                <&str as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.as_str(), buf)
            }
        }
    };
}

/// Lifecycle of an order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum OrderStatus {
    #[default]
    New,
    InProgress,
    Delivered,
    Cancelled,
}

text_status!(OrderStatus {
    New => "new",
    InProgress => "in-progress",
    Delivered => "delivered",
    Cancelled => "cancelled",
});

/// Payment state of an invoice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum InvoiceStatus {
    #[default]
    Unpaid,
    Paid,
}

text_status!(InvoiceStatus {
    Unpaid => "unpaid",
    Paid => "paid",
});

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_status_text_matches_serde() {
        for status in [
            OrderStatus::New,
            OrderStatus::InProgress,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{status}\""));
            assert_eq!(status.as_str().parse::<OrderStatus>().unwrap(), status);
        }
    }

    #[test]
    fn test_unknown_status_lists_allowed_values() {
        let err = "shipped".parse::<OrderStatus>().unwrap_err();
        assert_eq!(
            err.to_string(),
            "must be one of: new, in-progress, delivered, cancelled"
        );

        let err = "PAID".parse::<InvoiceStatus>().unwrap_err();
        assert_eq!(err.to_string(), "must be one of: unpaid, paid");
    }

    #[test]
    fn test_defaults() {
        assert_eq!(OrderStatus::default(), OrderStatus::New);
        assert_eq!(InvoiceStatus::default(), InvoiceStatus::Unpaid);
    }
}
