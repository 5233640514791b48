//! Catalog products.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{ProductId, ValidationErrors};

pub const TITLE_MAX_BYTES: usize = 500;
pub const DESCRIPTION_MAX_BYTES: usize = 5000;

/// A catalog item. `price` is in minor currency units.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub created_at: DateTime<Utc>,
    pub title: String,
    pub description: String,
    pub price: i32,
    pub version: i32,
}

/// Creation body.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProductInput {
    pub title: String,
    pub description: String,
    pub price: i32,
}

/// Validated creation fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProduct {
    pub title: String,
    pub description: String,
    pub price: i32,
}

impl ProductInput {
    /// # Errors
    ///
    /// Returns every failing field at once.
    pub fn validate(self) -> Result<NewProduct, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        check_fields(&mut errors, &self.title, &self.description, self.price);
        errors.into_result()?;
        Ok(NewProduct {
            title: self.title,
            description: self.description,
            price: self.price,
        })
    }
}

/// Partial update. Absent fields keep their stored value.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductPatch {
    pub version: i32,
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<i32>,
}

impl ProductPatch {
    /// Merges onto `current` and validates the result, which carries the
    /// caller's `version` as the write precondition.
    ///
    /// # Errors
    ///
    /// Returns every failing field at once.
    pub fn apply(self, current: &Product) -> Result<Product, ValidationErrors> {
        let mut product = current.clone();
        if let Some(title) = self.title {
            product.title = title;
        }
        if let Some(description) = self.description {
            product.description = description;
        }
        if let Some(price) = self.price {
            product.price = price;
        }

        let mut errors = ValidationErrors::new();
        check_fields(&mut errors, &product.title, &product.description, product.price);
        errors.into_result()?;

        product.version = self.version;
        Ok(product)
    }
}

fn check_fields(errors: &mut ValidationErrors, title: &str, description: &str, price: i32) {
    errors.check(!title.is_empty(), "title", "must be provided");
    errors.check(
        title.len() <= TITLE_MAX_BYTES,
        "title",
        format!("must not be more than {TITLE_MAX_BYTES} bytes long"),
    );
    errors.check(
        description.len() <= DESCRIPTION_MAX_BYTES,
        "description",
        format!("must not be more than {DESCRIPTION_MAX_BYTES} bytes long"),
    );
    errors.check(price >= 0, "price", "must be zero or greater");
}
