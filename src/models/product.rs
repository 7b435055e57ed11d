//! A catalogue entry and its image set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Upper bound on a product's image set.
pub const MAX_PRODUCT_IMAGES: usize = 10;

/// Storage folder for product images.
pub const PRODUCT_ASSET_FOLDER: &str = "products";

#[derive(Serialize, Deserialize, Clone, FromRow, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Uuid,

    /// Unique across the catalogue.
    pub title: String,

    pub description: String,

    /// Estimated price shown to customers.
    pub est_price: f64,

    /// Public image URLs, in display order. The first entry is the cover
    /// image; a valid product holds between 1 and [`MAX_PRODUCT_IMAGES`].
    #[sqlx(json)]
    #[serde(rename = "imageUrl")]
    pub image_urls: Vec<String>,

    /// Inactive products are hidden from the public listing.
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn cover_image(&self) -> Option<&str> {
        self.image_urls.first().map(String::as_str)
    }
}
