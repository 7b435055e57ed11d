//! Product catalogue workflows and the image-set protocols.
//!
//! Image sets are only ever swapped in this order:
//! 1. store the new images (failure aborts, nothing changes),
//! 2. persist the product row pointing at the new images,
//! 3. delete the old images.
//!
//! Step 3 is best-effort. Its failures are logged and handed to the
//! [`OrphanReporter`]; the request still succeeds.

use super::{ServiceError, ServiceResult, required};
use crate::{
    assets::{
        AssetManager, AssetUpload, LogOrphanReporter, OrphanReporter, OrphanedAssets,
        orphans::CleanupPhase,
    },
    db::is_unique_violation,
    models::product::{MAX_PRODUCT_IMAGES, PRODUCT_ASSET_FOLDER, Product},
};
use chrono::Utc;
use sqlx::{SqlitePool, types::Json};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

const SELECT_PRODUCT: &str = "SELECT id, title, description, est_price, image_urls, is_active, \
                              created_at, updated_at FROM products";

/// Text fields of a product form. On update, `None` leaves the field as is.
#[derive(Debug, Default, Clone)]
pub struct ProductFields {
    pub title: Option<String>,
    pub description: Option<String>,
    pub est_price: Option<f64>,
    pub is_active: Option<bool>,
}

#[derive(Clone)]
pub struct ProductService {
    db: SqlitePool,
    assets: AssetManager,
    orphans: Arc<dyn OrphanReporter>,
}

impl ProductService {
    pub fn new(db: SqlitePool, assets: AssetManager) -> Self {
        Self {
            db,
            assets,
            orphans: Arc::new(LogOrphanReporter),
        }
    }

    /// Replace the hook that receives orphaned assets.
    pub fn with_orphan_reporter(mut self, orphans: Arc<dyn OrphanReporter>) -> Self {
        self.orphans = orphans;
        self
    }

    pub async fn get_product(&self, id: Uuid) -> ServiceResult<Product> {
        sqlx::query_as::<_, Product>(&format!("{SELECT_PRODUCT} WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Product not found".into()))
    }

    /// Every product, newest first.
    pub async fn list_products(&self) -> ServiceResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "{SELECT_PRODUCT} ORDER BY created_at DESC"
        ))
        .fetch_all(&self.db)
        .await?;
        Ok(products)
    }

    /// Products visible to customers, newest first.
    pub async fn list_active_products(&self) -> ServiceResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(&format!(
            "{SELECT_PRODUCT} WHERE is_active = 1 ORDER BY created_at DESC"
        ))
        .fetch_all(&self.db)
        .await?;
        Ok(products)
    }

    async fn title_taken(&self, title: &str, except: Option<Uuid>) -> ServiceResult<bool> {
        let existing = sqlx::query_scalar::<_, Uuid>("SELECT id FROM products WHERE title = ?")
            .bind(title)
            .fetch_optional(&self.db)
            .await?;
        Ok(matches!(existing, Some(id) if Some(id) != except))
    }

    /// Validate, upload the images, then insert the product.
    pub async fn create_product(
        &self,
        fields: ProductFields,
        images: Vec<AssetUpload>,
    ) -> ServiceResult<Product> {
        let (Some(title), Some(description), Some(est_price)) = (
            required(fields.title),
            required(fields.description),
            fields.est_price,
        ) else {
            return Err(ServiceError::Validation(
                "Please provide title, est_price, and description".into(),
            ));
        };
        validate_price(est_price)?;

        if images.is_empty() {
            return Err(ServiceError::Validation(
                "At least 1 image is required".into(),
            ));
        }
        validate_image_count(images.len())?;

        if self.title_taken(&title, None).await? {
            return Err(ServiceError::Conflict(
                "Product with this title already exists".into(),
            ));
        }

        let image_urls = self
            .assets
            .store_asset_batch(images, PRODUCT_ASSET_FOLDER)
            .await?;

        let now = Utc::now();
        let product = Product {
            id: Uuid::new_v4(),
            title,
            description,
            est_price,
            image_urls,
            is_active: fields.is_active.unwrap_or(true),
            created_at: now,
            updated_at: now,
        };

        let inserted = sqlx::query(
            "INSERT INTO products (id, title, description, est_price, image_urls, is_active,
                                   created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(product.id)
        .bind(&product.title)
        .bind(&product.description)
        .bind(product.est_price)
        .bind(Json(&product.image_urls))
        .bind(product.is_active)
        .bind(product.created_at)
        .bind(product.updated_at)
        .execute(&self.db)
        .await;

        if let Err(err) = inserted {
            self.cleanup(product.id, &product.image_urls, CleanupPhase::RollbackNewSet)
                .await;
            return Err(if is_unique_violation(&err) {
                ServiceError::Conflict("Product with this title already exists".into())
            } else {
                ServiceError::Sqlx(err)
            });
        }

        info!(
            product_id = %product.id,
            images = product.image_urls.len(),
            cover = product.cover_image().unwrap_or_default(),
            "created product"
        );
        Ok(product)
    }

    /// Apply field changes and, when `images` is non-empty, replace the whole
    /// image set.
    pub async fn update_product(
        &self,
        id: Uuid,
        fields: ProductFields,
        images: Vec<AssetUpload>,
    ) -> ServiceResult<Product> {
        let current = self.get_product(id).await?;
        let old_set = current.image_urls.clone();
        let read_at = current.updated_at;
        let mut updated = current;

        if let Some(title) = fields.title {
            let title = required(Some(title))
                .ok_or_else(|| ServiceError::Validation("Title must not be empty".into()))?;
            if title != updated.title && self.title_taken(&title, Some(id)).await? {
                return Err(ServiceError::Conflict(
                    "Product with this title already exists".into(),
                ));
            }
            updated.title = title;
        }
        if let Some(description) = fields.description {
            updated.description = required(Some(description)).ok_or_else(|| {
                ServiceError::Validation("Description must not be empty".into())
            })?;
        }
        if let Some(est_price) = fields.est_price {
            validate_price(est_price)?;
            updated.est_price = est_price;
        }
        if let Some(is_active) = fields.is_active {
            updated.is_active = is_active;
        }
        validate_image_count(images.len())?;

        // Phase 1: new images must be stored before anything else changes.
        let replacing = !images.is_empty();
        if replacing {
            updated.image_urls = self
                .assets
                .store_asset_batch(images, PRODUCT_ASSET_FOLDER)
                .await?;
        }
        updated.updated_at = Utc::now();

        let persisted = sqlx::query(
            "UPDATE products
             SET title = ?, description = ?, est_price = ?, image_urls = ?, is_active = ?,
                 updated_at = ?
             WHERE id = ? AND image_urls = ? AND updated_at = ?",
        )
        .bind(&updated.title)
        .bind(&updated.description)
        .bind(updated.est_price)
        .bind(Json(&updated.image_urls))
        .bind(updated.is_active)
        .bind(updated.updated_at)
        .bind(id)
        .bind(Json(&old_set))
        .bind(read_at)
        .execute(&self.db)
        .await;

        let failure = match persisted {
            // Deleted or changed by another request since it was read.
            Ok(result) if result.rows_affected() == 0 => Some(self.stale_write(id).await),
            Ok(_) => None,
            Err(err) if is_unique_violation(&err) => Some(ServiceError::Conflict(
                "Product with this title already exists".into(),
            )),
            Err(err) => Some(ServiceError::Sqlx(err)),
        };
        if let Some(err) = failure {
            if replacing {
                self.cleanup(id, &updated.image_urls, CleanupPhase::RollbackNewSet)
                    .await;
            }
            return Err(err);
        }

        // Phase 2: the row now points at the new set; old images are garbage.
        if replacing {
            self.cleanup(id, &old_set, CleanupPhase::ReplaceOldSet).await;
        }

        info!(product_id = %id, replaced_images = replacing, "updated product");
        Ok(updated)
    }

    /// Delete the product's images, then the product. Image deletion failures
    /// never block removing the record.
    pub async fn delete_product(&self, id: Uuid) -> ServiceResult<Product> {
        let product = self.get_product(id).await?;

        self.cleanup(id, &product.image_urls, CleanupPhase::EntityDelete)
            .await;

        let result = sqlx::query("DELETE FROM products WHERE id = ?")
            .bind(id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ServiceError::NotFound("Product not found".into()));
        }

        info!(product_id = %id, "deleted product");
        Ok(product)
    }

    async fn stale_write(&self, id: Uuid) -> ServiceError {
        match self.get_product(id).await {
            Ok(_) => ServiceError::Conflict(
                "Product was modified by another request, please retry".into(),
            ),
            Err(err) => err,
        }
    }

    /// Best-effort delete of `references`; failures go to the orphan reporter.
    async fn cleanup(&self, entity_id: Uuid, references: &[String], phase: CleanupPhase) {
        let report = self.assets.delete_asset_batch_report(references).await;
        if report.is_success() {
            return;
        }

        let error = report
            .failed
            .first()
            .map(|(_, err)| err.to_string())
            .unwrap_or_default();
        let orphans = OrphanedAssets {
            entity_id,
            phase,
            references: report.failed.into_iter().map(|(r, _)| r).collect(),
            error,
        };
        self.orphans.report(&orphans);
    }
}

fn validate_price(est_price: f64) -> ServiceResult<()> {
    if !est_price.is_finite() || est_price < 0.0 {
        return Err(ServiceError::Validation(
            "est_price must be a non-negative number".into(),
        ));
    }
    Ok(())
}

fn validate_image_count(count: usize) -> ServiceResult<()> {
    if count > MAX_PRODUCT_IMAGES {
        return Err(ServiceError::Validation(format!(
            "At most {MAX_PRODUCT_IMAGES} images are allowed"
        )));
    }
    Ok(())
}
