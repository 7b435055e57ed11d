//! Customer order requests and their back-office handling.

use super::{ServiceError, ServiceResult, required};
use crate::models::order::{Order, OrderStatus};
use chrono::Utc;
use serde::Deserialize;
use sqlx::SqlitePool;
use uuid::Uuid;

const SELECT_ORDER: &str = "SELECT id, user_name, email_user, whatsapp, status, user_note, \
                            admin_note, product_id, created_at, updated_at FROM orders";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrder {
    pub user_name: Option<String>,
    pub email_user: Option<String>,
    pub whatsapp: Option<String>,
    pub user_note: Option<String>,
    pub product_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderUpdate {
    pub status: Option<OrderStatus>,
    pub admin_note: Option<String>,
}

#[derive(Clone)]
pub struct OrderService {
    db: SqlitePool,
}

impl OrderService {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    pub async fn create_order(&self, req: NewOrder) -> ServiceResult<Order> {
        let (Some(user_name), Some(email_user), Some(whatsapp), Some(product_id)) = (
            required(req.user_name),
            required(req.email_user),
            required(req.whatsapp),
            required(req.product_id),
        ) else {
            return Err(ServiceError::Validation(
                "Please provide userName, emailUser, whatsapp, and productId".into(),
            ));
        };

        let not_found = || ServiceError::NotFound("Product not found".into());
        let product_id = Uuid::parse_str(&product_id).map_err(|_| not_found())?;
        let exists = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM products WHERE id = ?")
            .bind(product_id)
            .fetch_one(&self.db)
            .await?;
        if exists == 0 {
            return Err(not_found());
        }

        let now = Utc::now();
        let order = Order {
            id: Uuid::new_v4(),
            user_name,
            email_user,
            whatsapp,
            status: OrderStatus::Pending,
            user_note: req.user_note.unwrap_or_default().trim().to_string(),
            admin_note: None,
            product_id,
            created_at: now,
            updated_at: now,
        };

        sqlx::query(
            "INSERT INTO orders (id, user_name, email_user, whatsapp, status, user_note,
                                 admin_note, product_id, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(order.id)
        .bind(&order.user_name)
        .bind(&order.email_user)
        .bind(&order.whatsapp)
        .bind(order.status)
        .bind(&order.user_note)
        .bind(&order.admin_note)
        .bind(order.product_id)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&self.db)
        .await?;

        tracing::info!(order_id = %order.id, product_id = %order.product_id, "created order");
        Ok(order)
    }

    /// All orders, newest first.
    pub async fn list_orders(&self) -> ServiceResult<Vec<Order>> {
        let orders = sqlx::query_as::<_, Order>(&format!("{SELECT_ORDER} ORDER BY created_at DESC"))
            .fetch_all(&self.db)
            .await?;
        Ok(orders)
    }

    pub async fn update_order(&self, id: Uuid, update: OrderUpdate) -> ServiceResult<Order> {
        if update.status.is_none() && update.admin_note.is_none() {
            return Err(ServiceError::Validation(
                "Please provide status or adminNote".into(),
            ));
        }

        let mut order = sqlx::query_as::<_, Order>(&format!("{SELECT_ORDER} WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound("Order not found".into()))?;

        if let Some(status) = update.status {
            order.status = status;
        }
        if let Some(note) = update.admin_note {
            order.admin_note = Some(note.trim().to_string());
        }
        order.updated_at = Utc::now();

        sqlx::query("UPDATE orders SET status = ?, admin_note = ?, updated_at = ? WHERE id = ?")
            .bind(order.status)
            .bind(&order.admin_note)
            .bind(order.updated_at)
            .bind(id)
            .execute(&self.db)
            .await?;

        tracing::info!(order_id = %id, status = %order.status, "updated order");
        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    async fn seed_product(db: &SqlitePool) -> Uuid {
        let id = Uuid::new_v4();
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO products (id, title, description, est_price, image_urls, is_active,
                                   created_at, updated_at)
             VALUES (?, 'Batik', 'Shirt', 100.0, '[\"https://cdn/products/a.jpg\"]', 1, ?, ?)",
        )
        .bind(id)
        .bind(now)
        .bind(now)
        .execute(db)
        .await
        .unwrap();
        id
    }

    fn new_order(product_id: &str) -> NewOrder {
        NewOrder {
            user_name: Some("Sari".into()),
            email_user: Some("sari@example.com".into()),
            whatsapp: Some("+62811000000".into()),
            user_note: None,
            product_id: Some(product_id.into()),
        }
    }

    #[tokio::test]
    async fn order_starts_pending() {
        let db = test_pool().await;
        let product_id = seed_product(&db).await;
        let orders = OrderService::new(db);

        let order = orders
            .create_order(new_order(&product_id.to_string()))
            .await
            .unwrap();

        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(order.user_note, "");
        let listed = orders.list_orders().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].product_id, product_id);
    }

    #[tokio::test]
    async fn unknown_product_is_not_found() {
        let orders = OrderService::new(test_pool().await);

        let missing = orders
            .create_order(new_order(&Uuid::new_v4().to_string()))
            .await;
        let malformed = orders.create_order(new_order("not-a-uuid")).await;

        assert!(matches!(missing, Err(ServiceError::NotFound(_))));
        assert!(matches!(malformed, Err(ServiceError::NotFound(_))));
    }

    #[tokio::test]
    async fn missing_contact_details_are_rejected() {
        let db = test_pool().await;
        let product_id = seed_product(&db).await;
        let orders = OrderService::new(db);

        let req = NewOrder {
            whatsapp: None,
            ..new_order(&product_id.to_string())
        };

        assert!(matches!(
            orders.create_order(req).await,
            Err(ServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn admin_can_progress_order() {
        let db = test_pool().await;
        let product_id = seed_product(&db).await;
        let orders = OrderService::new(db);
        let order = orders
            .create_order(new_order(&product_id.to_string()))
            .await
            .unwrap();

        let updated = orders
            .update_order(
                order.id,
                OrderUpdate {
                    status: Some(OrderStatus::InProgress),
                    admin_note: Some(" call back tomorrow ".into()),
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.status, OrderStatus::InProgress);
        assert_eq!(updated.admin_note.as_deref(), Some("call back tomorrow"));
        let listed = orders.list_orders().await.unwrap();
        assert_eq!(listed[0].status, OrderStatus::InProgress);
    }

    #[tokio::test]
    async fn empty_update_is_rejected() {
        let orders = OrderService::new(test_pool().await);
        let err = orders
            .update_order(
                Uuid::new_v4(),
                OrderUpdate {
                    status: None,
                    admin_note: None,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }
}
