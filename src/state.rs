//! Shared application state handed to every handler.

use crate::{
    assets::AssetManager,
    auth::TokenIssuer,
    services::{AdminService, OrderService, ProductService},
};
use sqlx::SqlitePool;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub assets: AssetManager,
    pub tokens: TokenIssuer,
    pub admins: AdminService,
    pub products: ProductService,
    pub orders: OrderService,
}

impl AppState {
    pub fn new(db: SqlitePool, assets: AssetManager, tokens: TokenIssuer) -> Self {
        Self {
            admins: AdminService::new(db.clone()),
            products: ProductService::new(db.clone(), assets.clone()),
            orders: OrderService::new(db.clone()),
            db,
            assets,
            tokens,
        }
    }
}
