pub mod carts;
pub mod categories;
pub mod common;
pub mod orders;
pub mod products;
pub mod reviews;
pub mod stats;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::EventSender;
use crate::services::{
    CartService, CategoryService, CheckoutService, OrderService, ProductService, ReviewService,
    StatsService,
};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub categories: Arc<CategoryService>,
    pub products: Arc<ProductService>,
    pub carts: Arc<CartService>,
    pub checkout: Arc<CheckoutService>,
    pub orders: Arc<OrderService>,
    pub reviews: Arc<ReviewService>,
    pub stats: Arc<StatsService>,
}

impl AppServices {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>, config: &AppConfig) -> Self {
        Self {
            categories: Arc::new(CategoryService::new(db_pool.clone())),
            products: Arc::new(ProductService::new(
                db_pool.clone(),
                event_sender.clone(),
                config.default_currency.clone(),
            )),
            carts: Arc::new(CartService::new(db_pool.clone())),
            checkout: Arc::new(CheckoutService::new(db_pool.clone(), event_sender.clone())),
            orders: Arc::new(OrderService::new(db_pool.clone())),
            reviews: Arc::new(ReviewService::new(db_pool.clone(), event_sender)),
            stats: Arc::new(StatsService::new(db_pool)),
        }
    }
}
