/// Business logic, one service per aggregate. Handlers stay thin and
/// delegate here; services own transactions and event emission.
pub mod carts;
pub mod catalog;
pub mod checkout;
pub mod notifications;
pub mod orders;
pub mod reviews;
pub mod search;
pub mod stats;

pub use carts::CartService;
pub use catalog::{CategoryService, ProductService};
pub use checkout::CheckoutService;
pub use orders::OrderService;
pub use reviews::ReviewService;
pub use stats::StatsService;
