use crate::{
    entities::{order, order_item, Order, OrderItem, PaymentStatus},
    errors::ServiceError,
};
use chrono::{DateTime, Days, NaiveDate, TimeZone, Utc};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

const TOP_PRODUCTS_LIMIT: usize = 5;

/// Staff sales statistics.
///
/// Revenue is gross: every non-deleted order in the window counts at its
/// full total, whatever its payment or fulfilment status, grouped per
/// currency and never summed across currencies. `paid_orders` breaks out
/// how many of those have actually been paid. Aggregation happens in
/// memory after a filtered fetch so the numbers come out identical on
/// every database backend.
#[derive(Clone)]
pub struct StatsService {
    db: Arc<DatabaseConnection>,
}

impl StatsService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Sales overview for an optional inclusive date window over
    /// `placed_at`. Soft-deleted orders are excluded; everything else in
    /// the window counts, cancelled and unpaid orders included.
    #[instrument(skip(self))]
    pub async fn overview(&self, range: DateRange) -> Result<StatsOverview, ServiceError> {
        if let (Some(from), Some(to)) = (range.date_from, range.date_to) {
            if from > to {
                return Err(ServiceError::ValidationError(
                    "date_from must not be after date_to".to_string(),
                ));
            }
        }

        let mut order_query = Order::find().filter(order::Column::DeletedAt.is_null());
        if let Some(from) = range.date_from {
            let start = Utc.from_utc_datetime(&from.and_hms_opt(0, 0, 0).unwrap_or_default());
            order_query = order_query.filter(order::Column::PlacedAt.gte(start));
        }
        if let Some(end) = range.date_to.and_then(window_end) {
            order_query = order_query.filter(order::Column::PlacedAt.lt(end));
        }
        let orders = order_query.all(&*self.db).await?;

        let total_orders = orders.len() as u64;
        let mut by_currency: HashMap<String, CurrencyBreakdown> = HashMap::new();
        let mut paid_orders = 0u64;
        let mut order_ids = Vec::with_capacity(orders.len());
        for o in &orders {
            if o.payment_status == PaymentStatus::Paid {
                paid_orders += 1;
            }
            order_ids.push(o.id);
            let entry = by_currency
                .entry(o.currency.clone())
                .or_insert_with(|| CurrencyBreakdown {
                    currency: o.currency.clone(),
                    orders: 0,
                    revenue: Decimal::ZERO,
                });
            entry.orders += 1;
            entry.revenue += o.total_amount;
        }

        let top_products = self.top_products(&order_ids).await?;

        let mut revenue_by_currency: Vec<CurrencyBreakdown> = by_currency.into_values().collect();
        revenue_by_currency.sort_by(|a, b| b.revenue.cmp(&a.revenue));

        Ok(StatsOverview {
            date_from: range.date_from,
            date_to: range.date_to,
            total_orders,
            paid_orders,
            revenue_by_currency,
            top_products,
        })
    }

    /// Best-selling products by quantity across the given orders.
    async fn top_products(&self, order_ids: &[Uuid]) -> Result<Vec<TopProduct>, ServiceError> {
        if order_ids.is_empty() {
            return Ok(Vec::new());
        }

        let items = OrderItem::find()
            .filter(order_item::Column::OrderId.is_in(order_ids.iter().copied()))
            .all(&*self.db)
            .await?;

        let mut by_product: HashMap<Uuid, TopProduct> = HashMap::new();
        for item in items {
            let entry = by_product
                .entry(item.product_id)
                .or_insert_with(|| TopProduct {
                    product_id: item.product_id,
                    product_name: item.product_name.clone(),
                    total_quantity: 0,
                    total_revenue: Decimal::ZERO,
                });
            entry.total_quantity += i64::from(item.quantity);
            entry.total_revenue += item.line_total;
        }

        let mut ranked: Vec<TopProduct> = by_product.into_values().collect();
        ranked.sort_by(|a, b| {
            b.total_quantity
                .cmp(&a.total_quantity)
                .then(b.total_revenue.cmp(&a.total_revenue))
        });
        ranked.truncate(TOP_PRODUCTS_LIMIT);
        Ok(ranked)
    }
}

/// Upper bound for an inclusive end date: the following midnight, UTC.
/// `None` at the calendar boundary, where the window is left unbounded.
fn window_end(to: NaiveDate) -> Option<DateTime<Utc>> {
    let next = to.checked_add_days(Days::new(1))?;
    Some(Utc.from_utc_datetime(&next.and_hms_opt(0, 0, 0)?))
}

/// Optional reporting window, inclusive ISO-8601 dates
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct DateRange {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
}

/// Per-currency gross totals over every order in the window
#[derive(Debug, Clone, Serialize)]
pub struct CurrencyBreakdown {
    pub currency: String,
    pub orders: u64,
    pub revenue: Decimal,
}

/// Sales-ranked product line
#[derive(Debug, Clone, Serialize)]
pub struct TopProduct {
    pub product_id: Uuid,
    pub product_name: String,
    pub total_quantity: i64,
    pub total_revenue: Decimal,
}

/// Overview payload returned to staff
#[derive(Debug, Serialize)]
pub struct StatsOverview {
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub total_orders: u64,
    pub paid_orders: u64,
    pub revenue_by_currency: Vec<CurrencyBreakdown>,
    pub top_products: Vec<TopProduct>,
}
