use crate::{
    entities::{
        order, order_item, Order, OrderItem, OrderItemModel, OrderModel, OrderStatus, PaymentStatus,
    },
    errors::ServiceError,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Order retrieval and lifecycle after checkout.
///
/// Orders are append-mostly: lines never change, and the header only
/// moves through status updates and soft deletion.
#[derive(Clone)]
pub struct OrderService {
    db: Arc<DatabaseConnection>,
}

impl OrderService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn get(&self, order_id: Uuid) -> Result<OrderView, ServiceError> {
        let order = Order::find_by_id(order_id)
            .filter(order::Column::DeletedAt.is_null())
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {order_id} not found")))?;
        self.with_items(order).await
    }

    /// Staff lookup that also reaches soft-deleted orders.
    pub async fn get_any(&self, order_id: Uuid) -> Result<OrderView, ServiceError> {
        let order = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {order_id} not found")))?;
        self.with_items(order).await
    }

    async fn with_items(&self, order: OrderModel) -> Result<OrderView, ServiceError> {
        let items = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order.id))
            .all(&*self.db)
            .await?;
        Ok(OrderView { order, items })
    }

    /// List orders, newest first. `user_id = None` lists every order and
    /// is reserved for staff callers.
    pub async fn list(
        &self,
        user_id: Option<Uuid>,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<OrderModel>, u64), ServiceError> {
        let mut query = Order::find()
            .filter(order::Column::DeletedAt.is_null())
            .order_by_desc(order::Column::PlacedAt);
        if let Some(id) = user_id {
            query = query.filter(order::Column::UserId.eq(id));
        }

        let paginator = query.paginate(&*self.db, per_page.max(1));
        let total = paginator.num_items().await?;
        let data = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((data, total))
    }

    /// Staff status update. Soft-deleted orders must be restored first.
    #[instrument(skip(self))]
    pub async fn update_status(
        &self,
        order_id: Uuid,
        input: UpdateOrderStatusInput,
    ) -> Result<OrderModel, ServiceError> {
        let existing = Order::find_by_id(order_id)
            .filter(order::Column::DeletedAt.is_null())
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {order_id} not found")))?;

        if input.status.is_none() && input.payment_status.is_none() {
            return Err(ServiceError::ValidationError(
                "nothing to update".to_string(),
            ));
        }

        let mut active: order::ActiveModel = existing.into();
        if let Some(status) = input.status {
            active.status = Set(status);
        }
        if let Some(payment_status) = input.payment_status {
            active.payment_status = Set(payment_status);
        }
        active.updated_at = Set(Utc::now());

        let updated = active.update(&*self.db).await?;
        info!(order_id = %order_id, status = ?updated.status, "order status updated");
        Ok(updated)
    }

    /// Hide the order. Its items stay put so statistics and verified
    /// purchases computed from restored orders remain correct.
    #[instrument(skip(self))]
    pub async fn soft_delete(&self, order_id: Uuid) -> Result<OrderModel, ServiceError> {
        let existing = Order::find_by_id(order_id)
            .filter(order::Column::DeletedAt.is_null())
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Order {order_id} not found")))?;

        let mut active: order::ActiveModel = existing.into();
        active.deleted_at = Set(Some(Utc::now()));
        active.updated_at = Set(Utc::now());
        Ok(active.update(&*self.db).await?)
    }

    #[instrument(skip(self))]
    pub async fn restore(&self, order_id: Uuid) -> Result<OrderModel, ServiceError> {
        let existing = Order::find_by_id(order_id)
            .filter(order::Column::DeletedAt.is_not_null())
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Deleted order {order_id} not found"))
            })?;

        let mut active: order::ActiveModel = existing.into();
        active.deleted_at = Set(None);
        active.updated_at = Set(Utc::now());
        Ok(active.update(&*self.db).await?)
    }
}

/// Staff payload for moving an order through its lifecycle
#[derive(Debug, Default, Deserialize)]
pub struct UpdateOrderStatusInput {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
}

/// Order with its frozen lines
#[derive(Debug, Serialize)]
pub struct OrderView {
    pub order: OrderModel,
    pub items: Vec<OrderItemModel>,
}
