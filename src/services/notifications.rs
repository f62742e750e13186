use crate::{
    entities::{order_item, Order, OrderItem, OrderItemModel, OrderModel},
    events::{Event, PostCommitHook},
};
use async_trait::async_trait;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Outbound mail transport. The default implementation only logs;
/// deployments plug in a real transport.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}

/// Mailer that writes messages to the log. Used in development and tests.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        info!(to, subject, body_len = body.len(), "email (log transport)");
        Ok(())
    }
}

/// Post-commit hook sending order confirmations and guest welcome mail.
///
/// Delivery is best effort: failures are logged by the event processor
/// and never surface to the customer.
pub struct EmailNotifier {
    db: Arc<DatabaseConnection>,
    mailer: Arc<dyn Mailer>,
    password_reset_url: String,
}

impl EmailNotifier {
    pub fn new(
        db: Arc<DatabaseConnection>,
        mailer: Arc<dyn Mailer>,
        password_reset_url: String,
    ) -> Self {
        Self {
            db,
            mailer,
            password_reset_url,
        }
    }

    async fn send_order_confirmation(&self, order_id: Uuid) -> anyhow::Result<()> {
        let order = Order::find_by_id(order_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| anyhow::anyhow!("order {order_id} not found"))?;
        let items = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await?;

        let subject = format!("Order confirmation #{}", short_ref(&order.id));
        let body = order_confirmation_body(&order, &items);
        self.mailer.send(&order.customer_email, &subject, &body).await
    }

    async fn send_welcome(&self, email: &str) -> anyhow::Result<()> {
        let body = welcome_body(email, &self.password_reset_url);
        self.mailer
            .send(email, "Welcome! Set a password for your account", &body)
            .await
    }
}

#[async_trait]
impl PostCommitHook for EmailNotifier {
    fn name(&self) -> &'static str {
        "email"
    }

    async fn handle(&self, event: &Event) -> anyhow::Result<()> {
        match event {
            Event::OrderPlaced(order_id) => self.send_order_confirmation(*order_id).await,
            Event::GuestAccountCreated { email, .. } => self.send_welcome(email).await,
            _ => Ok(()),
        }
    }
}

/// Short human-facing order reference derived from the id.
fn short_ref(id: &Uuid) -> String {
    id.simple().to_string()[..8].to_uppercase()
}

fn order_confirmation_body(order: &OrderModel, items: &[OrderItemModel]) -> String {
    let mut body = format!(
        "Hello {},\n\nThank you for your order. Here is what you bought:\n\n",
        order.shipping_full_name
    );
    for item in items {
        body.push_str(&format!(
            "  {} x{} — {} {}\n",
            item.product_name, item.quantity, item.line_total, order.currency
        ));
    }
    body.push_str(&format!(
        "\nSubtotal: {} {}\nShipping: {} {}\nTotal: {} {}\n\nShipping to: {}, {}, {} {}\n",
        order.subtotal_amount,
        order.currency,
        order.shipping_amount,
        order.currency,
        order.total_amount,
        order.currency,
        order.shipping_address,
        order.shipping_city,
        order.shipping_postcode,
        order.shipping_country,
    ));
    body
}

fn welcome_body(email: &str, reset_url: &str) -> String {
    format!(
        "An account for {email} was created during checkout.\n\
         To access your order history, set a password here: {reset_url}\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{OrderStatus, PaymentStatus};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn sample_order() -> OrderModel {
        OrderModel {
            id: Uuid::new_v4(),
            user_id: None,
            status: OrderStatus::Pending,
            payment_status: PaymentStatus::Pending,
            subtotal_amount: dec!(4990.00),
            shipping_amount: dec!(350.00),
            total_amount: dec!(5340.00),
            currency: "RUB".to_string(),
            customer_email: "buyer@example.com".to_string(),
            customer_phone: "+7 900 000-00-00".to_string(),
            shipping_full_name: "Ivan Petrov".to_string(),
            shipping_address: "Tverskaya 1".to_string(),
            shipping_city: "Moscow".to_string(),
            shipping_postcode: "125009".to_string(),
            shipping_country: "RU".to_string(),
            notes: String::new(),
            placed_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        }
    }

    #[test]
    fn confirmation_lists_lines_and_totals() {
        let order = sample_order();
        let items = vec![OrderItemModel {
            id: Uuid::new_v4(),
            order_id: order.id,
            product_id: Uuid::new_v4(),
            product_name: "Comfort Sneaker".to_string(),
            unit_price: dec!(4990.00),
            quantity: 1,
            line_total: dec!(4990.00),
        }];

        let body = order_confirmation_body(&order, &items);
        assert!(body.contains("Ivan Petrov"));
        assert!(body.contains("Comfort Sneaker x1"));
        assert!(body.contains("Total: 5340.00 RUB"));
    }

    #[test]
    fn welcome_includes_reset_url() {
        let body = welcome_body("buyer@example.com", "https://shop.example/reset");
        assert!(body.contains("buyer@example.com"));
        assert!(body.contains("https://shop.example/reset"));
    }

    #[test]
    fn short_ref_is_eight_upper_hex_chars() {
        let r = short_ref(&Uuid::new_v4());
        assert_eq!(r.len(), 8);
        assert!(r.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }
}
