use crate::{
    entities::{
        cart_item, order, order_item, user, Cart, CartItem, OrderItem, OrderItemModel, OrderModel,
        OrderStatus, PaymentStatus, Product, User,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    DbBackend, EntityTrait, QueryFilter, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

/// Converts a cart into a durable order in a single transaction.
///
/// The order header and its lines commit atomically together with the
/// deletion of the cart, so a cart can be checked out at most once and an
/// order can never exist half-written. Product names and prices are
/// copied into the order lines inside the transaction; the lines are
/// immutable from then on.
#[derive(Clone)]
pub struct CheckoutService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl CheckoutService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    /// Place an order from a cart.
    ///
    /// `user_id` is the authenticated caller, if any. Anonymous checkout
    /// resolves the shipping email against existing accounts and creates
    /// a passwordless guest account when none matches.
    #[instrument(skip(self, input), fields(cart_id = %input.cart_id))]
    pub async fn create_order_from_cart(
        &self,
        user_id: Option<Uuid>,
        input: CheckoutInput,
    ) -> Result<CheckoutOutcome, ServiceError> {
        input.validate()?;

        let shipping_amount = input.shipping_amount.unwrap_or(Decimal::ZERO);
        if shipping_amount < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "shipping amount must not be negative".to_string(),
            ));
        }

        let txn = self.db.begin().await?;

        // Serialize concurrent checkouts of the same cart. SQLite has a
        // single writer and rejects FOR UPDATE, so the row lock is
        // Postgres-only.
        let mut cart_query = Cart::find_by_id(input.cart_id);
        if self.db.get_database_backend() == DbBackend::Postgres {
            cart_query = cart_query.lock_exclusive();
        }
        let cart = cart_query.one(&txn).await?.ok_or_else(|| {
            ServiceError::InvalidOperation(format!(
                "cart {} not found or already checked out",
                input.cart_id
            ))
        })?;

        let lines = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .find_also_related(Product)
            .all(&txn)
            .await?;
        if lines.is_empty() {
            return Err(ServiceError::ValidationError(
                "cannot check out an empty cart".to_string(),
            ));
        }

        let mut currency: Option<String> = None;
        let mut snapshots = Vec::with_capacity(lines.len());
        let mut subtotal = Decimal::ZERO;
        for (item, maybe_product) in lines {
            let product = maybe_product.ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "cart item {} references missing product",
                    item.id
                ))
            })?;
            if !product.is_active || product.deleted_at.is_some() {
                return Err(ServiceError::ValidationError(format!(
                    "product '{}' is no longer available",
                    product.slug
                )));
            }
            match &currency {
                None => currency = Some(product.currency.clone()),
                Some(c) if *c != product.currency => {
                    return Err(ServiceError::ValidationError(
                        "cart mixes products in different currencies".to_string(),
                    ));
                }
                Some(_) => {}
            }

            let line_total = (product.price * Decimal::from(item.quantity)).round_dp(2);
            subtotal += line_total;
            snapshots.push((product, item.quantity, line_total));
        }
        // Non-empty cart, so set above.
        let currency = currency.ok_or_else(|| {
            ServiceError::InternalError("no currency resolved for order".to_string())
        })?;

        let (order_user_id, guest) = match user_id {
            Some(id) => (Some(id), None),
            None => {
                let (id, guest) = self.resolve_guest(&txn, &input).await?;
                (Some(id), guest)
            }
        };

        let subtotal = subtotal.round_dp(2);
        let total = (subtotal + shipping_amount).round_dp(2);
        let now = Utc::now();
        let order_id = Uuid::new_v4();

        let header = order::ActiveModel {
            id: Set(order_id),
            user_id: Set(order_user_id),
            status: Set(OrderStatus::Pending),
            payment_status: Set(PaymentStatus::Pending),
            subtotal_amount: Set(subtotal),
            shipping_amount: Set(shipping_amount.round_dp(2)),
            total_amount: Set(total),
            currency: Set(currency),
            customer_email: Set(input.email.to_lowercase()),
            customer_phone: Set(input.phone.clone()),
            shipping_full_name: Set(input.full_name.clone()),
            shipping_address: Set(input.address.clone()),
            shipping_city: Set(input.city.clone()),
            shipping_postcode: Set(input.postcode.clone()),
            shipping_country: Set(input.country.clone()),
            notes: Set(input.notes.clone().unwrap_or_default()),
            placed_at: Set(now),
            updated_at: Set(now),
            deleted_at: Set(None),
        };
        let order = header.insert(&txn).await?;

        let item_models: Vec<order_item::ActiveModel> = snapshots
            .iter()
            .map(|(product, quantity, line_total)| order_item::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                product_id: Set(product.id),
                product_name: Set(product.name.clone()),
                unit_price: Set(product.price),
                quantity: Set(*quantity),
                line_total: Set(*line_total),
            })
            .collect();
        OrderItem::insert_many(item_models).exec(&txn).await?;

        // The cart is consumed; a second checkout of the same id fails.
        CartItem::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .exec(&txn)
            .await?;
        Cart::delete_by_id(cart.id).exec(&txn).await?;

        txn.commit().await?;

        let items = OrderItem::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .all(&*self.db)
            .await?;

        if let Some((guest_id, email)) = &guest {
            self.event_sender
                .send_or_log(Event::GuestAccountCreated {
                    user_id: *guest_id,
                    email: email.clone(),
                })
                .await;
        }
        self.event_sender.send_or_log(Event::OrderPlaced(order_id)).await;

        info!(
            order_id = %order_id,
            total = %order.total_amount,
            guest = guest.is_some(),
            "order placed"
        );

        Ok(CheckoutOutcome {
            requires_account_activation: guest.is_some(),
            activation_email: guest.map(|(_, email)| email),
            order,
            items,
        })
    }

    /// Attach the order to the account matching the shipping email, or
    /// create a passwordless guest account to hang it on.
    async fn resolve_guest(
        &self,
        txn: &DatabaseTransaction,
        input: &CheckoutInput,
    ) -> Result<(Uuid, Option<(Uuid, String)>), ServiceError> {
        let email = input.email.to_lowercase();

        let existing = User::find()
            .filter(user::Column::Email.eq(email.clone()))
            .one(txn)
            .await?;
        if let Some(account) = existing {
            return Ok((account.id, None));
        }

        let now = Utc::now();
        let id = Uuid::new_v4();
        let guest = user::ActiveModel {
            id: Set(id),
            email: Set(email.clone()),
            password_hash: Set(None),
            full_name: Set(input.full_name.clone()),
            is_staff: Set(false),
            is_active: Set(true),
            requires_account_activation: Set(true),
            created_at: Set(now),
            updated_at: Set(now),
        };
        guest.insert(txn).await?;

        warn!(email = %email, "created guest account during checkout");
        Ok((id, Some((id, email))))
    }

}

/// Checkout payload: shipping contact plus an optional shipping charge.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CheckoutInput {
    pub cart_id: Uuid,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, max = 32))]
    pub phone: String,
    #[validate(length(min = 1, max = 255))]
    pub full_name: String,
    #[validate(length(min = 1, max = 500))]
    pub address: String,
    #[validate(length(min = 1, max = 100))]
    pub city: String,
    #[validate(length(min = 1, max = 20))]
    pub postcode: String,
    #[validate(length(min = 1, max = 100))]
    pub country: String,
    pub notes: Option<String>,
    pub shipping_amount: Option<Decimal>,
}

/// Result of a successful checkout.
#[derive(Debug, Serialize)]
pub struct CheckoutOutcome {
    pub order: OrderModel,
    pub items: Vec<OrderItemModel>,
    /// True when a guest account was created for the shipping email; the
    /// client should prompt the customer to set a password.
    pub requires_account_activation: bool,
    /// Email the activation prompt was sent to, when a guest account was
    /// created.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activation_email: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn valid_input() -> CheckoutInput {
        CheckoutInput {
            cart_id: Uuid::new_v4(),
            email: "buyer@example.com".to_string(),
            phone: "+7 900 000-00-00".to_string(),
            full_name: "Ivan Petrov".to_string(),
            address: "Tverskaya 1".to_string(),
            city: "Moscow".to_string(),
            postcode: "125009".to_string(),
            country: "RU".to_string(),
            notes: None,
            shipping_amount: None,
        }
    }

    #[test]
    fn checkout_input_validates() {
        assert!(valid_input().validate().is_ok());
    }

    #[test]
    fn checkout_input_rejects_bad_email() {
        let mut input = valid_input();
        input.email = "not-an-email".to_string();
        assert!(input.validate().is_err());
    }

    #[test]
    fn checkout_input_rejects_empty_address() {
        let mut input = valid_input();
        input.address = String::new();
        assert!(input.validate().is_err());
    }

    #[test]
    fn totals_round_half_even_to_cents() {
        let subtotal = dec!(4990.005);
        assert_eq!(subtotal.round_dp(2), dec!(4990.00));
        let total = (dec!(4990.00) + dec!(350)).round_dp(2);
        assert_eq!(total, dec!(5340.00));
    }
}
