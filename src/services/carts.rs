use crate::{
    entities::{cart, cart_item, product, Cart, CartItem, CartModel, Product, ProductModel},
    errors::ServiceError,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

/// Anonymous shopping carts.
///
/// Carts store only product references and quantities. Prices are read
/// from the catalog at display time and frozen only at checkout, so a cart
/// created before a price change always shows the current price.
#[derive(Clone)]
pub struct CartService {
    db: Arc<DatabaseConnection>,
}

impl CartService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn create_cart(&self, user_id: Option<Uuid>) -> Result<CartModel, ServiceError> {
        let now = Utc::now();
        let model = cart::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(user_id),
            created_at: Set(now),
            updated_at: Set(now),
        };
        let created = model.insert(&*self.db).await?;
        info!(cart_id = %created.id, "created cart");
        Ok(created)
    }

    async fn find_cart(&self, cart_id: Uuid) -> Result<CartModel, ServiceError> {
        Cart::find_by_id(cart_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Cart {cart_id} not found")))
    }

    /// Cart with its lines priced at current catalog values.
    ///
    /// Lines whose product has been soft-deleted or deactivated since it
    /// was added are surfaced with `available = false` and excluded from
    /// the subtotal; checkout rejects them outright.
    #[instrument(skip(self))]
    pub async fn get_cart(&self, cart_id: Uuid) -> Result<CartView, ServiceError> {
        let cart = self.find_cart(cart_id).await?;

        let rows = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart_id))
            .find_also_related(Product)
            .all(&*self.db)
            .await?;

        let mut items = Vec::with_capacity(rows.len());
        let mut subtotal = Decimal::ZERO;
        for (item, maybe_product) in rows {
            let product = maybe_product.ok_or_else(|| {
                ServiceError::InternalError(format!(
                    "cart item {} references missing product",
                    item.id
                ))
            })?;
            let available = product.is_active && product.deleted_at.is_none();
            let line_total = (product.price * Decimal::from(item.quantity)).round_dp(2);
            if available {
                subtotal += line_total;
            }
            items.push(CartItemView {
                item_id: item.id,
                product_id: product.id,
                slug: product.slug,
                name: product.name,
                unit_price: product.price,
                currency: product.currency,
                quantity: item.quantity,
                line_total,
                available,
            });
        }

        Ok(CartView {
            id: cart.id,
            user_id: cart.user_id,
            items,
            subtotal: subtotal.round_dp(2),
            created_at: cart.created_at,
            updated_at: cart.updated_at,
        })
    }

    /// Add a product to the cart, merging into the existing line when the
    /// product is already present.
    #[instrument(skip(self, input), fields(product_id = %input.product_id))]
    pub async fn add_item(
        &self,
        cart_id: Uuid,
        input: AddItemInput,
    ) -> Result<CartView, ServiceError> {
        input.validate()?;
        let cart = self.find_cart(cart_id).await?;
        let product = self.purchasable_product(input.product_id).await?;

        let existing = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ProductId.eq(product.id))
            .one(&*self.db)
            .await?;

        let now = Utc::now();
        match existing {
            Some(line) => {
                let quantity = line.quantity + input.quantity;
                let mut active: cart_item::ActiveModel = line.into();
                active.quantity = Set(quantity);
                active.updated_at = Set(now);
                active.update(&*self.db).await?;
            }
            None => {
                let model = cart_item::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    cart_id: Set(cart.id),
                    product_id: Set(product.id),
                    quantity: Set(input.quantity),
                    created_at: Set(now),
                    updated_at: Set(now),
                };
                model.insert(&*self.db).await?;
            }
        }

        self.touch(cart).await?;
        self.get_cart(cart_id).await
    }

    /// Set a line's quantity. Zero or negative removes the line.
    #[instrument(skip(self))]
    pub async fn update_item(
        &self,
        cart_id: Uuid,
        product_id: Uuid,
        quantity: i32,
    ) -> Result<CartView, ServiceError> {
        let cart = self.find_cart(cart_id).await?;
        let line = CartItem::find()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .filter(cart_item::Column::ProductId.eq(product_id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Product {product_id} is not in cart {cart_id}"))
            })?;

        if quantity <= 0 {
            line.delete(&*self.db).await?;
        } else {
            let mut active: cart_item::ActiveModel = line.into();
            active.quantity = Set(quantity);
            active.updated_at = Set(Utc::now());
            active.update(&*self.db).await?;
        }

        self.touch(cart).await?;
        self.get_cart(cart_id).await
    }

    #[instrument(skip(self))]
    pub async fn remove_item(
        &self,
        cart_id: Uuid,
        product_id: Uuid,
    ) -> Result<CartView, ServiceError> {
        self.update_item(cart_id, product_id, 0).await
    }

    #[instrument(skip(self))]
    pub async fn delete_cart(&self, cart_id: Uuid) -> Result<(), ServiceError> {
        let cart = self.find_cart(cart_id).await?;
        CartItem::delete_many()
            .filter(cart_item::Column::CartId.eq(cart.id))
            .exec(&*self.db)
            .await?;
        cart.delete(&*self.db).await?;
        Ok(())
    }

    async fn purchasable_product(&self, product_id: Uuid) -> Result<ProductModel, ServiceError> {
        let product = Product::find_by_id(product_id)
            .filter(product::Column::DeletedAt.is_null())
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {product_id} not found")))?;
        if !product.is_active {
            return Err(ServiceError::ValidationError(format!(
                "product '{}' is not available for purchase",
                product.slug
            )));
        }
        Ok(product)
    }

    async fn touch(&self, cart: CartModel) -> Result<(), ServiceError> {
        let mut active: cart::ActiveModel = cart.into();
        active.updated_at = Set(Utc::now());
        active.update(&*self.db).await?;
        Ok(())
    }
}

/// Input for adding a product to a cart
#[derive(Debug, Deserialize, Validate)]
pub struct AddItemInput {
    pub product_id: Uuid,
    #[validate(range(min = 1, max = 999))]
    pub quantity: i32,
}

/// Cart line priced at current catalog values
#[derive(Debug, Serialize)]
pub struct CartItemView {
    pub item_id: Uuid,
    pub product_id: Uuid,
    pub slug: String,
    pub name: String,
    pub unit_price: Decimal,
    pub currency: String,
    pub quantity: i32,
    pub line_total: Decimal,
    pub available: bool,
}

/// Cart as returned to clients
#[derive(Debug, Serialize)]
pub struct CartView {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub items: Vec<CartItemView>,
    pub subtotal: Decimal,
    pub created_at: chrono::DateTime<Utc>,
    pub updated_at: chrono::DateTime<Utc>,
}
