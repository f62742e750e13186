use crate::{
    entities::{
        category, order_item, product, product_image, product_review, Category, CategoryModel,
        ModerationStatus, OrderItem, Product, ProductImage, ProductImageModel, ProductModel,
        ProductReview,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;

/// Derive a URL slug from a human-readable name: lowercase ASCII
/// alphanumerics with single hyphens between words.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_hyphen = true;
    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.push(ch.to_ascii_lowercase());
            last_hyphen = false;
        } else if !last_hyphen {
            slug.push('-');
            last_hyphen = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Category management: staff-write, public read.
#[derive(Clone)]
pub struct CategoryService {
    db: Arc<DatabaseConnection>,
}

impl CategoryService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self))]
    pub async fn create(&self, input: CreateCategoryInput) -> Result<CategoryModel, ServiceError> {
        let slug = match input.slug {
            Some(s) if !s.is_empty() => s,
            _ => slugify(&input.name),
        };
        if slug.is_empty() {
            return Err(ServiceError::ValidationError(
                "category name does not produce a usable slug".to_string(),
            ));
        }

        let existing = Category::find()
            .filter(category::Column::Slug.eq(slug.clone()))
            .one(&*self.db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(format!(
                "category slug '{slug}' already exists"
            )));
        }

        let now = Utc::now();
        let model = category::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(input.name),
            slug: Set(slug),
            description: Set(input.description.unwrap_or_default()),
            meta_title: Set(input.meta_title),
            meta_description: Set(input.meta_description),
            is_active: Set(input.is_active.unwrap_or(true)),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let created = model.insert(&*self.db).await?;
        info!(category = %created.slug, "created category");
        Ok(created)
    }

    pub async fn get_by_slug(&self, slug: &str) -> Result<CategoryModel, ServiceError> {
        Category::find()
            .filter(category::Column::Slug.eq(slug))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Category '{slug}' not found")))
    }

    pub async fn list(&self, include_inactive: bool) -> Result<Vec<CategoryModel>, ServiceError> {
        let mut query = Category::find().order_by_asc(category::Column::Name);
        if !include_inactive {
            query = query.filter(category::Column::IsActive.eq(true));
        }
        Ok(query.all(&*self.db).await?)
    }

    #[instrument(skip(self))]
    pub async fn update(
        &self,
        slug: &str,
        input: UpdateCategoryInput,
    ) -> Result<CategoryModel, ServiceError> {
        let existing = self.get_by_slug(slug).await?;
        let mut active: category::ActiveModel = existing.into();

        if let Some(name) = input.name {
            active.name = Set(name);
        }
        if let Some(description) = input.description {
            active.description = Set(description);
        }
        if let Some(meta_title) = input.meta_title {
            active.meta_title = Set(Some(meta_title));
        }
        if let Some(meta_description) = input.meta_description {
            active.meta_description = Set(Some(meta_description));
        }
        if let Some(is_active) = input.is_active {
            active.is_active = Set(is_active);
        }
        active.updated_at = Set(Utc::now());

        Ok(active.update(&*self.db).await?)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, slug: &str) -> Result<(), ServiceError> {
        let existing = self.get_by_slug(slug).await?;

        let product_count = Product::find()
            .filter(product::Column::CategoryId.eq(existing.id))
            .count(&*self.db)
            .await?;
        if product_count > 0 {
            return Err(ServiceError::Conflict(format!(
                "category '{slug}' still has {product_count} products"
            )));
        }

        Category::delete_by_id(existing.id).exec(&*self.db).await?;
        Ok(())
    }
}

/// Product catalog: CRUD with slug generation, soft-delete lifecycle and
/// read-side rating aggregates.
#[derive(Clone)]
pub struct ProductService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    default_currency: String,
}

impl ProductService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        default_currency: String,
    ) -> Self {
        Self {
            db,
            event_sender,
            default_currency,
        }
    }

    /// Pick a slug unique among non-deleted products, suffixing `-2`,
    /// `-3`, ... on collision.
    async fn unique_slug(&self, base: &str, exclude: Option<Uuid>) -> Result<String, ServiceError> {
        let base = if base.is_empty() { "product" } else { base };
        let mut candidate = base.to_string();
        let mut counter = 1u32;
        loop {
            let mut query = Product::find()
                .filter(product::Column::Slug.eq(candidate.clone()))
                .filter(product::Column::DeletedAt.is_null());
            if let Some(id) = exclude {
                query = query.filter(product::Column::Id.ne(id));
            }
            if query.one(&*self.db).await?.is_none() {
                return Ok(candidate);
            }
            counter += 1;
            candidate = format!("{base}-{counter}");
        }
    }

    #[instrument(skip(self, input), fields(sku = %input.sku))]
    pub async fn create(&self, input: CreateProductInput) -> Result<ProductModel, ServiceError> {
        if input.price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "price must not be negative".to_string(),
            ));
        }
        if input.stock < 0 {
            return Err(ServiceError::ValidationError(
                "stock must not be negative".to_string(),
            ));
        }

        let category = Category::find_by_id(input.category_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| {
                ServiceError::ValidationError(format!("Category {} not found", input.category_id))
            })?;

        let duplicate_sku = Product::find()
            .filter(product::Column::Sku.eq(input.sku.clone()))
            .one(&*self.db)
            .await?;
        if duplicate_sku.is_some() {
            return Err(ServiceError::Conflict(format!(
                "sku '{}' already exists",
                input.sku
            )));
        }

        let slug = self.unique_slug(&slugify(&input.name), None).await?;
        let now = Utc::now();
        let model = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            category_id: Set(category.id),
            name: Set(input.name),
            slug: Set(slug),
            sku: Set(input.sku),
            short_description: Set(input.short_description.unwrap_or_default()),
            description: Set(input.description.unwrap_or_default()),
            meta_title: Set(input.meta_title),
            meta_description: Set(input.meta_description),
            meta_keywords: Set(input.meta_keywords),
            price: Set(input.price.round_dp(2)),
            currency: Set(input
                .currency
                .unwrap_or_else(|| self.default_currency.clone())),
            stock: Set(input.stock),
            is_active: Set(input.is_active.unwrap_or(true)),
            deleted_at: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        };

        let created = model.insert(&*self.db).await?;
        self.sync_search(&created).await;
        info!(product = %created.slug, "created product");
        Ok(created)
    }

    /// Fetch a non-deleted product by slug.
    pub async fn get_by_slug(&self, slug: &str) -> Result<ProductModel, ServiceError> {
        Product::find()
            .filter(product::Column::Slug.eq(slug))
            .filter(product::Column::DeletedAt.is_null())
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product '{slug}' not found")))
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<ProductModel, ServiceError> {
        Product::find_by_id(id)
            .filter(product::Column::DeletedAt.is_null())
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {id} not found")))
    }

    pub async fn list(
        &self,
        filters: ProductFilters,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<ProductModel>, u64), ServiceError> {
        let mut query = Product::find().order_by_asc(product::Column::Name);

        if !filters.include_deleted {
            query = query.filter(product::Column::DeletedAt.is_null());
        }
        if !filters.include_inactive {
            query = query.filter(product::Column::IsActive.eq(true));
        }
        if let Some(slug) = filters.category {
            let category = Category::find()
                .filter(category::Column::Slug.eq(slug))
                .one(&*self.db)
                .await?;
            match category {
                Some(c) => query = query.filter(product::Column::CategoryId.eq(c.id)),
                None => return Ok((Vec::new(), 0)),
            }
        }
        if let Some(min) = filters.min_price {
            query = query.filter(product::Column::Price.gte(min));
        }
        if let Some(max) = filters.max_price {
            query = query.filter(product::Column::Price.lte(max));
        }
        if let Some(in_stock) = filters.in_stock {
            query = if in_stock {
                query.filter(product::Column::Stock.gt(0))
            } else {
                query.filter(product::Column::Stock.eq(0))
            };
        }

        let paginator = query.paginate(&*self.db, per_page.max(1));
        let total = paginator.num_items().await?;
        let data = paginator.fetch_page(page.saturating_sub(1)).await?;
        Ok((data, total))
    }

    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        slug: &str,
        input: UpdateProductInput,
    ) -> Result<ProductModel, ServiceError> {
        let existing = self.get_by_slug(slug).await?;
        let id = existing.id;
        let mut active: product::ActiveModel = existing.into();

        if let Some(name) = input.name {
            let new_slug = self.unique_slug(&slugify(&name), Some(id)).await?;
            active.slug = Set(new_slug);
            active.name = Set(name);
        }
        if let Some(category_id) = input.category_id {
            Category::find_by_id(category_id)
                .one(&*self.db)
                .await?
                .ok_or_else(|| {
                    ServiceError::ValidationError(format!("Category {category_id} not found"))
                })?;
            active.category_id = Set(category_id);
        }
        if let Some(short_description) = input.short_description {
            active.short_description = Set(short_description);
        }
        if let Some(description) = input.description {
            active.description = Set(description);
        }
        if let Some(meta_title) = input.meta_title {
            active.meta_title = Set(Some(meta_title));
        }
        if let Some(meta_description) = input.meta_description {
            active.meta_description = Set(Some(meta_description));
        }
        if let Some(meta_keywords) = input.meta_keywords {
            active.meta_keywords = Set(Some(meta_keywords));
        }
        if let Some(currency) = input.currency {
            active.currency = Set(currency);
        }
        if let Some(price) = input.price {
            if price < Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "price must not be negative".to_string(),
                ));
            }
            active.price = Set(price.round_dp(2));
        }
        if let Some(stock) = input.stock {
            if stock < 0 {
                return Err(ServiceError::ValidationError(
                    "stock must not be negative".to_string(),
                ));
            }
            active.stock = Set(stock);
        }
        if let Some(is_active) = input.is_active {
            active.is_active = Set(is_active);
        }
        active.updated_at = Set(Utc::now());

        let updated = active.update(&*self.db).await?;
        self.sync_search(&updated).await;
        Ok(updated)
    }

    /// Hide the product from default queries. Historical order items keep
    /// referencing it untouched.
    #[instrument(skip(self))]
    pub async fn soft_delete(&self, slug: &str) -> Result<ProductModel, ServiceError> {
        let existing = self.get_by_slug(slug).await?;
        let id = existing.id;
        let mut active: product::ActiveModel = existing.into();
        active.deleted_at = Set(Some(Utc::now()));
        active.updated_at = Set(Utc::now());
        let updated = active.update(&*self.db).await?;

        self.event_sender.send_or_log(Event::ProductRemoved(id)).await;
        info!(product = %slug, "soft-deleted product");
        Ok(updated)
    }

    /// Reverse a soft delete. The product reappears in default queries.
    #[instrument(skip(self))]
    pub async fn restore(&self, slug: &str) -> Result<ProductModel, ServiceError> {
        let existing = Product::find()
            .filter(product::Column::Slug.eq(slug))
            .filter(product::Column::DeletedAt.is_not_null())
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Deleted product '{slug}' not found")))?;

        let mut active: product::ActiveModel = existing.into();
        active.deleted_at = Set(None);
        active.updated_at = Set(Utc::now());
        let restored = active.update(&*self.db).await?;

        self.sync_search(&restored).await;
        info!(product = %slug, "restored product");
        Ok(restored)
    }

    /// Irreversible removal. Blocked while any order item references the
    /// product; soft delete is the path for products with sales history.
    #[instrument(skip(self))]
    pub async fn hard_delete(&self, slug: &str) -> Result<(), ServiceError> {
        let existing = Product::find()
            .filter(product::Column::Slug.eq(slug))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product '{slug}' not found")))?;

        let references = OrderItem::find()
            .filter(order_item::Column::ProductId.eq(existing.id))
            .count(&*self.db)
            .await?;
        if references > 0 {
            return Err(ServiceError::Conflict(format!(
                "product '{slug}' is referenced by {references} order items"
            )));
        }

        let id = existing.id;
        Product::delete_by_id(id).exec(&*self.db).await?;
        self.event_sender.send_or_log(Event::ProductRemoved(id)).await;
        Ok(())
    }

    /// Admin listing that also surfaces soft-deleted rows.
    pub async fn list_all(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<ProductModel>, u64), ServiceError> {
        self.list(
            ProductFilters {
                include_deleted: true,
                include_inactive: true,
                ..Default::default()
            },
            page,
            per_page,
        )
        .await
    }

    pub async fn add_image(
        &self,
        slug: &str,
        input: AddImageInput,
    ) -> Result<ProductImageModel, ServiceError> {
        let product = self.get_by_slug(slug).await?;
        let model = product_image::ActiveModel {
            id: Set(Uuid::new_v4()),
            product_id: Set(product.id),
            url: Set(input.url),
            alt_text: Set(input.alt_text.unwrap_or_default()),
            is_main: Set(input.is_main.unwrap_or(false)),
            created_at: Set(Utc::now()),
        };
        let image = model.insert(&*self.db).await?;
        self.sync_search(&product).await;
        Ok(image)
    }

    pub async fn remove_image(&self, slug: &str, image_id: Uuid) -> Result<(), ServiceError> {
        let product = self.get_by_slug(slug).await?;
        let image = ProductImage::find_by_id(image_id)
            .filter(product_image::Column::ProductId.eq(product.id))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Image {image_id} not found")))?;
        ProductImage::delete_by_id(image.id).exec(&*self.db).await?;
        self.sync_search(&product).await;
        Ok(())
    }

    pub async fn images(&self, product_id: Uuid) -> Result<Vec<ProductImageModel>, ServiceError> {
        Ok(ProductImage::find()
            .filter(product_image::Column::ProductId.eq(product_id))
            .all(&*self.db)
            .await?)
    }

    /// Rating aggregate over approved, non-deleted reviews only.
    /// Computed on read; pending and rejected reviews never contribute.
    pub async fn rating_summary(&self, product_id: Uuid) -> Result<RatingSummary, ServiceError> {
        let ratings: Vec<i32> = ProductReview::find()
            .select_only()
            .column(product_review::Column::Rating)
            .filter(product_review::Column::ProductId.eq(product_id))
            .filter(product_review::Column::ModerationStatus.eq(ModerationStatus::Approved))
            .filter(product_review::Column::DeletedAt.is_null())
            .into_tuple()
            .all(&*self.db)
            .await?;

        let reviews_count = ratings.len() as u64;
        let average_rating = if ratings.is_empty() {
            None
        } else {
            Some(ratings.iter().map(|r| *r as f64).sum::<f64>() / reviews_count as f64)
        };

        Ok(RatingSummary {
            average_rating,
            reviews_count,
        })
    }

    /// Emit the search-index event matching the product's visibility:
    /// active products are upserted, everything else is removed.
    async fn sync_search(&self, product: &ProductModel) {
        let event = if product.is_active && product.deleted_at.is_none() {
            Event::ProductUpserted(product.id)
        } else {
            Event::ProductRemoved(product.id)
        };
        self.event_sender.send_or_log(event).await;
    }
}

/// Input for creating a category
#[derive(Debug, Deserialize)]
pub struct CreateCategoryInput {
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub is_active: Option<bool>,
}

/// Input for updating a category
#[derive(Debug, Default, Deserialize)]
pub struct UpdateCategoryInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub is_active: Option<bool>,
}

/// Input for creating a product
#[derive(Debug, Deserialize)]
pub struct CreateProductInput {
    pub category_id: Uuid,
    pub name: String,
    pub sku: String,
    pub short_description: Option<String>,
    pub description: Option<String>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub meta_keywords: Option<String>,
    pub price: Decimal,
    pub currency: Option<String>,
    pub stock: i32,
    pub is_active: Option<bool>,
}

/// Input for updating a product
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProductInput {
    pub category_id: Option<Uuid>,
    pub name: Option<String>,
    pub short_description: Option<String>,
    pub description: Option<String>,
    pub meta_title: Option<String>,
    pub meta_description: Option<String>,
    pub meta_keywords: Option<String>,
    pub price: Option<Decimal>,
    pub currency: Option<String>,
    pub stock: Option<i32>,
    pub is_active: Option<bool>,
}

/// Input for attaching a product image
#[derive(Debug, Deserialize)]
pub struct AddImageInput {
    pub url: String,
    pub alt_text: Option<String>,
    pub is_main: Option<bool>,
}

/// Catalog listing filters
#[derive(Debug, Default, Deserialize)]
pub struct ProductFilters {
    pub category: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub in_stock: Option<bool>,
    #[serde(skip)]
    pub include_inactive: bool,
    #[serde(skip)]
    pub include_deleted: bool,
}

/// Read-side review aggregate for a product
#[derive(Debug, Serialize)]
pub struct RatingSummary {
    pub average_rating: Option<f64>,
    pub reviews_count: u64,
}
