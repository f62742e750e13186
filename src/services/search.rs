use crate::{
    entities::{Category, Product, ProductModel},
    events::{Event, PostCommitHook},
};
use async_trait::async_trait;
use rust_decimal::Decimal;
use sea_orm::{DatabaseConnection, EntityTrait, ModelTrait};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Flattened product document pushed to the search index.
#[derive(Debug, Clone, Serialize)]
pub struct SearchRecord {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub sku: String,
    pub short_description: String,
    pub category: Option<String>,
    pub price: Decimal,
    pub currency: String,
    pub in_stock: bool,
}

impl SearchRecord {
    pub fn from_product(product: &ProductModel, category_name: Option<String>) -> Self {
        Self {
            id: product.id,
            name: product.name.clone(),
            slug: product.slug.clone(),
            sku: product.sku.clone(),
            short_description: product.short_description.clone(),
            category: category_name,
            price: product.price,
            currency: product.currency.clone(),
            in_stock: product.stock > 0,
        }
    }
}

/// Search index transport. The default implementation only logs;
/// deployments plug in a hosted search provider.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn upsert(&self, record: &SearchRecord) -> anyhow::Result<()>;
    async fn remove(&self, product_id: Uuid) -> anyhow::Result<()>;
}

/// Backend that writes index operations to the log.
pub struct LogSearchBackend;

#[async_trait]
impl SearchBackend for LogSearchBackend {
    async fn upsert(&self, record: &SearchRecord) -> anyhow::Result<()> {
        info!(product = %record.slug, "search upsert (log backend)");
        Ok(())
    }

    async fn remove(&self, product_id: Uuid) -> anyhow::Result<()> {
        info!(%product_id, "search remove (log backend)");
        Ok(())
    }
}

/// Post-commit hook keeping the search index in step with the catalog.
///
/// Upserted products that turn out hidden by the time the event is
/// processed are removed instead, so the index never advertises an
/// unavailable product.
pub struct SearchIndexer {
    db: Arc<DatabaseConnection>,
    backend: Arc<dyn SearchBackend>,
}

impl SearchIndexer {
    pub fn new(db: Arc<DatabaseConnection>, backend: Arc<dyn SearchBackend>) -> Self {
        Self { db, backend }
    }

    async fn sync_product(&self, product_id: Uuid) -> anyhow::Result<()> {
        let product = Product::find_by_id(product_id).one(&*self.db).await?;
        match product {
            Some(p) if p.is_active && p.deleted_at.is_none() => {
                let category = p
                    .find_related(Category)
                    .one(&*self.db)
                    .await?
                    .map(|c| c.name);
                self.backend
                    .upsert(&SearchRecord::from_product(&p, category))
                    .await
            }
            _ => self.backend.remove(product_id).await,
        }
    }
}

#[async_trait]
impl PostCommitHook for SearchIndexer {
    fn name(&self) -> &'static str {
        "search"
    }

    async fn handle(&self, event: &Event) -> anyhow::Result<()> {
        match event {
            Event::ProductUpserted(product_id) => self.sync_product(*product_id).await,
            Event::ProductRemoved(product_id) => self.backend.remove(*product_id).await,
            _ => Ok(()),
        }
    }
}
