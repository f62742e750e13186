use crate::config::AppConfig;
use crate::entities;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DbErr, EntityTrait, Schema,
};
use std::time::Duration;
use tracing::{debug, info};

/// Type alias for the database connection pool
pub type DbPool = DatabaseConnection;

/// Establish a connection pool using the application configuration.
pub async fn establish_connection(cfg: &AppConfig) -> Result<DbPool, DbErr> {
    debug!(url = %cfg.database_url, "configuring database connection");

    let mut opt = ConnectOptions::new(cfg.database_url.clone());
    opt.max_connections(cfg.db_max_connections)
        .min_connections(cfg.db_min_connections)
        .connect_timeout(Duration::from_secs(cfg.db_connect_timeout_secs))
        .sqlx_logging(false);

    let pool = Database::connect(opt).await?;

    info!(
        max_connections = cfg.db_max_connections,
        "database connection established"
    );
    Ok(pool)
}

/// Create any missing tables from the entity definitions.
///
/// Development and test convenience only; production schema is managed by
/// external migration tooling. Statements use IF NOT EXISTS so repeated
/// startups are safe.
pub async fn create_schema(db: &DbPool) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    create_table(db, &schema, entities::User).await?;
    create_table(db, &schema, entities::Category).await?;
    create_table(db, &schema, entities::Product).await?;
    create_table(db, &schema, entities::ProductImage).await?;
    create_table(db, &schema, entities::Cart).await?;
    create_table(db, &schema, entities::CartItem).await?;
    create_table(db, &schema, entities::Order).await?;
    create_table(db, &schema, entities::OrderItem).await?;
    create_table(db, &schema, entities::ProductReview).await?;

    info!("schema bootstrap complete");
    Ok(())
}

async fn create_table<E: EntityTrait>(db: &DbPool, schema: &Schema, entity: E) -> Result<(), DbErr> {
    let backend = db.get_database_backend();
    let mut stmt = schema.create_table_from_entity(entity);
    stmt.if_not_exists();
    db.execute(backend.build(&stmt)).await?;
    Ok(())
}
