//! Shared fixtures for engine integration tests.
#![allow(dead_code)]

use std::path::{Path, PathBuf};

use chrono::Utc;
use till_core::{Business, Product, SaleContext};
use till_db::{
    BusinessRepository, Database, DbConfig, InventoryRepository, ProductRepository, ReservationRepository,
    SaleRepository,
};
use till_engine::{EventPublisher, SaleEngine, SalesSettings};

pub const TENANT: &str = "tenant-1";
pub const BUSINESS: &str = "biz-1";
pub const OTHER_BUSINESS: &str = "biz-2";

/// Tracked, price 1500, 10 on hand.
pub const COLA: &str = "prod-cola";
/// Tracked, price 250, 20 on hand.
pub const CHIPS: &str = "prod-chips";
/// Not stock-tracked, price 2000.
pub const SERVICE: &str = "prod-service";
/// Tracked but inactive.
pub const RETIRED: &str = "prod-retired";

pub fn ctx() -> SaleContext {
    SaleContext::new(TENANT, BUSINESS, "cashier-1")
}

pub fn other_cashier() -> SaleContext {
    SaleContext::new(TENANT, BUSINESS, "cashier-2")
}

pub async fn engine() -> SaleEngine {
    engine_with(SalesSettings::default()).await
}

pub async fn engine_with(settings: SalesSettings) -> SaleEngine {
    let db = Database::new(DbConfig::in_memory()).await.unwrap();
    seed(&db).await;
    SaleEngine::new(db, settings, EventPublisher::new(16))
}

/// A second engine over the same database with different sale settings.
pub fn sibling(engine: &SaleEngine, settings: SalesSettings) -> SaleEngine {
    SaleEngine::new(engine.database().clone(), settings, EventPublisher::new(16))
}

pub fn short_ttl(secs: i64) -> SalesSettings {
    SalesSettings {
        reservation_ttl_secs: secs,
        ..SalesSettings::default()
    }
}

pub async fn seed(db: &Database) {
    let now = Utc::now();
    let mut conn = db.acquire().await.unwrap();

    for id in [BUSINESS, OTHER_BUSINESS] {
        BusinessRepository::new(&mut conn)
            .insert(&Business {
                id: id.to_string(),
                tenant_id: TENANT.to_string(),
                name: format!("Cafe {id}"),
                created_at: now,
            })
            .await
            .unwrap();
    }

    for (id, sku, price, active) in [
        (COLA, "COLA", 1500, true),
        (CHIPS, "CHIPS", 250, true),
        (SERVICE, "SVC", 2000, true),
        (RETIRED, "OLD", 900, false),
    ] {
        ProductRepository::new(&mut conn)
            .insert(&Product {
                id: id.to_string(),
                business_id: BUSINESS.to_string(),
                sku: sku.to_string(),
                name: sku.to_lowercase(),
                price_cents: price,
                is_active: active,
                created_at: now,
                updated_at: now,
            })
            .await
            .unwrap();
    }

    let mut inventory = InventoryRepository::new(&mut conn);
    inventory.upsert(BUSINESS, COLA, 10, 2, now).await.unwrap();
    inventory.upsert(BUSINESS, CHIPS, 20, 5, now).await.unwrap();
    inventory.upsert(BUSINESS, RETIRED, 3, 0, now).await.unwrap();
}

/// Committed stock on hand.
pub async fn committed(engine: &SaleEngine, product_id: &str) -> i64 {
    let mut conn = engine.database().acquire().await.unwrap();
    InventoryRepository::new(&mut conn)
        .get(BUSINESS, product_id)
        .await
        .unwrap()
        .map(|i| i.quantity)
        .unwrap()
}

/// Quantity a sale actively holds for a product.
pub async fn held(engine: &SaleEngine, sale_id: &str, product_id: &str) -> i64 {
    let mut conn = engine.database().acquire().await.unwrap();
    ReservationRepository::new(&mut conn)
        .active_quantity(sale_id, product_id, Utc::now())
        .await
        .unwrap()
}

/// Σ active holds for a product across every sale.
pub async fn total_held(engine: &SaleEngine, product_id: &str) -> i64 {
    let available = engine.available_stock(&ctx(), product_id).await.unwrap().unwrap();
    committed(engine, product_id).await - available
}

/// Asserts the stored totals agree with the stored lines.
pub async fn assert_totals_consistent(engine: &SaleEngine, sale_id: &str) {
    let mut conn = engine.database().acquire().await.unwrap();
    let mut sales = SaleRepository::new(&mut conn);
    let sale = sales.get(BUSINESS, sale_id).await.unwrap().unwrap();
    let items = sales.items(sale_id).await.unwrap();

    let lines: i64 = items.iter().map(|i| i.line_total_cents).sum();
    assert_eq!(sale.subtotal_cents, lines, "subtotal must equal the sum of line totals");
    assert_eq!(
        sale.total_cents,
        sale.subtotal_cents - sale.discount_cents + sale.tax_cents,
        "total must equal subtotal - discount + tax"
    );
}

/// A fresh database file under the system temp dir.
pub fn temp_db_path() -> PathBuf {
    std::env::temp_dir().join(format!("till-engine-{}.db", uuid::Uuid::new_v4()))
}

pub fn remove_db_files(path: &Path) {
    for suffix in ["", "-wal", "-shm"] {
        let mut file = path.as_os_str().to_owned();
        file.push(suffix);
        let _ = std::fs::remove_file(file);
    }
}
