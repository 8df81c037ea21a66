//! Concurrent cashiers against one file-backed database.

mod common;

use std::sync::Arc;

use common::*;
use till_db::{Database, DbConfig};
use till_engine::{Checkout, ErrorCode, EventPublisher, NewSale, SaleEngine, SalesSettings};

async fn file_engine(path: &std::path::Path) -> SaleEngine {
    let db = Database::new(DbConfig::new(path).max_connections(5)).await.unwrap();
    seed(&db).await;
    SaleEngine::new(db, SalesSettings::default(), EventPublisher::new(64))
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_reservations_never_oversell() {
    let path = temp_db_path();
    let engine = Arc::new(file_engine(&path).await);

    let mut tasks = Vec::new();
    for n in 0..14 {
        let engine = Arc::clone(&engine);
        tasks.push(tokio::spawn(async move {
            let ctx = till_core::SaleContext::new(TENANT, BUSINESS, format!("cashier-{n}"));
            let sale = engine.create_draft(&ctx, NewSale::default()).await?;
            engine.add_item(&ctx, &sale.id, COLA, 1).await
        }));
    }

    let mut reserved = 0;
    let mut rejected = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => reserved += 1,
            Err(e) => {
                assert_eq!(e.code(), ErrorCode::InsufficientStock, "{e}");
                rejected += 1;
            }
        }
    }

    assert_eq!(reserved, 10);
    assert_eq!(rejected, 4);
    assert_eq!(total_held(&engine, COLA).await, 10);
    assert_eq!(engine.available_stock(&ctx(), COLA).await.unwrap(), Some(0));

    engine.database().close().await;
    remove_db_files(&path);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_parallel_completions_get_distinct_receipts() {
    let path = temp_db_path();
    let engine = Arc::new(file_engine(&path).await);
    let ctx = ctx();

    let mut sale_ids = Vec::new();
    for _ in 0..8 {
        let sale = engine.create_draft(&ctx, NewSale::default()).await.unwrap();
        engine.add_item(&ctx, &sale.id, CHIPS, 2).await.unwrap();
        sale_ids.push(sale.id);
    }

    let mut tasks = Vec::new();
    for sale_id in sale_ids {
        let engine = Arc::clone(&engine);
        let ctx = ctx.clone();
        tasks.push(tokio::spawn(async move {
            engine.complete_sale(&ctx, &sale_id, Checkout::cash(500)).await
        }));
    }

    let mut sequences = Vec::new();
    for task in tasks {
        let done = task.await.unwrap().unwrap();
        sequences.push(done.sale.daily_sequence.unwrap());
    }
    sequences.sort_unstable();

    assert_eq!(sequences, (1..=8).collect::<Vec<_>>());
    assert_eq!(committed(&engine, CHIPS).await, 20 - 16);

    engine.database().close().await;
    remove_db_files(&path);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_same_sale_edits_are_serialized() {
    let path = temp_db_path();
    let engine = Arc::new(file_engine(&path).await);
    let ctx = ctx();

    let sale = engine.create_draft(&ctx, NewSale::default()).await.unwrap();

    let mut tasks = Vec::new();
    for _ in 0..10 {
        let engine = Arc::clone(&engine);
        let ctx = ctx.clone();
        let sale_id = sale.id.clone();
        tasks.push(tokio::spawn(async move { engine.add_item(&ctx, &sale_id, CHIPS, 1).await }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    let current = engine.get_sale(&ctx, &sale.id).await.unwrap();
    assert_eq!(current.items.len(), 1);
    assert_eq!(current.items[0].quantity, 10);
    assert_eq!(current.sale.subtotal_cents, 2500);
    assert_eq!(held(&engine, &sale.id, CHIPS).await, 10);

    engine.database().close().await;
    remove_db_files(&path);
}
