//! Line item mutation.
//!
//! Each mutation keeps three things in step inside one transaction: the
//! line rows, the product's reservation, and the sale totals.
//!
//! ```text
//! add_item(cola, 2)          sale_items           stock_reservations
//!   held for cola: 3  ──►    cola × 3 → × 5  ──►  cola: 3 → 5 (expiry reset)
//!                                   │
//!                                   ▼
//!                            subtotal = Σ line totals
//! ```

use chrono::Utc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use till_core::sale::{line_total, next_status};
use till_core::validation::validate_quantity;
use till_core::{
    ActivityDetail, CoreError, FieldChange, Money, SaleContext, SaleItem, SaleOperation,
    ValidationError,
};
use till_db::{ActivityRepository, DbError, ProductRepository, SaleRepository};

use super::{is_tracked, recalculate, RemovalMode, SaleEngine};
use crate::error::EngineResult;

impl SaleEngine {
    /// Adds `quantity` of a product to an open sale.
    ///
    /// If the product is already on the sale its first line grows;
    /// otherwise a new line is created with the catalog name and price as
    /// they are now. For stock-tracked products the sale's reservation is
    /// set to the product's new total on the sale, which fails with
    /// `InsufficientStock` unless `available + already held ≥ new total`.
    ///
    /// Returns the sale's lines after the change.
    #[instrument(skip(self, ctx), fields(business_id = %ctx.business_id))]
    pub async fn add_item(
        &self,
        ctx: &SaleContext,
        sale_id: &str,
        product_id: &str,
        quantity: i64,
    ) -> EngineResult<Vec<SaleItem>> {
        validate_quantity(quantity)?;

        let now = Utc::now();
        let mut tx = self.db.begin().await?;
        let sale = SaleRepository::new(&mut tx).lock(&ctx.business_id, sale_id, now).await?;
        next_status(sale.status, SaleOperation::EditItems)?;

        let product = ProductRepository::new(&mut tx)
            .get(&ctx.business_id, product_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Product", product_id))?;
        if !product.is_active {
            return Err(ValidationError::InvalidFormat {
                field: "product_id".to_string(),
                reason: format!("product {} is not for sale", product.id),
            }
            .into());
        }

        let line_quantity = SaleRepository::new(&mut tx)
            .product_quantity(&sale.id, &product.id)
            .await?
            + quantity;
        validate_quantity(line_quantity)?;

        if is_tracked(&mut tx, &ctx.business_id, &product.id).await? {
            self.reservations(&mut tx)
                .update_quantity(&ctx.business_id, &sale.id, &product.id, &ctx.cashier_id, line_quantity, now)
                .await?;
        }

        let mut sales = SaleRepository::new(&mut tx);
        match sales.first_item_for_product(&sale.id, &product.id).await? {
            Some(existing) => {
                sales.set_item_quantity(&existing.id, existing.quantity + quantity).await?;
            }
            None => {
                sales
                    .insert_item(&SaleItem {
                        id: Uuid::new_v4().to_string(),
                        sale_id: sale.id.clone(),
                        product_id: product.id.clone(),
                        name_snapshot: product.name.clone(),
                        unit_price_cents: product.price_cents,
                        quantity,
                        line_total_cents: line_total(product.price(), quantity).cents(),
                        created_at: now,
                    })
                    .await?;
            }
        }

        let (totals, items) = recalculate(&mut tx, &sale, Money::from_cents(sale.discount_cents), now).await?;
        ActivityRepository::new(&mut tx)
            .append(
                &ctx.business_id,
                &sale.id,
                &ctx.cashier_id,
                ActivityDetail::ItemAdded {
                    product_id: product.id.clone(),
                    product_name: product.name.clone(),
                    quantity,
                    line_quantity,
                    unit_price_cents: product.price_cents,
                },
                now,
            )
            .await?;
        tx.commit().await.map_err(DbError::transaction)?;

        info!(
            sale_id = %sale.id,
            product_id = %product.id,
            quantity,
            subtotal = totals.subtotal.cents(),
            "Item added"
        );
        Ok(items)
    }

    /// Sets one line to exactly `quantity`, resizing the product's
    /// reservation to match.
    #[instrument(skip(self, ctx), fields(business_id = %ctx.business_id))]
    pub async fn set_item_quantity(
        &self,
        ctx: &SaleContext,
        sale_id: &str,
        item_id: &str,
        quantity: i64,
    ) -> EngineResult<Vec<SaleItem>> {
        validate_quantity(quantity)?;

        let now = Utc::now();
        let mut tx = self.db.begin().await?;
        let sale = SaleRepository::new(&mut tx).lock(&ctx.business_id, sale_id, now).await?;
        next_status(sale.status, SaleOperation::EditItems)?;

        let mut sales = SaleRepository::new(&mut tx);
        let item = sales
            .get_item(&sale.id, item_id)
            .await?
            .ok_or_else(|| CoreError::not_found("SaleItem", item_id))?;

        if item.quantity == quantity {
            debug!(item_id = %item_id, "Quantity unchanged");
            return Ok(sales.items(&sale.id).await?);
        }

        let product_total = sales.product_quantity(&sale.id, &item.product_id).await? - item.quantity + quantity;
        validate_quantity(product_total)?;

        if is_tracked(&mut tx, &ctx.business_id, &item.product_id).await? {
            self.reservations(&mut tx)
                .update_quantity(
                    &ctx.business_id,
                    &sale.id,
                    &item.product_id,
                    &ctx.cashier_id,
                    product_total,
                    now,
                )
                .await?;
        }

        SaleRepository::new(&mut tx).set_item_quantity(&item.id, quantity).await?;
        let (totals, items) = recalculate(&mut tx, &sale, Money::from_cents(sale.discount_cents), now).await?;
        ActivityRepository::new(&mut tx)
            .append(
                &ctx.business_id,
                &sale.id,
                &ctx.cashier_id,
                ActivityDetail::Updated {
                    changes: vec![FieldChange::new(
                        format!("items.{}.quantity", item.id),
                        Some(item.quantity.to_string()),
                        Some(quantity.to_string()),
                    )],
                },
                now,
            )
            .await?;
        tx.commit().await.map_err(DbError::transaction)?;

        info!(
            sale_id = %sale.id,
            item_id = %item.id,
            from = item.quantity,
            to = quantity,
            subtotal = totals.subtotal.cents(),
            "Item quantity changed"
        );
        Ok(items)
    }

    /// Removes one line from an open sale.
    ///
    /// With [`RemovalMode::ReleaseReservation`] the product's hold shrinks to
    /// what is still on the sale, and is deleted when nothing is left.
    /// [`RemovalMode::KeepReservation`] leaves the ledger alone.
    #[instrument(skip(self, ctx), fields(business_id = %ctx.business_id))]
    pub async fn remove_item(
        &self,
        ctx: &SaleContext,
        sale_id: &str,
        item_id: &str,
        mode: RemovalMode,
    ) -> EngineResult<Vec<SaleItem>> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;
        let sale = SaleRepository::new(&mut tx).lock(&ctx.business_id, sale_id, now).await?;
        next_status(sale.status, SaleOperation::EditItems)?;

        let mut sales = SaleRepository::new(&mut tx);
        let item = sales
            .get_item(&sale.id, item_id)
            .await?
            .ok_or_else(|| CoreError::not_found("SaleItem", item_id))?;
        sales.delete_item(&item.id).await?;
        let remaining = sales.product_quantity(&sale.id, &item.product_id).await?;

        let reservation_released = match mode {
            RemovalMode::ReleaseReservation => {
                self.reservations(&mut tx)
                    .shrink(&sale.id, &item.product_id, remaining)
                    .await?
                    > 0
            }
            RemovalMode::KeepReservation => false,
        };

        let (totals, items) = recalculate(&mut tx, &sale, Money::from_cents(sale.discount_cents), now).await?;
        ActivityRepository::new(&mut tx)
            .append(
                &ctx.business_id,
                &sale.id,
                &ctx.cashier_id,
                ActivityDetail::ItemRemoved {
                    item_id: item.id.clone(),
                    product_id: item.product_id.clone(),
                    quantity: item.quantity,
                    reservation_released,
                },
                now,
            )
            .await?;
        tx.commit().await.map_err(DbError::transaction)?;

        info!(
            sale_id = %sale.id,
            item_id = %item.id,
            remaining,
            reservation_released,
            subtotal = totals.subtotal.cents(),
            "Item removed"
        );
        Ok(items)
    }
}
