//! Table operations: moving a bill and combining bills.
//!
//! ```text
//! merge_bills(A, [B, C])
//!
//!   A ◄── B.items, B.holds ── B (deleted)
//!   A ◄── C.items, C.holds ── C (deleted)
//!   A: totals recalculated once, one `merged` activity row
//! ```

use chrono::Utc;
use tracing::{debug, info, instrument};

use till_core::sale::next_status;
use till_core::validation::{validate_merge_targets, validate_table_ref};
use till_core::{ActivityDetail, CoreError, Money, Sale, SaleContext, SaleOperation, SaleWithItems, ValidationError};
use till_db::{ActivityRepository, DbError, SaleRepository};

use super::{recalculate, SaleEngine};
use crate::error::EngineResult;

impl SaleEngine {
    /// Moves an open sale to another table. No stock effect.
    #[instrument(skip(self, ctx), fields(business_id = %ctx.business_id))]
    pub async fn transfer_bill(&self, ctx: &SaleContext, sale_id: &str, table_ref: &str) -> EngineResult<Sale> {
        let table_ref = validate_table_ref(table_ref)?;

        let now = Utc::now();
        let mut tx = self.db.begin().await?;
        let mut sale = SaleRepository::new(&mut tx).lock(&ctx.business_id, sale_id, now).await?;
        next_status(sale.status, SaleOperation::Transfer)?;

        if sale.table_ref.as_deref() == Some(table_ref.as_str()) {
            return Err(ValidationError::InvalidFormat {
                field: "table".to_string(),
                reason: format!("sale is already at table {table_ref}"),
            }
            .into());
        }

        SaleRepository::new(&mut tx)
            .set_table(&sale.id, Some(&table_ref), now)
            .await?;
        ActivityRepository::new(&mut tx)
            .append(
                &ctx.business_id,
                &sale.id,
                &ctx.cashier_id,
                ActivityDetail::Transferred {
                    from_table: sale.table_ref.clone(),
                    to_table: Some(table_ref.clone()),
                },
                now,
            )
            .await?;
        tx.commit().await.map_err(DbError::transaction)?;

        info!(sale_id = %sale.id, from = ?sale.table_ref, to = %table_ref, "Bill transferred");
        sale.table_ref = Some(table_ref);
        Ok(sale)
    }

    /// Absorbs the secondary sales into the primary.
    ///
    /// Lines and reservations move to the primary and each secondary is
    /// deleted. When two sales hold the same product their holds are summed.
    /// If any named sale is missing or not open nothing is merged.
    #[instrument(skip(self, ctx), fields(business_id = %ctx.business_id))]
    pub async fn merge_bills(
        &self,
        ctx: &SaleContext,
        primary_id: &str,
        secondary_ids: &[String],
        table_ref: Option<&str>,
    ) -> EngineResult<SaleWithItems> {
        validate_merge_targets(primary_id, secondary_ids)?;
        let table_ref = table_ref.map(validate_table_ref).transpose()?;

        let now = Utc::now();
        let mut tx = self.db.begin().await?;
        let primary = SaleRepository::new(&mut tx).lock(&ctx.business_id, primary_id, now).await?;
        next_status(primary.status, SaleOperation::Merge)?;
        let subtotal_before_cents = primary.subtotal_cents;

        for secondary_id in secondary_ids {
            let mut sales = SaleRepository::new(&mut tx);
            let secondary = sales.lock(&ctx.business_id, secondary_id, now).await?;
            next_status(secondary.status, SaleOperation::Merge)?;

            let moved_items = sales.reassign_items(&secondary.id, &primary.id).await?;
            let moved_holds = self.reservations(&mut tx).reassign(&secondary.id, &primary.id, now).await?;
            SaleRepository::new(&mut tx).delete(&secondary.id).await?;

            debug!(
                primary = %primary.id,
                secondary = %secondary.id,
                moved_items,
                moved_holds,
                "Absorbed sale"
            );
        }

        if let Some(table) = &table_ref {
            SaleRepository::new(&mut tx)
                .set_table(&primary.id, Some(table), now)
                .await?;
        }

        let (totals, items) = recalculate(&mut tx, &primary, Money::from_cents(primary.discount_cents), now).await?;
        let final_table = table_ref.or_else(|| primary.table_ref.clone());
        ActivityRepository::new(&mut tx)
            .append(
                &ctx.business_id,
                &primary.id,
                &ctx.cashier_id,
                ActivityDetail::Merged {
                    merged_sale_ids: secondary_ids.to_vec(),
                    table_ref: final_table,
                    subtotal_before_cents,
                    subtotal_after_cents: totals.subtotal.cents(),
                },
                now,
            )
            .await?;

        let sale = SaleRepository::new(&mut tx)
            .get(&ctx.business_id, &primary.id)
            .await?
            .ok_or_else(|| CoreError::not_found("Sale", &primary.id))?;
        tx.commit().await.map_err(DbError::transaction)?;

        info!(
            sale_id = %sale.id,
            merged = secondary_ids.len(),
            subtotal_before = subtotal_before_cents,
            subtotal_after = totals.subtotal.cents(),
            "Bills merged"
        );
        Ok(SaleWithItems { sale, items })
    }
}
