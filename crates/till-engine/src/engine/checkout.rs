//! # Completion & Void
//!
//! ## Completion
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        complete_sale (one tx)                           │
//! │                                                                         │
//! │  lock sale ─► totals from items ─► discount ≤ total ─► paid ≥ net      │
//! │       │                                                                 │
//! │       ▼   for each tracked product                                     │
//! │  release own hold (already expired is fine)                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  inventory −qty, must stay ≥ other sales' holds ── no ──► Insufficient │
//! │       │ yes                                                  Stock     │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  daily sequence +1 ─► receipt YYYYMMDD-NNNN ─► status COMPLETED        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  shift totals +net, +1 ─► activity ─► COMMIT ─► SaleEvent::Completed   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Void
//! A completed sale puts every line back into committed stock and takes
//! exactly what completion added back off its shift. A draft or held sale
//! only loses its reservations; committed stock is not touched.

use chrono::Utc;
use tracing::{info, instrument, warn};

use till_core::sale::{change_due, next_status};
use till_core::validation::{validate_discount, validate_non_negative_cents, validate_void_reason};
use till_core::{
    ActivityDetail, Money, Sale, SaleContext, SaleEvent, SaleOperation, SaleStatus,
    SaleTotals, ValidationError,
};
use till_db::{
    receipt_number, ActivityRepository, DbError, InventoryRepository, SaleCompletion, SaleRepository,
    SequenceRepository, ShiftRepository,
};

use super::{is_tracked, product_quantities, Checkout, CompletedSale, SaleEngine};
use crate::error::EngineResult;

impl SaleEngine {
    /// Takes payment for an open sale and commits its stock.
    ///
    /// Every tracked product is deducted from committed stock. Deduction
    /// must leave enough stock for other sales' active reservations, so a
    /// sale whose own hold lapsed cannot oversell. Any failure aborts the
    /// whole completion.
    ///
    /// ## Errors
    /// - `ValidationError` for negative amounts, an empty sale or a
    ///   discount above the total
    /// - `InsufficientPayment` if `amount_paid < total − discount`
    /// - `InsufficientStock` if a product can no longer be covered
    #[instrument(skip(self, ctx, checkout), fields(business_id = %ctx.business_id))]
    pub async fn complete_sale(
        &self,
        ctx: &SaleContext,
        sale_id: &str,
        checkout: Checkout,
    ) -> EngineResult<CompletedSale> {
        validate_non_negative_cents("amount_paid", checkout.amount_paid_cents)?;
        validate_non_negative_cents("discount", checkout.discount_cents)?;

        let now = Utc::now();
        let mut tx = self.db.begin().await?;
        let sale = SaleRepository::new(&mut tx).lock(&ctx.business_id, sale_id, now).await?;
        next_status(sale.status, SaleOperation::Complete)?;

        let items = SaleRepository::new(&mut tx).items(&sale.id).await?;
        if items.is_empty() {
            return Err(ValidationError::Required {
                field: "items".to_string(),
            }
            .into());
        }

        let gross = SaleTotals::compute(&items, sale.tax_rate(), Money::zero());
        validate_discount(checkout.discount_cents, gross.total.cents())?;
        let totals = SaleTotals::compute(&items, sale.tax_rate(), Money::from_cents(checkout.discount_cents));
        let change = change_due(totals.total, Money::from_cents(checkout.amount_paid_cents))?;

        for (product_id, quantity) in product_quantities(&items) {
            if !is_tracked(&mut tx, &ctx.business_id, &product_id).await? {
                continue;
            }

            // Own hold goes first; the ledger then guards other sales' holds
            if self.reservations(&mut tx).release(&sale.id, &product_id).await? == 0 {
                warn!(
                    sale_id = %sale.id,
                    product_id = %product_id,
                    "No reservation to release on completion"
                );
            }

            InventoryRepository::new(&mut tx)
                .adjust(&ctx.business_id, &product_id, -quantity, now)
                .await?;
        }
        self.reservations(&mut tx).release_all(&sale.id).await?;

        let day = now.date_naive();
        let daily_sequence = SequenceRepository::new(&mut tx).next(&ctx.business_id, day).await?;
        let receipt = receipt_number(day, daily_sequence);
        let shift_id = sale.shift_id.clone().or_else(|| ctx.shift_id.clone());

        let completed = SaleRepository::new(&mut tx)
            .complete(
                &sale.id,
                &SaleCompletion {
                    totals,
                    amount_paid_cents: checkout.amount_paid_cents,
                    change_cents: change.cents(),
                    payment_method: checkout.payment_method,
                    daily_sequence,
                    receipt_number: receipt.clone(),
                    sale_date: day,
                    shift_id: shift_id.clone(),
                    completed_at: now,
                },
            )
            .await?;

        if let Some(shift_id) = &shift_id {
            ShiftRepository::new(&mut tx)
                .adjust_totals(&ctx.business_id, shift_id, totals.total.cents(), 1)
                .await?;
        }

        ActivityRepository::new(&mut tx)
            .append(
                &ctx.business_id,
                &sale.id,
                &ctx.cashier_id,
                ActivityDetail::Completed {
                    daily_sequence,
                    receipt_number: receipt.clone(),
                    total_cents: totals.total.cents(),
                    amount_paid_cents: checkout.amount_paid_cents,
                    change_cents: change.cents(),
                    discount_cents: checkout.discount_cents,
                    payment_method: checkout.payment_method,
                },
                now,
            )
            .await?;
        tx.commit().await.map_err(DbError::transaction)?;

        info!(
            sale_id = %completed.id,
            receipt_number = %receipt,
            total = totals.total.cents(),
            change = change.cents(),
            "Sale completed"
        );

        self.publish(SaleEvent::Completed {
            sale_id: completed.id.clone(),
            business_id: completed.business_id.clone(),
            cashier_id: completed.cashier_id.clone(),
            shift_id: completed.shift_id.clone(),
            table_ref: completed.table_ref.clone(),
            receipt_number: receipt.clone(),
            total_cents: completed.total_cents,
            amount_paid_cents: completed.amount_paid_cents,
            change_cents: completed.change_cents,
            payment_method: checkout.payment_method,
            items: items.clone(),
            completed_at: now,
        });

        Ok(CompletedSale {
            sale: completed,
            items,
            change_cents: change.cents(),
            receipt_number: receipt,
        })
    }

    /// Cancels a sale.
    ///
    /// Completed sales are restocked and their shift is reversed by the
    /// amount completion added. Open sales only release their holds.
    #[instrument(skip(self, ctx, reason), fields(business_id = %ctx.business_id))]
    pub async fn void_sale(&self, ctx: &SaleContext, sale_id: &str, reason: &str) -> EngineResult<Sale> {
        let reason = validate_void_reason(reason, self.settings.min_void_reason_len)?;

        let now = Utc::now();
        let mut tx = self.db.begin().await?;
        let sale = SaleRepository::new(&mut tx).lock(&ctx.business_id, sale_id, now).await?;
        next_status(sale.status, SaleOperation::Void)?;

        let restocked = sale.status == SaleStatus::Completed;
        if restocked {
            let items = SaleRepository::new(&mut tx).items(&sale.id).await?;
            for (product_id, quantity) in product_quantities(&items) {
                let mut inventory = InventoryRepository::new(&mut tx);
                if inventory.get(&ctx.business_id, &product_id).await?.is_none() {
                    continue;
                }
                inventory.adjust(&ctx.business_id, &product_id, quantity, now).await?;
            }

            if let Some(shift_id) = &sale.shift_id {
                ShiftRepository::new(&mut tx)
                    .adjust_totals(&ctx.business_id, shift_id, -sale.total_cents, -1)
                    .await?;
            }
        } else {
            self.reservations(&mut tx).release_all(&sale.id).await?;
        }

        let voided = SaleRepository::new(&mut tx)
            .void(&sale.id, &reason, &ctx.cashier_id, now)
            .await?;
        ActivityRepository::new(&mut tx)
            .append(
                &ctx.business_id,
                &sale.id,
                &ctx.cashier_id,
                ActivityDetail::Voided {
                    reason: reason.clone(),
                    previous_status: sale.status,
                    restocked,
                },
                now,
            )
            .await?;
        tx.commit().await.map_err(DbError::transaction)?;

        info!(
            sale_id = %voided.id,
            previous_status = %sale.status,
            restocked,
            "Sale voided"
        );

        self.publish(SaleEvent::Voided {
            sale_id: voided.id.clone(),
            business_id: voided.business_id.clone(),
            cashier_id: ctx.cashier_id.clone(),
            previous_status: sale.status,
            reason,
            total_cents: voided.total_cents,
            restocked,
            voided_at: now,
        });

        Ok(voided)
    }
}
