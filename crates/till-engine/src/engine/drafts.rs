//! Draft lifecycle: open, read, edit details, hold, resume, delete.

use chrono::Utc;
use tracing::{debug, info, instrument};
use uuid::Uuid;

use till_core::sale::next_status;
use till_core::validation::{normalize_optional_text, validate_table_ref};
use till_core::{
    ActivityDetail, CoreError, FieldChange, Sale, SaleActivity, SaleContext, SaleOperation,
    SaleStatus, SaleWithItems,
};
use till_db::{ActivityRepository, DbError, SaleRepository};

use super::{is_tracked, product_quantities, NewSale, SaleDetailsUpdate, SaleEngine};
use crate::error::EngineResult;

const MAX_CUSTOMER_NAME_LEN: usize = 100;
const MAX_CUSTOMER_PHONE_LEN: usize = 30;
const MAX_NOTES_LEN: usize = 500;

impl SaleEngine {
    /// Opens a new draft for the calling cashier.
    ///
    /// The tax rate in effect now is snapshotted onto the sale.
    #[instrument(skip(self, ctx, request), fields(business_id = %ctx.business_id))]
    pub async fn create_draft(&self, ctx: &SaleContext, request: NewSale) -> EngineResult<Sale> {
        let table_ref = request.table_ref.as_deref().map(validate_table_ref).transpose()?;
        let customer_name =
            normalize_optional_text("customer_name", request.customer_name.as_deref(), MAX_CUSTOMER_NAME_LEN)?;
        let customer_phone =
            normalize_optional_text("customer_phone", request.customer_phone.as_deref(), MAX_CUSTOMER_PHONE_LEN)?;
        let notes = normalize_optional_text("notes", request.notes.as_deref(), MAX_NOTES_LEN)?;

        let now = Utc::now();
        let sale = Sale {
            id: Uuid::new_v4().to_string(),
            tenant_id: ctx.tenant_id.clone(),
            business_id: ctx.business_id.clone(),
            status: SaleStatus::Draft,
            customer_name,
            customer_phone,
            notes,
            table_ref,
            cashier_id: ctx.cashier_id.clone(),
            shift_id: ctx.shift_id.clone(),
            tax_rate_bps: self.settings.tax_rate_bps,
            subtotal_cents: 0,
            tax_cents: 0,
            discount_cents: 0,
            total_cents: 0,
            amount_paid_cents: 0,
            change_cents: 0,
            payment_method: None,
            daily_sequence: None,
            receipt_number: None,
            void_reason: None,
            voided_by: None,
            sale_date: now.date_naive(),
            created_at: now,
            updated_at: now,
            completed_at: None,
            voided_at: None,
            synced_at: None,
        };

        let mut tx = self.db.begin().await?;
        SaleRepository::new(&mut tx).insert(&sale).await?;
        ActivityRepository::new(&mut tx)
            .append(
                &ctx.business_id,
                &sale.id,
                &ctx.cashier_id,
                ActivityDetail::Created {
                    table_ref: sale.table_ref.clone(),
                    customer_name: sale.customer_name.clone(),
                },
                now,
            )
            .await?;
        tx.commit().await.map_err(DbError::transaction)?;

        info!(sale_id = %sale.id, table = ?sale.table_ref, "Draft sale opened");
        Ok(sale)
    }

    /// A sale and its lines.
    #[instrument(skip(self, ctx), fields(business_id = %ctx.business_id))]
    pub async fn get_sale(&self, ctx: &SaleContext, sale_id: &str) -> EngineResult<SaleWithItems> {
        let mut conn = self.db.acquire().await?;
        let mut sales = SaleRepository::new(&mut conn);

        let sale = sales
            .get(&ctx.business_id, sale_id)
            .await?
            .ok_or_else(|| CoreError::not_found("Sale", sale_id))?;
        let items = sales.items(&sale.id).await?;

        Ok(SaleWithItems { sale, items })
    }

    /// Draft and held sales of the caller's business.
    #[instrument(skip(self, ctx), fields(business_id = %ctx.business_id))]
    pub async fn list_open_sales(&self, ctx: &SaleContext) -> EngineResult<Vec<Sale>> {
        let mut conn = self.db.acquire().await?;
        Ok(SaleRepository::new(&mut conn).list_open(&ctx.business_id).await?)
    }

    /// Every activity row of a sale, oldest first.
    ///
    /// Works for merged and deleted sales too; their history is kept.
    #[instrument(skip(self, ctx), fields(business_id = %ctx.business_id))]
    pub async fn activity(&self, ctx: &SaleContext, sale_id: &str) -> EngineResult<Vec<SaleActivity>> {
        let mut conn = self.db.acquire().await?;
        Ok(ActivityRepository::new(&mut conn)
            .list(&ctx.business_id, sale_id)
            .await?)
    }

    /// Edits customer name, phone and notes.
    ///
    /// An edit that changes nothing writes nothing.
    #[instrument(skip(self, ctx, update), fields(business_id = %ctx.business_id))]
    pub async fn update_details(
        &self,
        ctx: &SaleContext,
        sale_id: &str,
        update: SaleDetailsUpdate,
    ) -> EngineResult<Sale> {
        let customer_name = update
            .customer_name
            .as_deref()
            .map(|v| normalize_optional_text("customer_name", Some(v), MAX_CUSTOMER_NAME_LEN))
            .transpose()?;
        let customer_phone = update
            .customer_phone
            .as_deref()
            .map(|v| normalize_optional_text("customer_phone", Some(v), MAX_CUSTOMER_PHONE_LEN))
            .transpose()?;
        let notes = update
            .notes
            .as_deref()
            .map(|v| normalize_optional_text("notes", Some(v), MAX_NOTES_LEN))
            .transpose()?;

        let now = Utc::now();
        let mut tx = self.db.begin().await?;
        let mut sale = SaleRepository::new(&mut tx).lock(&ctx.business_id, sale_id, now).await?;
        next_status(sale.status, SaleOperation::UpdateDetails)?;

        let mut changes = Vec::new();
        for (field, current, requested) in [
            ("customer_name", &mut sale.customer_name, customer_name),
            ("customer_phone", &mut sale.customer_phone, customer_phone),
            ("notes", &mut sale.notes, notes),
        ] {
            if let Some(value) = requested {
                if *current != value {
                    changes.push(FieldChange::new(field, current.clone(), value.clone()));
                    *current = value;
                }
            }
        }

        if changes.is_empty() {
            debug!(sale_id = %sale_id, "Sale details unchanged");
            return Ok(sale);
        }

        SaleRepository::new(&mut tx)
            .update_details(
                &sale.id,
                sale.customer_name.as_deref(),
                sale.customer_phone.as_deref(),
                sale.notes.as_deref(),
                now,
            )
            .await?;
        ActivityRepository::new(&mut tx)
            .append(
                &ctx.business_id,
                &sale.id,
                &ctx.cashier_id,
                ActivityDetail::Updated { changes },
                now,
            )
            .await?;
        tx.commit().await.map_err(DbError::transaction)?;

        Ok(sale)
    }

    /// Parks a draft. Its reservations stay in place until they expire.
    #[instrument(skip(self, ctx, note), fields(business_id = %ctx.business_id))]
    pub async fn hold_sale(&self, ctx: &SaleContext, sale_id: &str, note: Option<&str>) -> EngineResult<Sale> {
        let note = normalize_optional_text("note", note, MAX_NOTES_LEN)?;

        let now = Utc::now();
        let mut tx = self.db.begin().await?;
        let mut sale = SaleRepository::new(&mut tx).lock(&ctx.business_id, sale_id, now).await?;
        let status = next_status(sale.status, SaleOperation::Hold)?;

        SaleRepository::new(&mut tx).set_status(&sale.id, status, now).await?;
        ActivityRepository::new(&mut tx)
            .append(&ctx.business_id, &sale.id, &ctx.cashier_id, ActivityDetail::Held { note }, now)
            .await?;
        tx.commit().await.map_err(DbError::transaction)?;

        sale.status = status;
        info!(sale_id = %sale.id, "Sale held");
        Ok(sale)
    }

    /// Returns a held sale to draft.
    ///
    /// Every tracked product is re-reserved at its full quantity on the sale
    /// with a fresh expiry. If holds lapsed while the sale was parked and the
    /// stock has since gone to other sales, resuming fails with
    /// `InsufficientStock` and the sale stays held.
    #[instrument(skip(self, ctx), fields(business_id = %ctx.business_id))]
    pub async fn resume_sale(&self, ctx: &SaleContext, sale_id: &str) -> EngineResult<Sale> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;
        let mut sale = SaleRepository::new(&mut tx).lock(&ctx.business_id, sale_id, now).await?;
        let status = next_status(sale.status, SaleOperation::Resume)?;

        let items = SaleRepository::new(&mut tx).items(&sale.id).await?;
        let mut reserved_products = 0;
        for (product_id, quantity) in product_quantities(&items) {
            if !is_tracked(&mut tx, &ctx.business_id, &product_id).await? {
                continue;
            }
            self.reservations(&mut tx)
                .update_quantity(&ctx.business_id, &sale.id, &product_id, &ctx.cashier_id, quantity, now)
                .await?;
            reserved_products += 1;
        }

        SaleRepository::new(&mut tx).set_status(&sale.id, status, now).await?;
        ActivityRepository::new(&mut tx)
            .append(
                &ctx.business_id,
                &sale.id,
                &ctx.cashier_id,
                ActivityDetail::Resumed { reserved_products },
                now,
            )
            .await?;
        tx.commit().await.map_err(DbError::transaction)?;

        sale.status = status;
        info!(sale_id = %sale.id, reserved_products, "Sale resumed");
        Ok(sale)
    }

    /// Discards an open sale with its lines and reservations.
    ///
    /// The activity history is kept.
    #[instrument(skip(self, ctx), fields(business_id = %ctx.business_id))]
    pub async fn delete_sale(&self, ctx: &SaleContext, sale_id: &str) -> EngineResult<()> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;
        let sale = SaleRepository::new(&mut tx).lock(&ctx.business_id, sale_id, now).await?;
        next_status(sale.status, SaleOperation::Delete)?;

        let item_count = SaleRepository::new(&mut tx).items(&sale.id).await?.len();
        self.reservations(&mut tx).release_all(&sale.id).await?;
        SaleRepository::new(&mut tx).delete(&sale.id).await?;
        ActivityRepository::new(&mut tx)
            .append(
                &ctx.business_id,
                &sale.id,
                &ctx.cashier_id,
                ActivityDetail::Deleted {
                    previous_status: sale.status,
                    item_count,
                },
                now,
            )
            .await?;
        tx.commit().await.map_err(DbError::transaction)?;

        info!(sale_id = %sale.id, item_count, "Sale deleted");
        Ok(())
    }
}
