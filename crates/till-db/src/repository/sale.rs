//! # Sale Repository
//!
//! Sale headers and line items.
//!
//! ## Locking
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  lock(business, sale, now)                                             │
//! │                                                                         │
//! │  UPDATE sales SET updated_at = now                                     │
//! │   WHERE id = ? AND business_id = ?                                     │
//! │  RETURNING *                                                           │
//! │                                                                         │
//! │  The first statement of every write transaction. Being a write, it     │
//! │  takes SQLite's database write lock before any read-modify-write       │
//! │  decision, so two operations on one sale (or on one product) are      │
//! │  serialized by the transaction, not by application locks.             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Item rows are ordered by `created_at`, then insertion order.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqliteConnection;
use tracing::debug;

use crate::error::DbResult;
use till_core::{CoreError, PaymentMethod, Sale, SaleItem, SaleStatus, SaleTotals};

/// Everything a completion writes onto the sale header.
#[derive(Debug, Clone)]
pub struct SaleCompletion {
    pub totals: SaleTotals,
    pub amount_paid_cents: i64,
    pub change_cents: i64,
    pub payment_method: PaymentMethod,
    pub daily_sequence: i64,
    pub receipt_number: String,
    pub sale_date: NaiveDate,
    pub shift_id: Option<String>,
    pub completed_at: DateTime<Utc>,
}

/// Repository for sale database operations.
pub struct SaleRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> SaleRepository<'c> {
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        SaleRepository { conn }
    }

    // =========================================================================
    // Header
    // =========================================================================

    pub async fn insert(&mut self, sale: &Sale) -> DbResult<()> {
        debug!(id = %sale.id, business_id = %sale.business_id, "Inserting sale");

        sqlx::query(
            r#"
            INSERT INTO sales (
                id, tenant_id, business_id, status,
                customer_name, customer_phone, notes, table_ref,
                cashier_id, shift_id, tax_rate_bps,
                subtotal_cents, tax_cents, discount_cents, total_cents,
                amount_paid_cents, change_cents, payment_method,
                daily_sequence, receipt_number, void_reason, voided_by,
                sale_date, created_at, updated_at, completed_at, voided_at, synced_at
            ) VALUES (
                ?1, ?2, ?3, ?4,
                ?5, ?6, ?7, ?8,
                ?9, ?10, ?11,
                ?12, ?13, ?14, ?15,
                ?16, ?17, ?18,
                ?19, ?20, ?21, ?22,
                ?23, ?24, ?25, ?26, ?27, ?28
            )
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.tenant_id)
        .bind(&sale.business_id)
        .bind(sale.status)
        .bind(&sale.customer_name)
        .bind(&sale.customer_phone)
        .bind(&sale.notes)
        .bind(&sale.table_ref)
        .bind(&sale.cashier_id)
        .bind(&sale.shift_id)
        .bind(sale.tax_rate_bps)
        .bind(sale.subtotal_cents)
        .bind(sale.tax_cents)
        .bind(sale.discount_cents)
        .bind(sale.total_cents)
        .bind(sale.amount_paid_cents)
        .bind(sale.change_cents)
        .bind(sale.payment_method)
        .bind(sale.daily_sequence)
        .bind(&sale.receipt_number)
        .bind(&sale.void_reason)
        .bind(&sale.voided_by)
        .bind(sale.sale_date)
        .bind(sale.created_at)
        .bind(sale.updated_at)
        .bind(sale.completed_at)
        .bind(sale.voided_at)
        .bind(sale.synced_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    /// Gets a sale by ID within a business.
    pub async fn get(&mut self, business_id: &str, id: &str) -> DbResult<Option<Sale>> {
        let sale = sqlx::query_as::<_, Sale>("SELECT * FROM sales WHERE id = ?1 AND business_id = ?2")
            .bind(id)
            .bind(business_id)
            .fetch_optional(&mut *self.conn)
            .await?;

        Ok(sale)
    }

    /// Loads the sale and takes the write lock in one statement.
    ///
    /// ## Errors
    /// `NotFound` if the sale doesn't exist or belongs to another business.
    pub async fn lock(&mut self, business_id: &str, id: &str, now: DateTime<Utc>) -> DbResult<Sale> {
        let sale = sqlx::query_as::<_, Sale>(
            r#"
            UPDATE sales SET updated_at = ?1
            WHERE id = ?2 AND business_id = ?3
            RETURNING *
            "#,
        )
        .bind(now)
        .bind(id)
        .bind(business_id)
        .fetch_optional(&mut *self.conn)
        .await?;

        sale.ok_or_else(|| CoreError::not_found("Sale", id).into())
    }

    /// Draft and held sales of a business, oldest first.
    pub async fn list_open(&mut self, business_id: &str) -> DbResult<Vec<Sale>> {
        let sales = sqlx::query_as::<_, Sale>(
            r#"
            SELECT * FROM sales
            WHERE business_id = ?1 AND status IN ('draft', 'held')
            ORDER BY created_at, rowid
            "#,
        )
        .bind(business_id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(sales)
    }

    pub async fn update_totals(&mut self, id: &str, totals: &SaleTotals, now: DateTime<Utc>) -> DbResult<()> {
        debug!(
            id = %id,
            subtotal = totals.subtotal.cents(),
            total = totals.total.cents(),
            "Updating sale totals"
        );

        sqlx::query(
            r#"
            UPDATE sales
               SET subtotal_cents = ?1, tax_cents = ?2, discount_cents = ?3, total_cents = ?4,
                   updated_at = ?5
            WHERE id = ?6
            "#,
        )
        .bind(totals.subtotal.cents())
        .bind(totals.tax.cents())
        .bind(totals.discount.cents())
        .bind(totals.total.cents())
        .bind(now)
        .bind(id)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    pub async fn set_status(&mut self, id: &str, status: SaleStatus, now: DateTime<Utc>) -> DbResult<()> {
        debug!(id = %id, status = %status, "Updating sale status");

        sqlx::query("UPDATE sales SET status = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(status)
            .bind(now)
            .bind(id)
            .execute(&mut *self.conn)
            .await?;

        Ok(())
    }

    pub async fn update_details(
        &mut self,
        id: &str,
        customer_name: Option<&str>,
        customer_phone: Option<&str>,
        notes: Option<&str>,
        now: DateTime<Utc>,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            UPDATE sales SET customer_name = ?1, customer_phone = ?2, notes = ?3, updated_at = ?4
            WHERE id = ?5
            "#,
        )
        .bind(customer_name)
        .bind(customer_phone)
        .bind(notes)
        .bind(now)
        .bind(id)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    pub async fn set_table(&mut self, id: &str, table_ref: Option<&str>, now: DateTime<Utc>) -> DbResult<()> {
        sqlx::query("UPDATE sales SET table_ref = ?1, updated_at = ?2 WHERE id = ?3")
            .bind(table_ref)
            .bind(now)
            .bind(id)
            .execute(&mut *self.conn)
            .await?;

        Ok(())
    }

    /// Marks the sale completed with its payment, totals and receipt number.
    ///
    /// `synced_at` is stamped with the completion time.
    pub async fn complete(&mut self, id: &str, completion: &SaleCompletion) -> DbResult<Sale> {
        debug!(
            id = %id,
            receipt_number = %completion.receipt_number,
            total = completion.totals.total.cents(),
            "Completing sale"
        );

        let sale = sqlx::query_as::<_, Sale>(
            r#"
            UPDATE sales
               SET status = 'completed',
                   subtotal_cents = ?1, tax_cents = ?2, discount_cents = ?3, total_cents = ?4,
                   amount_paid_cents = ?5, change_cents = ?6, payment_method = ?7,
                   daily_sequence = ?8, receipt_number = ?9, sale_date = ?10, shift_id = ?11,
                   completed_at = ?12, synced_at = ?12, updated_at = ?12
            WHERE id = ?13
            RETURNING *
            "#,
        )
        .bind(completion.totals.subtotal.cents())
        .bind(completion.totals.tax.cents())
        .bind(completion.totals.discount.cents())
        .bind(completion.totals.total.cents())
        .bind(completion.amount_paid_cents)
        .bind(completion.change_cents)
        .bind(completion.payment_method)
        .bind(completion.daily_sequence)
        .bind(&completion.receipt_number)
        .bind(completion.sale_date)
        .bind(&completion.shift_id)
        .bind(completion.completed_at)
        .bind(id)
        .fetch_one(&mut *self.conn)
        .await?;

        Ok(sale)
    }

    /// Marks the sale voided.
    pub async fn void(&mut self, id: &str, reason: &str, voided_by: &str, now: DateTime<Utc>) -> DbResult<Sale> {
        debug!(id = %id, voided_by = %voided_by, "Voiding sale");

        let sale = sqlx::query_as::<_, Sale>(
            r#"
            UPDATE sales
               SET status = 'voided', void_reason = ?1, voided_by = ?2,
                   voided_at = ?3, updated_at = ?3
            WHERE id = ?4
            RETURNING *
            "#,
        )
        .bind(reason)
        .bind(voided_by)
        .bind(now)
        .bind(id)
        .fetch_one(&mut *self.conn)
        .await?;

        Ok(sale)
    }

    /// Deletes the sale row. Items and reservations cascade.
    pub async fn delete(&mut self, id: &str) -> DbResult<u64> {
        debug!(id = %id, "Deleting sale");

        let result = sqlx::query("DELETE FROM sales WHERE id = ?1")
            .bind(id)
            .execute(&mut *self.conn)
            .await?;

        Ok(result.rows_affected())
    }

    // =========================================================================
    // Items
    // =========================================================================

    pub async fn items(&mut self, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        let items = sqlx::query_as::<_, SaleItem>(
            "SELECT * FROM sale_items WHERE sale_id = ?1 ORDER BY created_at, rowid",
        )
        .bind(sale_id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(items)
    }

    pub async fn get_item(&mut self, sale_id: &str, item_id: &str) -> DbResult<Option<SaleItem>> {
        let item = sqlx::query_as::<_, SaleItem>("SELECT * FROM sale_items WHERE id = ?1 AND sale_id = ?2")
            .bind(item_id)
            .bind(sale_id)
            .fetch_optional(&mut *self.conn)
            .await?;

        Ok(item)
    }

    /// The earliest line of a product on a sale; quantity adds merge into it.
    pub async fn first_item_for_product(&mut self, sale_id: &str, product_id: &str) -> DbResult<Option<SaleItem>> {
        let item = sqlx::query_as::<_, SaleItem>(
            r#"
            SELECT * FROM sale_items
            WHERE sale_id = ?1 AND product_id = ?2
            ORDER BY created_at, rowid
            LIMIT 1
            "#,
        )
        .bind(sale_id)
        .bind(product_id)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(item)
    }

    /// Total quantity of a product across all lines of a sale.
    pub async fn product_quantity(&mut self, sale_id: &str, product_id: &str) -> DbResult<i64> {
        let quantity: i64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(quantity), 0) FROM sale_items WHERE sale_id = ?1 AND product_id = ?2",
        )
        .bind(sale_id)
        .bind(product_id)
        .fetch_one(&mut *self.conn)
        .await?;

        Ok(quantity)
    }

    pub async fn insert_item(&mut self, item: &SaleItem) -> DbResult<()> {
        debug!(sale_id = %item.sale_id, product_id = %item.product_id, quantity = item.quantity, "Adding sale item");

        sqlx::query(
            r#"
            INSERT INTO sale_items (
                id, sale_id, product_id, name_snapshot, unit_price_cents,
                quantity, line_total_cents, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            "#,
        )
        .bind(&item.id)
        .bind(&item.sale_id)
        .bind(&item.product_id)
        .bind(&item.name_snapshot)
        .bind(item.unit_price_cents)
        .bind(item.quantity)
        .bind(item.line_total_cents)
        .bind(item.created_at)
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    /// Sets an item's quantity, recomputing its line total from the snapshot price.
    pub async fn set_item_quantity(&mut self, item_id: &str, quantity: i64) -> DbResult<SaleItem> {
        debug!(item_id = %item_id, quantity, "Updating sale item quantity");

        sqlx::query_as::<_, SaleItem>(
            r#"
            UPDATE sale_items SET quantity = ?1, line_total_cents = unit_price_cents * ?1
            WHERE id = ?2
            RETURNING *
            "#,
        )
        .bind(quantity)
        .bind(item_id)
        .fetch_optional(&mut *self.conn)
        .await?
        .ok_or_else(|| CoreError::not_found("SaleItem", item_id).into())
    }

    pub async fn delete_item(&mut self, item_id: &str) -> DbResult<u64> {
        debug!(item_id = %item_id, "Removing sale item");

        let result = sqlx::query("DELETE FROM sale_items WHERE id = ?1")
            .bind(item_id)
            .execute(&mut *self.conn)
            .await?;

        Ok(result.rows_affected())
    }

    /// Moves every item of `from_sale` onto `to_sale`.
    pub async fn reassign_items(&mut self, from_sale: &str, to_sale: &str) -> DbResult<u64> {
        let result = sqlx::query("UPDATE sale_items SET sale_id = ?1 WHERE sale_id = ?2")
            .bind(to_sale)
            .bind(from_sale)
            .execute(&mut *self.conn)
            .await?;

        debug!(from = %from_sale, to = %to_sale, moved = result.rows_affected(), "Reassigned sale items");

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DbError;
    use crate::repository::fixtures::{self, BUSINESS, TRACKED};
    use till_core::{Money, TaxRate};

    fn item(sale_id: &str, id: &str, qty: i64) -> SaleItem {
        SaleItem {
            id: id.to_string(),
            sale_id: sale_id.to_string(),
            product_id: TRACKED.to_string(),
            name_snapshot: "cola".to_string(),
            unit_price_cents: 1500,
            quantity: qty,
            line_total_cents: 1500 * qty,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_lock_is_business_scoped() {
        let db = fixtures::database().await;
        let mut conn = db.acquire().await.unwrap();
        fixtures::insert_draft(&mut conn, "s1").await;
        let mut repo = SaleRepository::new(&mut conn);

        let later = Utc::now() + chrono::Duration::seconds(5);
        let sale = repo.lock(BUSINESS, "s1", later).await.unwrap();
        assert_eq!(sale.status, SaleStatus::Draft);
        assert_eq!(sale.updated_at, later);

        let err = repo.lock("other-biz", "s1", later).await.unwrap_err();
        assert!(matches!(err, DbError::Core(CoreError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_items_and_totals() {
        let db = fixtures::database().await;
        let mut conn = db.acquire().await.unwrap();
        fixtures::insert_draft(&mut conn, "s1").await;
        let mut repo = SaleRepository::new(&mut conn);
        let now = Utc::now();

        repo.insert_item(&item("s1", "i1", 3)).await.unwrap();
        let updated = repo.set_item_quantity("i1", 5).await.unwrap();
        assert_eq!(updated.line_total_cents, 7500);
        assert_eq!(repo.product_quantity("s1", TRACKED).await.unwrap(), 5);

        let items = repo.items("s1").await.unwrap();
        let totals = SaleTotals::compute(&items, TaxRate::zero(), Money::zero());
        repo.update_totals("s1", &totals, now).await.unwrap();

        let sale = repo.get(BUSINESS, "s1").await.unwrap().unwrap();
        assert_eq!(sale.subtotal_cents, 7500);
        assert_eq!(sale.total_cents, 7500);
    }

    #[tokio::test]
    async fn test_zero_quantity_item_rejected_by_schema() {
        let db = fixtures::database().await;
        let mut conn = db.acquire().await.unwrap();
        fixtures::insert_draft(&mut conn, "s1").await;
        let mut repo = SaleRepository::new(&mut conn);

        let err = repo.insert_item(&item("s1", "i1", 0)).await.unwrap_err();
        assert!(matches!(err, DbError::CheckViolation { .. }));
    }

    #[tokio::test]
    async fn test_reassign_and_delete_cascade() {
        let db = fixtures::database().await;
        let mut conn = db.acquire().await.unwrap();
        fixtures::insert_draft(&mut conn, "a").await;
        fixtures::insert_draft(&mut conn, "b").await;
        let mut repo = SaleRepository::new(&mut conn);

        repo.insert_item(&item("a", "i1", 1)).await.unwrap();
        repo.insert_item(&item("b", "i2", 2)).await.unwrap();
        repo.insert_item(&item("b", "i3", 1)).await.unwrap();

        assert_eq!(repo.reassign_items("b", "a").await.unwrap(), 2);
        assert_eq!(repo.delete("b").await.unwrap(), 1);

        let items = repo.items("a").await.unwrap();
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].id, "i1");
        assert_eq!(repo.first_item_for_product("a", TRACKED).await.unwrap().unwrap().id, "i1");
        assert_eq!(repo.list_open(BUSINESS).await.unwrap().len(), 1);
    }
}
