use std::collections::BTreeSet;

use anyhow::{anyhow, Context, Result};
use pfm_reconcile::{
    Card, CardId, CardKind, CategoryId, EntryKind, LedgerEntry, LedgerStore, NewLedgerEntry,
    PeriodWindow, UserId,
};
use sqlx::{postgres::PgRow, PgPool, Row};
use uuid::Uuid;

const CARD_COLUMNS: &str = "card_id, user_id, name, total_limit, kind, closing_day, due_day";

/// [`LedgerStore`] over the `cards`, `categories` and `ledger_entries` tables.
#[derive(Clone)]
pub struct PgLedgerStore {
    pool: PgPool,
}

impl PgLedgerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn day(row: &PgRow, col: &str) -> Result<u8> {
    let raw: i16 = row.try_get(col)?;
    u8::try_from(raw).map_err(|_| anyhow!("cards.{col} out of range: {raw}"))
}

fn card_from_row(row: &PgRow) -> Result<Card> {
    let card = Card {
        id: row.try_get("card_id")?,
        user_id: row.try_get("user_id")?,
        name: row.try_get("name")?,
        limit: row.try_get("total_limit")?,
        kind: CardKind::parse(&row.try_get::<String, _>("kind")?)?,
        closing_day: day(row, "closing_day")?,
        due_day: day(row, "due_day")?,
    };
    card.validate()?;
    Ok(card)
}

fn entry_from_row(row: &PgRow) -> Result<LedgerEntry> {
    Ok(LedgerEntry {
        id: row.try_get("entry_id")?,
        card_id: row.try_get("card_id")?,
        amount: row.try_get("amount")?,
        occurred_at: row.try_get("occurred_at_utc")?,
        kind: EntryKind::parse(&row.try_get::<String, _>("kind")?)?,
        category_id: row.try_get("category_id")?,
        description: row.try_get("description")?,
    })
}

/// Insert a card row. Used by seeding tools and DB tests.
pub async fn insert_card(pool: &PgPool, card: &Card) -> Result<()> {
    card.validate()?;
    sqlx::query(
        r#"
        insert into cards (card_id, user_id, name, total_limit, kind, closing_day, due_day)
        values ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(card.id)
    .bind(card.user_id)
    .bind(&card.name)
    .bind(card.limit)
    .bind(card.kind.as_str())
    .bind(i16::from(card.closing_day))
    .bind(i16::from(card.due_day))
    .execute(pool)
    .await
    .context("insert_card failed")?;
    Ok(())
}

#[async_trait::async_trait]
impl LedgerStore for PgLedgerStore {
    async fn fetch_card(&self, card_id: CardId) -> Result<Option<Card>> {
        let row = sqlx::query(&format!(
            "select {CARD_COLUMNS} from cards where card_id = $1"
        ))
        .bind(card_id)
        .fetch_optional(&self.pool)
        .await
        .context("fetch_card failed")?;

        row.as_ref().map(card_from_row).transpose()
    }

    async fn list_cards(&self) -> Result<Vec<Card>> {
        let rows = sqlx::query(&format!(
            "select {CARD_COLUMNS} from cards order by card_id"
        ))
        .fetch_all(&self.pool)
        .await
        .context("list_cards failed")?;

        rows.iter().map(card_from_row).collect()
    }

    async fn query_qualifying_entries(
        &self,
        card_id: CardId,
        window: PeriodWindow,
        adjustment_category: CategoryId,
    ) -> Result<Vec<LedgerEntry>> {
        let rows = sqlx::query(
            r#"
            select entry_id, card_id, amount, occurred_at_utc, kind, category_id, description
            from ledger_entries
            where card_id = $1
              and occurred_at_utc >= $2
              and occurred_at_utc <= $3
              and (amount < 0 or category_id = $4)
            order by occurred_at_utc, entry_id
            "#,
        )
        .bind(card_id)
        .bind(window.start)
        .bind(window.end)
        .bind(adjustment_category)
        .fetch_all(&self.pool)
        .await
        .context("query_qualifying_entries failed")?;

        rows.iter().map(entry_from_row).collect()
    }

    async fn create_ledger_entry(&self, entry: &NewLedgerEntry) -> Result<LedgerEntry> {
        let row = sqlx::query(
            r#"
            insert into ledger_entries (
              entry_id, card_id, amount, occurred_at_utc, kind, category_id, description
            ) values ($1, $2, $3, $4, $5, $6, $7)
            returning entry_id, card_id, amount, occurred_at_utc, kind, category_id, description
            "#,
        )
        .bind(entry.id)
        .bind(entry.card_id)
        .bind(entry.amount)
        .bind(entry.occurred_at)
        .bind(entry.kind.as_str())
        .bind(entry.category_id)
        .bind(&entry.description)
        .fetch_one(&self.pool)
        .await
        .context("create_ledger_entry failed")?;

        entry_from_row(&row)
    }

    async fn list_food_voucher_card_owners(&self) -> Result<BTreeSet<UserId>> {
        let rows: Vec<(Uuid,)> =
            sqlx::query_as("select distinct user_id from cards where kind = 'FOOD_VOUCHER'")
                .fetch_all(&self.pool)
                .await
                .context("list_food_voucher_card_owners failed")?;

        Ok(rows.into_iter().map(|(u,)| u).collect())
    }

    async fn update_card_classification(&self, card_id: CardId, kind: CardKind) -> Result<Card> {
        let row = sqlx::query(&format!(
            "update cards set kind = $2 where card_id = $1 returning {CARD_COLUMNS}"
        ))
        .bind(card_id)
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await
        .context("update_card_classification failed")?;

        match row {
            Some(r) => card_from_row(&r),
            None => Err(anyhow!("card {card_id} vanished during classification")),
        }
    }

    async fn ensure_category(&self, name: &str) -> Result<CategoryId> {
        sqlx::query(
            r#"
            insert into categories (category_id, name)
            values ($1, $2)
            on conflict (name) do nothing
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .execute(&self.pool)
        .await
        .context("ensure_category insert failed")?;

        let (id,): (Uuid,) = sqlx::query_as("select category_id from categories where name = $1")
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .context("ensure_category lookup failed")?;

        tracing::debug!(category = name, category_id = %id, "category provisioned");
        Ok(id)
    }
}
