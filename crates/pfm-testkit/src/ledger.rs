//! Deterministic in-memory ledger store.
//!
//! No IO. Reads and writes can be made to fail on demand so scenario tests
//! can exercise the storage-failure paths.

use std::{
    collections::{BTreeMap, BTreeSet, HashSet},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex, MutexGuard,
    },
};

use anyhow::{anyhow, bail, Result};
use chrono::{DateTime, Utc};
use pfm_reconcile::{
    Card, CardId, CardKind, CategoryId, EntryKind, LedgerEntry, LedgerStore, NewLedgerEntry,
    PeriodWindow, UserId,
};
use rust_decimal::Decimal;
use uuid::Uuid;

#[derive(Default)]
struct Inner {
    cards: BTreeMap<CardId, Card>,
    entries: Vec<LedgerEntry>,
    categories: BTreeMap<String, CategoryId>,
}

#[derive(Default)]
pub struct InMemoryLedger {
    inner: Mutex<Inner>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    failing_cards: Mutex<HashSet<CardId>>,
    classification_writes: AtomicUsize,
    category_lookups: AtomicUsize,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn insert_card(&self, card: Card) -> CardId {
        let id = card.id;
        self.lock().cards.insert(id, card);
        id
    }

    /// Insert a fresh card and return it.
    pub fn add_card(&self, user_id: UserId, name: &str, limit: Decimal, kind: CardKind) -> Card {
        let card = Card {
            id: Uuid::new_v4(),
            user_id,
            name: name.to_string(),
            limit,
            kind,
            closing_day: 5,
            due_day: 15,
        };
        self.insert_card(card.clone());
        card
    }

    /// Book an entry directly, bypassing the write-failure switch.
    pub fn book(
        &self,
        card_id: Option<CardId>,
        amount: Decimal,
        occurred_at: DateTime<Utc>,
        category_id: Option<CategoryId>,
    ) -> LedgerEntry {
        let entry = LedgerEntry {
            id: Uuid::new_v4(),
            card_id,
            amount,
            occurred_at,
            kind: EntryKind::Single,
            category_id,
            description: "seeded".to_string(),
        };
        self.lock().entries.push(entry.clone());
        entry
    }

    pub fn card(&self, card_id: CardId) -> Option<Card> {
        self.lock().cards.get(&card_id).cloned()
    }

    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.lock().entries.clone()
    }

    pub fn entries_for(&self, card_id: CardId) -> Vec<LedgerEntry> {
        self.lock()
            .entries
            .iter()
            .filter(|e| e.card_id == Some(card_id))
            .cloned()
            .collect()
    }

    pub fn set_fail_reads(&self, on: bool) {
        self.fail_reads.store(on, Ordering::SeqCst);
    }

    pub fn set_fail_writes(&self, on: bool) {
        self.fail_writes.store(on, Ordering::SeqCst);
    }

    /// Make classification writes for `card_id` fail.
    pub fn fail_classification_for(&self, card_id: CardId) {
        self.failing_cards
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .insert(card_id);
    }

    pub fn classification_writes(&self) -> usize {
        self.classification_writes.load(Ordering::SeqCst)
    }

    pub fn category_lookups(&self) -> usize {
        self.category_lookups.load(Ordering::SeqCst)
    }

    fn check_reads(&self) -> Result<()> {
        if self.fail_reads.load(Ordering::SeqCst) {
            bail!("in-memory ledger: read failure injected");
        }
        Ok(())
    }

    fn check_writes(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            bail!("in-memory ledger: write failure injected");
        }
        Ok(())
    }
}

#[async_trait::async_trait]
impl LedgerStore for InMemoryLedger {
    async fn fetch_card(&self, card_id: CardId) -> Result<Option<Card>> {
        self.check_reads()?;
        Ok(self.card(card_id))
    }

    async fn list_cards(&self) -> Result<Vec<Card>> {
        self.check_reads()?;
        Ok(self.lock().cards.values().cloned().collect())
    }

    async fn query_qualifying_entries(
        &self,
        card_id: CardId,
        window: PeriodWindow,
        adjustment_category: CategoryId,
    ) -> Result<Vec<LedgerEntry>> {
        self.check_reads()?;
        Ok(self
            .lock()
            .entries
            .iter()
            .filter(|e| e.card_id == Some(card_id) && window.contains(e.occurred_at))
            .filter(|e| e.is_expense() || e.category_id == Some(adjustment_category))
            .cloned()
            .collect())
    }

    async fn create_ledger_entry(&self, entry: &NewLedgerEntry) -> Result<LedgerEntry> {
        self.check_writes()?;
        let stored = entry.clone().into_entry();
        self.lock().entries.push(stored.clone());
        Ok(stored)
    }

    async fn list_food_voucher_card_owners(&self) -> Result<BTreeSet<UserId>> {
        self.check_reads()?;
        Ok(self
            .lock()
            .cards
            .values()
            .filter(|c| c.is_food_voucher())
            .map(|c| c.user_id)
            .collect())
    }

    async fn update_card_classification(&self, card_id: CardId, kind: CardKind) -> Result<Card> {
        self.check_writes()?;
        if self
            .failing_cards
            .lock()
            .unwrap_or_else(|p| p.into_inner())
            .contains(&card_id)
        {
            bail!("in-memory ledger: classification write failure injected for {card_id}");
        }
        self.classification_writes.fetch_add(1, Ordering::SeqCst);
        let mut inner = self.lock();
        let card = inner
            .cards
            .get_mut(&card_id)
            .ok_or_else(|| anyhow!("card {card_id} not found"))?;
        card.kind = kind;
        Ok(card.clone())
    }

    async fn ensure_category(&self, name: &str) -> Result<CategoryId> {
        self.check_writes()?;
        self.category_lookups.fetch_add(1, Ordering::SeqCst);
        Ok(*self
            .lock()
            .categories
            .entry(name.to_string())
            .or_insert_with(Uuid::new_v4))
    }
}
