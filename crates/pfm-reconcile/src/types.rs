use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ReconcileError;

pub type UserId = Uuid;
pub type CardId = Uuid;
pub type EntryId = Uuid;
pub type CategoryId = Uuid;

/// Card classification. Only food-voucher cards take part in the monthly reset.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CardKind {
    Credit,
    FoodVoucher,
}

impl CardKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CardKind::Credit => "CREDIT",
            CardKind::FoodVoucher => "FOOD_VOUCHER",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ReconcileError> {
        match s.trim().to_ascii_uppercase().as_str() {
            "CREDIT" => Ok(CardKind::Credit),
            "FOOD_VOUCHER" => Ok(CardKind::FoodVoucher),
            other => Err(ReconcileError::InvalidInput(format!(
                "invalid card kind '{other}'. expected one of: CREDIT | FOOD_VOUCHER"
            ))),
        }
    }
}

/// A credit or voucher card. The available limit is never stored on it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    pub id: CardId,
    pub user_id: UserId,
    pub name: String,
    /// Total limit. Must be >= 0.
    pub limit: Decimal,
    pub kind: CardKind,
    /// Day of month the statement closes (1..=31). Carried but not used by the
    /// limit calculation, which works on calendar months.
    pub closing_day: u8,
    pub due_day: u8,
}

impl Card {
    pub fn new(
        user_id: UserId,
        name: impl Into<String>,
        limit: Decimal,
        kind: CardKind,
    ) -> Result<Self, ReconcileError> {
        let card = Self {
            id: Uuid::new_v4(),
            user_id,
            name: name.into(),
            limit,
            kind,
            closing_day: 1,
            due_day: 10,
        };
        card.validate()?;
        Ok(card)
    }

    pub fn validate(&self) -> Result<(), ReconcileError> {
        if self.limit.is_sign_negative() && !self.limit.is_zero() {
            return Err(ReconcileError::InvalidInput(format!(
                "card {} has negative total limit {}",
                self.id, self.limit
            )));
        }
        for (field, day) in [("closing_day", self.closing_day), ("due_day", self.due_day)] {
            if !(1..=31).contains(&day) {
                return Err(ReconcileError::InvalidInput(format!(
                    "card {} has {field}={day}; expected 1..=31",
                    self.id
                )));
            }
        }
        Ok(())
    }

    pub fn is_food_voucher(&self) -> bool {
        self.kind == CardKind::FoodVoucher
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryKind {
    Single,
    Recurring,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Single => "SINGLE",
            EntryKind::Recurring => "RECURRING",
        }
    }

    pub fn parse(s: &str) -> Result<Self, ReconcileError> {
        match s.trim().to_ascii_uppercase().as_str() {
            "SINGLE" => Ok(EntryKind::Single),
            "RECURRING" => Ok(EntryKind::Recurring),
            other => Err(ReconcileError::InvalidInput(format!(
                "invalid entry kind '{other}'. expected one of: SINGLE | RECURRING"
            ))),
        }
    }
}

/// A persisted ledger entry (transaction).
///
/// The sign of `amount` encodes the flow: negative is an expense and reduces
/// the available limit of its card, positive is income or a credit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub id: EntryId,
    pub card_id: Option<CardId>,
    pub amount: Decimal,
    pub occurred_at: DateTime<Utc>,
    pub kind: EntryKind,
    pub category_id: Option<CategoryId>,
    pub description: String,
}

impl LedgerEntry {
    pub fn is_expense(&self) -> bool {
        self.amount.is_sign_negative() && !self.amount.is_zero()
    }
}

/// Insert shape for [`LedgerEntry`]; the store assigns nothing but may echo it back.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewLedgerEntry {
    pub id: EntryId,
    pub card_id: Option<CardId>,
    pub amount: Decimal,
    pub occurred_at: DateTime<Utc>,
    pub kind: EntryKind,
    pub category_id: Option<CategoryId>,
    pub description: String,
}

impl NewLedgerEntry {
    pub fn into_entry(self) -> LedgerEntry {
        LedgerEntry {
            id: self.id,
            card_id: self.card_id,
            amount: self.amount,
            occurred_at: self.occurred_at,
            kind: self.kind,
            category_id: self.category_id,
            description: self.description,
        }
    }
}
