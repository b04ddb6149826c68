//! Shopping list collaborator.
//!
//! The matching core never mutates a list; callers apply a finished
//! [`CategorizedMapping`] through [`apply_mapping`].

mod json_store;

pub use json_store::{JsonShoppingList, ListDocument, ListItem, ShoppingListData};

use async_trait::async_trait;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::ListError;
use crate::models::receipt::{CategorizedMapping, ReferenceItemSet};

/// Summary of a shopping list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListSummary {
    pub uuid: String,
    pub name: String,
    pub open_items: usize,
}

/// Outcome of marking one item fulfilled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Fulfillment {
    /// The item moved from open to done.
    Fulfilled,
    /// The item was already done; nothing changed.
    AlreadyFulfilled,
}

/// Operations the pipeline needs from a shopping list backend.
///
/// `list` is a list identifier (uuid or name); `None` selects the first list.
#[async_trait]
pub trait ShoppingList: Send + Sync {
    /// All lists visible to this account.
    async fn lists(&self) -> Result<Vec<ListSummary>, ListError>;

    /// Names of the open items on a list.
    async fn load_reference_items(&self, list: Option<&str>) -> Result<ReferenceItemSet, ListError>;

    /// Check an item off. Re-marking a done item succeeds.
    async fn mark_fulfilled(&self, list: Option<&str>, name: &str) -> Result<Fulfillment, ListError>;

    /// Add an open item, or reopen it if it was done.
    async fn add_item(
        &self,
        list: Option<&str>,
        name: &str,
        specification: &str,
    ) -> Result<(), ListError>;

    /// Remove an item entirely.
    async fn remove_item(&self, list: Option<&str>, name: &str) -> Result<(), ListError>;
}

/// Per-item result of applying a mapping.
#[derive(Debug, Clone, Serialize)]
pub struct AppliedItem {
    pub reference: String,
    /// Receipt lines that confirmed this item.
    pub receipts: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Fulfillment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of applying a mapping to a list.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FulfillmentReport {
    pub items: Vec<AppliedItem>,
}

impl FulfillmentReport {
    pub fn fulfilled(&self) -> usize {
        self.count(Some(Fulfillment::Fulfilled))
    }

    pub fn already_fulfilled(&self) -> usize {
        self.count(Some(Fulfillment::AlreadyFulfilled))
    }

    pub fn failed(&self) -> usize {
        self.items.iter().filter(|item| item.error.is_some()).count()
    }

    fn count(&self, outcome: Option<Fulfillment>) -> usize {
        self.items.iter().filter(|item| item.outcome == outcome).count()
    }
}

/// Mark every matched reference item fulfilled, one call per distinct item.
///
/// Failures are recorded and do not stop the remaining items.
pub async fn apply_mapping<L: ShoppingList + ?Sized>(
    store: &L,
    list: Option<&str>,
    mapping: &CategorizedMapping,
) -> FulfillmentReport {
    let mut report = FulfillmentReport::default();

    for reference in mapping.matched_references() {
        let receipts: Vec<String> = mapping
            .iter()
            .filter(|(_, value)| *value == reference)
            .map(|(receipt, _)| receipt.to_string())
            .collect();

        for receipt in &receipts {
            info!("Receipt '{}' -> list '{}'", receipt, reference);
        }

        let (outcome, error) = match store.mark_fulfilled(list, reference).await {
            Ok(outcome) => {
                info!("Checked off item: {}", reference);
                (Some(outcome), None)
            }
            Err(e) => {
                warn!("Failed to check off '{}': {}", reference, e);
                (None, Some(e.to_string()))
            }
        };

        report.items.push(AppliedItem {
            reference: reference.to_string(),
            receipts,
            outcome,
            error,
        });
    }

    report
}
