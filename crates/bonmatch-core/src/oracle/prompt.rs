//! Instruction payload sent to the matching oracle.

use crate::models::receipt::ReferenceItemSet;

use super::NO_MATCH_SENTINEL;

const TASK_DESCRIPTION: &str = "You are a receipt parsing assistant.\n\
Your task is to decide whether a given receipt item appears in a predefined list of items (Item_list).\n\
If the receipt item is not a grocery or household item, skip it.\n\
- Item names may be written in a different language than the list.\n\
- The list may contain brand names instead of product names, or the other way round.\n\
- Items may appear only partially or abbreviated on the receipt.\n";

/// Build the single-turn prompt for one candidate.
pub fn build_prompt(candidate: &str, references: &ReferenceItemSet) -> String {
    // JSON keeps names with quotes or commas unambiguous.
    let item_list = serde_json::to_string(references.as_slice())
        .unwrap_or_else(|_| "[]".to_string());

    format!(
        "{TASK_DESCRIPTION}\
         Item_list: {item_list}\n\
         Item: {candidate}\n\
         Return either the exact matching item from Item_list, copied verbatim, or '{NO_MATCH_SENTINEL}'. \
         Do not add any other text."
    )
}
