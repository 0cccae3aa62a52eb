use std::collections::HashMap;

use crate::error::CorrelationViolation;
use crate::models::TypedItem;
use crate::models::WireItem;

/// Checks the cross-item rules a backend enforces on one request:
///
/// - with `requires_same_batch_pairing`, every tool output follows its tool
///   call *within `items`*;
/// - a reasoning item is never last;
/// - a `call_id` never names two different tools.
///
/// Reports the first violation found. Items are never reordered or dropped.
pub fn validate(
    items: &[WireItem],
    requires_same_batch_pairing: bool,
) -> Result<(), CorrelationViolation> {
    let mut calls: HashMap<&str, &str> = HashMap::new();

    for item in items {
        match item {
            WireItem::Typed(TypedItem::FunctionCall { call_id, name, .. }) => {
                if let Some(first) = calls.insert(call_id.as_str(), name.as_str()) {
                    if first != name {
                        return Err(CorrelationViolation::ConflictingToolName {
                            call_id: call_id.clone(),
                            first: first.to_string(),
                            second: name.clone(),
                        });
                    }
                }
            }
            WireItem::Typed(TypedItem::FunctionCallOutput { call_id, .. }) => {
                if requires_same_batch_pairing && !calls.contains_key(call_id.as_str()) {
                    return Err(CorrelationViolation::OrphanToolResult {
                        call_id: call_id.clone(),
                    });
                }
            }
            WireItem::Typed(TypedItem::Reasoning { .. }) | WireItem::Message(_) => {}
        }
    }

    if let Some(WireItem::Typed(TypedItem::Reasoning { id, .. })) = items.last() {
        return Err(CorrelationViolation::TrailingReasoning { id: id.clone() });
    }

    Ok(())
}
