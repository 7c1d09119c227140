use serde::Serialize;
use thiserror::Error;

use crate::entities::order::OrderStatus;
use crate::entities::order_item::ItemStatus;

use super::ItemSnapshot;

/// Cancelling or postponing an order needs an explanation an operator can
/// act on later; short notes like "customer asked" are rejected.
pub const REASON_MIN_WORDS: usize = 10;

/// The ordinary forward chain for an order. Side exits (cancelled,
/// postponed), normalizing completion, and the postponed → pending resume
/// path are handled structurally in [`order_target_allowed`].
const ORDER_CHAIN: &[(OrderStatus, OrderStatus)] = &[
    (OrderStatus::Pending, OrderStatus::Confirmed),
    (OrderStatus::Confirmed, OrderStatus::Scheduled),
    (OrderStatus::Scheduled, OrderStatus::InProgress),
    (OrderStatus::InProgress, OrderStatus::Completed),
];

/// A cascade applied to every item of the order as part of an order-level
/// transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideEffect {
    /// Force every item to the given status, unconditionally.
    ForceItems(ItemStatus),
    /// Reset every item's status to pending while leaving assignment and
    /// schedule fields intact (workflow restart after a postponement).
    ResetItemsToPending,
}

/// A validated order transition plan. Applying the plan means updating the
/// order status and executing each side effect; all of it must commit
/// atomically or not at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderTransition {
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub side_effects: Vec<SideEffect>,
}

impl OrderTransition {
    pub fn is_noop(&self) -> bool {
        self.from == self.to
    }
}

/// An item the start-work gate found unschedulable, with the fields it is
/// missing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MissingSchedule {
    pub item_name: String,
    pub missing_date: bool,
    pub missing_slot: bool,
}

impl std::fmt::Display for MissingSchedule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let missing = match (self.missing_date, self.missing_slot) {
            (true, true) => "date and time slot",
            (true, false) => "date",
            (false, true) => "time slot",
            (false, false) => "nothing",
        };
        write!(f, "'{}' is missing {}", self.item_name, missing)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("cannot transition order from '{from}' to '{to}'")]
    InvalidOrderTransition { from: OrderStatus, to: OrderStatus },

    #[error("cannot transition item from '{from}' to '{to}'")]
    InvalidItemTransition { from: ItemStatus, to: ItemStatus },

    #[error(
        "marking an order {target} requires a reason of at least {min_words} words (got {words})"
    )]
    ReasonTooShort {
        target: OrderStatus,
        words: usize,
        min_words: usize,
    },

    #[error("cannot start work: {}", format_missing(.0))]
    UnscheduledItems(Vec<MissingSchedule>),

    #[error("order is cancelled; item statuses can no longer change")]
    OrderFrozen,
}

fn format_missing(missing: &[MissingSchedule]) -> String {
    missing
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

fn order_target_allowed(from: OrderStatus, to: OrderStatus) -> bool {
    if from.is_terminal() {
        return false;
    }
    match to {
        // Side exits are open from every non-terminal state.
        OrderStatus::Cancelled | OrderStatus::Postponed => true,
        // Completion normalizes the whole order and is reachable from any
        // non-terminal state (the auto-progression trigger may fire it while
        // the order is still confirmed or scheduled).
        OrderStatus::Completed => true,
        // The only recovery from a postponement is a full workflow restart.
        OrderStatus::Pending => from == OrderStatus::Postponed,
        _ => ORDER_CHAIN.contains(&(from, to)),
    }
}

fn count_words(reason: Option<&str>) -> usize {
    reason.map_or(0, |r| r.split_whitespace().count())
}

/// Validates an order-level transition and returns the plan to apply,
/// including the cascade side effects the target state demands.
pub fn plan_order_transition(
    from: OrderStatus,
    to: OrderStatus,
    reason: Option<&str>,
    items: &[ItemSnapshot],
) -> Result<OrderTransition, TransitionError> {
    // Re-submitting the current status is accepted as a no-op; the cascade
    // for that status has already run.
    if from == to {
        return Ok(OrderTransition {
            from,
            to,
            side_effects: Vec::new(),
        });
    }

    if !order_target_allowed(from, to) {
        return Err(TransitionError::InvalidOrderTransition { from, to });
    }

    if matches!(to, OrderStatus::Cancelled | OrderStatus::Postponed) {
        let words = count_words(reason);
        if words < REASON_MIN_WORDS {
            return Err(TransitionError::ReasonTooShort {
                target: to,
                words,
                min_words: REASON_MIN_WORDS,
            });
        }
    }

    if from == OrderStatus::Scheduled && to == OrderStatus::InProgress {
        let missing: Vec<MissingSchedule> = items
            .iter()
            .filter(|item| item.status != ItemStatus::Cancelled)
            .filter(|item| !item.has_date || !item.has_slot)
            .map(|item| MissingSchedule {
                item_name: item.name.clone(),
                missing_date: !item.has_date,
                missing_slot: !item.has_slot,
            })
            .collect();
        if !missing.is_empty() {
            return Err(TransitionError::UnscheduledItems(missing));
        }
    }

    let side_effects = match (from, to) {
        (_, OrderStatus::Cancelled) => vec![SideEffect::ForceItems(ItemStatus::Cancelled)],
        (_, OrderStatus::Completed) => vec![SideEffect::ForceItems(ItemStatus::Completed)],
        (OrderStatus::Postponed, OrderStatus::Pending) => vec![SideEffect::ResetItemsToPending],
        _ => Vec::new(),
    };

    Ok(OrderTransition {
        from,
        to,
        side_effects,
    })
}

/// Validates a single item-status change in the context of its owning
/// order. Item statuses only move forward along the chain; cancellation is
/// open from every state; cancelled orders are frozen.
pub fn plan_item_transition(
    order_status: OrderStatus,
    from: ItemStatus,
    to: ItemStatus,
) -> Result<(), TransitionError> {
    if order_status == OrderStatus::Cancelled {
        return Err(TransitionError::OrderFrozen);
    }

    if from == to {
        return Ok(());
    }

    if to == ItemStatus::Cancelled {
        return Ok(());
    }

    match (from.chain_rank(), to.chain_rank()) {
        (Some(from_rank), Some(to_rank)) if to_rank > from_rank => Ok(()),
        _ => Err(TransitionError::InvalidItemTransition { from, to }),
    }
}
