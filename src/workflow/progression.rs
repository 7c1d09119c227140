use crate::entities::order::OrderStatus;
use crate::entities::order_item::ItemStatus;

use super::ItemSnapshot;

/// Evaluates the auto-progression rules against the state left behind by an
/// item mutation and returns the order transition to issue, if any.
///
/// Rules, in order:
/// 1. a confirmed order whose items all carry an engineer moves to
///    scheduled;
/// 2. an order whose items are all completed moves to completed (unless it
///    is already completed or cancelled).
///
/// The caller applies the returned transition through the transition engine
/// (which runs the §cascade normalization) and may re-evaluate; on a state
/// this function already agreed with it returns `None`, so re-running it is
/// always a safe no-op.
pub fn next_auto_transition(
    order_status: OrderStatus,
    items: &[ItemSnapshot],
) -> Option<OrderStatus> {
    if items.is_empty() {
        return None;
    }

    if order_status == OrderStatus::Confirmed && items.iter().all(|item| item.engineer_assigned) {
        return Some(OrderStatus::Scheduled);
    }

    if !matches!(order_status, OrderStatus::Completed | OrderStatus::Cancelled)
        && items.iter().all(|item| item.status == ItemStatus::Completed)
    {
        return Some(OrderStatus::Completed);
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::test_support::{assigned_item, item};

    #[test]
    fn partial_assignment_does_not_schedule() {
        let items = vec![
            assigned_item("Deep Cleaning", ItemStatus::Assigned),
            item("Tap Repair", ItemStatus::Pending),
        ];
        assert_eq!(next_auto_transition(OrderStatus::Confirmed, &items), None);
    }

    #[test]
    fn last_assignment_schedules_the_order() {
        let items = vec![
            assigned_item("Deep Cleaning", ItemStatus::Assigned),
            assigned_item("Tap Repair", ItemStatus::Assigned),
        ];
        assert_eq!(
            next_auto_transition(OrderStatus::Confirmed, &items),
            Some(OrderStatus::Scheduled)
        );
    }

    #[test]
    fn full_assignment_only_schedules_from_confirmed() {
        let items = vec![assigned_item("Deep Cleaning", ItemStatus::Assigned)];
        assert_eq!(next_auto_transition(OrderStatus::Pending, &items), None);
        assert_eq!(next_auto_transition(OrderStatus::Scheduled, &items), None);
    }

    #[test]
    fn all_items_completed_completes_the_order() {
        let items = vec![
            assigned_item("Deep Cleaning", ItemStatus::Completed),
            assigned_item("Tap Repair", ItemStatus::Completed),
        ];
        assert_eq!(
            next_auto_transition(OrderStatus::InProgress, &items),
            Some(OrderStatus::Completed)
        );
    }

    #[test]
    fn completed_order_needs_no_further_transition() {
        let items = vec![assigned_item("Deep Cleaning", ItemStatus::Completed)];
        assert_eq!(next_auto_transition(OrderStatus::Completed, &items), None);
        assert_eq!(next_auto_transition(OrderStatus::Cancelled, &items), None);
    }

    #[test]
    fn reevaluation_is_a_noop() {
        // Scheduled order, everything assigned but not yet complete: the
        // trigger already fired once; running it again must do nothing.
        let items = vec![
            assigned_item("Deep Cleaning", ItemStatus::Assigned),
            assigned_item("Tap Repair", ItemStatus::InProgress),
        ];
        assert_eq!(next_auto_transition(OrderStatus::Scheduled, &items), None);
    }

    #[test]
    fn empty_order_never_progresses() {
        assert_eq!(next_auto_transition(OrderStatus::Confirmed, &[]), None);
    }
}
