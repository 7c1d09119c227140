//! Order and order-item lifecycle rules.
//!
//! Everything in this module is pure: callers collect the current order and
//! item state into snapshots, ask for a transition plan, and apply the plan
//! (including its cascade side effects) inside their own transaction. This
//! keeps the business rules testable without a database.

pub mod progression;
pub mod schedule;
pub mod transitions;

pub use progression::next_auto_transition;
pub use schedule::{validate_schedule, ScheduleRejection, TimeSlot, TIME_SLOTS};
pub use transitions::{
    plan_item_transition, plan_order_transition, OrderTransition, SideEffect, TransitionError,
};

use crate::entities::order_item::{self, ItemStatus};

/// The slice of an order item the lifecycle rules need to see.
#[derive(Debug, Clone)]
pub struct ItemSnapshot {
    pub name: String,
    pub status: ItemStatus,
    pub engineer_assigned: bool,
    pub has_date: bool,
    pub has_slot: bool,
}

impl From<&order_item::Model> for ItemSnapshot {
    fn from(item: &order_item::Model) -> Self {
        Self {
            name: item.service_name.clone(),
            status: item.status,
            engineer_assigned: item.engineer_id.is_some(),
            has_date: item.scheduled_date.is_some(),
            has_slot: item.time_slot.is_some(),
        }
    }
}
