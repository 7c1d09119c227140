use chrono::{DateTime, FixedOffset, NaiveDate, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseTransaction, EntityTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::DbPool,
    entities::order::{self, Entity as OrderEntity, Model as OrderModel, OrderStatus},
    entities::order_item::{
        self, ActiveModel as OrderItemActiveModel, Entity as OrderItemEntity,
        ItemStatus, Model as OrderItemModel,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::orders::{item_to_response, model_to_response, OrderItemResponse, OrderResponse},
    workflow::{
        self, next_auto_transition, plan_item_transition, plan_order_transition,
        schedule::{find_slot, slot_valid_on},
        ItemSnapshot, SideEffect,
    },
};

/// Field updates for a single order item. All fields are optional patch
/// semantics; omitted fields keep their current value.
#[derive(Debug, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateOrderItemRequest {
    pub status: Option<ItemStatus>,
    pub notes: Option<String>,
    pub scheduled_date: Option<NaiveDate>,
    pub time_slot: Option<String>,
    #[validate(range(min = 1, max = 5, message = "Rating must be between 1 and 5"))]
    pub rating: Option<i16>,
    pub review: Option<String>,
}

/// Result of an item update, including what the auto-progression trigger
/// did afterwards.
#[derive(Debug, Serialize, ToSchema)]
pub struct ItemUpdateOutcome {
    pub item: OrderItemResponse,
    /// Set when a date change invalidated the previously chosen time slot;
    /// the caller must ask the customer to pick a new one.
    pub time_slot_cleared: bool,
    /// Order status the trigger advanced to, when it fired.
    pub auto_transition: Option<OrderStatus>,
}

/// Applies validated lifecycle transitions to orders and their items.
/// Every mutation runs inside one transaction with the order row's version
/// column as the concurrency token, so a transition either fully commits
/// (including its cascades) or not at all.
#[derive(Clone)]
pub struct OrderStatusService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl OrderStatusService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Applies an order-level status transition with its cascades.
    #[instrument(skip(self, reason), fields(order_id = %order_id, new_status = %new_status))]
    pub async fn update_order_status(
        &self,
        order_id: Uuid,
        new_status: OrderStatus,
        reason: Option<String>,
    ) -> Result<OrderResponse, ServiceError> {
        let db = &*self.db_pool;
        let now = Utc::now();

        let txn = db.begin().await.map_err(ServiceError::DatabaseError)?;

        let order = load_order(&txn, order_id).await?;
        let mut items = load_items(&txn, order_id).await?;
        let snapshots: Vec<ItemSnapshot> = items.iter().map(ItemSnapshot::from).collect();

        let old_status = order.status;
        let plan = plan_order_transition(old_status, new_status, reason.as_deref(), &snapshots)
            .map_err(ServiceError::from)?;

        if plan.is_noop() {
            info!(order_id = %order_id, status = %new_status, "Order already in requested status");
            return Ok(model_to_response(order, items));
        }

        let mut events =
            apply_side_effects(&txn, order_id, &mut items, &plan.side_effects, now).await?;

        let admin_notes = reason.as_deref().map(|r| {
            let label = match new_status {
                OrderStatus::Cancelled => "cancelled",
                OrderStatus::Postponed => "postponed",
                _ => "status",
            };
            append_admin_note(order.admin_notes.as_deref(), label, r)
        });

        let updated = guarded_update_order(&txn, &order, new_status, admin_notes, now).await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to commit status transition");
            ServiceError::DatabaseError(e)
        })?;

        info!(
            order_id = %order_id,
            old_status = %old_status,
            new_status = %new_status,
            "Order status updated"
        );

        events.insert(
            0,
            Event::OrderStatusChanged {
                order_id,
                old_status,
                new_status,
            },
        );
        if old_status == OrderStatus::Postponed && new_status == OrderStatus::Pending {
            events.push(Event::OrderResumed(order_id));
        }
        self.emit(events).await;

        Ok(model_to_response(updated, items))
    }

    /// Applies field updates to one item, then re-evaluates the
    /// auto-progression rules for the owning order.
    #[instrument(skip(self, request), fields(order_id = %order_id, item_id = %item_id))]
    pub async fn update_order_item(
        &self,
        order_id: Uuid,
        item_id: Uuid,
        request: UpdateOrderItemRequest,
        now: DateTime<FixedOffset>,
    ) -> Result<ItemUpdateOutcome, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let db = &*self.db_pool;
        let now_utc = now.with_timezone(&Utc);

        let txn = db.begin().await.map_err(ServiceError::DatabaseError)?;

        let order = load_order(&txn, order_id).await?;
        let mut items = load_items(&txn, order_id).await?;
        let position = items
            .iter()
            .position(|item| item.id == item_id)
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Item {} not found on order {}", item_id, order_id))
            })?;
        let item = items[position].clone();

        // Status first: a cancelled order freezes item statuses before any
        // other field is even considered.
        if let Some(target) = request.status {
            plan_item_transition(order.status, item.status, target).map_err(ServiceError::from)?;
        }

        let wants_schedule_change =
            request.scheduled_date.is_some() || request.time_slot.is_some();
        if wants_schedule_change && item.status == ItemStatus::Cancelled {
            return Err(ServiceError::ValidationError(
                "Cannot schedule a cancelled item".to_string(),
            ));
        }

        let mut time_slot_cleared = false;
        let mut new_date = item.scheduled_date;
        let mut new_slot = item.time_slot.clone();

        if wants_schedule_change {
            let date = request.scheduled_date.or(item.scheduled_date);
            match (date, request.time_slot.as_deref()) {
                (None, Some(_)) => {
                    return Err(ServiceError::ValidationError(
                        "A time slot needs a scheduled date".to_string(),
                    ));
                }
                (Some(date), Some(slot)) => {
                    workflow::validate_schedule(date, Some(slot), now)
                        .map_err(ServiceError::from)?;
                    new_date = Some(date);
                    new_slot = Some(slot.to_string());
                }
                (Some(date), None) => {
                    workflow::validate_schedule(date, None, now).map_err(ServiceError::from)?;
                    new_date = Some(date);
                    // A date change can leave the previously chosen window
                    // unbookable; clear it and tell the caller.
                    if let Some(existing) = &item.time_slot {
                        let still_valid = find_slot(existing)
                            .map(|slot| slot_valid_on(slot, date, now))
                            .unwrap_or(false);
                        if !still_valid {
                            new_slot = None;
                            time_slot_cleared = true;
                        }
                    }
                }
                (None, None) => unreachable!("guarded by wants_schedule_change"),
            }
        }

        let mut events = Vec::new();
        let mut active: OrderItemActiveModel = item.clone().into();

        if wants_schedule_change {
            active.scheduled_date = Set(new_date);
            active.time_slot = Set(new_slot);
            events.push(Event::OrderItemScheduleChanged { order_id, item_id });
        }
        if let Some(notes) = request.notes.clone() {
            active.notes = Set(Some(notes));
        }
        if let Some(rating) = request.rating {
            active.rating = Set(Some(rating));
        }
        if let Some(review) = request.review.clone() {
            active.review = Set(Some(review));
        }
        if let Some(target) = request.status {
            if target != item.status {
                active.status = Set(target);
                if target == ItemStatus::Completed && item.completed_at.is_none() {
                    active.completed_at = Set(Some(now_utc));
                }
                events.push(Event::OrderItemStatusChanged {
                    order_id,
                    item_id,
                    old_status: item.status,
                    new_status: target,
                });
            }
        }

        let updated_item = active.update(&txn).await.map_err(|e| {
            error!(error = %e, item_id = %item_id, "Failed to update order item");
            ServiceError::DatabaseError(e)
        })?;
        items[position] = updated_item;

        let (final_status, progression_events) =
            run_auto_progression(&txn, &order, &mut items, now_utc).await?;
        events.extend(progression_events);

        guarded_update_order(&txn, &order, final_status, None, now_utc).await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to commit item update");
            ServiceError::DatabaseError(e)
        })?;

        let auto_transition = (final_status != order.status).then_some(final_status);
        if let Some(status) = auto_transition {
            info!(order_id = %order_id, new_status = %status, "Auto-progression advanced order");
        }

        self.emit(events).await;

        Ok(ItemUpdateOutcome {
            item: item_to_response(items[position].clone()),
            time_slot_cleared,
            auto_transition,
        })
    }

    async fn emit(&self, events: Vec<Event>) {
        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send_all(events).await {
                warn!(error = %e, "Failed to send lifecycle events");
            }
        }
    }
}

pub(crate) async fn load_order(
    txn: &DatabaseTransaction,
    order_id: Uuid,
) -> Result<OrderModel, ServiceError> {
    OrderEntity::find_by_id(order_id)
        .one(txn)
        .await
        .map_err(ServiceError::DatabaseError)?
        .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))
}

pub(crate) async fn load_items(
    txn: &DatabaseTransaction,
    order_id: Uuid,
) -> Result<Vec<OrderItemModel>, ServiceError> {
    OrderItemEntity::find()
        .filter(order_item::Column::OrderId.eq(order_id))
        .order_by_asc(order_item::Column::Position)
        .all(txn)
        .await
        .map_err(ServiceError::DatabaseError)
}

/// Applies the cascade side effects of an order transition to the in-memory
/// item set and the database. Items already in the target status are left
/// untouched, which keeps re-applied cascades idempotent.
pub(crate) async fn apply_side_effects(
    txn: &DatabaseTransaction,
    order_id: Uuid,
    items: &mut [OrderItemModel],
    effects: &[SideEffect],
    now: DateTime<Utc>,
) -> Result<Vec<Event>, ServiceError> {
    let mut events = Vec::new();

    for effect in effects {
        match effect {
            SideEffect::ForceItems(target) => {
                for item in items.iter_mut() {
                    if item.status == *target {
                        continue;
                    }
                    let mut active: OrderItemActiveModel = item.clone().into();
                    active.status = Set(*target);
                    if *target == ItemStatus::Completed && item.completed_at.is_none() {
                        active.completed_at = Set(Some(now));
                    }
                    *item = active.update(txn).await.map_err(ServiceError::DatabaseError)?;
                }
                events.push(Event::OrderItemsCascaded {
                    order_id,
                    status: *target,
                });
            }
            SideEffect::ResetItemsToPending => {
                for item in items.iter_mut() {
                    if item.status == ItemStatus::Pending {
                        continue;
                    }
                    let mut active: OrderItemActiveModel = item.clone().into();
                    active.status = Set(ItemStatus::Pending);
                    *item = active.update(txn).await.map_err(ServiceError::DatabaseError)?;
                }
                events.push(Event::OrderItemsCascaded {
                    order_id,
                    status: ItemStatus::Pending,
                });
            }
        }
    }

    Ok(events)
}

/// Re-evaluates the auto-progression rules until quiescent and applies any
/// transitions they demand. Returns the order status the caller must
/// persist (through [`guarded_update_order`]) and the events to emit after
/// commit.
pub(crate) async fn run_auto_progression(
    txn: &DatabaseTransaction,
    order: &OrderModel,
    items: &mut Vec<OrderItemModel>,
    now: DateTime<Utc>,
) -> Result<(OrderStatus, Vec<Event>), ServiceError> {
    let mut current = order.status;
    let mut events = Vec::new();

    // Two rules can chain (scheduled, then completed); a third pass only
    // confirms quiescence.
    for _ in 0..3 {
        let snapshots: Vec<ItemSnapshot> = items.iter().map(ItemSnapshot::from).collect();
        let Some(target) = next_auto_transition(current, &snapshots) else {
            break;
        };
        let plan = plan_order_transition(current, target, None, &snapshots)
            .map_err(ServiceError::from)?;
        let cascade_events =
            apply_side_effects(txn, order.id, items, &plan.side_effects, now).await?;
        events.extend(cascade_events);
        events.push(Event::OrderAutoProgressed {
            order_id: order.id,
            new_status: target,
        });
        current = target;
    }

    Ok((current, events))
}

/// Persists the order row with a version check. Zero affected rows means a
/// concurrent writer got there first; the caller's transaction must roll
/// back and the client may retry.
pub(crate) async fn guarded_update_order(
    txn: &DatabaseTransaction,
    order: &OrderModel,
    new_status: OrderStatus,
    admin_notes: Option<String>,
    now: DateTime<Utc>,
) -> Result<OrderModel, ServiceError> {
    let mut update = OrderEntity::update_many()
        .col_expr(order::Column::Status, Expr::value(new_status))
        .col_expr(order::Column::UpdatedAt, Expr::value(Some(now)))
        .col_expr(order::Column::Version, Expr::value(order.version + 1));

    if let Some(notes) = admin_notes {
        update = update.col_expr(order::Column::AdminNotes, Expr::value(Some(notes)));
    }

    let result = update
        .filter(order::Column::Id.eq(order.id))
        .filter(order::Column::Version.eq(order.version))
        .exec(txn)
        .await
        .map_err(ServiceError::DatabaseError)?;

    if result.rows_affected == 0 {
        return Err(ServiceError::Conflict(format!(
            "Order {} was modified concurrently; retry the operation",
            order.id
        )));
    }

    OrderEntity::find_by_id(order.id)
        .one(txn)
        .await
        .map_err(ServiceError::DatabaseError)?
        .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order.id)))
}

fn append_admin_note(existing: Option<&str>, label: &str, reason: &str) -> String {
    match existing {
        Some(previous) if !previous.trim().is_empty() => {
            format!("{}\n{}: {}", previous, label, reason)
        }
        _ => format!("{}: {}", label, reason),
    }
}
