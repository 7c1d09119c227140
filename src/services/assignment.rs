use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    db::DbPool,
    entities::employee::{self, Entity as EmployeeEntity, Model as EmployeeModel},
    entities::order::OrderStatus,
    entities::order_item::{
        self, ActiveModel as OrderItemActiveModel, Entity as OrderItemEntity, ItemStatus,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::order_status::{
        guarded_update_order, load_items, load_order, run_auto_progression,
    },
    services::orders::{item_to_response, model_to_response, OrderItemResponse, OrderResponse},
};

/// Category slug → canonical expertise-area label. This mirrors the
/// marketplace's service catalog; an engineer qualifies for a category when
/// their expertise set contains the mapped label.
const CATEGORY_EXPERTISE: &[(&str, &str)] = &[
    ("ac_repair", "AC Repair"),
    ("appliance_repair", "Appliance Repair"),
    ("carpentry", "Carpentry"),
    ("cleaning", "Cleaning"),
    ("electrical", "Electrical"),
    ("painting", "Painting"),
    ("pest_control", "Pest Control"),
    ("plumbing", "Plumbing"),
];

/// Maps a category to its expertise label, if the catalog knows it.
pub fn expertise_for_category(category_id: &str) -> Option<&'static str> {
    CATEGORY_EXPERTISE
        .iter()
        .find(|(slug, _)| *slug == category_id)
        .map(|(_, label)| *label)
}

/// Active employees qualified for the category, in roster order. Unknown
/// categories produce an empty set, never an error — eligibility is
/// advisory.
pub fn eligible_employees<'a>(
    category_id: &str,
    employees: &'a [EmployeeModel],
) -> Vec<&'a EmployeeModel> {
    let Some(label) = expertise_for_category(category_id) else {
        return Vec::new();
    };
    employees
        .iter()
        .filter(|e| e.is_active && e.has_expertise(label))
        .collect()
}

/// Result of assigning an engineer to one item.
#[derive(Debug, Serialize, ToSchema)]
pub struct AssignmentOutcome {
    pub item: OrderItemResponse,
    /// Set when the assignment did not match the engineer's expertise; the
    /// assignment still went through.
    pub expertise_mismatch: bool,
    /// Order status the auto-progression trigger advanced to, if it fired.
    pub auto_transition: Option<OrderStatus>,
}

/// Result of auto-assigning every open item on an order.
#[derive(Debug, Serialize, ToSchema)]
pub struct AutoAssignOutcome {
    pub order: OrderResponse,
    pub assigned_count: usize,
    /// Items left unassigned because no eligible engineer exists.
    pub skipped_items: Vec<String>,
    pub auto_transition: Option<OrderStatus>,
}

/// Resolves engineer eligibility and records assignments. Assignment never
/// changes item status by itself; status transitions stay a separate,
/// independently audited step.
#[derive(Clone)]
pub struct AssignmentService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl AssignmentService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// The active roster in stable listing order.
    pub async fn active_roster(&self) -> Result<Vec<EmployeeModel>, ServiceError> {
        let db = &*self.db_pool;
        EmployeeEntity::find()
            .filter(employee::Column::IsActive.eq(true))
            .order_by_asc(employee::Column::EmployeeCode)
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// Eligible engineers for one item of an order, in roster order.
    #[instrument(skip(self), fields(order_id = %order_id, item_id = %item_id))]
    pub async fn eligible_for_item(
        &self,
        order_id: Uuid,
        item_id: Uuid,
    ) -> Result<Vec<EmployeeModel>, ServiceError> {
        let db = &*self.db_pool;
        let item = OrderItemEntity::find_by_id(item_id)
            .filter(order_item::Column::OrderId.eq(order_id))
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Item {} not found on order {}", item_id, order_id))
            })?;

        let roster = self.active_roster().await?;
        Ok(eligible_employees(&item.category_id, &roster)
            .into_iter()
            .cloned()
            .collect())
    }

    /// Records an engineer assignment on one order item.
    ///
    /// Expertise mismatch is surfaced as a flag, not an error — operators
    /// may deliberately send a generalist. Inactive or unknown engineers
    /// are rejected.
    #[instrument(skip(self, notes), fields(order_id = %order_id, item_id = %item_id, employee_id = %employee_id))]
    pub async fn assign_employee(
        &self,
        order_id: Uuid,
        item_id: Uuid,
        employee_id: Uuid,
        notes: Option<String>,
    ) -> Result<AssignmentOutcome, ServiceError> {
        let db = &*self.db_pool;
        let now = Utc::now();

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

        if item.status == ItemStatus::Cancelled {
            return Err(ServiceError::InvalidOperation(
                "Cannot assign an engineer to a cancelled item".to_string(),
            ));
        }

        let engineer = EmployeeEntity::find_by_id(employee_id)
            .one(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Employee {} not found", employee_id))
            })?;

        if !engineer.is_active {
            return Err(ServiceError::ValidationError(format!(
                "Employee {} ({}) is inactive and cannot take assignments",
                engineer.name, engineer.employee_code
            )));
        }

        let expertise_mismatch = match expertise_for_category(&item.category_id) {
            Some(label) => !engineer.has_expertise(label),
            None => false,
        };
        if expertise_mismatch {
            warn!(
                employee_id = %employee_id,
                category = %item.category_id,
                "Assigned engineer does not match the item's expertise area"
            );
        }

        let mut active: OrderItemActiveModel = item.clone().into();
        active.engineer_id = Set(Some(engineer.id));
        active.engineer_name = Set(Some(engineer.name.clone()));
        active.assigned_at = Set(Some(now));
        if let Some(note) = notes {
            let merged = match item.notes.as_deref() {
                Some(existing) if !existing.trim().is_empty() => {
                    format!("{}\n{}", existing, note)
                }
                _ => note,
            };
            active.notes = Set(Some(merged));
        }

        let updated_item = active.update(&txn).await.map_err(|e| {
            error!(error = %e, item_id = %item_id, "Failed to record assignment");
            ServiceError::DatabaseError(e)
        })?;
        items[position] = updated_item;

        let mut events = vec![Event::OrderItemAssigned {
            order_id,
            item_id,
            engineer_id: engineer.id,
        }];

        let (final_status, progression_events) =
            run_auto_progression(&txn, &order, &mut items, now).await?;
        events.extend(progression_events);

        guarded_update_order(&txn, &order, final_status, None, now).await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to commit assignment");
            ServiceError::DatabaseError(e)
        })?;

        info!(
            order_id = %order_id,
            item_id = %item_id,
            engineer = %engineer.name,
            "Engineer assigned to order item"
        );

        self.emit(events).await;

        Ok(AssignmentOutcome {
            item: item_to_response(items[position].clone()),
            expertise_mismatch,
            auto_transition: (final_status != order.status).then_some(final_status),
        })
    }

    /// Assigns the least-loaded eligible engineer to every unassigned,
    /// non-cancelled item of the order, then lets auto-progression run.
    /// Items without any eligible engineer are reported, not failed.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn auto_assign_order(&self, order_id: Uuid) -> Result<AutoAssignOutcome, ServiceError> {
        let db = &*self.db_pool;
        let now = Utc::now();

        let txn = db.begin().await.map_err(ServiceError::DatabaseError)?;

        let order = load_order(&txn, order_id).await?;
        let mut items = load_items(&txn, order_id).await?;

        let roster = EmployeeEntity::find()
            .filter(employee::Column::IsActive.eq(true))
            .order_by_asc(employee::Column::EmployeeCode)
            .all(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?;

        // Current open workload per engineer, marketplace-wide. Used to
        // rank eligible candidates least-loaded first.
        let mut active_counts: HashMap<Uuid, u32> = HashMap::new();
        let open_items = OrderItemEntity::find()
            .filter(order_item::Column::EngineerId.is_not_null())
            .filter(order_item::Column::Status.is_in([
                ItemStatus::Pending,
                ItemStatus::Assigned,
                ItemStatus::Scheduled,
                ItemStatus::InProgress,
            ]))
            .all(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?;
        for open in &open_items {
            if let Some(engineer_id) = open.engineer_id {
                *active_counts.entry(engineer_id).or_default() += 1;
            }
        }

        let mut events = Vec::new();
        let mut assigned_count = 0usize;
        let mut skipped_items = Vec::new();

        for item in items.iter_mut() {
            if item.engineer_id.is_some() || item.status == ItemStatus::Cancelled {
                continue;
            }

            let candidates = eligible_employees(&item.category_id, &roster);
            let Some(pick) = candidates.into_iter().min_by_key(|candidate| {
                active_counts.get(&candidate.id).copied().unwrap_or(0)
            }) else {
                skipped_items.push(item.service_name.clone());
                continue;
            };

            let mut active: OrderItemActiveModel = item.clone().into();
            active.engineer_id = Set(Some(pick.id));
            active.engineer_name = Set(Some(pick.name.clone()));
            active.assigned_at = Set(Some(now));
            *item = active.update(&txn).await.map_err(ServiceError::DatabaseError)?;

            *active_counts.entry(pick.id).or_default() += 1;
            assigned_count += 1;
            events.push(Event::OrderItemAssigned {
                order_id,
                item_id: item.id,
                engineer_id: pick.id,
            });
        }

        let (final_status, progression_events) =
            run_auto_progression(&txn, &order, &mut items, now).await?;
        events.extend(progression_events);

        let updated = guarded_update_order(&txn, &order, final_status, None, now).await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to commit auto-assignment");
            ServiceError::DatabaseError(e)
        })?;

        info!(
            order_id = %order_id,
            assigned = assigned_count,
            skipped = skipped_items.len(),
            "Auto-assignment complete"
        );

        self.emit(events).await;

        Ok(AutoAssignOutcome {
            auto_transition: (final_status != order.status).then_some(final_status),
            order: model_to_response(updated, items),
            assigned_count,
            skipped_items,
        })
    }

    async fn emit(&self, events: Vec<Event>) {
        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send_all(events).await {
                warn!(error = %e, "Failed to send assignment events");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn engineer(code: &str, name: &str, areas: &[&str], active: bool) -> EmployeeModel {
        let now = Utc::now();
        EmployeeModel {
            id: Uuid::new_v4(),
            employee_code: code.to_string(),
            name: name.to_string(),
            manager: None,
            phone: "+91-9800000000".to_string(),
            email: format!("{}@fieldserve.dev", code.to_lowercase()),
            expertise_areas: json!(areas),
            is_active: active,
            created_at: now,
            updated_at: Some(now),
        }
    }

    #[test]
    fn category_mapping_is_exhaustive_for_known_slugs() {
        assert_eq!(expertise_for_category("plumbing"), Some("Plumbing"));
        assert_eq!(expertise_for_category("ac_repair"), Some("AC Repair"));
        assert_eq!(expertise_for_category("gardening"), None);
    }

    #[test]
    fn eligibility_filters_by_expertise_and_activity() {
        let roster = vec![
            engineer("ENG-001", "Ravi", &["Plumbing"], true),
            engineer("ENG-002", "Sunita", &["Electrical", "Plumbing"], true),
            engineer("ENG-003", "Imran", &["Plumbing"], false),
            engineer("ENG-004", "Leela", &["Cleaning"], true),
        ];

        let eligible = eligible_employees("plumbing", &roster);
        let names: Vec<&str> = eligible.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Ravi", "Sunita"]);
    }

    #[test]
    fn unknown_category_yields_empty_set() {
        let roster = vec![engineer("ENG-001", "Ravi", &["Plumbing"], true)];
        assert!(eligible_employees("underwater_welding", &roster).is_empty());
    }

    #[test]
    fn eligibility_preserves_roster_order() {
        let roster = vec![
            engineer("ENG-010", "Zoya", &["Cleaning"], true),
            engineer("ENG-002", "Anil", &["Cleaning"], true),
        ];
        let eligible = eligible_employees("cleaning", &roster);
        assert_eq!(eligible[0].name, "Zoya");
        assert_eq!(eligible[1].name, "Anil");
    }
}
