use sea_orm::{ColumnTrait, EntityTrait, QueryFilter, QueryOrder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    db::DbPool,
    entities::employee::{self, Entity as EmployeeEntity, Model as EmployeeModel},
    entities::order_item::{self, Entity as OrderItemEntity, Model as OrderItemModel},
    errors::ServiceError,
};

/// Load classification by open task count. Boundaries are inclusive on the
/// upper end: 1–2 Light, 3–5 Moderate, 6–8 Heavy, 9+ Overloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum LoadLevel {
    Idle,
    Light,
    Moderate,
    Heavy,
    Overloaded,
}

impl LoadLevel {
    pub fn classify(active_tasks: u32) -> Self {
        match active_tasks {
            0 => LoadLevel::Idle,
            1..=2 => LoadLevel::Light,
            3..=5 => LoadLevel::Moderate,
            6..=8 => LoadLevel::Heavy,
            _ => LoadLevel::Overloaded,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EngineerWorkload {
    pub employee_id: Uuid,
    pub employee_code: String,
    pub name: String,
    pub active_tasks: u32,
    pub completed_tasks: u32,
    pub load: LoadLevel,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BusiestEngineer {
    pub employee_id: Uuid,
    pub name: String,
    pub active_tasks: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WorkloadSummary {
    pub total_employees: u32,
    pub busy_employees: u32,
    pub idle_employees: u32,
    pub total_active_tasks: u32,
    /// Mean open tasks among engineers with at least one, rounded to two
    /// decimals. Zero when nobody is busy.
    pub mean_active_per_busy: f64,
    /// First-encountered engineer with the maximum open task count; ties
    /// break by roster order.
    pub busiest: Option<BusiestEngineer>,
    pub per_employee: Vec<EngineerWorkload>,
}

/// Computes per-engineer workload from the active roster and the current
/// order-item set. Pure; the service below feeds it from the database.
pub fn compute_workload(
    employees: &[EmployeeModel],
    items: &[OrderItemModel],
) -> WorkloadSummary {
    let mut per_employee = Vec::with_capacity(employees.len());

    for engineer in employees {
        let mut active_tasks = 0u32;
        let mut completed_tasks = 0u32;
        for item in items {
            if item.engineer_id != Some(engineer.id) {
                continue;
            }
            if item.status.is_active_work() {
                active_tasks += 1;
            } else if item.status == order_item::ItemStatus::Completed {
                completed_tasks += 1;
            }
        }
        per_employee.push(EngineerWorkload {
            employee_id: engineer.id,
            employee_code: engineer.employee_code.clone(),
            name: engineer.name.clone(),
            active_tasks,
            completed_tasks,
            load: LoadLevel::classify(active_tasks),
        });
    }

    let busy: Vec<&EngineerWorkload> = per_employee
        .iter()
        .filter(|w| w.active_tasks > 0)
        .collect();
    let total_active_tasks: u32 = busy.iter().map(|w| w.active_tasks).sum();
    let mean_active_per_busy = if busy.is_empty() {
        0.0
    } else {
        let raw = f64::from(total_active_tasks) / busy.len() as f64;
        (raw * 100.0).round() / 100.0
    };

    // First engineer with the maximum count wins ties, so the result is
    // stable for a stable roster order.
    let mut busiest: Option<&EngineerWorkload> = None;
    for workload in per_employee.iter().filter(|w| w.active_tasks > 0) {
        if busiest.map_or(true, |b| workload.active_tasks > b.active_tasks) {
            busiest = Some(workload);
        }
    }
    let busiest = busiest.map(|w| BusiestEngineer {
        employee_id: w.employee_id,
        name: w.name.clone(),
        active_tasks: w.active_tasks,
    });

    WorkloadSummary {
        total_employees: per_employee.len() as u32,
        busy_employees: busy.len() as u32,
        idle_employees: (per_employee.len() - busy.len()) as u32,
        total_active_tasks,
        mean_active_per_busy,
        busiest,
        per_employee,
    }
}

/// Serves engineer workload statistics for the operations dashboard.
#[derive(Clone)]
pub struct WorkloadService {
    db_pool: Arc<DbPool>,
}

impl WorkloadService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    /// Workload summary for the active roster, in roster order.
    #[instrument(skip(self))]
    pub async fn engineer_workload_stats(&self) -> Result<WorkloadSummary, ServiceError> {
        let db = &*self.db_pool;

        let employees = EmployeeEntity::find()
            .filter(employee::Column::IsActive.eq(true))
            .order_by_asc(employee::Column::EmployeeCode)
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let items = OrderItemEntity::find()
            .filter(order_item::Column::EngineerId.is_not_null())
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok(compute_workload(&employees, &items))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::order_item::ItemStatus;
    use chrono::Utc;
    use rust_decimal_macros::dec;
    use serde_json::json;
    use test_case::test_case;

    #[test_case(0 => LoadLevel::Idle)]
    #[test_case(1 => LoadLevel::Light)]
    #[test_case(2 => LoadLevel::Light)]
    #[test_case(3 => LoadLevel::Moderate)]
    #[test_case(5 => LoadLevel::Moderate)]
    #[test_case(6 => LoadLevel::Heavy)]
    #[test_case(8 => LoadLevel::Heavy)]
    #[test_case(9 => LoadLevel::Overloaded)]
    #[test_case(40 => LoadLevel::Overloaded)]
    fn bucket_boundaries(active: u32) -> LoadLevel {
        LoadLevel::classify(active)
    }

    fn engineer(code: &str, name: &str) -> EmployeeModel {
        let now = Utc::now();
        EmployeeModel {
            id: Uuid::new_v4(),
            employee_code: code.to_string(),
            name: name.to_string(),
            manager: None,
            phone: "+91-9800000000".to_string(),
            email: format!("{}@fieldserve.dev", code.to_lowercase()),
            expertise_areas: json!(["Plumbing"]),
            is_active: true,
            created_at: now,
            updated_at: Some(now),
        }
    }

    fn task(engineer_id: Uuid, status: ItemStatus) -> OrderItemModel {
        let now = Utc::now();
        OrderItemModel {
            id: Uuid::new_v4(),
            order_id: Uuid::new_v4(),
            service_id: Uuid::new_v4(),
            service_name: "Tap Repair".to_string(),
            variant_id: None,
            variant_name: None,
            category_id: "plumbing".to_string(),
            quantity: 1,
            unit_price: dec!(499.00),
            total_price: dec!(499.00),
            status,
            engineer_id: Some(engineer_id),
            engineer_name: Some("someone".to_string()),
            assigned_at: Some(now),
            scheduled_date: None,
            time_slot: None,
            completed_at: None,
            notes: None,
            rating: None,
            review: None,
            position: 0,
            created_at: now,
            updated_at: Some(now),
        }
    }

    #[test]
    fn counts_active_and_completed_separately() {
        let ravi = engineer("ENG-001", "Ravi");
        let items = vec![
            task(ravi.id, ItemStatus::Pending),
            task(ravi.id, ItemStatus::Scheduled),
            task(ravi.id, ItemStatus::InProgress),
            task(ravi.id, ItemStatus::Completed),
            task(ravi.id, ItemStatus::Cancelled),
        ];

        let summary = compute_workload(&[ravi], &items);
        assert_eq!(summary.per_employee[0].active_tasks, 3);
        assert_eq!(summary.per_employee[0].completed_tasks, 1);
        assert_eq!(summary.per_employee[0].load, LoadLevel::Moderate);
    }

    #[test]
    fn summary_aggregates_and_mean() {
        let ravi = engineer("ENG-001", "Ravi");
        let sunita = engineer("ENG-002", "Sunita");
        let leela = engineer("ENG-003", "Leela");

        let mut items = Vec::new();
        for _ in 0..3 {
            items.push(task(ravi.id, ItemStatus::Assigned));
        }
        items.push(task(sunita.id, ItemStatus::InProgress));
        items.push(task(sunita.id, ItemStatus::Pending));

        let summary = compute_workload(&[ravi, sunita, leela], &items);
        assert_eq!(summary.total_employees, 3);
        assert_eq!(summary.busy_employees, 2);
        assert_eq!(summary.idle_employees, 1);
        assert_eq!(summary.total_active_tasks, 5);
        assert_eq!(summary.mean_active_per_busy, 2.5);
        let busiest = summary.busiest.unwrap();
        assert_eq!(busiest.name, "Ravi");
        assert_eq!(busiest.active_tasks, 3);
    }

    #[test]
    fn busiest_tie_breaks_by_first_encountered() {
        let first = engineer("ENG-001", "First");
        let second = engineer("ENG-002", "Second");
        let items = vec![
            task(first.id, ItemStatus::Assigned),
            task(second.id, ItemStatus::Assigned),
        ];

        let summary = compute_workload(&[first, second], &items);
        assert_eq!(summary.busiest.unwrap().name, "First");
    }

    #[test]
    fn mean_rounds_to_two_decimals() {
        let a = engineer("ENG-001", "A");
        let b = engineer("ENG-002", "B");
        let c = engineer("ENG-003", "C");
        let items = vec![
            task(a.id, ItemStatus::Assigned),
            task(b.id, ItemStatus::Assigned),
            task(b.id, ItemStatus::Assigned),
            task(c.id, ItemStatus::Assigned),
            task(c.id, ItemStatus::Assigned),
            task(c.id, ItemStatus::Assigned),
            task(c.id, ItemStatus::Assigned),
        ];

        // 7 active across 3 busy engineers = 2.333… → 2.33
        let summary = compute_workload(&[a, b, c], &items);
        assert_eq!(summary.mean_active_per_busy, 2.33);
    }

    #[test]
    fn empty_roster_is_all_zeroes() {
        let summary = compute_workload(&[], &[]);
        assert_eq!(summary.total_employees, 0);
        assert_eq!(summary.total_active_tasks, 0);
        assert!(summary.busiest.is_none());
        assert_eq!(summary.mean_active_per_busy, 0.0);
    }
}
