pub mod employees;
pub mod health;
pub mod orders;

use crate::db::DbPool;
use crate::events::EventSender;
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub order: Arc<crate::services::orders::OrderService>,
    pub order_status: Arc<crate::services::order_status::OrderStatusService>,
    pub assignment: Arc<crate::services::assignment::AssignmentService>,
    pub employees: Arc<crate::services::employees::EmployeeService>,
    pub workload: Arc<crate::services::workload::WorkloadService>,
}

impl AppServices {
    /// Builds the service container shared by all HTTP handlers.
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>) -> Self {
        let order = Arc::new(crate::services::orders::OrderService::new(
            db_pool.clone(),
            Some(event_sender.clone()),
        ));
        let order_status = Arc::new(crate::services::order_status::OrderStatusService::new(
            db_pool.clone(),
            Some(event_sender.clone()),
        ));
        let assignment = Arc::new(crate::services::assignment::AssignmentService::new(
            db_pool.clone(),
            Some(event_sender.clone()),
        ));
        let employees = Arc::new(crate::services::employees::EmployeeService::new(
            db_pool.clone(),
            Some(event_sender),
        ));
        let workload = Arc::new(crate::services::workload::WorkloadService::new(db_pool));

        Self {
            order,
            order_status,
            assignment,
            employees,
            workload,
        }
    }
}
