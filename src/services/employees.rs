use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::DbPool,
    entities::employee::{
        self, ActiveModel as EmployeeActiveModel, Entity as EmployeeEntity, Model as EmployeeModel,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateEmployeeRequest {
    #[validate(length(min = 1, max = 32, message = "Employee code is required"))]
    pub employee_code: String,
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    pub manager: Option<String>,
    #[validate(length(min = 7, max = 20, message = "Phone must be 7-20 characters"))]
    pub phone: String,
    #[validate(email(message = "Must be a valid email address"))]
    pub email: String,
    pub expertise_areas: Vec<String>,
}

#[derive(Debug, Default, Serialize, Deserialize, Validate, ToSchema)]
pub struct UpdateEmployeeRequest {
    pub name: Option<String>,
    pub manager: Option<String>,
    pub phone: Option<String>,
    #[validate(email(message = "Must be a valid email address"))]
    pub email: Option<String>,
    pub expertise_areas: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EmployeeResponse {
    pub id: Uuid,
    pub employee_code: String,
    pub name: String,
    pub manager: Option<String>,
    pub phone: String,
    pub email: String,
    pub expertise_areas: Vec<String>,
    /// Legacy single-expertise view: the first area of the set.
    pub primary_expertise: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct EmployeeListResponse {
    pub employees: Vec<EmployeeResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Administrative directory of field engineers. Deactivation is a soft
/// flag: the engineer disappears from candidate pools while historical
/// assignments stay resolvable.
#[derive(Clone)]
pub struct EmployeeService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl EmployeeService {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    #[instrument(skip(self, request), fields(employee_code = %request.employee_code))]
    pub async fn create_employee(
        &self,
        request: CreateEmployeeRequest,
    ) -> Result<EmployeeResponse, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let areas = normalize_expertise(&request.expertise_areas);
        if areas.is_empty() {
            return Err(ServiceError::ValidationError(
                "An engineer needs at least one expertise area".to_string(),
            ));
        }

        let db = &*self.db_pool;

        let existing = EmployeeEntity::find()
            .filter(employee::Column::EmployeeCode.eq(request.employee_code.clone()))
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Employee code {} is already in use",
                request.employee_code
            )));
        }

        let now = Utc::now();
        let employee_id = Uuid::new_v4();

        let active_model = EmployeeActiveModel {
            id: Set(employee_id),
            employee_code: Set(request.employee_code.clone()),
            name: Set(request.name.clone()),
            manager: Set(request.manager.clone()),
            phone: Set(request.phone.clone()),
            email: Set(request.email.clone()),
            expertise_areas: Set(serde_json::json!(areas)),
            is_active: Set(true),
            created_at: Set(now),
            updated_at: Set(Some(now)),
        };

        let model = active_model.insert(db).await.map_err(|e| {
            error!(error = %e, "Failed to create employee");
            ServiceError::DatabaseError(e)
        })?;

        info!(employee_id = %employee_id, code = %model.employee_code, "Employee created");
        self.emit(Event::EmployeeCreated(employee_id)).await;

        Ok(model_to_response(model))
    }

    #[instrument(skip(self), fields(employee_id = %employee_id))]
    pub async fn get_employee(
        &self,
        employee_id: Uuid,
    ) -> Result<Option<EmployeeResponse>, ServiceError> {
        let db = &*self.db_pool;
        let model = EmployeeEntity::find_by_id(employee_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        Ok(model.map(model_to_response))
    }

    /// Lists the roster. Inactive engineers are included only on request;
    /// listing order is the stable roster order used everywhere else.
    #[instrument(skip(self))]
    pub async fn list_employees(
        &self,
        page: u64,
        per_page: u64,
        include_inactive: bool,
    ) -> Result<EmployeeListResponse, ServiceError> {
        let db = &*self.db_pool;
        let page = page.max(1);
        let per_page = per_page.clamp(1, 100);

        let mut query = EmployeeEntity::find().order_by_asc(employee::Column::EmployeeCode);
        if !include_inactive {
            query = query.filter(employee::Column::IsActive.eq(true));
        }

        let paginator = query.paginate(db, per_page);
        let total = paginator
            .num_items()
            .await
            .map_err(ServiceError::DatabaseError)?;
        let employees = paginator
            .fetch_page(page - 1)
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok(EmployeeListResponse {
            employees: employees.into_iter().map(model_to_response).collect(),
            total,
            page,
            per_page,
        })
    }

    #[instrument(skip(self, request), fields(employee_id = %employee_id))]
    pub async fn update_employee(
        &self,
        employee_id: Uuid,
        request: UpdateEmployeeRequest,
    ) -> Result<EmployeeResponse, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let db = &*self.db_pool;
        let model = self.require_employee(employee_id).await?;

        let mut active: EmployeeActiveModel = model.into();
        if let Some(name) = request.name {
            active.name = Set(name);
        }
        if let Some(manager) = request.manager {
            active.manager = Set(Some(manager));
        }
        if let Some(phone) = request.phone {
            active.phone = Set(phone);
        }
        if let Some(email) = request.email {
            active.email = Set(email);
        }
        if let Some(areas) = request.expertise_areas {
            let areas = normalize_expertise(&areas);
            if areas.is_empty() {
                return Err(ServiceError::ValidationError(
                    "An engineer needs at least one expertise area".to_string(),
                ));
            }
            active.expertise_areas = Set(serde_json::json!(areas));
        }
        active.updated_at = Set(Some(Utc::now()));

        let updated = active.update(db).await.map_err(|e| {
            error!(error = %e, employee_id = %employee_id, "Failed to update employee");
            ServiceError::DatabaseError(e)
        })?;

        self.emit(Event::EmployeeUpdated(employee_id)).await;
        Ok(model_to_response(updated))
    }

    /// Soft-deactivates an engineer. Existing assignments keep the
    /// engineer id and denormalized name as a historical reference.
    #[instrument(skip(self), fields(employee_id = %employee_id))]
    pub async fn deactivate_employee(
        &self,
        employee_id: Uuid,
    ) -> Result<EmployeeResponse, ServiceError> {
        let updated = self.set_active(employee_id, false).await?;
        self.emit(Event::EmployeeDeactivated(employee_id)).await;
        Ok(updated)
    }

    #[instrument(skip(self), fields(employee_id = %employee_id))]
    pub async fn activate_employee(
        &self,
        employee_id: Uuid,
    ) -> Result<EmployeeResponse, ServiceError> {
        let updated = self.set_active(employee_id, true).await?;
        self.emit(Event::EmployeeActivated(employee_id)).await;
        Ok(updated)
    }

    async fn set_active(
        &self,
        employee_id: Uuid,
        is_active: bool,
    ) -> Result<EmployeeResponse, ServiceError> {
        let db = &*self.db_pool;
        let model = self.require_employee(employee_id).await?;

        if model.is_active == is_active {
            return Ok(model_to_response(model));
        }

        let mut active: EmployeeActiveModel = model.into();
        active.is_active = Set(is_active);
        active.updated_at = Set(Some(Utc::now()));

        let updated = active.update(db).await.map_err(|e| {
            error!(error = %e, employee_id = %employee_id, "Failed to change employee activity");
            ServiceError::DatabaseError(e)
        })?;
        info!(employee_id = %employee_id, is_active, "Employee activity changed");
        Ok(model_to_response(updated))
    }

    async fn require_employee(&self, employee_id: Uuid) -> Result<EmployeeModel, ServiceError> {
        let db = &*self.db_pool;
        EmployeeEntity::find_by_id(employee_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Employee {} not found", employee_id)))
    }

    async fn emit(&self, event: Event) {
        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(event).await {
                warn!(error = %e, "Failed to send employee event");
            }
        }
    }
}

/// Trims, drops empties, and dedupes expertise areas while preserving the
/// given order (the first entry stays the legacy "primary" expertise).
fn normalize_expertise(areas: &[String]) -> Vec<String> {
    let mut seen = Vec::new();
    for area in areas {
        let trimmed = area.trim();
        if trimmed.is_empty() {
            continue;
        }
        if !seen.iter().any(|existing: &String| existing == trimmed) {
            seen.push(trimmed.to_string());
        }
    }
    seen
}

pub(crate) fn model_to_response(model: EmployeeModel) -> EmployeeResponse {
    let expertise_areas = model.expertise_list();
    let primary_expertise = expertise_areas.first().cloned();
    EmployeeResponse {
        id: model.id,
        employee_code: model.employee_code,
        name: model.name,
        manager: model.manager,
        phone: model.phone,
        email: model.email,
        expertise_areas,
        primary_expertise,
        is_active: model.is_active,
        created_at: model.created_at,
        updated_at: model.updated_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalize_expertise_dedupes_and_preserves_order() {
        let input = vec![
            " Plumbing ".to_string(),
            "Electrical".to_string(),
            "Plumbing".to_string(),
            "".to_string(),
        ];
        assert_eq!(normalize_expertise(&input), vec!["Plumbing", "Electrical"]);
    }

    #[test]
    fn primary_expertise_is_first_area() {
        let now = Utc::now();
        let model = EmployeeModel {
            id: Uuid::new_v4(),
            employee_code: "ENG-007".to_string(),
            name: "Sunita".to_string(),
            manager: None,
            phone: "+91-9800000007".to_string(),
            email: "sunita@fieldserve.dev".to_string(),
            expertise_areas: json!(["Electrical", "AC Repair"]),
            is_active: true,
            created_at: now,
            updated_at: Some(now),
        };
        let response = model_to_response(model);
        assert_eq!(response.primary_expertise.as_deref(), Some("Electrical"));
        assert_eq!(response.expertise_areas.len(), 2);
    }
}
