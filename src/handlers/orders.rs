use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::order::OrderStatus;
use crate::services::assignment::{AssignmentOutcome, AutoAssignOutcome};
use crate::services::employees::EmployeeResponse;
use crate::services::order_status::{ItemUpdateOutcome, UpdateOrderItemRequest};
use crate::services::orders::{CreateOrderRequest, OrderItemResponse, OrderResponse};
use crate::{errors::ServiceError, ApiResponse, AppState, PaginatedResponse};

fn map_status_str(status: &str) -> Result<OrderStatus, ServiceError> {
    match status.to_ascii_lowercase().as_str() {
        "pending" => Ok(OrderStatus::Pending),
        "confirmed" => Ok(OrderStatus::Confirmed),
        "scheduled" => Ok(OrderStatus::Scheduled),
        "in_progress" => Ok(OrderStatus::InProgress),
        "completed" => Ok(OrderStatus::Completed),
        "cancelled" | "canceled" => Ok(OrderStatus::Cancelled),
        "postponed" => Ok(OrderStatus::Postponed),
        other => Err(ServiceError::InvalidStatus(format!(
            "Unknown order status: {other}"
        ))),
    }
}

// Resolve an order identifier that may be a UUID or an order_number string
async fn resolve_order_id(state: &AppState, id: &str) -> Result<Uuid, ServiceError> {
    if let Ok(uuid) = Uuid::parse_str(id) {
        return Ok(uuid);
    }
    if let Some(uuid) = state
        .services
        .order
        .find_order_id_by_order_number(id)
        .await?
    {
        return Ok(uuid);
    }
    Err(ServiceError::NotFound(format!(
        "Order with ID {} not found",
        id
    )))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct OrderListQuery {
    #[serde(default = "default_page")]
    pub page: u64,
    #[serde(default = "default_limit")]
    pub limit: u64,
    pub status: Option<String>,
}

fn default_page() -> u64 {
    1
}
fn default_limit() -> u64 {
    20
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UpdateOrderStatusRequest {
    /// Target status (snake_case, e.g. "in_progress")
    pub status: String,
    /// Required for cancellations and postponements (at least ten words)
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AssignEmployeeRequest {
    pub employee_id: Uuid,
    pub notes: Option<String>,
}

/// List orders with pagination and optional status filtering
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    summary = "List orders",
    params(
        ("page" = Option<u64>, Query, description = "Page number (default: 1)"),
        ("limit" = Option<u64>, Query, description = "Items per page (default: 20)"),
        ("status" = Option<String>, Query, description = "Filter by order status"),
    ),
    responses(
        (status = 200, description = "Orders retrieved successfully", body = ApiResponse<PaginatedResponse<OrderResponse>>),
        (status = 400, description = "Invalid request parameters", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<OrderListQuery>,
) -> Result<Json<ApiResponse<PaginatedResponse<OrderResponse>>>, ServiceError> {
    let status = query.status.as_deref().map(map_status_str).transpose()?;

    let result = state
        .services
        .order
        .list_orders(query.page, query.limit, status)
        .await?;

    let total_pages = result.total.div_ceil(result.per_page);
    Ok(Json(ApiResponse::success(PaginatedResponse {
        items: result.orders,
        total: result.total,
        page: result.page,
        limit: result.per_page,
        total_pages,
    })))
}

/// Create a new order
#[utoipa::path(
    post,
    path = "/api/v1/orders",
    summary = "Create order",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created successfully", body = ApiResponse<OrderResponse>),
        (status = 400, description = "Invalid request data", body = crate::errors::ErrorResponse),
        (status = 500, description = "Internal server error", body = crate::errors::ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn create_order(
    State(state): State<AppState>,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<ApiResponse<OrderResponse>>), ServiceError> {
    let created = state.services.order.create_order(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(created))))
}

/// Get an order by UUID or public order number
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}",
    summary = "Get order",
    params(("id" = String, Path, description = "Order UUID or order number")),
    responses(
        (status = 200, description = "Order retrieved successfully", body = ApiResponse<OrderResponse>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order_id = resolve_order_id(&state, &id).await?;
    let order = state
        .services
        .order
        .get_order(order_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
    Ok(Json(ApiResponse::success(order)))
}

/// Get order by its public order number (explicit route)
#[utoipa::path(
    get,
    path = "/api/v1/orders/by-number/{order_number}",
    summary = "Get order by number",
    params(("order_number" = String, Path, description = "Public order number (e.g. FS-4F2A9C31)")),
    responses(
        (status = 200, description = "Order retrieved successfully", body = ApiResponse<OrderResponse>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn get_order_by_number(
    State(state): State<AppState>,
    Path(order_number): Path<String>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order_id = state
        .services
        .order
        .find_order_id_by_order_number(&order_number)
        .await?
        .ok_or_else(|| {
            ServiceError::NotFound(format!("Order with number {} not found", order_number))
        })?;
    let order = state
        .services
        .order
        .get_order(order_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Order {} not found", order_id)))?;
    Ok(Json(ApiResponse::success(order)))
}

/// List the items of an order in presentation order
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}/items",
    summary = "List order items",
    params(("id" = String, Path, description = "Order UUID or order number")),
    responses(
        (status = 200, description = "Items retrieved successfully", body = ApiResponse<Vec<OrderItemResponse>>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn get_order_items(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<Vec<OrderItemResponse>>>, ServiceError> {
    let order_id = resolve_order_id(&state, &id).await?;
    let items = state.services.order.get_order_items(order_id).await?;
    Ok(Json(ApiResponse::success(
        items
            .into_iter()
            .map(crate::services::orders::item_to_response)
            .collect(),
    )))
}

/// Apply an order-level status transition (with cascades)
#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}/status",
    summary = "Update order status",
    params(("id" = String, Path, description = "Order UUID or order number")),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Status updated", body = ApiResponse<OrderResponse>),
        (status = 400, description = "Invalid transition or missing reason", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Concurrent modification", body = crate::errors::ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn update_order_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateOrderStatusRequest>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order_id = resolve_order_id(&state, &id).await?;
    let new_status = map_status_str(&request.status)?;
    let order = state
        .services
        .order_status
        .update_order_status(order_id, new_status, request.reason)
        .await?;
    Ok(Json(ApiResponse::success(order)))
}

/// Update fields of a single order item (status, notes, schedule)
#[utoipa::path(
    put,
    path = "/api/v1/orders/{id}/items/{item_id}",
    summary = "Update order item",
    params(
        ("id" = String, Path, description = "Order UUID or order number"),
        ("item_id" = Uuid, Path, description = "Order item UUID"),
    ),
    request_body = UpdateOrderItemRequest,
    responses(
        (status = 200, description = "Item updated", body = ApiResponse<ItemUpdateOutcome>),
        (status = 400, description = "Invalid update", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order or item not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Concurrent modification", body = crate::errors::ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn update_order_item(
    State(state): State<AppState>,
    Path((id, item_id)): Path<(String, Uuid)>,
    Json(request): Json<UpdateOrderItemRequest>,
) -> Result<Json<ApiResponse<ItemUpdateOutcome>>, ServiceError> {
    let order_id = resolve_order_id(&state, &id).await?;
    let now = state.config.local_now();
    let outcome = state
        .services
        .order_status
        .update_order_item(order_id, item_id, request, now)
        .await?;

    let mut response = ApiResponse::success(outcome);
    if response
        .data
        .as_ref()
        .is_some_and(|o| o.time_slot_cleared)
    {
        response.message =
            Some("The chosen time slot is no longer valid for the new date; please select a new slot".to_string());
    }
    Ok(Json(response))
}

/// Assign an engineer to an order item
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/items/{item_id}/assign",
    summary = "Assign engineer",
    params(
        ("id" = String, Path, description = "Order UUID or order number"),
        ("item_id" = Uuid, Path, description = "Order item UUID"),
    ),
    request_body = AssignEmployeeRequest,
    responses(
        (status = 200, description = "Engineer assigned", body = ApiResponse<AssignmentOutcome>),
        (status = 400, description = "Engineer inactive or item cancelled", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order, item, or employee not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn assign_employee(
    State(state): State<AppState>,
    Path((id, item_id)): Path<(String, Uuid)>,
    Json(request): Json<AssignEmployeeRequest>,
) -> Result<Json<ApiResponse<AssignmentOutcome>>, ServiceError> {
    let order_id = resolve_order_id(&state, &id).await?;
    let outcome = state
        .services
        .assignment
        .assign_employee(order_id, item_id, request.employee_id, request.notes)
        .await?;

    let mut response = ApiResponse::success(outcome);
    if response
        .data
        .as_ref()
        .is_some_and(|o| o.expertise_mismatch)
    {
        response.message = Some(
            "Assigned engineer does not match this item's expertise area".to_string(),
        );
    }
    Ok(Json(response))
}

/// Auto-assign the least-loaded eligible engineer to every open item
#[utoipa::path(
    post,
    path = "/api/v1/orders/{id}/auto-assign",
    summary = "Auto-assign order",
    params(("id" = String, Path, description = "Order UUID or order number")),
    responses(
        (status = 200, description = "Auto-assignment complete", body = ApiResponse<AutoAssignOutcome>),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn auto_assign_order(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<AutoAssignOutcome>>, ServiceError> {
    let order_id = resolve_order_id(&state, &id).await?;
    let outcome = state.services.assignment.auto_assign_order(order_id).await?;

    let mut response = ApiResponse::success(outcome);
    if let Some(skipped) = response
        .data
        .as_ref()
        .filter(|o| !o.skipped_items.is_empty())
        .map(|o| o.skipped_items.join(", "))
    {
        response.message = Some(format!("No eligible engineer found for: {}", skipped));
    }
    Ok(Json(response))
}

/// Advisory list of engineers eligible for an item's category
#[utoipa::path(
    get,
    path = "/api/v1/orders/{id}/eligible-engineers/{item_id}",
    summary = "Eligible engineers for item",
    params(
        ("id" = String, Path, description = "Order UUID or order number"),
        ("item_id" = Uuid, Path, description = "Order item UUID"),
    ),
    responses(
        (status = 200, description = "Eligible engineers", body = ApiResponse<Vec<EmployeeResponse>>),
        (status = 404, description = "Order or item not found", body = crate::errors::ErrorResponse),
    ),
    tag = "Orders"
)]
pub async fn eligible_engineers(
    State(state): State<AppState>,
    Path((id, item_id)): Path<(String, Uuid)>,
) -> Result<Json<ApiResponse<Vec<EmployeeResponse>>>, ServiceError> {
    let order_id = resolve_order_id(&state, &id).await?;
    let engineers = state
        .services
        .assignment
        .eligible_for_item(order_id, item_id)
        .await?;

    let payload = engineers
        .into_iter()
        .map(crate::services::employees::model_to_response)
        .collect();
    Ok(Json(ApiResponse::success(payload)))
}
