use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Fieldserve API",
        version = "0.3.0",
        description = r#"
# Fieldserve Order Management API

Backend for a household-services marketplace: customers book service
visits, operations manages the order lifecycle, engineer assignment,
visit scheduling, and workload reporting.

## Order lifecycle

Orders move pending → confirmed → scheduled → in_progress → completed,
with cancelled and postponed available as side exits from any
non-terminal state. Cancelling or completing an order cascades to every
item; resuming a postponed order restarts the workflow at pending.

## Auto-progression

Assigning an engineer to the last open item of a confirmed order moves
the order to scheduled automatically; completing the last item completes
the order.

## Error handling

Errors use a consistent response format:

```json
{
  "error": "Bad Request",
  "message": "marking an order cancelled requires a reason of at least 10 words (got 4)",
  "timestamp": "2025-03-10T10:30:00Z"
}
```
        "#,
        contact(
            name = "Fieldserve Engineering",
            email = "engineering@fieldserve.dev"
        ),
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Orders", description = "Order lifecycle and assignment endpoints"),
        (name = "Employees", description = "Engineer directory and workload endpoints"),
        (name = "Health", description = "Health check endpoints")
    ),
    paths(
        // Orders
        crate::handlers::orders::list_orders,
        crate::handlers::orders::create_order,
        crate::handlers::orders::get_order,
        crate::handlers::orders::get_order_by_number,
        crate::handlers::orders::get_order_items,
        crate::handlers::orders::update_order_status,
        crate::handlers::orders::update_order_item,
        crate::handlers::orders::assign_employee,
        crate::handlers::orders::auto_assign_order,
        crate::handlers::orders::eligible_engineers,

        // Employees
        crate::handlers::employees::list_employees,
        crate::handlers::employees::create_employee,
        crate::handlers::employees::get_employee,
        crate::handlers::employees::update_employee,
        crate::handlers::employees::deactivate_employee,
        crate::handlers::employees::activate_employee,
        crate::handlers::employees::workload_stats,
    ),
    components(
        schemas(
            // Common types
            crate::ApiResponse<serde_json::Value>,
            crate::PaginatedResponse<serde_json::Value>,
            crate::ListQuery,

            // Order types
            crate::services::orders::CreateOrderRequest,
            crate::services::orders::CreateOrderItemInput,
            crate::services::orders::ServiceAddress,
            crate::services::orders::OrderResponse,
            crate::services::orders::OrderItemResponse,
            crate::services::orders::AddressResponse,
            crate::services::order_status::UpdateOrderItemRequest,
            crate::services::order_status::ItemUpdateOutcome,
            crate::handlers::orders::UpdateOrderStatusRequest,
            crate::handlers::orders::AssignEmployeeRequest,
            crate::entities::order::OrderStatus,
            crate::entities::order::Priority,
            crate::entities::order_item::ItemStatus,

            // Assignment types
            crate::services::assignment::AssignmentOutcome,
            crate::services::assignment::AutoAssignOutcome,

            // Employee types
            crate::services::employees::CreateEmployeeRequest,
            crate::services::employees::UpdateEmployeeRequest,
            crate::services::employees::EmployeeResponse,

            // Workload types
            crate::services::workload::WorkloadSummary,
            crate::services::workload::EngineerWorkload,
            crate::services::workload::BusiestEngineer,
            crate::services::workload::LoadLevel,

            // Error types
            crate::errors::ErrorResponse
        )
    )
)]
pub struct ApiDocV1;

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_generates() {
        let doc = ApiDocV1::openapi();
        let json = serde_json::to_string(&doc).expect("openapi serializes");
        assert!(json.contains("/api/v1/orders"));
        assert!(json.contains("/api/v1/employees/workload"));
    }
}
