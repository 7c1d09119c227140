use crate::{
    db::DbPool,
    entities::order::{
        self, ActiveModel as OrderActiveModel, Entity as OrderEntity, Model as OrderModel,
        OrderStatus, Priority,
    },
    entities::order_item::{
        self, ActiveModel as OrderItemActiveModel, Entity as OrderItemEntity,
        Model as OrderItemModel, ItemStatus,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Request/Response types for the order service
#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateOrderRequest {
    #[validate(length(min = 1, message = "Customer name is required"))]
    pub customer_name: String,
    #[validate(length(min = 7, max = 20, message = "Customer phone must be 7-20 characters"))]
    pub customer_phone: String,
    #[validate(email(message = "Customer email must be a valid email address"))]
    pub customer_email: String,

    #[validate]
    pub address: ServiceAddress,

    pub priority: Option<Priority>,
    pub notes: Option<String>,

    /// Billing adjustments; the subtotal is always derived from the items.
    pub discount: Option<Decimal>,
    pub tax: Option<Decimal>,
    pub service_charge: Option<Decimal>,

    #[validate]
    pub items: Vec<CreateOrderItemInput>,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct ServiceAddress {
    #[validate(length(min = 1, message = "House number is required"))]
    pub house: String,
    #[validate(length(min = 1, message = "Area is required"))]
    pub area: String,
    pub landmark: Option<String>,
    #[validate(length(min = 1, message = "City is required"))]
    pub city: String,
    #[validate(length(min = 1, message = "State is required"))]
    pub state: String,
    #[validate(length(min = 4, max = 10, message = "Pincode must be 4-10 characters"))]
    pub pincode: String,
}

#[derive(Debug, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateOrderItemInput {
    pub service_id: Uuid,
    #[validate(length(min = 1, message = "Service name is required"))]
    pub service_name: String,
    pub variant_id: Option<Uuid>,
    pub variant_name: Option<String>,
    #[validate(length(min = 1, message = "Category is required"))]
    pub category_id: String,
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantity: i32,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderItemResponse {
    pub id: Uuid,
    pub order_id: Uuid,
    pub service_id: Uuid,
    pub service_name: String,
    pub variant_id: Option<Uuid>,
    pub variant_name: Option<String>,
    pub category_id: String,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub total_price: Decimal,
    pub status: ItemStatus,
    pub engineer_id: Option<Uuid>,
    pub engineer_name: Option<String>,
    pub assigned_at: Option<DateTime<Utc>>,
    pub scheduled_date: Option<NaiveDate>,
    pub time_slot: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
    pub rating: Option<i16>,
    pub review: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub order_number: String,
    pub customer_name: String,
    pub customer_phone: String,
    pub customer_email: String,
    pub address: AddressResponse,
    pub subtotal: Decimal,
    pub discount: Decimal,
    pub tax: Decimal,
    pub service_charge: Decimal,
    pub final_amount: Decimal,
    pub status: OrderStatus,
    pub priority: Priority,
    pub notes: Option<String>,
    pub admin_notes: Option<String>,
    pub rating: Option<i16>,
    pub review: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub version: i32,
    pub items: Vec<OrderItemResponse>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AddressResponse {
    pub house: String,
    pub area: String,
    pub landmark: Option<String>,
    pub city: String,
    pub state: String,
    pub pincode: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct OrderListResponse {
    pub orders: Vec<OrderResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Service for creating and reading orders. Lifecycle mutations live in
/// [`crate::services::order_status::OrderStatusService`].
#[derive(Clone)]
pub struct OrderService {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
}

impl OrderService {
    /// Creates a new order service instance
    pub fn new(db_pool: Arc<DbPool>, event_sender: Option<Arc<EventSender>>) -> Self {
        Self {
            db_pool,
            event_sender,
        }
    }

    /// Creates a new order with its items in a single transaction.
    #[instrument(skip(self, request), fields(customer_email = %request.customer_email))]
    pub async fn create_order(
        &self,
        request: CreateOrderRequest,
    ) -> Result<OrderResponse, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        if request.items.is_empty() {
            return Err(ServiceError::ValidationError(
                "An order needs at least one item".to_string(),
            ));
        }

        let discount = request.discount.unwrap_or(Decimal::ZERO);
        let tax = request.tax.unwrap_or(Decimal::ZERO);
        let service_charge = request.service_charge.unwrap_or(Decimal::ZERO);

        for (label, amount) in [
            ("discount", discount),
            ("tax", tax),
            ("service_charge", service_charge),
        ] {
            if amount < Decimal::ZERO {
                return Err(ServiceError::ValidationError(format!(
                    "{} must not be negative",
                    label
                )));
            }
        }

        let mut subtotal = Decimal::ZERO;
        for (index, item) in request.items.iter().enumerate() {
            if item.unit_price < Decimal::ZERO {
                return Err(ServiceError::ValidationError(format!(
                    "items[{index}].unit_price must not be negative"
                )));
            }
            subtotal += item.unit_price * Decimal::from(item.quantity);
        }

        let final_amount = subtotal - discount + tax + service_charge;
        if final_amount < Decimal::ZERO {
            return Err(ServiceError::ValidationError(format!(
                "discount ({discount}) exceeds the order value; final amount would be {final_amount}"
            )));
        }

        let db = &*self.db_pool;
        let now = Utc::now();
        let order_id = Uuid::new_v4();
        let order_number = generate_order_number();

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for order creation");
            ServiceError::DatabaseError(e)
        })?;

        let order_active_model = OrderActiveModel {
            id: Set(order_id),
            order_number: Set(order_number.clone()),
            customer_name: Set(request.customer_name.clone()),
            customer_phone: Set(request.customer_phone.clone()),
            customer_email: Set(request.customer_email.clone()),
            address_house: Set(request.address.house.clone()),
            address_area: Set(request.address.area.clone()),
            address_landmark: Set(request.address.landmark.clone()),
            address_city: Set(request.address.city.clone()),
            address_state: Set(request.address.state.clone()),
            address_pincode: Set(request.address.pincode.clone()),
            subtotal: Set(subtotal),
            discount: Set(discount),
            tax: Set(tax),
            service_charge: Set(service_charge),
            final_amount: Set(final_amount),
            status: Set(OrderStatus::Pending),
            priority: Set(request.priority.unwrap_or(Priority::Medium)),
            notes: Set(request.notes.clone()),
            admin_notes: Set(None),
            rating: Set(None),
            review: Set(None),
            created_at: Set(now),
            updated_at: Set(Some(now)),
            version: Set(1),
        };

        let order_model = order_active_model.insert(&txn).await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to create order in database");
            ServiceError::DatabaseError(e)
        })?;

        let mut item_models = Vec::with_capacity(request.items.len());
        for (index, item) in request.items.iter().enumerate() {
            let item_active_model = OrderItemActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(order_id),
                service_id: Set(item.service_id),
                service_name: Set(item.service_name.clone()),
                variant_id: Set(item.variant_id),
                variant_name: Set(item.variant_name.clone()),
                category_id: Set(item.category_id.clone()),
                quantity: Set(item.quantity),
                unit_price: Set(item.unit_price),
                total_price: Set(item.unit_price * Decimal::from(item.quantity)),
                status: Set(ItemStatus::Pending),
                engineer_id: Set(None),
                engineer_name: Set(None),
                assigned_at: Set(None),
                scheduled_date: Set(None),
                time_slot: Set(None),
                completed_at: Set(None),
                notes: Set(None),
                rating: Set(None),
                review: Set(None),
                position: Set(index as i32),
                created_at: Set(now),
                updated_at: Set(Some(now)),
            };

            let item_model = item_active_model.insert(&txn).await.map_err(|e| {
                error!(error = %e, order_id = %order_id, "Failed to create order item");
                ServiceError::DatabaseError(e)
            })?;
            item_models.push(item_model);
        }

        txn.commit().await.map_err(|e| {
            error!(error = %e, order_id = %order_id, "Failed to commit order creation transaction");
            ServiceError::DatabaseError(e)
        })?;

        info!(order_id = %order_id, order_number = %order_number, "Order created successfully");

        if let Some(event_sender) = &self.event_sender {
            if let Err(e) = event_sender.send(Event::OrderCreated(order_id)).await {
                tracing::warn!(error = %e, order_id = %order_id, "Failed to send order created event");
            }
        }

        Ok(model_to_response(order_model, item_models))
    }

    /// Retrieves an order with its items by ID.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order(&self, order_id: Uuid) -> Result<Option<OrderResponse>, ServiceError> {
        let db = &*self.db_pool;

        let order = OrderEntity::find_by_id(order_id)
            .one(db)
            .await
            .map_err(|e| {
                error!(error = %e, order_id = %order_id, "Failed to fetch order from database");
                ServiceError::DatabaseError(e)
            })?;

        match order {
            Some(order_model) => {
                let items = self.get_order_items(order_id).await?;
                Ok(Some(model_to_response(order_model, items)))
            }
            None => Ok(None),
        }
    }

    /// Resolves an order id from its public order number.
    #[instrument(skip(self))]
    pub async fn find_order_id_by_order_number(
        &self,
        order_number: &str,
    ) -> Result<Option<Uuid>, ServiceError> {
        let db = &*self.db_pool;
        let order = OrderEntity::find()
            .filter(order::Column::OrderNumber.eq(order_number))
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        Ok(order.map(|o| o.id))
    }

    /// Lists orders with pagination and an optional status filter.
    #[instrument(skip(self))]
    pub async fn list_orders(
        &self,
        page: u64,
        per_page: u64,
        status: Option<OrderStatus>,
    ) -> Result<OrderListResponse, ServiceError> {
        let db = &*self.db_pool;
        let page = page.max(1);
        let per_page = per_page.clamp(1, 100);

        let mut query = OrderEntity::find().order_by_desc(order::Column::CreatedAt);
        if let Some(status) = status {
            query = query.filter(order::Column::Status.eq(status));
        }

        let paginator = query.paginate(db, per_page);

        let total = paginator.num_items().await.map_err(|e| {
            error!(error = %e, "Failed to count orders");
            ServiceError::DatabaseError(e)
        })?;

        let orders = paginator.fetch_page(page - 1).await.map_err(|e| {
            error!(error = %e, page = page, per_page = per_page, "Failed to fetch orders page");
            ServiceError::DatabaseError(e)
        })?;

        let mut order_responses = Vec::with_capacity(orders.len());
        for order_model in orders {
            let items = self.get_order_items(order_model.id).await?;
            order_responses.push(model_to_response(order_model, items));
        }

        Ok(OrderListResponse {
            orders: order_responses,
            total,
            page,
            per_page,
        })
    }

    /// The items of an order in presentation order.
    #[instrument(skip(self), fields(order_id = %order_id))]
    pub async fn get_order_items(
        &self,
        order_id: Uuid,
    ) -> Result<Vec<OrderItemModel>, ServiceError> {
        let db = &*self.db_pool;
        OrderItemEntity::find()
            .filter(order_item::Column::OrderId.eq(order_id))
            .order_by_asc(order_item::Column::Position)
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)
    }
}

/// Public order numbers are short, upper-case, and prefixed for support
/// conversations ("FS-4F2A9C31").
fn generate_order_number() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("FS-{}", id[..8].to_uppercase())
}

pub(crate) fn item_to_response(model: OrderItemModel) -> OrderItemResponse {
    OrderItemResponse {
        id: model.id,
        order_id: model.order_id,
        service_id: model.service_id,
        service_name: model.service_name,
        variant_id: model.variant_id,
        variant_name: model.variant_name,
        category_id: model.category_id,
        quantity: model.quantity,
        unit_price: model.unit_price,
        total_price: model.total_price,
        status: model.status,
        engineer_id: model.engineer_id,
        engineer_name: model.engineer_name,
        assigned_at: model.assigned_at,
        scheduled_date: model.scheduled_date,
        time_slot: model.time_slot,
        completed_at: model.completed_at,
        notes: model.notes,
        rating: model.rating,
        review: model.review,
    }
}

/// Converts an order model (plus its items) to the response format.
pub(crate) fn model_to_response(model: OrderModel, items: Vec<OrderItemModel>) -> OrderResponse {
    OrderResponse {
        id: model.id,
        order_number: model.order_number,
        customer_name: model.customer_name,
        customer_phone: model.customer_phone,
        customer_email: model.customer_email,
        address: AddressResponse {
            house: model.address_house,
            area: model.address_area,
            landmark: model.address_landmark,
            city: model.address_city,
            state: model.address_state,
            pincode: model.address_pincode,
        },
        subtotal: model.subtotal,
        discount: model.discount,
        tax: model.tax,
        service_charge: model.service_charge,
        final_amount: model.final_amount,
        status: model.status,
        priority: model.priority,
        notes: model.notes,
        admin_notes: model.admin_notes,
        rating: model.rating,
        review: model.review,
        created_at: model.created_at,
        updated_at: model.updated_at,
        version: model.version,
        items: items.into_iter().map(item_to_response).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn sample_model() -> OrderModel {
        let now = Utc::now();
        OrderModel {
            id: Uuid::new_v4(),
            order_number: "FS-0001AB".to_string(),
            customer_name: "Asha Verma".to_string(),
            customer_phone: "+91-9800000001".to_string(),
            customer_email: "asha@example.com".to_string(),
            address_house: "14B".to_string(),
            address_area: "Indiranagar".to_string(),
            address_landmark: Some("Opp. metro".to_string()),
            address_city: "Bengaluru".to_string(),
            address_state: "Karnataka".to_string(),
            address_pincode: "560038".to_string(),
            subtotal: dec!(1500.00),
            discount: dec!(100.00),
            tax: dec!(270.00),
            service_charge: dec!(49.00),
            final_amount: dec!(1719.00),
            status: OrderStatus::Pending,
            priority: Priority::Medium,
            notes: None,
            admin_notes: None,
            rating: None,
            review: None,
            created_at: now,
            updated_at: Some(now),
            version: 1,
        }
    }

    #[test]
    fn final_amount_matches_components() {
        let model = sample_model();
        assert_eq!(model.computed_final_amount(), model.final_amount);
    }

    #[test]
    fn model_to_response_keeps_totals_and_address() {
        let model = sample_model();
        let id = model.id;
        let response = model_to_response(model, Vec::new());

        assert_eq!(response.id, id);
        assert_eq!(response.final_amount, dec!(1719.00));
        assert_eq!(response.address.city, "Bengaluru");
        assert_eq!(response.status, OrderStatus::Pending);
        assert!(response.items.is_empty());
    }

    #[test]
    fn order_numbers_are_prefixed_and_unique() {
        let a = generate_order_number();
        let b = generate_order_number();
        assert!(a.starts_with("FS-"));
        assert_eq!(a.len(), 11);
        assert_ne!(a, b);
    }
}
