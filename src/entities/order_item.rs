use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Lifecycle states for a single service line within an order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    #[sea_orm(string_value = "pending")]
    Pending,
    #[sea_orm(string_value = "assigned")]
    Assigned,
    #[sea_orm(string_value = "scheduled")]
    Scheduled,
    #[sea_orm(string_value = "in_progress")]
    InProgress,
    #[sea_orm(string_value = "completed")]
    Completed,
    #[sea_orm(string_value = "cancelled")]
    Cancelled,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Pending => "pending",
            ItemStatus::Assigned => "assigned",
            ItemStatus::Scheduled => "scheduled",
            ItemStatus::InProgress => "in_progress",
            ItemStatus::Completed => "completed",
            ItemStatus::Cancelled => "cancelled",
        }
    }

    /// Position in the forward chain pending → assigned → scheduled →
    /// in_progress → completed. Cancelled sits outside the chain.
    pub fn chain_rank(&self) -> Option<u8> {
        match self {
            ItemStatus::Pending => Some(0),
            ItemStatus::Assigned => Some(1),
            ItemStatus::Scheduled => Some(2),
            ItemStatus::InProgress => Some(3),
            ItemStatus::Completed => Some(4),
            ItemStatus::Cancelled => None,
        }
    }

    /// Whether the item still counts against an engineer's open workload.
    pub fn is_active_work(&self) -> bool {
        matches!(
            self,
            ItemStatus::Pending
                | ItemStatus::Assigned
                | ItemStatus::Scheduled
                | ItemStatus::InProgress
        )
    }
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "order_items")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub order_id: Uuid,

    pub service_id: Uuid,
    pub service_name: String,
    pub variant_id: Option<Uuid>,
    pub variant_name: Option<String>,
    /// Category slug used for engineer expertise matching.
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

    /// Insertion order within the owning order; presentation order.
    pub position: i32,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::order::Entity",
        from = "Column::OrderId",
        to = "super::order::Column::Id"
    )]
    Order,
}

impl Related<super::order::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Order.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;

        let now = Utc::now();

        if insert {
            if let ActiveValue::NotSet = active_model.created_at {
                active_model.created_at = Set(now);
            }
        }

        if let ActiveValue::NotSet = active_model.updated_at {
            active_model.updated_at = Set(Some(now));
        }

        Ok(active_model)
    }
}
