use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, Validate)]
#[sea_orm(table_name = "employees")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[validate(length(min = 1, max = 32, message = "Employee code is required"))]
    pub employee_code: String,

    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,

    pub manager: Option<String>,
    pub phone: String,

    #[validate(email(message = "Must be a valid email address"))]
    pub email: String,

    /// JSON array of expertise-area labels, e.g. ["Plumbing", "Electrical"].
    #[sea_orm(column_type = "Json")]
    pub expertise_areas: Json,

    /// Soft flag: inactive engineers keep their history but leave every
    /// assignment candidate pool.
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Model {
    /// Expertise areas as a plain list; tolerates malformed legacy rows.
    pub fn expertise_list(&self) -> Vec<String> {
        self.expertise_areas
            .as_array()
            .map(|areas| {
                areas
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_owned))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Compatibility accessor for the legacy single-expertise field:
    /// the first area of the set, if any. Not persisted separately.
    pub fn primary_expertise(&self) -> Option<String> {
        self.expertise_list().into_iter().next()
    }

    pub fn has_expertise(&self, area: &str) -> bool {
        self.expertise_list().iter().any(|a| a == area)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, _insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        Ok(self)
    }
}
