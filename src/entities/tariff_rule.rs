use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Customer segment a tariff rule applies to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
pub enum CustomerGroup {
    #[sea_orm(string_value = "distributor")]
    Distributor,
    #[sea_orm(string_value = "business")]
    Business,
    #[sea_orm(string_value = "hospital")]
    Hospital,
    #[sea_orm(string_value = "individual")]
    Individual,
}

/// Back-office owned discount rule, read-only to pricing.
///
/// Scope invariant: at most one of `product_id` / `category_id` is set.
/// Neither set means the rule is the group-global fallback.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tariff_rules")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub customer_group: CustomerGroup,
    pub discount_percent: Decimal,
    pub product_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
