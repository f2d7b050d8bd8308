use async_trait::async_trait;
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use std::sync::Arc;
use uuid::Uuid;

use crate::entities::{product, tariff_rule, tariff_rule::CustomerGroup};
use crate::errors::ServiceError;

/// Catalog snapshot of one product, as needed for pricing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductInfo {
    pub id: Uuid,
    pub name: String,
    pub sku: String,
    pub base_price: Decimal,
    pub category_id: Option<Uuid>,
}

impl From<product::Model> for ProductInfo {
    fn from(model: product::Model) -> Self {
        Self {
            id: model.id,
            name: model.name,
            sku: model.sku,
            base_price: model.base_price,
            category_id: model.category_id,
        }
    }
}

/// Narrow collaborator interface onto the product catalog and tariff store.
/// Pricing reads current catalog truth through this seam and nothing else.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Current catalog truth for a product; `None` when the id is unknown.
    async fn get_product(&self, id: Uuid) -> Result<Option<ProductInfo>, ServiceError>;

    /// All tariff rules for one customer group, back-office ordering.
    async fn get_tariff_rules(
        &self,
        group: CustomerGroup,
    ) -> Result<Vec<tariff_rule::Model>, ServiceError>;
}

/// Database-backed catalog implementation.
#[derive(Clone)]
pub struct SeaOrmCatalog {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmCatalog {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl ProductCatalog for SeaOrmCatalog {
    async fn get_product(&self, id: Uuid) -> Result<Option<ProductInfo>, ServiceError> {
        let product = product::Entity::find_by_id(id)
            .filter(product::Column::Active.eq(true))
            .one(&*self.db)
            .await?;
        Ok(product.map(ProductInfo::from))
    }

    async fn get_tariff_rules(
        &self,
        group: CustomerGroup,
    ) -> Result<Vec<tariff_rule::Model>, ServiceError> {
        let rules = tariff_rule::Entity::find()
            .filter(tariff_rule::Column::CustomerGroup.eq(group))
            .all(&*self.db)
            .await?;
        Ok(rules)
    }
}
