use crate::{
    db::DbPool,
    entities::product::{self, Entity as ProductEntity},
    entities::product_batch::{self, Entity as BatchEntity},
    entities::product_category::{self, Entity as CategoryEntity},
    errors::ServiceError,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, ModelTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, instrument};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize, Deserialize, ToSchema, Validate)]
pub struct CreateCategoryRequest {
    #[validate(length(min = 1, max = 100, message = "Category name must be 1 to 100 characters"))]
    pub name: String,
    pub description: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Validate)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 200, message = "Product name must be 1 to 200 characters"))]
    pub name: String,
    pub generic_name: Option<String>,
    pub category_id: Option<Uuid>,
    pub unit_price: Decimal,
    #[validate(range(min = 0, message = "Reorder level cannot be negative"))]
    pub reorder_level: i32,
    #[serde(default)]
    pub requires_prescription: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Validate)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 200, message = "Product name must be 1 to 200 characters"))]
    pub name: Option<String>,
    pub generic_name: Option<String>,
    pub category_id: Option<Uuid>,
    pub unit_price: Option<Decimal>,
    #[validate(range(min = 0, message = "Reorder level cannot be negative"))]
    pub reorder_level: Option<i32>,
    pub requires_prescription: Option<bool>,
}

/// Product view with stock figures rolled up from its batches.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProductResponse {
    pub id: Uuid,
    pub name: String,
    pub generic_name: Option<String>,
    pub category_id: Option<Uuid>,
    pub unit_price: Decimal,
    pub reorder_level: i32,
    pub requires_prescription: bool,
    pub is_active: bool,
    /// Units across all batches, expired stock included.
    pub stock_on_hand: i64,
    /// Units in batches that have not expired.
    pub stock_available: i64,
    pub low_stock: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ProductListResponse {
    pub products: Vec<ProductResponse>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

#[derive(Debug, Default, Deserialize)]
pub struct ProductFilter {
    /// Substring match on name or generic name.
    pub search: Option<String>,
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub low_stock_only: bool,
    #[serde(default)]
    pub include_inactive: bool,
}

#[derive(Debug, Default, Clone, Copy)]
struct StockFigures {
    on_hand: i64,
    available: i64,
}

fn model_to_response(model: product::Model, stock: StockFigures) -> ProductResponse {
    let low_stock = stock.available <= model.reorder_level as i64;
    ProductResponse {
        id: model.id,
        name: model.name,
        generic_name: model.generic_name,
        category_id: model.category_id,
        unit_price: model.unit_price,
        reorder_level: model.reorder_level,
        requires_prescription: model.requires_prescription,
        is_active: model.is_active,
        stock_on_hand: stock.on_hand,
        stock_available: stock.available,
        low_stock,
        created_at: model.created_at,
        updated_at: model.updated_at,
    }
}

/// Service for the product catalog and its categories.
#[derive(Clone)]
pub struct CatalogService {
    db_pool: Arc<DbPool>,
}

impl CatalogService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    // Categories

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_category(
        &self,
        request: CreateCategoryRequest,
    ) -> Result<product_category::Model, ServiceError> {
        request.validate()?;
        let db = &*self.db_pool;

        let existing = CategoryEntity::find()
            .filter(product_category::Column::Name.eq(request.name.as_str()))
            .one(db)
            .await?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Category '{}' already exists",
                request.name
            )));
        }

        let model = product_category::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name),
            description: Set(request.description),
            created_at: Set(Utc::now()),
        }
        .insert(db)
        .await?;

        Ok(model)
    }

    #[instrument(skip(self))]
    pub async fn list_categories(&self) -> Result<Vec<product_category::Model>, ServiceError> {
        let db = &*self.db_pool;
        let categories = CategoryEntity::find()
            .order_by_asc(product_category::Column::Name)
            .all(db)
            .await?;
        Ok(categories)
    }

    /// Deletes a category. Refused while products still reference it.
    #[instrument(skip(self))]
    pub async fn delete_category(&self, category_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        let category = CategoryEntity::find_by_id(category_id)
            .one(db)
            .await?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Category {} not found", category_id))
            })?;

        let in_use = ProductEntity::find()
            .filter(product::Column::CategoryId.eq(category_id))
            .count(db)
            .await?;
        if in_use > 0 {
            return Err(ServiceError::InvalidOperation(format!(
                "Category is assigned to {} product(s)",
                in_use
            )));
        }

        category.delete(db).await?;
        Ok(())
    }

    // Products

    #[instrument(skip(self, request), fields(name = %request.name))]
    pub async fn create_product(
        &self,
        request: CreateProductRequest,
    ) -> Result<ProductResponse, ServiceError> {
        request.validate()?;
        if request.unit_price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Unit price cannot be negative".to_string(),
            ));
        }

        let db = &*self.db_pool;

        if let Some(category_id) = request.category_id {
            CategoryEntity::find_by_id(category_id)
                .one(db)
                .await?
                .ok_or_else(|| {
                    ServiceError::InvalidInput(format!("Category {} does not exist", category_id))
                })?;
        }

        let model = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(request.name),
            generic_name: Set(request.generic_name),
            category_id: Set(request.category_id),
            unit_price: Set(request.unit_price),
            reorder_level: Set(request.reorder_level),
            requires_prescription: Set(request.requires_prescription),
            is_active: Set(true),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(db)
        .await?;

        info!(product_id = %model.id, "product created");
        Ok(model_to_response(model, StockFigures::default()))
    }

    #[instrument(skip(self))]
    pub async fn get_product(&self, product_id: Uuid) -> Result<ProductResponse, ServiceError> {
        let db = &*self.db_pool;
        let model = ProductEntity::find_by_id(product_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        let stock = self.stock_for(&[product_id]).await?;
        Ok(model_to_response(
            model,
            stock.get(&product_id).copied().unwrap_or_default(),
        ))
    }

    #[instrument(skip(self))]
    pub async fn list_products(
        &self,
        filter: ProductFilter,
        page: u64,
        per_page: u64,
    ) -> Result<ProductListResponse, ServiceError> {
        let db = &*self.db_pool;
        let page = page.max(1);
        let per_page = per_page.clamp(1, 100);

        let mut query = ProductEntity::find();
        if let Some(search) = &filter.search {
            let pattern = format!("%{}%", search);
            query = query.filter(
                sea_orm::Condition::any()
                    .add(product::Column::Name.like(pattern.clone()))
                    .add(product::Column::GenericName.like(pattern)),
            );
        }
        if let Some(category_id) = filter.category_id {
            query = query.filter(product::Column::CategoryId.eq(category_id));
        }
        if !filter.include_inactive {
            query = query.filter(product::Column::IsActive.eq(true));
        }

        let total = query.clone().count(db).await?;
        let models = query
            .order_by_asc(product::Column::Name)
            .limit(per_page)
            .offset((page - 1) * per_page)
            .all(db)
            .await?;

        let ids: Vec<Uuid> = models.iter().map(|m| m.id).collect();
        let stock = self.stock_for(&ids).await?;

        let mut products: Vec<ProductResponse> = models
            .into_iter()
            .map(|m| {
                let figures = stock.get(&m.id).copied().unwrap_or_default();
                model_to_response(m, figures)
            })
            .collect();

        // The low-stock flag depends on batch data, so this filter is applied
        // after the page is built rather than in SQL.
        if filter.low_stock_only {
            products.retain(|p| p.low_stock);
        }

        Ok(ProductListResponse {
            products,
            total,
            page,
            per_page,
        })
    }

    #[instrument(skip(self, request))]
    pub async fn update_product(
        &self,
        product_id: Uuid,
        request: UpdateProductRequest,
    ) -> Result<ProductResponse, ServiceError> {
        request.validate()?;
        if let Some(price) = request.unit_price {
            if price < Decimal::ZERO {
                return Err(ServiceError::ValidationError(
                    "Unit price cannot be negative".to_string(),
                ));
            }
        }

        let db = &*self.db_pool;
        let model = ProductEntity::find_by_id(product_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        if let Some(category_id) = request.category_id {
            CategoryEntity::find_by_id(category_id)
                .one(db)
                .await?
                .ok_or_else(|| {
                    ServiceError::InvalidInput(format!("Category {} does not exist", category_id))
                })?;
        }

        let mut active: product::ActiveModel = model.into();
        if let Some(name) = request.name {
            active.name = Set(name);
        }
        if let Some(generic_name) = request.generic_name {
            active.generic_name = Set(Some(generic_name));
        }
        if let Some(category_id) = request.category_id {
            active.category_id = Set(Some(category_id));
        }
        if let Some(unit_price) = request.unit_price {
            active.unit_price = Set(unit_price);
        }
        if let Some(reorder_level) = request.reorder_level {
            active.reorder_level = Set(reorder_level);
        }
        if let Some(requires_prescription) = request.requires_prescription {
            active.requires_prescription = Set(requires_prescription);
        }
        active.updated_at = Set(Some(Utc::now()));

        let updated = active.update(db).await?;
        let stock = self.stock_for(&[product_id]).await?;
        Ok(model_to_response(
            updated,
            stock.get(&product_id).copied().unwrap_or_default(),
        ))
    }

    /// Archives a product so it stops appearing in the catalog. Stock and
    /// sales history are retained.
    #[instrument(skip(self))]
    pub async fn archive_product(&self, product_id: Uuid) -> Result<(), ServiceError> {
        let db = &*self.db_pool;
        let model = ProductEntity::find_by_id(product_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Product {} not found", product_id)))?;

        if !model.is_active {
            return Ok(());
        }

        let mut active: product::ActiveModel = model.into();
        active.is_active = Set(false);
        active.updated_at = Set(Some(Utc::now()));
        active.update(db).await?;

        info!(product_id = %product_id, "product archived");
        Ok(())
    }

    /// Stock figures per product, computed from current batches.
    async fn stock_for(
        &self,
        product_ids: &[Uuid],
    ) -> Result<HashMap<Uuid, StockFigures>, ServiceError> {
        if product_ids.is_empty() {
            return Ok(HashMap::new());
        }

        let db = &*self.db_pool;
        let today = Utc::now().date_naive();
        let batches = BatchEntity::find()
            .filter(product_batch::Column::ProductId.is_in(product_ids.to_vec()))
            .all(db)
            .await?;

        let mut stock: HashMap<Uuid, StockFigures> = HashMap::new();
        for batch in batches {
            let entry = stock.entry(batch.product_id).or_default();
            entry.on_hand += batch.quantity as i64;
            if batch.expiry_date >= today {
                entry.available += batch.quantity as i64;
            }
        }
        Ok(stock)
    }
}
