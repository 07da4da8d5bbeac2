use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::entities::product_category;
use crate::services::catalog::{
    CreateCategoryRequest, CreateProductRequest, ProductFilter, ProductListResponse,
    ProductResponse, UpdateProductRequest,
};
use crate::{auth::AuthUser, errors::ServiceError, ApiResponse, AppState, ListQuery};

// Categories

#[utoipa::path(
    get,
    path = "/api/v1/categories",
    summary = "List product categories",
    responses(
        (status = 200, description = "Categories retrieved", body = ApiResponse<Vec<product_category::Model>>),
    ),
    security(("Bearer" = []))
)]
pub async fn list_categories(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<product_category::Model>>>, ServiceError> {
    let categories = state.services.catalog.list_categories().await?;
    Ok(Json(ApiResponse::success(categories)))
}

#[utoipa::path(
    post,
    path = "/api/v1/categories",
    summary = "Create a product category",
    request_body = CreateCategoryRequest,
    responses(
        (status = 201, description = "Category created", body = ApiResponse<product_category::Model>),
        (status = 409, description = "Category name taken", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn create_category(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(request): Json<CreateCategoryRequest>,
) -> Result<(StatusCode, Json<ApiResponse<product_category::Model>>), ServiceError> {
    let category = state.services.catalog.create_category(request).await?;
    state
        .services
        .audit
        .record(
            auth_user.user_id,
            "category.create",
            "category",
            Some(category.id.to_string()),
            None,
        )
        .await;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(category))))
}

#[utoipa::path(
    delete,
    path = "/api/v1/categories/{id}",
    summary = "Delete a product category",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Category deleted"),
        (status = 409, description = "Category still in use", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn delete_category(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, ServiceError> {
    state.services.catalog.delete_category(id).await?;
    state
        .services
        .audit
        .record(
            auth_user.user_id,
            "category.delete",
            "category",
            Some(id.to_string()),
            None,
        )
        .await;
    Ok(Json(ApiResponse::success(())))
}

// Products

#[derive(Debug, Deserialize)]
pub struct ProductQuery {
    pub category_id: Option<Uuid>,
    #[serde(default)]
    pub low_stock_only: bool,
    #[serde(default)]
    pub include_inactive: bool,
}

#[utoipa::path(
    get,
    path = "/api/v1/products",
    summary = "List products with stock figures",
    params(
        ("page" = Option<u64>, Query, description = "Page number (default: 1)"),
        ("limit" = Option<u64>, Query, description = "Items per page (default: 20)"),
        ("search" = Option<String>, Query, description = "Match against name or generic name"),
        ("category_id" = Option<Uuid>, Query, description = "Filter by category"),
        ("low_stock_only" = Option<bool>, Query, description = "Only products at or below reorder level"),
        ("include_inactive" = Option<bool>, Query, description = "Include archived products"),
    ),
    responses(
        (status = 200, description = "Products retrieved", body = ApiResponse<ProductListResponse>),
    ),
    security(("Bearer" = []))
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
    Query(product_query): Query<ProductQuery>,
) -> Result<Json<ApiResponse<ProductListResponse>>, ServiceError> {
    let filter = ProductFilter {
        search: query.search.clone(),
        category_id: product_query.category_id,
        low_stock_only: product_query.low_stock_only,
        include_inactive: product_query.include_inactive,
    };
    let result = state
        .services
        .catalog
        .list_products(filter, query.page, query.limit)
        .await?;
    Ok(Json(ApiResponse::success(result)))
}

#[utoipa::path(
    post,
    path = "/api/v1/products",
    summary = "Create a product",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Product created", body = ApiResponse<ProductResponse>),
        (status = 400, description = "Invalid request", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn create_product(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Json(request): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ApiResponse<ProductResponse>>), ServiceError> {
    let product = state.services.catalog.create_product(request).await?;
    state
        .services
        .audit
        .record(
            auth_user.user_id,
            "product.create",
            "product",
            Some(product.id.to_string()),
            None,
        )
        .await;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(product))))
}

#[utoipa::path(
    get,
    path = "/api/v1/products/{id}",
    summary = "Get a product with stock figures",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product found", body = ApiResponse<ProductResponse>),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<ProductResponse>>, ServiceError> {
    let product = state.services.catalog.get_product(id).await?;
    Ok(Json(ApiResponse::success(product)))
}

#[utoipa::path(
    put,
    path = "/api/v1/products/{id}",
    summary = "Update a product",
    params(("id" = Uuid, Path, description = "Product ID")),
    request_body = UpdateProductRequest,
    responses(
        (status = 200, description = "Product updated", body = ApiResponse<ProductResponse>),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn update_product(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<UpdateProductRequest>,
) -> Result<Json<ApiResponse<ProductResponse>>, ServiceError> {
    let product = state.services.catalog.update_product(id, request).await?;
    state
        .services
        .audit
        .record(
            auth_user.user_id,
            "product.update",
            "product",
            Some(id.to_string()),
            None,
        )
        .await;
    Ok(Json(ApiResponse::success(product)))
}

#[utoipa::path(
    post,
    path = "/api/v1/products/{id}/archive",
    summary = "Archive a product",
    params(("id" = Uuid, Path, description = "Product ID")),
    responses(
        (status = 200, description = "Product archived"),
        (status = 404, description = "Product not found", body = crate::errors::ErrorResponse),
    ),
    security(("Bearer" = []))
)]
pub async fn archive_product(
    State(state): State<AppState>,
    auth_user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<()>>, ServiceError> {
    state.services.catalog.archive_product(id).await?;
    state
        .services
        .audit
        .record(
            auth_user.user_id,
            "product.archive",
            "product",
            Some(id.to_string()),
            None,
        )
        .await;
    Ok(Json(ApiResponse::success(())))
}
