use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Botica API",
        version = "1.0.0",
        description = r#"
# Botica Pharmacy Management API

Inventory, dispensing, and point-of-sale backend for a hospital pharmacy.

## Features

- **Catalog & Inventory**: Products, categories, and batch-level stock with expiry tracking
- **Order Requests**: Ward order requests with pharmacist review and FEFO dispensing
- **Point of Sale**: Walk-in sales with VAT-inclusive pricing and senior/PWD discounts
- **Patients**: Patient registry for ward dispensing
- **Users & Roles**: Role-based access for admin, pharmacist, nurse, and medtech staff
- **Notifications**: Per-user notifications over REST, SSE, and WebSocket
- **Analytics**: Dashboard metrics for sales, stock, and expiry
- **Audit Trail**: Immutable log of every mutating action

## Authentication

All API endpoints require a JWT obtained from `/auth/login`. Include it in the
Authorization header:

```
Authorization: Bearer <your-jwt-token>
```

## Pagination

List endpoints support pagination with the following query parameters:
- `page`: Page number (default: 1)
- `limit`: Items per page (default: 20)
- `search`: Search term for filtering results
        "#
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    tags(
        (name = "Users", description = "User management endpoints"),
        (name = "Catalog", description = "Product and category endpoints"),
        (name = "Batches", description = "Batch inventory endpoints"),
        (name = "Orders", description = "Order request workflow endpoints"),
        (name = "POS", description = "Walk-in sale endpoints"),
        (name = "Patients", description = "Patient registry endpoints"),
        (name = "Notifications", description = "Notification endpoints"),
        (name = "Analytics", description = "Dashboard analytics endpoints"),
        (name = "Audit", description = "Audit trail endpoints")
    ),
    paths(
        // Users
        crate::handlers::users::list_users,
        crate::handlers::users::create_user,
        crate::handlers::users::get_me,
        crate::handlers::users::change_password,
        crate::handlers::users::get_user,
        crate::handlers::users::update_user,
        crate::handlers::users::deactivate_user,
        crate::handlers::users::reactivate_user,

        // Catalog
        crate::handlers::catalog::list_categories,
        crate::handlers::catalog::create_category,
        crate::handlers::catalog::delete_category,
        crate::handlers::catalog::list_products,
        crate::handlers::catalog::create_product,
        crate::handlers::catalog::get_product,
        crate::handlers::catalog::update_product,
        crate::handlers::catalog::archive_product,

        // Batches
        crate::handlers::batches::receive_batch,
        crate::handlers::batches::list_product_batches,
        crate::handlers::batches::get_batch,
        crate::handlers::batches::adjust_batch,
        crate::handlers::batches::delete_batch,
        crate::handlers::batches::expiring_batches,

        // Orders
        crate::handlers::orders::list_orders,
        crate::handlers::orders::create_order,
        crate::handlers::orders::get_order,
        crate::handlers::orders::approve_order,
        crate::handlers::orders::reject_order,
        crate::handlers::orders::dispense_order,
        crate::handlers::orders::cancel_order,

        // POS
        crate::handlers::pos::checkout,
        crate::handlers::pos::list_transactions,
        crate::handlers::pos::get_transaction,
        crate::handlers::pos::record_order_payment,

        // Patients
        crate::handlers::patients::list_patients,
        crate::handlers::patients::create_patient,
        crate::handlers::patients::get_patient,
        crate::handlers::patients::update_patient,
        crate::handlers::patients::delete_patient,

        // Notifications
        crate::handlers::notifications::list_notifications,
        crate::handlers::notifications::mark_read,
        crate::handlers::notifications::mark_all_read,
        crate::handlers::notifications::delete_notification,
        crate::handlers::notifications::unread_count,
        crate::handlers::notifications::stream_notifications,

        // Analytics
        crate::handlers::analytics::dashboard,
        crate::handlers::analytics::sales_metrics,
        crate::handlers::analytics::sales_trend,
        crate::handlers::analytics::top_products,
        crate::handlers::analytics::expiry_alerts,
        crate::handlers::analytics::low_stock,
        crate::handlers::analytics::order_status_counts,

        // Audit
        crate::handlers::audit::list_audit_logs,
    ),
    components(
        schemas(
            // Common types
            crate::ApiResponse<serde_json::Value>,
            crate::ListQuery,

            // User types
            crate::services::users::CreateUserRequest,
            crate::services::users::UpdateUserRequest,
            crate::services::users::ChangePasswordRequest,
            crate::services::users::UserResponse,
            crate::services::users::UserListResponse,

            // Catalog types
            crate::services::catalog::CreateCategoryRequest,
            crate::services::catalog::CreateProductRequest,
            crate::services::catalog::UpdateProductRequest,
            crate::services::catalog::ProductResponse,
            crate::services::catalog::ProductListResponse,
            crate::entities::product_category::Model,

            // Batch types
            crate::services::batches::BatchStatus,
            crate::services::batches::ReceiveBatchRequest,
            crate::services::batches::AdjustBatchRequest,
            crate::services::batches::BatchResponse,

            // Order types
            crate::services::orders::OrderItemRequest,
            crate::services::orders::CreateOrderRequest,
            crate::services::orders::RejectOrderRequest,
            crate::services::orders::OrderItemResponse,
            crate::services::orders::OrderResponse,
            crate::services::orders::OrderListResponse,

            // POS types
            crate::services::pos::DiscountKind,
            crate::services::pos::CheckoutItemRequest,
            crate::services::pos::PaymentRequest,
            crate::services::pos::CheckoutRequest,
            crate::services::pos::WalkInItemResponse,
            crate::services::pos::PaymentResponse,
            crate::services::pos::TransactionResponse,
            crate::services::pos::TransactionListResponse,
            crate::handlers::pos::OrderPaymentBody,

            // Patient types
            crate::services::patients::CreatePatientRequest,
            crate::services::patients::UpdatePatientRequest,
            crate::services::patients::PatientListResponse,
            crate::entities::patient::Model,

            // Notification types
            crate::services::notifications::NotificationResponse,
            crate::services::notifications::NotificationListResponse,

            // Analytics types
            crate::services::analytics::DashboardResponse,
            crate::services::analytics::SalesMetrics,
            crate::services::analytics::PeriodMetrics,
            crate::services::analytics::ChannelMetrics,
            crate::services::analytics::DailySales,
            crate::services::analytics::TopProduct,
            crate::services::analytics::ExpiryAlerts,
            crate::services::analytics::LowStockProduct,
            crate::services::analytics::OrderStatusCounts,

            // Audit types
            crate::services::audit::AuditLogListResponse,
            crate::entities::audit_log::Model,

            // Error types
            crate::errors::ErrorResponse
        )
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDocV1;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "Bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

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
        let openapi = ApiDocV1::openapi();
        let json = serde_json::to_string_pretty(&openapi).unwrap();
        assert!(json.contains("Botica API"));
        assert!(json.contains("/api/v1/orders"));
        assert!(json.contains("/api/v1/pos/checkout"));
        assert!(json.contains("OrderPaymentBody"));
        assert!(json.contains("Bearer"));
    }
}
