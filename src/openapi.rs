use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Fulfillment API",
        version = "1.0.0",
        description = r#"
# Order & Cash-on-Delivery Fulfillment API

Order lifecycle, cash-on-delivery payment collection, delivery tracking,
and returns processing.

## Authentication

All `/api/v1` endpoints require a bearer token:

```
Authorization: Bearer <your-jwt-token>
```

## Error Handling

Failures return a structured body with an appropriate HTTP status code:

```json
{
  "error": "Conflict",
  "message": "Invalid transition from shipped to cancelled",
  "timestamp": "2024-01-01T00:00:00Z"
}
```

## Pagination

List endpoints accept `page` (default: 1) and `limit` (default: 20).
        "#,
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080/api/v1", description = "Local development")
    ),
    tags(
        (name = "Orders", description = "Order lifecycle endpoints"),
        (name = "COD", description = "Cash-on-delivery ledger and delivery tracking"),
        (name = "Returns", description = "Return processing endpoints"),
        (name = "Health", description = "Health check endpoints")
    ),
    paths(
        // Orders
        crate::handlers::orders::create_order,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::update_order_status,
        crate::handlers::orders::cancel_order,

        // COD ledger and delivery workflow
        crate::handlers::cod::collect_payment,
        crate::handlers::cod::get_record,
        crate::handlers::cod::get_statistics,
        crate::handlers::cod::assign_staff,
        crate::handlers::cod::update_delivery_status,
        crate::handlers::cod::list_attempts,

        // Returns
        crate::handlers::returns::create_return,
        crate::handlers::returns::approve_return,
        crate::handlers::returns::complete_return,
        crate::handlers::returns::get_return,
        crate::handlers::returns::list_returns,
    ),
    components(
        schemas(
            // Common types
            crate::ApiResponse<serde_json::Value>,
            crate::PaginatedResponse<serde_json::Value>,
            crate::ListQuery,

            // Order types
            crate::services::orders::CreateOrderRequest,
            crate::services::orders::CreateOrderItemRequest,
            crate::services::orders::ShippingAddress,
            crate::services::orders::OrderResponse,
            crate::services::orders::OrderItemResponse,
            crate::handlers::orders::UpdateOrderStatusRequest,
            crate::entities::order::OrderStatus,
            crate::entities::order::PaymentMethod,

            // COD types
            crate::handlers::cod::CollectPaymentRequest,
            crate::handlers::cod::AssignStaffRequest,
            crate::handlers::cod::UpdateDeliveryStatusRequest,
            crate::services::cod::CodRecordResponse,
            crate::services::cod::CodStatistics,
            crate::services::delivery::DeliveryAttemptResponse,
            crate::entities::cod_record::CodPaymentStatus,
            crate::entities::cod_record::CodDeliveryStatus,
            crate::entities::delivery_attempt::AttemptStatus,

            // Return types
            crate::services::returns::CreateReturnRequest,
            crate::services::returns::CreateReturnItemRequest,
            crate::services::returns::ReturnResponse,
            crate::services::returns::ReturnItemResponse,
            crate::entities::return_entity::ReturnStatus,

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
        if let Some(components) = openapi.components.as_mut() {
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
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui")
        .url("/api-docs/openapi.json", ApiDocV1::openapi())
        .config(utoipa_swagger_ui::Config::from("/api-docs/openapi.json").try_it_out_enabled(true))
}
