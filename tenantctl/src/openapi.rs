//! OpenAPI documentation for the management API at `/api/v1/*`.

use utoipa::{
    Modify, OpenApi,
    openapi::security::{ApiKey, ApiKeyValue, SecurityScheme},
};

use crate::api;
use crate::api::models::users::{Alert, AlertLevel, AlertsResponse, ListResponse, User};

/// Security scheme for the trusted identity header.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.security_schemes.insert(
                "X-Tenantctl-User".to_string(),
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                    "x-tenantctl-user",
                    "Username of an active user, set by the fronting proxy.",
                ))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    servers(
        (url = "/api/v1", description = "Management API server")
    ),
    modifiers(&SecurityAddon),
    paths(
        api::handlers::users::list_users,
        api::handlers::users::get_user,
        api::handlers::users::create_user,
        api::handlers::users::update_user,
        api::handlers::users::delete_user,
    ),
    components(
        schemas(
            User,
            Alert,
            AlertLevel,
            ListResponse<User>,
            AlertsResponse<User>,
        )
    ),
    tags(
        (name = "users", description = "Tenant-scoped user administration"),
    ),
    info(
        title = "tenantctl",
        description = "Multi-tenant administrative API."
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_user_routes() {
        let doc = ApiDoc::openapi();
        assert!(doc.paths.paths.contains_key("/users"));
        assert!(doc.paths.paths.contains_key("/users/{id}"));

        let components = doc.components.expect("components");
        assert!(components.security_schemes.contains_key("X-Tenantctl-User"));
        assert!(components.schemas.contains_key("User"));
    }
}
