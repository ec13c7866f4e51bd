use utoipa::OpenApi;

use crate::atelier::handlers::{health, register, session, types, visits};
use crate::gate::{Capabilities, RegistrationState, ViewState};

/// `OpenAPI` document of every routed handler.
///
/// Title, version, contact and license come from the Cargo metadata.
#[derive(OpenApi)]
#[openapi(
    paths(
        health::health,
        visits::open_visit,
        visits::get_visit,
        visits::close_visit,
        session::login,
        session::logout,
        register::request_otp,
        register::register,
    ),
    components(schemas(
        health::Health,
        types::VisitResponse,
        types::PageResponse,
        types::RegistrationView,
        types::ErrorBody,
        types::LoginRequest,
        types::OtpRequest,
        types::RegisterRequest,
        ViewState,
        Capabilities,
        RegistrationState,
    )),
    tags(
        (name = "health", description = "Service status"),
        (name = "visits", description = "Page visits and the view they render"),
        (name = "session", description = "Sign-in and sign-out"),
        (name = "register", description = "Account registration"),
    )
)]
pub struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_paths() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&str> = doc.paths.paths.keys().map(String::as_str).collect();

        assert!(paths.contains(&"/health"));
        assert!(paths.contains(&"/v1/visits"));
        assert!(paths.contains(&"/v1/visits/{visit_id}"));
        assert!(paths.contains(&"/v1/visits/{visit_id}/login"));
        assert!(paths.contains(&"/v1/visits/{visit_id}/logout"));
        assert!(paths.contains(&"/v1/visits/{visit_id}/register/otp"));
        assert!(paths.contains(&"/v1/visits/{visit_id}/register"));
        assert_eq!(doc.info.title, env!("CARGO_PKG_NAME"));
    }
}
