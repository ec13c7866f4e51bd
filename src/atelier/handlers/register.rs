use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use std::sync::Arc;
use tracing::{info, instrument};

use super::{
    flow_error_response, missing_payload,
    types::{ErrorBody, OtpRequest, PageResponse, RegisterRequest, RegistrationView},
    visit_not_found,
};
use crate::{
    atelier::state::SiteState,
    gate::{RegistrationForm, VerificationMode},
};

#[utoipa::path(
    post,
    path= "/v1/visits/{visit_id}/register/otp",
    request_body = OtpRequest,
    responses (
        (status = 200, description = "Code sent, resend disabled until the cooldown ends", body = PageResponse),
        (status = 400, description = "Missing or invalid email address", body = ErrorBody),
        (status = 404, description = "Unknown visit"),
        (status = 429, description = "Resend still cooling down", body = ErrorBody),
        (status = 502, description = "OTP service failure", body = ErrorBody),
    ),
    params(
        ("visit_id" = String, Path, description = "Visit identifier"),
    ),
    tag= "register"
)]
// axum handler for requesting a one-time passcode
#[instrument(skip(state, payload))]
pub async fn request_otp(
    Path(visit_id): Path<String>,
    state: Extension<Arc<SiteState>>,
    payload: Option<Json<OtpRequest>>,
) -> impl IntoResponse {
    let request: OtpRequest = match payload {
        Some(Json(payload)) => payload,
        None => return missing_payload(),
    };

    let Some((_, visit)) = state.visit(&visit_id).await else {
        return visit_not_found(&visit_id);
    };

    let mut registration = visit.registration().await;
    if let Err(err) = registration.request_otp(&request.email).await {
        return flow_error_response(&err);
    }

    let page = PageResponse::new(visit.context().view())
        .with_registration(RegistrationView::new(registration.pending(), state.mode()))
        .with_notice("A code was sent to your email address.");

    (StatusCode::OK, Json(page)).into_response()
}

#[utoipa::path(
    post,
    path= "/v1/visits/{visit_id}/register",
    request_body = RegisterRequest,
    responses (
        (status = 201, description = "Account created, navigate to the login page", body = PageResponse),
        (status = 400, description = "A required field is missing", body = ErrorBody),
        (status = 404, description = "Unknown visit"),
        (status = 422, description = "The code was refused", body = ErrorBody),
        (status = 502, description = "Backend failure", body = ErrorBody),
    ),
    params(
        ("visit_id" = String, Path, description = "Visit identifier"),
    ),
    tag= "register"
)]
// axum handler for register
#[instrument(skip(state, payload))]
pub async fn register(
    Path(visit_id): Path<String>,
    state: Extension<Arc<SiteState>>,
    payload: Option<Json<RegisterRequest>>,
) -> impl IntoResponse {
    let request: RegisterRequest = match payload {
        Some(Json(payload)) => payload,
        None => return missing_payload(),
    };

    let Some((_, visit)) = state.visit(&visit_id).await else {
        return visit_not_found(&visit_id);
    };

    let form = RegistrationForm {
        email: request.email,
        password: request.password,
        code: request.code,
        privacy_agreed: request.privacy_agreed,
    };

    let mut registration = visit.registration().await;
    let session = match registration.register(&form).await {
        Ok(session) => session,
        Err(err) => return flow_error_response(&err),
    };

    info!(user_id = %session.user_id, "registered");

    let notice = match state.mode() {
        VerificationMode::Otp => "Registration complete, sign in to continue.",
        VerificationMode::EmailLink => {
            "Registration complete, follow the link in your email before signing in."
        }
    };

    let page = PageResponse::new(visit.context().view())
        .with_registration(RegistrationView::new(registration.pending(), state.mode()))
        .with_redirect("/login")
        .with_notice(notice);

    (StatusCode::CREATED, Json(page)).into_response()
}
