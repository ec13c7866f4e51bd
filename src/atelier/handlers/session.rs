use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use std::sync::Arc;
use tracing::{info, instrument};

use super::{
    flow_error_response, missing_payload,
    types::{ErrorBody, LoginRequest, PageResponse},
    visit_not_found,
};
use crate::{atelier::state::SiteState, gate};

#[utoipa::path(
    post,
    path= "/v1/visits/{visit_id}/login",
    request_body = LoginRequest,
    responses (
        (status = 200, description = "Signed in, navigate to the home page", body = PageResponse),
        (status = 400, description = "Missing email or password", body = ErrorBody),
        (status = 403, description = "Email address not verified yet", body = ErrorBody),
        (status = 404, description = "Unknown visit"),
        (status = 502, description = "Identity provider refused the credentials", body = ErrorBody),
    ),
    params(
        ("visit_id" = String, Path, description = "Visit identifier"),
    ),
    tag= "session"
)]
// axum handler for login
#[instrument(skip(state, payload))]
pub async fn login(
    Path(visit_id): Path<String>,
    state: Extension<Arc<SiteState>>,
    payload: Option<Json<LoginRequest>>,
) -> impl IntoResponse {
    let request: LoginRequest = match payload {
        Some(Json(payload)) => payload,
        None => return missing_payload(),
    };

    let Some((_, visit)) = state.visit(&visit_id).await else {
        return visit_not_found(&visit_id);
    };

    match gate::sign_in(
        visit.identity(),
        state.mode(),
        &request.email,
        &request.password,
    )
    .await
    {
        Ok(session) => {
            info!(user_id = %session.user_id, "signed in");
            let context = visit.settled().await;
            let page = PageResponse::new(context.view()).with_redirect("/");
            (StatusCode::OK, Json(page)).into_response()
        }
        Err(err) => flow_error_response(&err),
    }
}

#[utoipa::path(
    post,
    path= "/v1/visits/{visit_id}/logout",
    responses (
        (status = 200, description = "Signed out, navigate to the home page", body = PageResponse),
        (status = 404, description = "Unknown visit"),
    ),
    params(
        ("visit_id" = String, Path, description = "Visit identifier"),
    ),
    tag= "session"
)]
// axum handler for logout
#[instrument(skip(state))]
pub async fn logout(
    Path(visit_id): Path<String>,
    state: Extension<Arc<SiteState>>,
) -> impl IntoResponse {
    let Some((_, visit)) = state.visit(&visit_id).await else {
        return visit_not_found(&visit_id);
    };

    visit.identity().sign_out();
    let context = visit.settled().await;
    let page = PageResponse::new(context.view())
        .with_redirect("/")
        .with_notice("Signed out.");

    (StatusCode::OK, Json(page)).into_response()
}
