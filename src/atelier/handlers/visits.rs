use axum::{
    extract::{Extension, Path},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use std::sync::Arc;
use tracing::{debug, instrument};

use super::{
    bearer_token,
    types::{PageResponse, RegistrationView, VisitResponse},
    visit_not_found,
};
use crate::atelier::state::SiteState;

#[utoipa::path(
    post,
    path= "/v1/visits",
    responses (
        (status = 201, description = "Visit opened", body = VisitResponse),
    ),
    params(
        ("Authorization" = Option<String>, Header, description = "Bearer id token restoring a previous session"),
    ),
    tag= "visits"
)]
// axum handler for opening a visit
#[instrument(skip_all)]
pub async fn open_visit(headers: HeaderMap, state: Extension<Arc<SiteState>>) -> impl IntoResponse {
    let (visit_id, visit) = state.open_visit(bearer_token(&headers)).await;
    let context = visit.settled().await;

    debug!(visit_id = %visit_id, signed_in = context.is_signed_in(), "visit ready");

    (
        StatusCode::CREATED,
        Json(VisitResponse {
            visit_id: visit_id.to_string(),
            view: context.view(),
        }),
    )
}

#[utoipa::path(
    get,
    path= "/v1/visits/{visit_id}",
    responses (
        (status = 200, description = "Current view of the visit", body = PageResponse),
        (status = 404, description = "Unknown visit"),
    ),
    params(
        ("visit_id" = String, Path, description = "Visit identifier"),
    ),
    tag= "visits"
)]
// axum handler for the current view
#[instrument(skip(state))]
pub async fn get_visit(
    Path(visit_id): Path<String>,
    state: Extension<Arc<SiteState>>,
) -> impl IntoResponse {
    let Some((_, visit)) = state.visit(&visit_id).await else {
        return visit_not_found(&visit_id);
    };

    let context = visit.settled().await;
    let registration = visit.registration().await;
    let page = PageResponse::new(context.view())
        .with_registration(RegistrationView::new(registration.pending(), state.mode()));

    (StatusCode::OK, Json(page)).into_response()
}

#[utoipa::path(
    delete,
    path= "/v1/visits/{visit_id}",
    responses (
        (status = 204, description = "Visit closed, in-flight work abandoned"),
        (status = 404, description = "Unknown visit"),
    ),
    params(
        ("visit_id" = String, Path, description = "Visit identifier"),
    ),
    tag= "visits"
)]
// axum handler for navigating away
#[instrument(skip(state))]
pub async fn close_visit(
    Path(visit_id): Path<String>,
    state: Extension<Arc<SiteState>>,
) -> impl IntoResponse {
    let Some((id, _)) = state.visit(&visit_id).await else {
        return visit_not_found(&visit_id);
    };

    if state.visits().remove(&id).await {
        debug!("visit closed");
        StatusCode::NO_CONTENT.into_response()
    } else {
        visit_not_found(&visit_id)
    }
}
