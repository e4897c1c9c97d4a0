use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::error;

use super::domain::{tag_catalog, ListingId};
use super::normalize::draft_from_value;
use super::query::CatalogParams;
use super::repository::{ListingRepository, RepositoryError};
use super::service::{CatalogService, CatalogServiceError};
use crate::admin::{bearer_token, AdminAuthenticator, AuthError};
use crate::config::ContactConfig;
use crate::contact::{whatsapp_link, ContactForm};

/// Shared state behind every catalog route.
pub struct CatalogState<R> {
    pub service: Arc<CatalogService<R>>,
    pub auth: Arc<AdminAuthenticator>,
    pub contact: ContactConfig,
}

impl<R> Clone for CatalogState<R> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            auth: Arc::clone(&self.auth),
            contact: self.contact.clone(),
        }
    }
}

impl<R> CatalogState<R> {
    pub fn new(service: Arc<CatalogService<R>>, auth: Arc<AdminAuthenticator>) -> Self {
        Self {
            service,
            auth,
            contact: ContactConfig::default(),
        }
    }

    pub fn with_contact(mut self, contact: ContactConfig) -> Self {
        self.contact = contact;
        self
    }
}

/// Public catalog, admin writes and the contact endpoint.
pub fn catalog_router<R>(state: CatalogState<R>) -> Router
where
    R: ListingRepository + 'static,
{
    Router::new()
        .route("/healthz", get(healthz_handler))
        .route(
            "/api/imoveis",
            get(list_handler::<R>).post(create_handler::<R>),
        )
        .route("/api/imoveis/facets", get(facets_handler::<R>))
        .route(
            "/api/imoveis/:id",
            get(get_handler::<R>)
                .put(update_handler::<R>)
                .delete(delete_handler::<R>),
        )
        .route("/api/admin/login", post(login_handler::<R>))
        .route("/api/admin/logout", post(logout_handler::<R>))
        .route("/api/tags", get(tags_handler))
        .route("/api/contato", post(contact_handler::<R>))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginRequest {
    #[serde(default)]
    email: String,
    #[serde(default, alias = "senha")]
    password: String,
}

async fn healthz_handler() -> &'static str {
    "ok"
}

pub(crate) async fn list_handler<R>(
    State(state): State<CatalogState<R>>,
    Query(params): Query<CatalogParams>,
) -> Response
where
    R: ListingRepository + 'static,
{
    match state.service.list(&params.query(), params.page_request()) {
        Ok(page) => (StatusCode::OK, Json(page)).into_response(),
        Err(err) => service_error(err),
    }
}

pub(crate) async fn facets_handler<R>(State(state): State<CatalogState<R>>) -> Response
where
    R: ListingRepository + 'static,
{
    match state.service.facets() {
        Ok(facets) => (StatusCode::OK, Json(facets)).into_response(),
        Err(err) => service_error(err),
    }
}

pub(crate) async fn get_handler<R>(
    State(state): State<CatalogState<R>>,
    Path(id): Path<String>,
) -> Response
where
    R: ListingRepository + 'static,
{
    match state.service.get(&ListingId(id)) {
        Ok(listing) => (StatusCode::OK, Json(listing)).into_response(),
        Err(err) => service_error(err),
    }
}

pub(crate) async fn create_handler<R>(
    State(state): State<CatalogState<R>>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> Response
where
    R: ListingRepository + 'static,
{
    if let Err(response) = require_admin(&state.auth, &headers) {
        return response;
    }
    let draft = match draft_from_value(&payload) {
        Ok(draft) => draft,
        Err(err) => return error_body(StatusCode::UNPROCESSABLE_ENTITY, err.to_string()),
    };
    match state.service.create(draft) {
        Ok(listing) => (StatusCode::CREATED, Json(listing)).into_response(),
        Err(err) => service_error(err),
    }
}

pub(crate) async fn update_handler<R>(
    State(state): State<CatalogState<R>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> Response
where
    R: ListingRepository + 'static,
{
    if let Err(response) = require_admin(&state.auth, &headers) {
        return response;
    }
    let draft = match draft_from_value(&payload) {
        Ok(draft) => draft,
        Err(err) => return error_body(StatusCode::UNPROCESSABLE_ENTITY, err.to_string()),
    };
    match state.service.update(&ListingId(id), draft) {
        Ok(listing) => (StatusCode::OK, Json(listing)).into_response(),
        Err(err) => service_error(err),
    }
}

pub(crate) async fn delete_handler<R>(
    State(state): State<CatalogState<R>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Response
where
    R: ListingRepository + 'static,
{
    if let Err(response) = require_admin(&state.auth, &headers) {
        return response;
    }
    match state.service.delete(&ListingId(id)) {
        Ok(()) => (StatusCode::OK, Json(json!({ "ok": true }))).into_response(),
        Err(err) => service_error(err),
    }
}

pub(crate) async fn login_handler<R>(
    State(state): State<CatalogState<R>>,
    Json(request): Json<LoginRequest>,
) -> Response
where
    R: ListingRepository + 'static,
{
    match state.auth.login(&request.email, &request.password) {
        Ok(session) => (StatusCode::OK, Json(session)).into_response(),
        Err(err) => auth_error(err),
    }
}

pub(crate) async fn logout_handler<R>(
    State(state): State<CatalogState<R>>,
    headers: HeaderMap,
) -> Response
where
    R: ListingRepository + 'static,
{
    let token = match require_admin(&state.auth, &headers) {
        Ok(token) => token,
        Err(response) => return response,
    };
    match state.auth.logout(&token) {
        Ok(_) => StatusCode::NO_CONTENT.into_response(),
        Err(err) => auth_error(err),
    }
}

async fn tags_handler() -> Response {
    (StatusCode::OK, Json(tag_catalog())).into_response()
}

pub(crate) async fn contact_handler<R>(
    State(state): State<CatalogState<R>>,
    Json(form): Json<ContactForm>,
) -> Response
where
    R: ListingRepository + 'static,
{
    match form.validate() {
        Ok(()) => {
            let url = whatsapp_link(&state.contact.whatsapp_number, &form.whatsapp_message());
            (StatusCode::OK, Json(json!({ "whatsapp_url": url }))).into_response()
        }
        Err(errors) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "errors": errors })),
        )
            .into_response(),
    }
}

/// Returns the caller's token when it names a live admin session.
fn require_admin(auth: &AdminAuthenticator, headers: &HeaderMap) -> Result<String, Response> {
    let token = bearer_token(headers).ok_or_else(|| auth_error(AuthError::MissingToken))?;
    auth.authorize(&token).map_err(auth_error)?;
    Ok(token)
}

fn auth_error(err: AuthError) -> Response {
    match err {
        AuthError::Unavailable | AuthError::Hash(_) => {
            error!(error = %err, "admin session check failed");
            error_body(StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
        other => error_body(StatusCode::UNAUTHORIZED, other.to_string()),
    }
}

fn service_error(err: CatalogServiceError) -> Response {
    match err {
        CatalogServiceError::Validation(err) => {
            error_body(StatusCode::UNPROCESSABLE_ENTITY, err.to_string())
        }
        CatalogServiceError::Repository(RepositoryError::NotFound) => {
            error_body(StatusCode::NOT_FOUND, "imóvel não encontrado")
        }
        CatalogServiceError::Repository(RepositoryError::Conflict) => {
            error_body(StatusCode::CONFLICT, "imóvel já existe")
        }
        CatalogServiceError::Repository(other) => {
            error!(error = %other, "listing store failure");
            error_body(StatusCode::INTERNAL_SERVER_ERROR, other.to_string())
        }
    }
}

fn error_body(status: StatusCode, message: impl Into<String>) -> Response {
    let payload = json!({
        "error": message.into(),
    });
    (status, Json(payload)).into_response()
}
