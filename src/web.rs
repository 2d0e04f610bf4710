// 🌐 Web Layer
// axum routes over the numerology engine, persistence and admin panel

use crate::admin::{self, AdminView, SessionStore, SESSION_COOKIE};
use crate::db::{
    delete_submission, get_all_submissions, get_recent_events, get_submission_stats,
    upsert_submission, SubmissionStats,
};
use crate::export::{chart_csv_bytes, render_chart_pdf, submissions_csv_bytes, CSV_FILE_NAME, PDF_FILE_NAME};
use crate::form::{validate, RawSubmission, ValidationError};
use crate::numerology::{BirthChart, BirthRecord};
use crate::render::{self, AdminContent, SaveStatus};
use crate::settings::Settings;
use anyhow::anyhow;
use axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Json, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Connection>>,
    pub sessions: Arc<Mutex<SessionStore>>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(conn: Connection, settings: Settings) -> Self {
        Self {
            db: Arc::new(Mutex::new(conn)),
            sessions: Arc::new(Mutex::new(SessionStore::new(settings.session_ttl_minutes))),
            settings: Arc::new(settings),
        }
    }

    fn contact(&self) -> &str {
        &self.settings.contact_url
    }
}

/// API Response wrapper
#[derive(Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
        }
    }

    pub fn failed(data: T, error: impl Into<String>) -> Self {
        Self {
            success: false,
            data,
            error: Some(error.into()),
        }
    }
}

#[derive(Serialize)]
pub struct ChartResponse {
    pub chart: BirthChart,
    pub saved: bool,
}

// ============================================================================
// Errors
// ============================================================================

pub enum AppError {
    Internal(anyhow::Error),
    Unauthorized,
    NotFound(String),
}

impl<E: Into<anyhow::Error>> From<E> for AppError {
    fn from(e: E) -> Self {
        AppError::Internal(e.into())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Internal(e) => {
                error!(error = %e, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error").into_response()
            }
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "Admin login required").into_response(),
            AppError::NotFound(what) => (StatusCode::NOT_FOUND, what).into_response(),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, AppError> {
    mutex
        .lock()
        .map_err(|_| AppError::Internal(anyhow!("state lock poisoned")))
}

// ============================================================================
// Helpers
// ============================================================================

/// name/dob/gender as a query string, for the download links
pub fn download_query(raw: &RawSubmission) -> String {
    [
        ("first_name", &raw.first_name),
        ("last_name", &raw.last_name),
        ("dob", &raw.dob),
        ("gender", &raw.gender),
    ]
    .iter()
    .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v.trim())))
    .collect::<Vec<_>>()
    .join("&")
}

fn compute(raw: &RawSubmission) -> Result<(BirthRecord, BirthChart), Vec<ValidationError>> {
    let record = validate(raw)?;
    let chart = BirthChart::compute(&record).map_err(|e| {
        vec![ValidationError {
            field: "first_name".to_string(),
            message: e.to_string(),
        }]
    })?;
    Ok((record, chart))
}

fn save(state: &AppState, record: &BirthRecord, chart: &BirthChart) -> Result<SaveStatus, AppError> {
    if record.phone_number.is_none() {
        return Ok(SaveStatus::NoPhone);
    }
    let conn = lock(&state.db)?;
    Ok(match upsert_submission(&conn, record, chart) {
        Ok(outcome) => SaveStatus::Saved(outcome),
        Err(e) => {
            error!(error = %e, "could not store submission");
            SaveStatus::Failed
        }
    })
}

fn attachment(content_type: &str, filename: &str, body: Vec<u8>) -> Response {
    (
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
        ],
        body,
    )
        .into_response()
}

fn validation_text(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .find_map(|pair| {
            pair.trim()
                .strip_prefix(SESSION_COOKIE)
                .and_then(|rest| rest.strip_prefix('='))
                .map(str::to_string)
        })
}

fn is_admin(state: &AppState, headers: &HeaderMap) -> Result<bool, AppError> {
    let Some(token) = session_token(headers) else {
        return Ok(false);
    };
    Ok(lock(&state.sessions)?.is_valid(&token))
}

fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    if is_admin(state, headers)? {
        Ok(())
    } else {
        Err(AppError::Unauthorized)
    }
}

// ============================================================================
// Public pages
// ============================================================================

/// GET / - Birth chart form
async fn serve_form(State(state): State<AppState>) -> impl IntoResponse {
    Html(render::form_page(&RawSubmission::default(), &[], state.contact()))
}

/// POST /chart - Validate, compute, store, render
async fn submit_chart(
    State(state): State<AppState>,
    Form(raw): Form<RawSubmission>,
) -> Result<Response, AppError> {
    if !raw.is_complete() {
        return Ok(Html(render::form_page(&raw, &[], state.contact())).into_response());
    }

    let (record, chart) = match compute(&raw) {
        Ok(computed) => computed,
        Err(errors) => {
            info!(errors = errors.len(), "form rejected");
            return Ok((
                StatusCode::UNPROCESSABLE_ENTITY,
                Html(render::form_page(&raw, &errors, state.contact())),
            )
                .into_response());
        }
    };

    let status = save(&state, &record, &chart)?;
    let page = render::chart_page(&chart, status, &download_query(&raw), state.contact());
    Ok(Html(page).into_response())
}

/// GET /chart.pdf - Chart as a PDF attachment
async fn chart_pdf(Query(raw): Query<RawSubmission>) -> Response {
    match compute(&raw) {
        Ok((_, chart)) => attachment("application/pdf", PDF_FILE_NAME, render_chart_pdf(&chart)),
        Err(errors) => (StatusCode::UNPROCESSABLE_ENTITY, validation_text(&errors)).into_response(),
    }
}

/// GET /chart.csv - Chart as a CSV attachment
async fn chart_csv(Query(raw): Query<RawSubmission>) -> Result<Response, AppError> {
    match compute(&raw) {
        Ok((_, chart)) => Ok(attachment("text/csv", CSV_FILE_NAME, chart_csv_bytes(&chart)?)),
        Err(errors) => Ok((StatusCode::UNPROCESSABLE_ENTITY, validation_text(&errors)).into_response()),
    }
}

async fn serve_services(State(state): State<AppState>) -> impl IntoResponse {
    Html(render::services_page(state.contact()))
}

async fn serve_about(State(state): State<AppState>) -> impl IntoResponse {
    Html(render::about_page(state.contact()))
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check() -> impl IntoResponse {
    Json(ApiResponse::ok("OK"))
}

/// POST /api/chart - JSON in, chart out
async fn api_chart(
    State(state): State<AppState>,
    Json(raw): Json<RawSubmission>,
) -> Result<Response, AppError> {
    match compute(&raw) {
        Ok((record, chart)) => {
            let saved = matches!(save(&state, &record, &chart)?, SaveStatus::Saved(_));
            Ok(Json(ApiResponse::ok(ChartResponse { chart, saved })).into_response())
        }
        Err(errors) => Ok((
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ApiResponse::failed(errors, "validation failed")),
        )
            .into_response()),
    }
}

/// GET /api/admin/stats - Aggregates as JSON
async fn api_admin_stats(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<ApiResponse<SubmissionStats>>, AppError> {
    require_admin(&state, &headers)?;
    let conn = lock(&state.db)?;
    Ok(Json(ApiResponse::ok(get_submission_stats(&conn)?)))
}

// ============================================================================
// Admin panel
// ============================================================================

#[derive(Debug, Default, Deserialize)]
struct AdminQuery {
    view: Option<String>,
    deleted: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LoginForm {
    username: String,
    password: String,
}

const EVENTS_SHOWN: usize = 100;

/// GET /admin - Login form, or the panel view named in ?view=
async fn admin_page(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(query): Query<AdminQuery>,
) -> Result<Response, AppError> {
    if !is_admin(&state, &headers)? {
        let page = render::admin_login_page(None, state.settings.admin_enabled(), state.contact());
        return Ok(Html(page).into_response());
    }

    let flash = query.deleted.as_ref().map(|phone| format!("Deleted record {}", phone));
    let conn = lock(&state.db)?;
    let page = match AdminView::parse(query.view.as_deref()) {
        AdminView::Records => {
            let submissions = get_all_submissions(&conn)?;
            render::admin_panel_page(&AdminContent::Records(&submissions), flash.as_deref(), state.contact())
        }
        AdminView::Aggregates => {
            let stats = get_submission_stats(&conn)?;
            render::admin_panel_page(&AdminContent::Aggregates(&stats), flash.as_deref(), state.contact())
        }
        AdminView::Events => {
            let events = get_recent_events(&conn, EVENTS_SHOWN)?;
            render::admin_panel_page(&AdminContent::Events(&events), flash.as_deref(), state.contact())
        }
    };

    Ok(Html(page).into_response())
}

/// POST /admin/login
async fn admin_login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    let token = {
        let conn = lock(&state.db)?;
        let mut sessions = lock(&state.sessions)?;
        admin::login(&conn, &state.settings.admin, &mut sessions, &form.username, &form.password)
    };

    match token {
        Some(token) => {
            let cookie = format!(
                "{}={}; Path=/; HttpOnly; SameSite=Strict; Max-Age={}",
                SESSION_COOKIE,
                token,
                state.settings.session_ttl_minutes * 60
            );
            Ok(([(header::SET_COOKIE, cookie)], Redirect::to("/admin")).into_response())
        }
        None => {
            let page = render::admin_login_page(
                Some("Invalid credentials."),
                state.settings.admin_enabled(),
                state.contact(),
            );
            Ok((StatusCode::UNAUTHORIZED, Html(page)).into_response())
        }
    }
}

/// POST /admin/logout
async fn admin_logout(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, AppError> {
    if let Some(token) = session_token(&headers) {
        lock(&state.sessions)?.revoke(&token);
    }
    let cleared = format!("{}=; Path=/; HttpOnly; SameSite=Strict; Max-Age=0", SESSION_COOKIE);
    Ok(([(header::SET_COOKIE, cleared)], Redirect::to("/admin")).into_response())
}

/// POST /admin/delete/:phone
async fn admin_delete(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(phone): Path<String>,
) -> Result<Response, AppError> {
    require_admin(&state, &headers)?;

    let deleted = {
        let conn = lock(&state.db)?;
        delete_submission(&conn, &phone, &state.settings.admin.username)?
    };

    if !deleted {
        warn!(phone = %phone, "delete requested for unknown record");
        return Err(AppError::NotFound(format!("No record for {}", phone)));
    }

    let target = format!("/admin?view=records&deleted={}", urlencoding::encode(&phone));
    Ok(Redirect::to(&target).into_response())
}

/// GET /admin/export.csv
async fn admin_export_csv(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, AppError> {
    require_admin(&state, &headers)?;
    let submissions = {
        let conn = lock(&state.db)?;
        get_all_submissions(&conn)?
    };
    Ok(attachment("text/csv", "user_data.csv", submissions_csv_bytes(&submissions)?))
}

// ============================================================================
// Router
// ============================================================================

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/chart", post(api_chart))
        .route("/admin/stats", get(api_admin_stats));

    Router::new()
        .route("/", get(serve_form))
        .route("/chart", post(submit_chart))
        .route("/chart.pdf", get(chart_pdf))
        .route("/chart.csv", get(chart_csv))
        .route("/services", get(serve_services))
        .route("/about", get(serve_about))
        .route("/admin", get(admin_page))
        .route("/admin/login", post(admin_login))
        .route("/admin/logout", post(admin_logout))
        .route("/admin/delete/:phone", post(admin_delete))
        .route("/admin/export.csv", get(admin_export_csv))
        .nest("/api", api_routes)
        .nest_service("/static", ServeDir::new("web"))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
