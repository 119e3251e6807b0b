use actix_web::{HttpResponse, get, rt, web};
use serde_json::json;
use tracing::{debug, info, warn};

use crate::{
    AppState, db,
    error::AppError,
    models::{
        events::{FimEventsResponse, HuntingResponse, ResultRow},
        filters::FilterSet,
    },
    search::{self, Profile, normalize},
};

const HISTORY_LIMIT: i64 = 100;

pub fn register(cfg: &mut web::ServiceConfig) {
    cfg.service(health)
        .service(hunting)
        .service(fim_inventory)
        .service(fim_events)
        .service(event_history);
}

#[get("/healthz")]
async fn health() -> HttpResponse {
    HttpResponse::Ok().json(json!({
        "status": "ok",
        "service": "sentry-backend",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

#[get("/api/hunting")]
async fn hunting(
    query: web::Query<FilterSet>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let filters = query.into_inner();
    let page = search::resolve(filters.page.as_deref(), filters.size.as_deref());
    let body = search::synthesize(&filters);
    debug!(query = %json!(body), "hunting query");

    let response = state.indexer.search(&body).await?;
    let rows: Vec<ResultRow> = response
        .hits
        .hits
        .iter()
        .map(|hit| normalize(hit, Profile::Hunting))
        .collect();
    let total = search::reconcile_total(response.hits.total.as_ref(), rows.len());

    Ok(HttpResponse::Ok().json(HuntingResponse {
        success: true,
        page: page.page,
        size: page.size,
        total,
        data: rows,
        debug: state.debug_query.then(|| json!({ "query": body })),
    }))
}

#[get("/api/fim/{agent_id}")]
async fn fim_inventory(
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let agent_id = checked_agent_id(path.into_inner())?;
    let items = state.wazuh.syscheck(&agent_id).await?;

    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "data": items
    })))
}

#[get("/api/events/{agent_id}")]
async fn fim_events(
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let agent_id = checked_agent_id(path.into_inner())?;
    let response = state
        .indexer
        .search(&search::syscheck_events(&agent_id))
        .await?;
    let rows: Vec<ResultRow> = response
        .hits
        .hits
        .iter()
        .map(|hit| normalize(hit, Profile::Fim))
        .collect();

    persist_in_background(&state, rows.clone());

    let latest_alert = rows
        .iter()
        .find(|row| row.level().is_some_and(|level| level >= state.alert_min_level))
        .cloned();
    if let (Some(row), Some(notifier)) = (latest_alert, state.notifier.clone()) {
        rt::spawn(async move {
            if let Err(err) = notifier.send_alert(&row).await {
                warn!(error = %err, id = ?row.id, "failed to send alert");
            }
        });
    }

    Ok(HttpResponse::Ok().json(FimEventsResponse {
        success: true,
        total_hits: rows.len() as u64,
        data: rows,
    }))
}

#[get("/api/db/history")]
async fn event_history(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    let rows = db::history(&state.pool, HISTORY_LIMIT).await?;
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "data": rows
    })))
}

fn persist_in_background(state: &AppState, rows: Vec<ResultRow>) {
    if rows.is_empty() {
        return;
    }
    let pool = state.pool.clone();
    rt::spawn(async move {
        let mut stored = 0usize;
        for row in &rows {
            match db::save_fim_row(&pool, row).await {
                Ok(true) => stored += 1,
                Ok(false) => {}
                Err(err) => warn!(error = %err, id = ?row.id, "failed to store FIM event"),
            }
        }
        info!(stored, received = rows.len(), "FIM events persisted");
    });
}

/// Agent ids end up in upstream URL paths.
fn checked_agent_id(raw: String) -> Result<String, AppError> {
    let agent_id = raw.trim();
    let valid = !agent_id.is_empty()
        && agent_id
            .chars()
            .all(|ch| ch.is_ascii_alphanumeric() || matches!(ch, '-' | '_'));
    if valid {
        Ok(agent_id.to_string())
    } else {
        Err(AppError::BadRequest(format!("invalid agent id: {raw}")))
    }
}
