//! API route handlers.

use axum::extract::{FromRequest, Query, Request, State};
use axum::http::header::{CONTENT_TYPE, HOST, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use serde_json::Value;
use tracing::{debug, info, warn};

use subforge_core::{Configuration, Template};
use subforge_storage::NewSubscription;

use crate::error::{ApiError, Result};
use crate::models::{
    ConvertRequest, DraftSavedResponse, DraftStatusResponse, FetchProxiesQuery, ProxiesResponse,
    SubQuery, SubResponse,
};
use crate::pipeline::{self, parse_subscription_urls, split_url_list};
use crate::session::{random_hex, SessionId, SESSION_TTL};
use crate::state::AppState;

/// Length in bytes of a subscription user id (24 hex characters).
const USER_ID_BYTES: usize = 12;

/// POST /convert - Build a configuration from subscription URLs.
pub async fn convert(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<ConvertRequest>,
) -> Result<Json<Configuration>> {
    let urls = require_urls(&req.urls)?;

    let mut template = state.default_template()?;
    if req.is_customer {
        if let Some(session) = SessionId::from_headers(&headers) {
            if let Some((draft, _)) = load_draft(&state, &session)? {
                debug!(session = session.as_str(), "converting with session draft");
                template = draft;
            }
        }
    }

    let build = pipeline::build(state.fetcher.as_ref(), &urls, template, req.is_split).await;
    info!(sources = urls.len(), split = req.is_split, "configuration converted");
    Ok(Json(build.config))
}

/// POST /sub - Build a configuration and issue a subscription link for it.
///
/// Accepts JSON or form-encoded bodies.
pub async fn create_subscription(
    State(state): State<AppState>,
    request: Request,
) -> Result<Json<SubResponse>> {
    let headers = request.headers().clone();
    let req = read_convert_request(request).await?;

    state.db.prune_drafts(SESSION_TTL)?;

    let urls = require_urls(&req.urls)?;

    let mut template = state.default_template()?;
    let mut config_hash = None;
    if req.is_customer {
        match SessionId::from_headers(&headers) {
            Some(session) => match load_draft(&state, &session)? {
                Some((draft, json_content)) => {
                    config_hash = Some(state.db.save_customer_config(&json_content)?);
                    template = draft;
                }
                None => {
                    // A session that already issued a link keeps its template.
                    config_hash = state
                        .db
                        .user(session.as_str())?
                        .and_then(|user| user.customer_config_hash);
                    if let Some(hash) = &config_hash {
                        if let Some(customer) = customer_template(&state, hash)? {
                            template = customer;
                        }
                    }
                }
            },
            None => warn!("customer template requested without a live session"),
        }
    }

    let build = pipeline::build(state.fetcher.as_ref(), &urls, template, req.is_split).await;

    let subscriptions: Vec<NewSubscription> = urls
        .iter()
        .zip(&build.sources)
        .enumerate()
        .map(|(i, (url, source))| NewSubscription {
            name: format!("Subscription {}", i + 1),
            url: url.clone(),
            last_hash: source.hash.clone(),
            user_info: source.user_info.clone(),
        })
        .collect();
    let config_json = serde_json::to_string(&build.config)
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    let user_id = random_hex(USER_ID_BYTES);
    state
        .db
        .create_user(&user_id, config_hash.as_deref(), &subscriptions, &config_json)?;

    let mut subscription_url = format!("{}/sub?id={}", origin(&headers), user_id);
    if req.is_split {
        subscription_url.push_str("&is_split=true");
    }
    info!(user = %user_id, sources = urls.len(), "subscription link issued");

    Ok(Json(SubResponse {
        subscription_url,
        config: build.config,
    }))
}

/// GET /sub - Rebuild the configuration behind a subscription link.
pub async fn get_subscription(
    State(state): State<AppState>,
    Query(query): Query<SubQuery>,
) -> Result<Json<Configuration>> {
    let id = query
        .id
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ApiError::BadRequest("missing subscription id".into()))?;

    let user = state
        .db
        .user(&id)?
        .ok_or_else(|| ApiError::NotFound(format!("subscription {id}")))?;

    let sources = state.db.subscriptions(&id)?;
    if sources.is_empty() {
        return Err(ApiError::BadRequest("subscription has no sources".into()));
    }
    let urls: Vec<String> = sources.iter().map(|s| s.url.clone()).collect();

    let template = match &user.customer_config_hash {
        Some(hash) => customer_template(&state, hash)?,
        None => None,
    };
    let template = match template {
        Some(template) => template,
        None => state.default_template()?,
    };

    let build = pipeline::build(state.fetcher.as_ref(), &urls, template, query.is_split).await;

    for (stored, fetched) in sources.iter().zip(&build.sources) {
        if fetched.hash.is_some() && fetched.hash != stored.last_hash {
            state.db.touch_subscription(stored.id, fetched.hash.as_deref())?;
        }
    }
    info!(user = %id, "subscription rebuilt");

    Ok(Json(build.config))
}

/// GET /fetchConfig - The session draft, or the default template.
pub async fn fetch_config(State(state): State<AppState>, headers: HeaderMap) -> Json<Value> {
    if let Some(session) = SessionId::from_headers(&headers) {
        match state.db.draft(session.as_str()) {
            Ok(Some(draft)) => match serde_json::from_str(&draft.json_content) {
                Ok(value) => return Json(value),
                Err(e) => warn!(error = %e, "stored draft is not JSON"),
            },
            Ok(None) => {}
            Err(e) => warn!(error = %e, "failed to load draft"),
        }
    }
    Json(state.default_template.as_ref().clone())
}

/// GET /configReset - The default template.
pub async fn config_reset(State(state): State<AppState>) -> Json<Value> {
    Json(state.default_template.as_ref().clone())
}

/// POST /cus/save - Store the body as the session draft.
pub async fn save_draft(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Result<Response> {
    let existing = SessionId::from_headers(&headers);
    let is_new = existing.is_none();
    let session = existing.unwrap_or_else(SessionId::generate);

    let json_content = serde_json::to_string(&body).map_err(|e| ApiError::Internal(e.to_string()))?;
    state.db.save_draft(session.as_str(), &json_content)?;
    info!(session = session.as_str(), new_session = is_new, "draft saved");

    let mut response = Json(DraftSavedResponse {
        success: true,
        message: "draft saved".to_string(),
    })
    .into_response();

    if is_new {
        let cookie = HeaderValue::from_str(&session.set_cookie())
            .map_err(|e| ApiError::Internal(e.to_string()))?;
        response.headers_mut().insert(SET_COOKIE, cookie);
    }

    Ok(response)
}

/// GET /cus/check_draft - Whether the session has a draft.
pub async fn check_draft(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<DraftStatusResponse>> {
    let has_draft = match SessionId::from_headers(&headers) {
        Some(session) => state.db.has_draft(session.as_str())?,
        None => false,
    };
    Ok(Json(DraftStatusResponse { has_draft }))
}

/// POST /cus/cleanup - Drop the session draft.
pub async fn cleanup_draft(State(state): State<AppState>, headers: HeaderMap) -> Result<StatusCode> {
    if let Some(session) = SessionId::from_headers(&headers) {
        state.db.delete_draft(session.as_str())?;
    }
    Ok(StatusCode::NO_CONTENT)
}

/// GET /cus/fetch_proxies - Converted nodes of the given sources, flattened.
pub async fn fetch_proxies(
    State(state): State<AppState>,
    Query(query): Query<FetchProxiesQuery>,
) -> Result<Json<ProxiesResponse>> {
    let urls = split_url_list(&query.urls);
    if urls.is_empty() {
        return Err(ApiError::BadRequest("no URLs provided".into()));
    }

    let template = state.default_template()?;
    let batches = pipeline::fetch_batches(state.fetcher.as_ref(), &urls, &template.metadata).await;
    let proxies = batches.into_iter().flat_map(|b| b.outbounds).collect();

    Ok(Json(ProxiesResponse {
        success: true,
        proxies,
    }))
}

async fn read_convert_request(request: Request) -> Result<ConvertRequest> {
    let is_json = request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.contains("application/json"));

    if is_json {
        let Json(req) = Json::<ConvertRequest>::from_request(request, &())
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        Ok(req)
    } else {
        let Form(req) = Form::<ConvertRequest>::from_request(request, &())
            .await
            .map_err(|e| ApiError::BadRequest(e.body_text()))?;
        Ok(req)
    }
}

fn require_urls(raw: &str) -> Result<Vec<String>> {
    if raw.trim().is_empty() {
        return Err(ApiError::BadRequest("no subscription URLs provided".into()));
    }
    let urls = parse_subscription_urls(raw);
    if urls.is_empty() {
        return Err(ApiError::BadRequest("no valid subscription URLs found".into()));
    }
    Ok(urls)
}

/// The session draft as a usable template, with its stored text.
///
/// Drafts that are not a valid template are ignored.
fn load_draft(state: &AppState, session: &SessionId) -> Result<Option<(Template, String)>> {
    let Some(draft) = state.db.draft(session.as_str())? else {
        return Ok(None);
    };
    match Template::from_json(&draft.json_content) {
        Ok(template) => Ok(Some((template, draft.json_content))),
        Err(e) => {
            warn!(session = session.as_str(), error = %e, "ignoring unusable draft");
            Ok(None)
        }
    }
}

fn customer_template(state: &AppState, hash: &str) -> Result<Option<Template>> {
    let Some(stored) = state.db.customer_config(hash)? else {
        warn!(hash, "customer template missing");
        return Ok(None);
    };
    match Template::from_json(&stored.json_content) {
        Ok(template) => Ok(Some(template)),
        Err(e) => {
            warn!(hash, error = %e, "ignoring unusable customer template");
            Ok(None)
        }
    }
}

fn origin(headers: &HeaderMap) -> String {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    let scheme = header("x-forwarded-proto").unwrap_or("http");
    let host = headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    format!("{scheme}://{host}")
}
