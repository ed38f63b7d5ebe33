use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::{Path, Query, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Deserialize;
use tokio_stream::StreamExt;

use sibyl_service::{AnswerRequest, Error, RateLimitOutcome};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/v1/projects/{project_id}/completions",
            post(project_completions).options(preflight),
        )
        .route("/v1/completions", post(query_completions).options(preflight))
        .with_state(state)
}

async fn health() -> StatusCode {
    StatusCode::OK
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionsBody {
    pub model: String,
    pub prompt: String,
    pub i_dont_know_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProjectParams {
    project: Option<String>,
}

async fn preflight() -> Response {
    let mut response = StatusCode::OK.into_response();

    apply_cors(&mut response);
    response.headers_mut().insert(
        header::ACCESS_CONTROL_ALLOW_METHODS,
        HeaderValue::from_static("POST, OPTIONS"),
    );
    response.headers_mut().insert(
        header::ACCESS_CONTROL_ALLOW_HEADERS,
        HeaderValue::from_static("authorization, content-type"),
    );

    response
}

async fn project_completions(
    State(state): State<AppState>,
    Path(project_id): Path<String>,
    Json(body): Json<CompletionsBody>,
) -> Response {
    respond(state, Some(project_id), body).await
}

async fn query_completions(
    State(state): State<AppState>,
    Query(params): Query<ProjectParams>,
    Json(body): Json<CompletionsBody>,
) -> Response {
    respond(state, params.project, body).await
}

async fn respond(state: AppState, project_id: Option<String>, body: CompletionsBody) -> Response {
    let Some(project_id) = project_id.filter(|id| !id.trim().is_empty()) else {
        return error_response(&Error::MissingProject, None);
    };
    let request = AnswerRequest {
        project_id,
        model: body.model,
        prompt: body.prompt,
        i_dont_know_message: body.i_dont_know_message,
    };

    match state.service.answer(request).await {
        Err(failure) => error_response(&failure.error, failure.rate_limit),
        Ok(answer) => {
            let rate_limit = answer.rate_limit;
            let frames = answer
                .stream
                .map(|frame| frame.map(|frame| Bytes::from(frame.encode())));
            let mut response = Response::new(Body::from_stream(frames));

            response.headers_mut().insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static("text/plain; charset=utf-8"),
            );
            apply_cors(&mut response);
            apply_rate_limit_headers(&mut response, &rate_limit);

            response
        }
    }
}

fn error_response(error: &Error, rate_limit: Option<RateLimitOutcome>) -> Response {
    let status = match error {
        Error::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        Error::UpstreamStream { .. } => StatusCode::BAD_GATEWAY,
        _ => StatusCode::BAD_REQUEST,
    };
    let mut response = (status, error.to_string()).into_response();

    apply_cors(&mut response);

    if let Some(rate_limit) = rate_limit.as_ref() {
        apply_rate_limit_headers(&mut response, rate_limit);
    }

    response
}

fn apply_cors(response: &mut Response) {
    response
        .headers_mut()
        .insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*"));
}

fn apply_rate_limit_headers(response: &mut Response, rate_limit: &RateLimitOutcome) {
    let headers = response.headers_mut();

    headers.insert("x-ratelimit-limit", HeaderValue::from(rate_limit.limit));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(rate_limit.remaining));
}
