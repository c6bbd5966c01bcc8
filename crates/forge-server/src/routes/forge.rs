use axum::body::Bytes;
use axum::extract::{FromRequest, Path, Query, Request, State};
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use forge_core::archive;
use forge_core::command::UiContext;
use forge_core::controller::{Controller, Session};
use forge_core::diagnostic::FORGE_VERSION;
use forge_core::outcome::{project, validation_document, Projection};
use forge_core::replay::{self, Execution};
use forge_core::workdir::WorkDir;
use forge_core::{ForgeError, StepInputs, ValidationMessage};
use serde_json::Value;
use tracing::info;

use crate::catapult;
use crate::config::CatapultEndpoint;
use crate::error::AppError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

/// Body of execute and zip requests: a form post or a JSON document.
pub enum Payload {
    Form(Vec<(String, String)>),
    Json(Value),
}

impl Payload {
    fn is_form(&self) -> bool {
        matches!(self, Payload::Form(_))
    }

    fn inputs(&self, default_step: usize) -> Result<StepInputs, ForgeError> {
        match self {
            Payload::Form(pairs) => StepInputs::from_params(pairs.iter().cloned(), default_step),
            Payload::Json(body) => StepInputs::from_json(body, default_step),
        }
    }
}

impl<S> FromRequest<S> for Payload
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_form = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/x-www-form-urlencoded"));

        if is_form {
            let Form(pairs) = Form::<Vec<(String, String)>>::from_request(req, state)
                .await
                .map_err(|e| AppError::bad_request(e.body_text()))?;
            return Ok(Payload::Form(pairs));
        }

        let JsonBody(value) = JsonBody::from_request(req, state).await?;
        Ok(Payload::Json(value))
    }
}

/// A JSON body whose rejections are rendered as `{"error": ..}` 400s. The
/// content type is not checked and an empty body reads as `{}`.
pub struct JsonBody(pub Value);

impl<S> FromRequest<S> for JsonBody
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let body = Bytes::from_request(req, state)
            .await
            .map_err(|e| AppError::bad_request(e.body_text()))?;
        if body.iter().all(u8::is_ascii_whitespace) {
            return Ok(JsonBody(serde_json::json!({})));
        }
        let value = serde_json::from_slice(&body).map_err(|e| AppError::bad_request(e.to_string()))?;
        Ok(JsonBody(value))
    }
}

/// Request headers become UI attributes, keyed by lower-case name.
fn ui_context(selection: &std::path::Path, headers: &HeaderMap) -> UiContext {
    headers
        .iter()
        .fold(UiContext::new(selection), |ui, (name, value)| match value.to_str() {
            Ok(v) => ui.with_attribute(name.as_str(), v),
            Err(_) => ui,
        })
}

fn describe(controller: &dyn Controller) -> Value {
    serde_json::json!({
        "metadata": controller.describe_metadata(),
        "state": controller.describe_state(),
        "inputs": controller.describe_inputs()["inputs"],
    })
}

// ---------------------------------------------------------------------------
// Response shapes
// ---------------------------------------------------------------------------

fn projected(outcome: &forge_core::Outcome) -> Response {
    match project(outcome) {
        Projection::Entity(entity) => Json(entity).into_response(),
        Projection::Message(message) => message.into_response(),
        Projection::Failed(doc) => (StatusCode::INTERNAL_SERVER_ERROR, Json(doc)).into_response(),
    }
}

/// 412 response. Form and query clients get the first message as text.
fn precondition_failed(messages: &[ValidationMessage], as_text: bool) -> Response {
    if as_text {
        if let Some(first) = messages.first() {
            return (StatusCode::PRECONDITION_FAILED, first.description.clone()).into_response();
        }
    }
    (
        StatusCode::PRECONDITION_FAILED,
        Json(validation_document(messages)),
    )
        .into_response()
}

/// Run `name` to completion inside a fresh working directory.
fn run(app: &AppState, name: &str, headers: &HeaderMap, inputs: &StepInputs) -> Result<(Execution, Session), ForgeError> {
    app.registry.ensure(name)?;
    let workdir = WorkDir::acquire_in(&app.reaper, &app.config.root)?;
    let controller = app.registry.open(name, ui_context(workdir.path(), headers))?;
    let mut session = Session::new(controller, Some(workdir));
    let execution = replay::execute(session.controller(), inputs)?;
    Ok((execution, session))
}

enum Packaged {
    Archive(Vec<u8>),
    Invalid(Vec<ValidationMessage>),
    Failed(Response),
}

/// Execute and zip the selection. The session, and with it the working
/// directory, is released before this returns.
fn package(app: &AppState, name: &str, headers: &HeaderMap, inputs: &StepInputs) -> Result<Packaged, ForgeError> {
    let (execution, mut session) = run(app, name, headers, inputs)?;
    let outcome = match execution {
        Execution::Invalid(messages) => return Ok(Packaged::Invalid(messages)),
        Execution::Completed(outcome) => outcome,
    };
    if outcome.is_failure() {
        return Ok(Packaged::Failed(projected(&outcome)));
    }
    let selection = session.controller().selection();
    let bytes = archive::zip_directory(&inputs.artifact_name(), &selection)?;
    drop(session);
    Ok(Packaged::Archive(bytes))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /forge/version
pub async fn version() -> Json<Value> {
    Json(serde_json::json!({
        "backendVersion": env!("CARGO_PKG_VERSION"),
        "forgeVersion": FORGE_VERSION,
    }))
}

/// GET /forge/commands — every exposed command.
pub async fn list_commands(State(app): State<AppState>) -> Json<Value> {
    let commands: Vec<Value> = app
        .registry
        .metadata()
        .into_iter()
        .map(|meta| {
            let wizard = app.registry.is_wizard(&meta.name);
            serde_json::json!({
                "name": meta.name,
                "title": meta.title,
                "description": meta.description,
                "category": meta.category,
                "wizard": wizard,
            })
        })
        .collect();
    Json(serde_json::json!({ "commands": commands }))
}

/// GET /forge/commands/{name} — metadata, state and inputs of a fresh controller.
pub async fn get_command(
    State(app): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Value>, AppError> {
    let result = tokio::task::spawn_blocking(move || {
        let controller = app.registry.open(&name, ui_context(&app.config.root, &headers))?;
        let mut session = Session::new(controller, None);
        Ok::<_, ForgeError>(describe(session.controller()))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}

/// POST /forge/commands/{name}/validate — apply inputs to every step and
/// report validation messages.
pub async fn validate_command(
    State(app): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    JsonBody(body): JsonBody,
) -> Result<Json<Value>, AppError> {
    let result = tokio::task::spawn_blocking(move || {
        let inputs = StepInputs::from_json(&body, 0)?;
        let controller = app.registry.open(&name, ui_context(&app.config.root, &headers))?;
        let mut session = Session::new(controller, None);
        let controller = session.controller();
        replay::populate_all_steps(controller, &inputs)?;
        Ok::<_, ForgeError>(serde_json::json!({
            "state": controller.describe_state(),
            "messages": controller.validation(),
            "inputs": controller.describe_inputs()["inputs"],
        }))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}

/// POST /forge/commands/{name}/next — replay the wizard up to `stepIndex`.
pub async fn next_step(
    State(app): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    JsonBody(body): JsonBody,
) -> Result<Json<Value>, AppError> {
    let result = tokio::task::spawn_blocking(move || {
        let inputs = StepInputs::from_json(&body, 1)?;
        let controller = app.registry.open(&name, ui_context(&app.config.root, &headers))?;
        let mut session = Session::new(controller, None);
        let advance = replay::advance(session.controller(), &inputs, inputs.step_index)?;
        info!(command = %name, target = inputs.step_index, phase = %advance.phase(), "next");

        let mut doc = describe(session.controller());
        if let Some(messages) = advance.blocked {
            doc["messages"] = serde_json::json!(messages);
        }
        Ok::<_, ForgeError>(doc)
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(Json(result))
}

/// GET /forge/commands/{name}/query — execute with query-string inputs.
pub async fn query_command(
    State(app): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    Query(params): Query<Vec<(String, String)>>,
) -> Result<Response, AppError> {
    let response = tokio::task::spawn_blocking(move || {
        let inputs = StepInputs::from_params(params, 0)?;
        info!(command = %name, "query");
        let (execution, _session) = run(&app, &name, &headers, &inputs)?;
        Ok::<_, ForgeError>(match execution {
            Execution::Invalid(messages) => precondition_failed(&messages, true),
            Execution::Completed(outcome) => projected(&outcome),
        })
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(response)
}

/// POST /forge/commands/{name}/execute — form or JSON inputs.
pub async fn execute_command(
    State(app): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    payload: Payload,
) -> Result<Response, AppError> {
    let response = tokio::task::spawn_blocking(move || {
        let inputs = payload.inputs(0)?;
        info!(command = %name, form = payload.is_form(), "execute");
        let (execution, _session) = run(&app, &name, &headers, &inputs)?;
        Ok::<_, ForgeError>(match execution {
            Execution::Invalid(messages) => precondition_failed(&messages, payload.is_form()),
            Execution::Completed(outcome) => projected(&outcome),
        })
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(response)
}

/// POST /forge/commands/{name}/zip — execute and download the result.
pub async fn zip_command(
    State(app): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    payload: Payload,
) -> Result<Response, AppError> {
    let response = tokio::task::spawn_blocking(move || {
        let inputs = payload.inputs(0)?;
        let artifact = inputs.artifact_name();
        info!(command = %name, artifact = %artifact, "zip");
        Ok::<_, ForgeError>(match package(&app, &name, &headers, &inputs)? {
            Packaged::Invalid(messages) => precondition_failed(&messages, payload.is_form()),
            Packaged::Failed(response) => response,
            Packaged::Archive(bytes) => zip_response(&artifact, bytes),
        })
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    Ok(response)
}

fn zip_response(artifact: &str, bytes: Vec<u8>) -> Response {
    let disposition = format!("attachment; filename=\"{artifact}.zip\"");
    let mut response = bytes.into_response();
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/zip"));
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(CONTENT_DISPOSITION, value);
    }
    response
}

/// POST /forge/commands/{name}/catapult — execute, zip and upload; answers
/// with the location reported by the catapult service.
pub async fn catapult_command(
    State(app): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    JsonBody(body): JsonBody,
) -> Result<Response, AppError> {
    let endpoint = CatapultEndpoint::resolve(&app.config)?;
    let http = app.http.clone();

    let (packaged, artifact) = tokio::task::spawn_blocking(move || {
        let inputs = StepInputs::from_json(&body, 0)?;
        let artifact = inputs.artifact_name();
        info!(command = %name, artifact = %artifact, "catapult");
        let packaged = package(&app, &name, &headers, &inputs)?;
        Ok::<_, ForgeError>((packaged, artifact))
    })
    .await
    .map_err(|e| AppError(anyhow::anyhow!("task join error: {e}")))??;

    let bytes = match packaged {
        Packaged::Invalid(messages) => return Ok(precondition_failed(&messages, false)),
        Packaged::Failed(response) => return Ok(response),
        Packaged::Archive(bytes) => bytes,
    };

    let location = catapult::upload(&http, &endpoint, bytes, &format!("{artifact}.zip")).await?;
    info!(location = %location, "archive uploaded");
    Ok(location.into_response())
}
