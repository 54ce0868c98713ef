//! The action endpoint.
//!
//! Every request is a JSON object tagged by `action`; each arm validates its
//! body, delegates to the dispatcher or polling protocol, and returns JSON.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::{info, warn};

use genbroker_models::RecordEntry;

use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::polling;
use crate::request::{
    ActionRequest, SubmitJobResponse, SuccessResponse, TranslateResponse,
};
use crate::state::AppState;

/// Handle one action request.
pub async fn handle_action(
    State(state): State<AppState>,
    body: Result<Json<ActionRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(request) = body?;
    let action = request.name();

    let result = run_action(&state, request).await;
    match &result {
        Ok(_) => metrics::record_action(action, "ok"),
        Err(e) => {
            warn!(action = action, code = e.code(), "Action failed: {}", e);
            metrics::record_action(action, e.code());
        }
    }
    result
}

async fn run_action(state: &AppState, request: ActionRequest) -> ApiResult<Response> {
    let dispatcher = &state.dispatcher;

    match request {
        ActionRequest::Auth(body) => {
            state.password.verify(&body.password)?;
            Ok(Json(SuccessResponse { success: true }).into_response())
        }

        ActionRequest::Translate(body) => {
            let prompt = body.prompt.trim();
            if prompt.is_empty() {
                return Err(ApiError::validation("prompt is required"));
            }
            let translated_prompt = dispatcher.translate(prompt, body.rotation_index).await?;
            Ok(Json(TranslateResponse { translated_prompt }).into_response())
        }

        ActionRequest::GenerateFg(body) => {
            let rotation_index = body.rotation_index;
            let request = body.into_generate()?;
            let result = dispatcher.run_sync(request, rotation_index).await?;
            Ok(Json(result).into_response())
        }

        ActionRequest::EditFg(body) => {
            let rotation_index = body.rotation_index;
            let request = body.into_edit()?;
            let result = dispatcher.run_sync(request, rotation_index).await?;
            Ok(Json(result).into_response())
        }

        ActionRequest::SubmitBgJob(body) => {
            let (model, payload, rotation_index) = body.validate()?;
            let job_id = dispatcher.submit(model, payload, rotation_index).await?;
            Ok(Json(SubmitJobResponse { job_id }).into_response())
        }

        ActionRequest::CheckStatus(body) => {
            let job_id = body.job_id()?;
            let response = polling::check_status(state.jobs(), &job_id).await?;
            Ok(Json(response).into_response())
        }

        ActionRequest::LogError(body) => {
            let model_tag = body.model.filter(|m| !m.is_empty()).unwrap_or_else(|| "unknown".to_string());
            info!(model = %model_tag, "Client reported error");
            dispatcher.record(RecordEntry::error(body.prompt, model_tag, body.error));
            Ok(Json(SuccessResponse { success: true }).into_response())
        }
    }
}
