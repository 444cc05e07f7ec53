//! Chat relay endpoints.
//!
//! ```text
//! POST /api/chat/start                 client request, forwarded to the webhook
//! POST /api/chat/callback              webhook result
//! GET  /api/chat/result/:request_id    client poll
//! ```

use crate::WebResult;
use crate::error::AppError;
use crate::extractors::{CallbackSignature, ClientIdHeader, RequestOrigin};
use crate::state::AppState;
use axum::{
    Json,
    body::Bytes,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
};
use chat_relay_core::record::{RequestId, RequestStatus};
use chat_relay_core::relay::{ANONYMOUS_CLIENT, CallbackPayload, DispatchRequest, PollOutcome};
use chat_relay_core::store::RecordStore;
use chat_relay_core::webhook::Webhook;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Response to an accepted chat request.
#[derive(Debug, Serialize, Deserialize)]
pub struct StartChatResponse {
    /// Human-readable acknowledgement.
    pub message: String,
    /// Always `processing`.
    pub status: RequestStatus,
    /// Id to poll with.
    #[serde(rename = "requestID")]
    pub request_id: RequestId,
}

/// Response to a stored callback.
#[derive(Debug, Serialize, Deserialize)]
pub struct CallbackResponse {
    /// Human-readable acknowledgement.
    pub message: String,
    /// Request the result was stored for.
    #[serde(rename = "requestID")]
    pub request_id: RequestId,
}

/// Response to a poll.
#[derive(Debug, Serialize, Deserialize)]
pub struct ResultResponse {
    /// `processing` or `completed`.
    pub status: RequestStatus,
    /// The polled id.
    #[serde(rename = "requestID")]
    pub request_id: RequestId,
    /// Result data, present once completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// Query string of a callback.
#[derive(Debug, Default, Deserialize)]
pub struct CallbackQuery {
    /// Signature appended to signed callback URLs.
    pub signature: Option<String>,
}

/// Accept a client request and forward it to the webhook.
///
/// The body may be any JSON value (an empty body counts as `{}`). The client
/// id is taken from the body's `clientId`, else the `X-Client-ID` header,
/// else `anon`.
///
/// # Errors
///
/// - 400 if the body is not JSON
/// - 500 if no webhook is configured
/// - 502 if the webhook is unreachable or rejects the request
pub async fn start_chat<S, W>(
    State(state): State<AppState<S, W>>,
    ClientIdHeader(header_client): ClientIdHeader,
    origin: RequestOrigin,
    body: Bytes,
) -> WebResult<(StatusCode, Json<StartChatResponse>)>
where
    S: RecordStore,
    W: Webhook,
{
    let payload = parse_body(&body)?;

    let client_id = payload
        .get("clientId")
        .and_then(Value::as_str)
        .filter(|id| !id.trim().is_empty())
        .map(ToString::to_string)
        .or(header_client)
        .unwrap_or_else(|| ANONYMOUS_CLIENT.to_string());

    let request = DispatchRequest::new(client_id, payload, state.callback_base(origin.as_str()));
    let request_id = state.relay.dispatch(request).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(StartChatResponse {
            message: "Request accepted for processing".to_string(),
            status: RequestStatus::Processing,
            request_id,
        }),
    ))
}

/// Store the webhook's result.
///
/// The signature, when signing is enabled, is read from the `signature`
/// query parameter or the `X-Callback-Signature` header.
///
/// # Errors
///
/// - 400 if the query string or body is malformed, or a field is missing
/// - 401 if the signature is missing or wrong
/// - 404 in strict mode for an unknown id
/// - 500 if the store fails
pub async fn chat_callback<S, W>(
    State(state): State<AppState<S, W>>,
    query: Result<Query<CallbackQuery>, QueryRejection>,
    CallbackSignature(header_signature): CallbackSignature,
    body: Result<Json<CallbackPayload>, JsonRejection>,
) -> WebResult<Json<CallbackResponse>>
where
    S: RecordStore,
    W: Webhook,
{
    let Query(query) = query.map_err(|rejection| {
        tracing::warn!(error = %rejection, "Malformed callback query");
        AppError::bad_request(format!("Malformed callback query: {}", rejection.body_text()))
    })?;

    let Json(payload) = body.map_err(|rejection| {
        tracing::warn!(error = %rejection, "Malformed callback body");
        AppError::bad_request(format!("Malformed callback body: {}", rejection.body_text()))
    })?;

    let signature = query.signature.or(header_signature);
    let request_id = state.relay.complete(payload, signature.as_deref()).await?;

    Ok(Json(CallbackResponse {
        message: "Result received".to_string(),
        request_id,
    }))
}

/// Poll for a result; a completed result is returned once and then removed.
///
/// # Errors
///
/// - 404 if the id is unknown, expired, or already delivered
/// - 500 if the store fails
pub async fn chat_result<S, W>(
    State(state): State<AppState<S, W>>,
    Path(request_id): Path<String>,
) -> WebResult<Json<ResultResponse>>
where
    S: RecordStore,
    W: Webhook,
{
    let request_id = RequestId::new(request_id);

    match state.relay.poll(&request_id).await? {
        PollOutcome::Processing => Ok(Json(ResultResponse {
            status: RequestStatus::Processing,
            request_id,
            data: None,
        })),
        PollOutcome::Completed(data) => Ok(Json(ResultResponse {
            status: RequestStatus::Completed,
            request_id,
            data: Some(data),
        })),
        PollOutcome::NotFound => Err(AppError::not_found("Request", request_id)),
    }
}

fn parse_body(body: &Bytes) -> WebResult<Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Object(Map::new()));
    }

    serde_json::from_slice(body).map_err(|e| AppError::bad_request(format!("Invalid JSON body: {e}")))
}
