//! Answer SSE endpoint
//!
//! Validates the inbound request, resolves the organisation's
//! localisation, wires the per-request pipeline, and returns the event
//! stream. Invalid requests still answer with a well-formed SSE stream
//! (`error` then `complete`) so clients never hang on a silent socket.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use axum::Json;
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;
use uuid::Uuid;

use answerflow_core::{AnswerRequest, EventPublisher, OrgConfig, SpeechAuth, StreamEvent};
use answerflow_pipeline::{sink, AnswerFlow, EventSink, FlowDependencies};
use answerflow_tts::{SpeechBufferConfig, SpeechStreamer, TtsRenderer};

use crate::state::AppState;

type EventStream = Sse<futures::stream::BoxStream<'static, Result<Event, Infallible>>>;

/// `POST /api/v1/answer-sse`
///
/// Rejections still carry an SSE body (`error` then `complete`) so the
/// stream is well-formed either way; the HTTP status distinguishes them.
pub async fn answer_sse(
    State(state): State<AppState>,
    Json(request): Json<AnswerRequest>,
) -> Response {
    let (status, rx) = answer_stream(state, request).await;
    let mut response = sse_response(rx).into_response();
    *response.status_mut() = status;
    response
}

/// Build the event stream for one request. Split from the handler so the
/// full event sequence is observable in tests.
async fn answer_stream(
    state: AppState,
    request: AnswerRequest,
) -> (StatusCode, ReceiverStream<StreamEvent>) {
    let request_id = Uuid::new_v4();
    metrics::counter!("answer_requests").increment(1);

    if let Err(e) = request.validate() {
        tracing::warn!(%request_id, error = %e, "rejecting malformed answer request");
        return (
            StatusCode::BAD_REQUEST,
            rejection_stream(e.to_string()).await,
        );
    }

    let org = match state.orgs.load(&request.org_id, &request.config_id).await {
        Ok(org) => org,
        Err(e) => {
            tracing::warn!(%request_id, error = %e, "organisation config unavailable");
            return (
                StatusCode::BAD_REQUEST,
                rejection_stream(e.to_string()).await,
            );
        }
    };

    let Some(localisation) = org.localisation(&request.language).cloned() else {
        tracing::warn!(
            %request_id,
            language = %request.language,
            "no localisation for request language"
        );
        return (
            StatusCode::BAD_REQUEST,
            rejection_stream(format!(
                "no localisation configured for language {}",
                request.language
            ))
            .await,
        );
    };

    let (event_sink, rx) = EventSink::channel(sink::DEFAULT_CAPACITY);
    let publisher: Arc<dyn EventPublisher> = Arc::new(event_sink.clone());
    let streamer = Arc::new(build_streamer(&state, &org, publisher));

    let deps = FlowDependencies {
        validator: state.validator.clone(),
        km: state.km.clone(),
        generator: state.generator.clone(),
        templates: state.templates.clone(),
    };

    let watchdog = Duration::from_secs(state.settings.server.answer_timeout_seconds);
    let flow = AnswerFlow::new(event_sink, streamer, deps, request, localisation, watchdog);

    tracing::info!(%request_id, "answer pipeline started");
    tokio::spawn(async move {
        flow.execute().await;
        tracing::debug!(%request_id, "answer pipeline finished");
    });

    (StatusCode::OK, rx)
}

/// TTS is per-request: the vendor must be configured, the auth must
/// resolve (organisation overrides process settings), and the
/// organisation must carry at least one voice.
fn build_streamer(
    state: &AppState,
    org: &Arc<OrgConfig>,
    publisher: Arc<dyn EventPublisher>,
) -> SpeechStreamer {
    let Some(vendor) = &state.speech_vendor else {
        return SpeechStreamer::inert(publisher);
    };
    let Some(auth) = speech_auth(state, org) else {
        return SpeechStreamer::inert(publisher);
    };
    if !org.localisations.iter().any(|l| l.tts_model.is_some()) {
        return SpeechStreamer::inert(publisher);
    }

    let renderer = Arc::new(TtsRenderer::new(vendor.clone(), state.audio_cache.clone()));
    SpeechStreamer::active(
        publisher,
        renderer,
        state.templates.clone(),
        org.clone(),
        auth,
        SpeechBufferConfig::default(),
    )
}

fn speech_auth(state: &AppState, org: &OrgConfig) -> Option<SpeechAuth> {
    let key = org
        .speech_key
        .clone()
        .or_else(|| state.settings.speech.key.clone())?;
    let region = org
        .speech_region
        .clone()
        .or_else(|| state.settings.speech.region.clone())?;
    Some(SpeechAuth { key, region })
}

/// A complete little stream for requests that never start the pipeline:
/// one `error`, one `complete`, then EOF.
async fn rejection_stream(message: String) -> ReceiverStream<StreamEvent> {
    let (event_sink, rx) = EventSink::channel(8);
    event_sink.emit(StreamEvent::error(message)).await;
    // Empty registry: closing emits `complete` immediately.
    event_sink.mark_complete().await;
    rx
}

fn sse_response(rx: ReceiverStream<StreamEvent>) -> EventStream {
    let stream = rx.map(|event| {
        let payload = serde_json::to_string(&event).unwrap_or_else(|e| {
            tracing::error!(error = %e, "event serialisation failed");
            "{\"type\":\"error\",\"message\":\"event serialisation failed\"}".to_string()
        });
        Ok(Event::default().data(payload))
    });

    Sse::new(Box::pin(stream) as futures::stream::BoxStream<'static, _>)
        .keep_alive(KeepAlive::default())
}
