//! Answer-flow orchestrator
//!
//! Drives one request through validation, retrieval, generation, and
//! speech synthesis, emitting progress onto the event sink as it goes.
//! The orchestrator never closes the sink itself: it marks its
//! components complete and the sink's registry decides when the stream
//! ends. Every error path either recovers locally or marks the owning
//! component done, so no path leaves the stream hanging.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use answerflow_core::{
    AnswerGenerator, AnswerRequest, KmSearchResult, KnowledgeSearch, Localisation, Result,
    StreamEvent, TranscriptValidator, ValidationOutcome, ValidatorPrompts,
};
use answerflow_llm::PromptBuilder;
use answerflow_templates::TemplateFetcher;
use answerflow_tts::SpeechStreamer;

use crate::parser::{ParsedSegment, SectionedParser};
use crate::sink::EventSink;

/// Completion-registry name for the LLM text stream
pub const TEXT_COMPONENT: &str = "text_generation";

/// Capacity of the token channel between the generator task and the
/// parse loop.
const TOKEN_CHANNEL_CAPACITY: usize = 64;

/// Upstream adapters the flow runs against
#[derive(Clone)]
pub struct FlowDependencies {
    pub validator: Arc<dyn TranscriptValidator>,
    pub km: Arc<dyn KnowledgeSearch>,
    pub generator: Arc<dyn AnswerGenerator>,
    pub templates: TemplateFetcher,
}

/// One request's pipeline run
pub struct AnswerFlow {
    sink: EventSink,
    streamer: Arc<SpeechStreamer>,
    deps: FlowDependencies,
    request: AnswerRequest,
    localisation: Localisation,
    watchdog: Duration,
}

impl AnswerFlow {
    pub fn new(
        sink: EventSink,
        streamer: Arc<SpeechStreamer>,
        deps: FlowDependencies,
        request: AnswerRequest,
        localisation: Localisation,
        watchdog: Duration,
    ) -> Self {
        Self {
            sink,
            streamer,
            deps,
            request,
            localisation,
            watchdog,
        }
    }

    /// Run the flow under the watchdog. Always leaves the sink closed or
    /// closing; never hangs the stream.
    pub async fn execute(self) {
        let sink = self.sink.clone();
        let watchdog = self.watchdog;

        match tokio::time::timeout(watchdog, self.run()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::error!(error = %e, "answer pipeline failed");
                sink.error(e.to_string()).await;
                sink.close_fatal().await;
            }
            Err(_) => {
                tracing::error!(timeout = ?watchdog, "answer pipeline watchdog expired");
                sink.error("answer pipeline timed out").await;
                sink.close_fatal().await;
            }
        }
    }

    /// The staged flow. Returns `Err` only for fatal conditions; local
    /// failures degrade and continue.
    async fn run(self) -> Result<()> {
        // Stage 1: announce and register producers.
        self.sink
            .emit(StreamEvent::status("Starting answer pipeline"))
            .await;
        self.sink.register_component(TEXT_COMPONENT).await;
        self.sink
            .register_component(answerflow_tts::TTS_COMPONENT)
            .await;
        if self.streamer.is_inert() {
            // Disabled TTS completes immediately so the registry never
            // waits on it.
            self.streamer.close().await;
        }

        // Stage 2: validation.
        let outcome = self.validation_stage().await?;
        self.sink
            .emit(StreamEvent::validation_result(outcome.clone()))
            .await;

        // Stage 3: retrieval.
        let documents = self.retrieval_stage(&outcome).await;

        // Stage 4: generation.
        let metadata = if self.request.generate_answer.unwrap_or(true) {
            self.generation_stage(&outcome, &documents).await?
        } else {
            Vec::new()
        };

        // Stage 5: finalise. Trailing metadata sits after the last
        // answer_chunk and before complete.
        for doc_ids in metadata {
            self.sink.emit(StreamEvent::metadata(doc_ids)).await;
        }

        self.streamer.flush_all().await;
        let streamer = self.streamer.clone();
        tokio::spawn(async move {
            // Marks the TTS component once all buffers drain.
            streamer.close().await;
        });

        self.sink.mark_component_complete(TEXT_COMPONENT).await;
        Ok(())
    }

    /// Produce the validation outcome per the request shape: caller
    /// keywords skip validation entirely; otherwise the validator runs
    /// with audio when present, and failures fall back to the transcript
    /// unchanged.
    async fn validation_stage(&self) -> Result<ValidationOutcome> {
        if let Some(keywords) = &self.request.keywords {
            self.sink
                .emit(StreamEvent::status(
                    "Skipping validation – using provided keywords",
                ))
                .await;
            return Ok(ValidationOutcome::from_keywords(
                self.request.transcript.clone(),
                keywords.clone(),
            ));
        }

        let prompts = self.validator_prompts().await?;

        let audio = match self.request.audio_bytes() {
            Ok(audio) => audio,
            Err(e) => {
                tracing::warn!(error = %e, "audio payload unusable, validating text only");
                None
            }
        };

        match self
            .deps
            .validator
            .validate(
                &prompts,
                &self.request.language,
                &self.request.transcript,
                audio.as_deref(),
                &self.request.chat_history,
            )
            .await
        {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                tracing::warn!(error = %e, "validation failed, using transcript as-is");
                self.sink
                    .emit(StreamEvent::status(
                        "Validation unavailable – using transcript as-is",
                    ))
                    .await;
                Ok(ValidationOutcome::identity(self.request.transcript.clone()))
            }
        }
    }

    /// Resolve the validator prompt pair from the localisation's
    /// template URLs. Template loss with no cached copy is fatal.
    async fn validator_prompts(&self) -> Result<ValidatorPrompts> {
        let system_prompt = self
            .deps
            .templates
            .fetch_text(&self.localisation.validator_system_prompt_template_url)
            .await?;
        let transcript_prompt = self
            .deps
            .templates
            .fetch_text(&self.localisation.validator_transcript_prompt_template_url)
            .await?;
        Ok(ValidatorPrompts {
            system_prompt,
            transcript_prompt,
        })
    }

    /// Search the knowledge base; retrieval failure degrades to an empty
    /// document set.
    async fn retrieval_stage(&self, outcome: &ValidationOutcome) -> KmSearchResult {
        match self
            .deps
            .km
            .search(&outcome.correction, &outcome.keywords)
            .await
        {
            Ok(result) => {
                self.sink
                    .emit(StreamEvent::km_result(result.clone()))
                    .await;
                result
            }
            Err(e) => {
                tracing::warn!(error = %e, "knowledge search failed, continuing without documents");
                self.sink
                    .emit(StreamEvent::status(
                        "Knowledge search unavailable – answering without documents",
                    ))
                    .await;
                KmSearchResult::default()
            }
        }
    }

    /// Stream the generator, fanning parsed segments to the sink and the
    /// speech streamer. Returns the metadata markers found in the
    /// stream. Generator failure closes the text producer but leaves the
    /// rest of the pipeline to finish.
    async fn generation_stage(
        &self,
        outcome: &ValidationOutcome,
        documents: &KmSearchResult,
    ) -> Result<Vec<String>> {
        let format_prompt = self.format_prompt().await;

        let mut builder = PromptBuilder::new(&self.localisation.system_prompt)
            .with_history(&self.request.chat_history)
            .with_question(&outcome.correction)
            .with_documents(documents);
        if let Some(format_prompt) = &format_prompt {
            builder = builder.with_format_prompt(format_prompt);
        }
        let messages = builder.build();

        let (tx, mut rx) = mpsc::channel::<String>(TOKEN_CHANNEL_CAPACITY);
        let generator = self.deps.generator.clone();
        let model = self.localisation.generator_model.clone();
        let generator_task =
            tokio::spawn(async move { generator.generate_stream(&model, &messages, tx).await });

        let mut parser = SectionedParser::new(format_prompt.is_some());
        let mut metadata = Vec::new();

        while let Some(fragment) = rx.recv().await {
            if self.sink.is_closed() {
                // Client gone; dropping rx tells the generator to stop.
                break;
            }
            for segment in parser.feed(&fragment) {
                self.dispatch_segment(segment, &mut metadata).await;
            }
        }
        drop(rx);

        for segment in parser.finish() {
            self.dispatch_segment(segment, &mut metadata).await;
        }

        match generator_task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::error!(error = %e, "generation failed mid-stream");
                self.sink
                    .error(format!("answer generation failed: {e}"))
                    .await;
            }
            Err(e) => {
                tracing::error!(error = %e, "generator task panicked");
                self.sink.error("answer generation failed").await;
            }
        }

        Ok(metadata)
    }

    async fn format_prompt(&self) -> Option<String> {
        let url = self.localisation.generator_format_text_prompt_url.as_ref()?;
        match self.deps.templates.fetch_text(url).await {
            Ok(prompt) => Some(prompt),
            Err(e) => {
                // Without the instructions the generator answers plain,
                // so parse plain too.
                tracing::warn!(url, error = %e, "format prompt unavailable, using plain output");
                None
            }
        }
    }

    async fn dispatch_segment(&self, segment: ParsedSegment, metadata: &mut Vec<String>) {
        match segment {
            ParsedSegment::Answer(text) => {
                self.sink.emit(StreamEvent::answer_chunk(&text)).await;
                self.streamer
                    .add_text_chunk(&text, &self.request.language)
                    .await;
            }
            ParsedSegment::Thinking(text) => {
                self.sink.emit(StreamEvent::thinking(text)).await;
            }
            ParsedSegment::Formatted(text) => {
                self.sink.emit(StreamEvent::formatted_answer(text)).await;
            }
            ParsedSegment::Metadata(doc_ids) => {
                metadata.push(doc_ids);
            }
        }
    }

}
