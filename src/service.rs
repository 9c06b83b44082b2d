use std::sync::Arc;

use crate::{
    classifier::Classifier,
    error::GatewayError,
    side_effects::SideEffectDispatcher,
    types::{Channel, InferenceInput, InferenceResult, UnstructuredLogEvent, format_timestamp, now},
};

const BANNER: &str = "Inference Gateway API";

/// Request and stream handlers share this composition of classifier and sinks.
pub struct InferenceService {
    classifier: Arc<dyn Classifier>,
    side_effects: SideEffectDispatcher,
}

impl InferenceService {
    pub fn new(classifier: Arc<dyn Classifier>, side_effects: SideEffectDispatcher) -> Self {
        Self {
            classifier,
            side_effects,
        }
    }

    /// One-shot inference. Only validation failures reach the caller; telemetry
    /// writes are dispatched and never awaited here.
    pub fn handle_request(
        &self,
        f1: Option<&str>,
        f2: Option<&str>,
    ) -> Result<InferenceResult, GatewayError> {
        let input = InferenceInput::from_query(f1, f2)?;
        Ok(self.infer(Channel::Request, input))
    }

    pub fn handle_stream_message(&self, text: &str) -> Result<InferenceResult, GatewayError> {
        let input = InferenceInput::parse_csv(text)?;
        Ok(self.infer(Channel::Stream, input))
    }

    pub fn infer(&self, channel: Channel, input: InferenceInput) -> InferenceResult {
        let result = self.classifier.infer(input);
        self.side_effects.record_inference(channel, &result);
        tracing::debug!(
            target: "service",
            channel = channel.as_str(),
            feature1 = input.feature1,
            feature2 = input.feature2,
            prediction = result.label.as_i32(),
            "inference_completed"
        );
        result
    }

    pub fn banner(&self) -> String {
        self.side_effects.record_event(UnstructuredLogEvent::root_call());
        format!("{BANNER} - {}", format_timestamp(now()))
    }

    pub fn side_effects(&self) -> &SideEffectDispatcher {
        &self.side_effects
    }

    pub async fn drain(&self) {
        self.side_effects.drain().await;
    }
}
