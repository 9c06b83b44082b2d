use crate::types::{InferenceInput, InferenceResult, Label};

/// Coefficients of the logistic model fitted (L2, C = 1) on the truth table
/// `(0,1) -> 1, (1,1) -> 1, (1,0) -> 0, (0,0) -> 0`.
const PRETRAINED_WEIGHTS: [f64; 2] = [0.0, 0.8];
const PRETRAINED_INTERCEPT: f64 = -0.4;

pub trait Classifier: Send + Sync {
    fn classify(&self, input: &InferenceInput) -> Label;

    fn infer(&self, input: InferenceInput) -> InferenceResult {
        InferenceResult {
            input,
            label: self.classify(&input),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LogisticClassifier {
    weights: [f64; 2],
    intercept: f64,
}

impl LogisticClassifier {
    pub fn new(weights: [f64; 2], intercept: f64) -> Self {
        Self { weights, intercept }
    }

    pub fn pretrained() -> Self {
        Self::new(PRETRAINED_WEIGHTS, PRETRAINED_INTERCEPT)
    }

    pub fn decision(&self, input: &InferenceInput) -> f64 {
        self.weights[0] * input.feature1 as f64
            + self.weights[1] * input.feature2 as f64
            + self.intercept
    }

    pub fn probability(&self, input: &InferenceInput) -> f64 {
        1.0 / (1.0 + (-self.decision(input)).exp())
    }
}

impl Default for LogisticClassifier {
    fn default() -> Self {
        Self::pretrained()
    }
}

impl Classifier for LogisticClassifier {
    fn classify(&self, input: &InferenceInput) -> Label {
        // Ties go to the negative class.
        if self.decision(input) > 0.0 {
            Label::One
        } else {
            Label::Zero
        }
    }
}
