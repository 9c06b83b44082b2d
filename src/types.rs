use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use time::{OffsetDateTime, format_description::well_known::Rfc3339};

use crate::error::{GatewayError, invalid_input};

/// Schema-less document as stored by the unstructured log.
pub type Document = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Request,
    Stream,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Request, Channel::Stream];

    /// Counter key of this channel in the counter store.
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Request => "request",
            Channel::Stream => "stream",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered pair of integer features, validated before classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferenceInput {
    pub feature1: i64,
    pub feature2: i64,
}

impl InferenceInput {
    pub fn new(feature1: i64, feature2: i64) -> Self {
        Self { feature1, feature2 }
    }

    /// Builds an input from raw textual fields; exactly two integers are accepted.
    pub fn from_fields<'a, I>(fields: I) -> Result<Self, GatewayError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut values = Vec::with_capacity(2);
        for (index, field) in fields.into_iter().enumerate() {
            if index >= 2 {
                return Err(invalid_input(
                    "expected exactly two features, got more than two",
                ));
            }
            values.push(parse_feature(index + 1, field)?);
        }

        match values.as_slice() {
            [feature1, feature2] => Ok(Self::new(*feature1, *feature2)),
            other => Err(invalid_input(format!(
                "expected exactly two features, got {}",
                other.len()
            ))),
        }
    }

    /// Parses the stream wire format `"<int>,<int>"`.
    pub fn parse_csv(text: &str) -> Result<Self, GatewayError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(invalid_input("empty message"));
        }
        Self::from_fields(text.split(','))
    }

    /// Parses the `f1` / `f2` query parameters of the request endpoint.
    pub fn from_query(f1: Option<&str>, f2: Option<&str>) -> Result<Self, GatewayError> {
        let f1 = f1.ok_or_else(|| invalid_input("missing query parameter 'f1'"))?;
        let f2 = f2.ok_or_else(|| invalid_input("missing query parameter 'f2'"))?;
        Self::from_fields([f1, f2])
    }

    pub fn as_array(&self) -> [i64; 2] {
        [self.feature1, self.feature2]
    }
}

fn parse_feature(position: usize, raw: &str) -> Result<i64, GatewayError> {
    let trimmed = raw.trim();
    trimmed.parse::<i64>().map_err(|_| {
        invalid_input(format!(
            "feature {position} must be an integer, got '{trimmed}'"
        ))
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label {
    Zero,
    One,
}

impl Label {
    pub fn as_i32(self) -> i32 {
        match self {
            Label::Zero => 0,
            Label::One => 1,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_i32())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InferenceResult {
    pub input: InferenceInput,
    pub label: Label,
}

impl InferenceResult {
    pub fn structured_record(&self) -> StructuredLogRecord {
        StructuredLogRecord {
            feature1: self.input.feature1,
            feature2: self.input.feature2,
            prediction: self.label.as_i32(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StructuredLogRecord {
    pub feature1: i64,
    pub feature2: i64,
    pub prediction: i32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnstructuredLogEvent {
    pub kind: String,
    pub payload: Document,
    pub timestamp: OffsetDateTime,
}

impl UnstructuredLogEvent {
    pub fn new(kind: impl Into<String>, payload: Document) -> Self {
        Self {
            kind: kind.into(),
            payload,
            timestamp: now(),
        }
    }

    pub fn inference(channel: Channel, result: &InferenceResult) -> Self {
        let mut payload = Document::new();
        payload.insert("channel".to_string(), json!(channel.as_str()));
        payload.insert("data".to_string(), json!(result.input.as_array()));
        payload.insert("prediction".to_string(), json!(result.label.as_i32()));
        Self::new("inference", payload)
    }

    pub fn root_call() -> Self {
        Self::new("root_call", Document::new())
    }

    pub fn periodic(outcome: &PeriodicOutcome) -> Self {
        let mut payload = Document::new();
        payload.insert("firing_id".to_string(), json!(outcome.firing_id));
        payload.insert("url".to_string(), json!(outcome.url));
        match &outcome.result {
            CallOutcome::Status(code) => {
                payload.insert("status".to_string(), json!(code));
            }
            CallOutcome::TimedOut => {
                payload.insert("failure".to_string(), json!("timeout"));
            }
            CallOutcome::Failed(reason) => {
                payload.insert("failure".to_string(), json!("error"));
                payload.insert("reason".to_string(), json!(reason));
            }
        }
        Self {
            kind: "periodic_http_call".to_string(),
            payload,
            timestamp: outcome.timestamp,
        }
    }

    pub fn into_document(self) -> Document {
        let mut document = Document::new();
        document.insert("kind".to_string(), Value::String(self.kind));
        document.insert("payload".to_string(), Value::Object(self.payload));
        document.insert(
            "timestamp".to_string(),
            Value::String(format_timestamp(self.timestamp)),
        );
        document
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutcome {
    Status(u16),
    TimedOut,
    Failed(String),
}

impl CallOutcome {
    pub fn is_failure(&self) -> bool {
        !matches!(self, CallOutcome::Status(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PeriodicOutcome {
    pub firing_id: u64,
    pub url: String,
    pub result: CallOutcome,
    pub timestamp: OffsetDateTime,
}

pub fn now() -> OffsetDateTime {
    OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc())
}

pub fn format_timestamp(timestamp: OffsetDateTime) -> String {
    timestamp
        .format(&Rfc3339)
        .unwrap_or_else(|_| timestamp.unix_timestamp().to_string())
}
