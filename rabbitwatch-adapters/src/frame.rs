//! Decoding of pushed frames.
//!
//! Both transports carry the same tagged JSON envelope:
//!
//! ```text
//! {"type": "metrics" | "messageFlow" | "connected" | "error", "payload": ...}
//! ```
//!
//! `metrics` and `messageFlow` payloads may be a single object or an array.

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use rabbitwatch_types::{MessageFlow, Metric};

use crate::AdapterError;

/// A decoded frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Metrics(Vec<Metric>),
    MessageFlow(Vec<MessageFlow>),
    /// Informational greeting sent by the SSE endpoint.
    Connected(Option<String>),
    /// Application-level error reported in-band. Not a transport failure.
    Error(String),
    /// A `type` this client does not understand.
    Unknown(String),
}

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Value,
    #[serde(default)]
    message: Option<String>,
}

impl Frame {
    /// Decode one frame of JSON text.
    ///
    /// Malformed JSON or a payload of the wrong shape is an error; an
    /// unrecognized `type` is not.
    pub fn decode(text: &str) -> Result<Frame, AdapterError> {
        let envelope: Envelope = serde_json::from_str(text)?;

        match envelope.kind.as_str() {
            "metrics" => Ok(Frame::Metrics(one_or_many(envelope.payload)?)),
            "messageFlow" => Ok(Frame::MessageFlow(one_or_many(envelope.payload)?)),
            "connected" => Ok(Frame::Connected(
                envelope.message.or_else(|| text_of(&envelope.payload)),
            )),
            "error" => Ok(Frame::Error(
                envelope
                    .message
                    .or_else(|| text_of(&envelope.payload))
                    .unwrap_or_else(|| "unspecified error".to_string()),
            )),
            other => Ok(Frame::Unknown(other.to_string())),
        }
    }
}

fn one_or_many<T: DeserializeOwned>(payload: Value) -> Result<Vec<T>, AdapterError> {
    match payload {
        Value::Array(items) => items
            .into_iter()
            .map(|item| serde_json::from_value(item).map_err(AdapterError::from))
            .collect(),
        Value::Null => Err(AdapterError::Parse("missing payload".to_string())),
        single => Ok(vec![serde_json::from_value(single)?]),
    }
}

fn text_of(payload: &Value) -> Option<String> {
    match payload {
        Value::String(s) => Some(s.clone()),
        Value::Object(map) => map
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rabbitwatch_types::NodeStatus;

    #[test]
    fn decodes_metric_array() {
        let text = r#"{"type":"metrics","payload":[
            {"nodeId":"q1","messageRate":1.5,"status":"active","timestamp":10},
            {"nodeId":"q2","messageRate":0,"status":"idle","timestamp":10,"consumerCount":0}
        ]}"#;

        let Frame::Metrics(metrics) = Frame::decode(text).unwrap() else {
            panic!("expected metrics frame");
        };
        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics[1].status, NodeStatus::Idle);
        assert_eq!(metrics[1].consumer_count, Some(0));
    }

    #[test]
    fn decodes_single_flow() {
        let text = r#"{"type":"messageFlow","payload":
            {"id":"f1","fromNodeId":"p","toNodeId":"q","messageSize":3,"timestamp":5}}"#;

        let Frame::MessageFlow(flows) = Frame::decode(text).unwrap() else {
            panic!("expected flow frame");
        };
        assert_eq!(flows.len(), 1);
        assert_eq!(flows[0].id, "f1");
    }

    #[test]
    fn control_frames() {
        assert_eq!(
            Frame::decode(r#"{"type":"connected","message":"hello"}"#).unwrap(),
            Frame::Connected(Some("hello".to_string()))
        );
        assert_eq!(
            Frame::decode(r#"{"type":"error","payload":{"message":"broker unreachable"}}"#).unwrap(),
            Frame::Error("broker unreachable".to_string())
        );
    }

    #[test]
    fn unknown_type_is_not_an_error() {
        assert_eq!(
            Frame::decode(r#"{"type":"queueStats","payload":{}}"#).unwrap(),
            Frame::Unknown("queueStats".to_string())
        );
    }

    #[test]
    fn malformed_frames_are_errors() {
        assert!(matches!(Frame::decode("not json"), Err(AdapterError::Parse(_))));
        assert!(matches!(
            Frame::decode(r#"{"type":"metrics","payload":{"nodeId":"q1"}}"#),
            Err(AdapterError::Parse(_))
        ));
        assert!(matches!(
            Frame::decode(r#"{"type":"metrics"}"#),
            Err(AdapterError::Parse(_))
        ));
    }
}
