use serde::Deserialize;
use serde_json::Value;

use crate::error::ParseError;
use crate::models::Proposal;
use crate::stream::frame::Frame;

/// A decoded unit of the chat stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Proposals(Vec<Proposal>),
    Chunk(String),
    Complete { elapsed_seconds: Option<f64> },
    Error(String),
    /// Forward-compatible catch-all, never fatal
    Unknown(String),
}

#[derive(Deserialize)]
struct WireEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

/// Decode one frame into an event.
///
/// The frame must be a JSON object with a `type` string and an optional
/// `data` payload whose shape depends on the type.
pub fn parse_event(frame: &Frame) -> Result<Event, ParseError> {
    let text = std::str::from_utf8(frame.as_bytes())?;
    let wire: WireEvent = serde_json::from_str(text.trim())?;

    match wire.kind.as_str() {
        "proposals" => {
            let proposals = serde_json::from_value(wire.data)
                .map_err(|e| payload_error("proposals", e.to_string()))?;
            Ok(Event::Proposals(proposals))
        }
        "chunk" => match wire.data {
            Value::String(delta) => Ok(Event::Chunk(delta)),
            other => Err(payload_error("chunk", format!("expected a string, got {other}"))),
        },
        "complete" => Ok(Event::Complete {
            elapsed_seconds: parse_elapsed(&wire.data)?,
        }),
        "error" => Ok(Event::Error(error_message(wire.data))),
        _ => {
            tracing::warn!("Unknown stream event type: {}", wire.kind);
            Ok(Event::Unknown(wire.kind))
        }
    }
}

/// `complete` carries the elapsed seconds either bare or as `{"elapsed": n}`.
fn parse_elapsed(data: &Value) -> Result<Option<f64>, ParseError> {
    match data {
        Value::Null => Ok(None),
        Value::Number(n) => Ok(n.as_f64()),
        Value::Object(map) => match map.get("elapsed") {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => Ok(n.as_f64()),
            Some(other) => Err(payload_error(
                "complete",
                format!("elapsed must be a number, got {other}"),
            )),
        },
        other => Err(payload_error(
            "complete",
            format!("expected a number, got {other}"),
        )),
    }
}

fn error_message(data: Value) -> String {
    match data {
        Value::String(s) if !s.trim().is_empty() => s,
        Value::Null | Value::String(_) => "Unknown error".to_string(),
        other => other.to_string(),
    }
}

fn payload_error(kind: &str, reason: String) -> ParseError {
    ParseError::Payload {
        kind: kind.to_string(),
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<Event, ParseError> {
        parse_event(&Frame::from(text.as_bytes()))
    }

    #[test]
    fn test_parse_proposals() {
        let event = parse(
            r#"{"type":"proposals","data":[{"document":"str.split","score":0.81},{"document":"re.split","score":0.4}]}"#,
        )
        .unwrap();
        match event {
            Event::Proposals(items) => {
                assert_eq!(items.len(), 2);
                assert_eq!(items[0].document, "str.split");
                assert!((items[1].score - 0.4).abs() < f64::EPSILON);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[test]
    fn test_parse_chunk() {
        assert_eq!(
            parse(r#"{"type":"chunk","data":"Hel"}"#).unwrap(),
            Event::Chunk("Hel".into())
        );
    }

    #[test]
    fn test_parse_chunk_keeps_whitespace() {
        assert_eq!(
            parse(r#"{"type":"chunk","data":" world\n"}"#).unwrap(),
            Event::Chunk(" world\n".into())
        );
    }

    #[test]
    fn test_parse_complete_shapes() {
        assert_eq!(
            parse(r#"{"type":"complete","data":2.5}"#).unwrap(),
            Event::Complete { elapsed_seconds: Some(2.5) }
        );
        assert_eq!(
            parse(r#"{"type":"complete"}"#).unwrap(),
            Event::Complete { elapsed_seconds: None }
        );
        assert_eq!(
            parse(r#"{"type":"complete","data":{"elapsed":1.25}}"#).unwrap(),
            Event::Complete { elapsed_seconds: Some(1.25) }
        );
    }

    #[test]
    fn test_parse_complete_bad_payload() {
        assert!(matches!(
            parse(r#"{"type":"complete","data":"soon"}"#),
            Err(ParseError::Payload { .. })
        ));
    }

    #[test]
    fn test_parse_error_event() {
        assert_eq!(
            parse(r#"{"type":"error","data":"boom"}"#).unwrap(),
            Event::Error("boom".into())
        );
        assert_eq!(
            parse(r#"{"type":"error","data":null}"#).unwrap(),
            Event::Error("Unknown error".into())
        );
    }

    #[test]
    fn test_parse_unknown_type() {
        assert_eq!(
            parse(r#"{"type":"usage","data":{"tokens":12}}"#).unwrap(),
            Event::Unknown("usage".into())
        );
    }

    #[test]
    fn test_parse_malformed_json() {
        assert!(matches!(parse("not json{{"), Err(ParseError::Malformed(_))));
        assert!(matches!(parse(r#"{"data":"x"}"#), Err(ParseError::Malformed(_))));
        assert!(matches!(parse(r#""chunk""#), Err(ParseError::Malformed(_))));
    }

    #[test]
    fn test_parse_invalid_utf8() {
        let frame = Frame::from(&b"{\"type\":\"chunk\",\"data\":\"\xff\"}"[..]);
        assert!(matches!(parse_event(&frame), Err(ParseError::Utf8(_))));
    }

    #[test]
    fn test_parse_bad_chunk_payload() {
        assert!(matches!(
            parse(r#"{"type":"chunk","data":42}"#),
            Err(ParseError::Payload { .. })
        ));
    }
}
