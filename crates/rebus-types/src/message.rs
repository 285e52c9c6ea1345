use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Header carrying the time a message may wait in a queue before it is
/// discarded, e.g. `"00:00:30"`
pub const TIME_TO_BE_RECEIVED: &str = "rebus-time-to-be-received";

pub type Headers = BTreeMap<String, HeaderValue>;

// ============================================================================
// HeaderValue
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HeaderValue {
    Text(String),
    Duration(Duration),
}

impl From<&str> for HeaderValue {
    fn from(value: &str) -> Self {
        HeaderValue::Text(value.to_string())
    }
}

impl From<String> for HeaderValue {
    fn from(value: String) -> Self {
        HeaderValue::Text(value)
    }
}

impl From<Duration> for HeaderValue {
    fn from(value: Duration) -> Self {
        HeaderValue::Duration(value)
    }
}

// ============================================================================
// SendRequest - what the bus hands to the transport
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SendRequest {
    pub body: Vec<u8>,
    pub headers: Headers,
    pub label: Option<String>,
}

impl SendRequest {
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: body.into(),
            ..Self::default()
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<HeaderValue>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Discard the message if nobody receives it within `ttl`
    pub fn with_time_to_be_received(self, ttl: Duration) -> Self {
        self.with_header(TIME_TO_BE_RECEIVED, ttl)
    }

    pub fn expiration(&self) -> Option<Duration> {
        expiration(&self.headers)
    }
}

// ============================================================================
// TransportMessage - envelope persisted under the message id
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportMessage {
    /// Assigned by the store when the message is enqueued; absent in the
    /// stored envelope and filled in on receive
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(with = "serde_bytes")]
    pub body: Vec<u8>,

    #[serde(default)]
    pub headers: Headers,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl TransportMessage {
    pub fn expiration(&self) -> Option<Duration> {
        expiration(&self.headers)
    }

    /// Tag the envelope with the id it was stored under
    pub fn into_received(self, id: String) -> ReceivedMessage {
        ReceivedMessage {
            id,
            body: self.body,
            headers: self.headers,
            label: self.label,
        }
    }
}

impl From<&SendRequest> for TransportMessage {
    fn from(request: &SendRequest) -> Self {
        Self {
            id: None,
            body: request.body.clone(),
            headers: request.headers.clone(),
            label: request.label.clone(),
        }
    }
}

// ============================================================================
// ReceivedMessage - what the transport hands back to the bus
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ReceivedMessage {
    pub id: String,
    pub body: Vec<u8>,
    pub headers: Headers,
    pub label: Option<String>,
}

// ============================================================================
// Expiration
// ============================================================================

/// Read the time-to-be-received header. Absent or unparsable values mean
/// the message never expires.
pub fn expiration(headers: &Headers) -> Option<Duration> {
    match headers.get(TIME_TO_BE_RECEIVED)? {
        HeaderValue::Duration(ttl) => Some(*ttl),
        HeaderValue::Text(text) => parse_time_span(text),
    }
}

/// Parse a `[d.]hh:mm[:ss[.fffffff]]` time span, or a bare number of days.
/// Negative spans are rejected.
pub fn parse_time_span(input: &str) -> Option<Duration> {
    let text = input.trim();
    if text.is_empty() || text.starts_with('-') {
        return None;
    }

    let parts: Vec<&str> = text.split(':').collect();
    if parts.len() == 1 {
        let days: u64 = parts[0].parse().ok()?;
        return Some(Duration::from_secs(days.checked_mul(86_400)?));
    }
    if parts.len() > 3 {
        return None;
    }

    let (days, hours) = match parts[0].split_once('.') {
        Some((days, hours)) => (days.parse::<u64>().ok()?, hours.parse::<u64>().ok()?),
        None => (0, parts[0].parse::<u64>().ok()?),
    };
    let minutes: u64 = parts[1].parse().ok()?;
    let (seconds, nanos) = match parts.get(2) {
        Some(field) => parse_seconds(field)?,
        None => (0, 0),
    };

    if hours >= 24 || minutes >= 60 || seconds >= 60 {
        return None;
    }

    let total = days
        .checked_mul(86_400)?
        .checked_add(hours * 3_600 + minutes * 60 + seconds)?;
    Some(Duration::new(total, nanos))
}

fn parse_seconds(field: &str) -> Option<(u64, u32)> {
    match field.split_once('.') {
        Some((whole, fraction)) => {
            if fraction.is_empty()
                || fraction.len() > 9
                || !fraction.bytes().all(|b| b.is_ascii_digit())
            {
                return None;
            }
            let padded = format!("{:0<9}", fraction);
            Some((whole.parse().ok()?, padded.parse().ok()?))
        }
        None => Some((field.parse().ok()?, 0)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_time_span_clock_formats() {
        assert_eq!(parse_time_span("00:00:30"), Some(Duration::from_secs(30)));
        assert_eq!(parse_time_span("01:30"), Some(Duration::from_secs(5_400)));
        assert_eq!(
            parse_time_span("1.02:03:04"),
            Some(Duration::from_secs(86_400 + 2 * 3_600 + 3 * 60 + 4))
        );
        assert_eq!(
            parse_time_span("00:00:01.5"),
            Some(Duration::from_millis(1_500))
        );
        assert_eq!(parse_time_span("2"), Some(Duration::from_secs(2 * 86_400)));
    }

    #[test]
    fn test_parse_time_span_rejects_garbage() {
        assert_eq!(parse_time_span(""), None);
        assert_eq!(parse_time_span("soon"), None);
        assert_eq!(parse_time_span("-00:00:05"), None);
        assert_eq!(parse_time_span("00:61:00"), None);
        assert_eq!(parse_time_span("25:00:00"), None);
        assert_eq!(parse_time_span("1:2:3:4"), None);
        assert_eq!(parse_time_span("00:00:01.x"), None);
    }

    #[test]
    fn test_expiration_from_headers() {
        let request = SendRequest::new(b"hello".to_vec());
        assert_eq!(request.expiration(), None);

        let request = request.with_header(TIME_TO_BE_RECEIVED, "00:00:10");
        assert_eq!(request.expiration(), Some(Duration::from_secs(10)));

        let request = SendRequest::new(b"hello".to_vec())
            .with_time_to_be_received(Duration::from_millis(250));
        assert_eq!(request.expiration(), Some(Duration::from_millis(250)));

        let request = SendRequest::new(b"hello".to_vec())
            .with_header(TIME_TO_BE_RECEIVED, "not a time span");
        assert_eq!(request.expiration(), None);
    }

    #[test]
    fn test_into_received_keeps_content() {
        let message = TransportMessage::from(
            &SendRequest::new(b"payload".to_vec())
                .with_label("OrderPlaced")
                .with_header("correlation-id", "abc"),
        );
        let received = message.into_received("17".to_string());

        assert_eq!(received.id, "17");
        assert_eq!(received.body, b"payload");
        assert_eq!(received.label.as_deref(), Some("OrderPlaced"));
        assert_eq!(
            received.headers.get("correlation-id"),
            Some(&HeaderValue::Text("abc".to_string()))
        );
    }

    #[test]
    fn test_header_value_json_shape() {
        let value = HeaderValue::from("x");
        assert_eq!(serde_json::to_string(&value).unwrap(), r#"{"Text":"x"}"#);
    }
}
