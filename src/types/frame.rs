use crate::error::{CourierError, CourierResult};

/// Separator between the type tag and the payload on the wire.
pub const FRAME_DELIMITER: &str = "::";

/// A decoded wire frame: `<type_tag>::<payload>`.
///
/// The type tag is an opaque registry key; by convention it reads
/// `"<QualifiedName>, <bundle>"`. The payload is a self-describing JSON
/// object and may itself contain the delimiter - only the first occurrence
/// splits the frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub type_tag: String,
    pub payload: Vec<u8>,
}

impl Frame {
    pub fn new(type_tag: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            type_tag: type_tag.into(),
            payload,
        }
    }

    /// Split raw bytes into tag and payload.
    pub fn parse(bytes: &[u8]) -> CourierResult<Self> {
        let text = std::str::from_utf8(bytes)
            .map_err(|err| CourierError::MalformedFrame(format!("frame is not utf-8: {err}")))?;

        let (type_tag, payload) = text.split_once(FRAME_DELIMITER).ok_or_else(|| {
            CourierError::MalformedFrame(format!("missing '{FRAME_DELIMITER}' delimiter"))
        })?;

        if type_tag.is_empty() {
            return Err(CourierError::MalformedFrame("empty type tag".to_string()));
        }
        if payload.is_empty() {
            return Err(CourierError::MalformedFrame("empty payload".to_string()));
        }

        Ok(Self {
            type_tag: type_tag.to_string(),
            payload: payload.as_bytes().to_vec(),
        })
    }

    /// Emit the wire form.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.type_tag.len() + FRAME_DELIMITER.len() + self.payload.len());
        out.extend_from_slice(self.type_tag.as_bytes());
        out.extend_from_slice(FRAME_DELIMITER.as_bytes());
        out.extend_from_slice(&self.payload);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let frame = Frame::new("Ping, app", br#"{"note":"hi"}"#.to_vec());
        let parsed = Frame::parse(&frame.encode()).unwrap();
        assert_eq!(parsed, frame);
    }

    #[test]
    fn splits_on_first_delimiter_only() {
        let parsed = Frame::parse(br#"Ping, app::{"note":"a::b"}"#).unwrap();
        assert_eq!(parsed.type_tag, "Ping, app");
        assert_eq!(parsed.payload, br#"{"note":"a::b"}"#.to_vec());
    }

    #[test]
    fn rejects_missing_delimiter() {
        let err = Frame::parse(b"just some bytes").unwrap_err();
        assert!(matches!(err, CourierError::MalformedFrame(_)));
    }

    #[test]
    fn rejects_empty_tag_and_payload() {
        assert!(Frame::parse(b"::{}").is_err());
        assert!(Frame::parse(b"Ping, app::").is_err());
    }
}
