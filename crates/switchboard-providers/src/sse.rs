//! Server-Sent Events framing for streamed responses.
//!
//! Bytes are buffered until a blank-line boundary, then each event's `event:`
//! and `data:` fields are extracted. Provider modules turn the events into
//! [`StreamChunk`](switchboard_core::types::StreamChunk)s.

use std::pin::Pin;

use futures_util::{Stream, StreamExt};

use crate::error::ProviderError;

/// One decoded SSE event.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SseEvent {
    /// The `event:` field, if present.
    pub event: Option<String>,
    /// All `data:` lines joined with `\n`.
    pub data: String,
}

pub(crate) type SseStream = Pin<Box<dyn Stream<Item = Result<SseEvent, ProviderError>> + Send>>;

fn find_event_boundary(buffer: &[u8]) -> Option<(usize, usize)> {
    let lf = buffer.windows(2).position(|w| w == b"\n\n");
    let crlf = buffer.windows(4).position(|w| w == b"\r\n\r\n");
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a <= b { (a, 2) } else { (b, 4) }),
        (Some(a), None) => Some((a, 2)),
        (None, Some(b)) => Some((b, 4)),
        (None, None) => None,
    }
}

fn drain_next_event(buffer: &mut Vec<u8>) -> Option<Vec<u8>> {
    let (pos, delim_len) = find_event_boundary(buffer)?;
    let event = buffer[..pos].to_vec();
    buffer.drain(..pos + delim_len);
    Some(event)
}

/// Parse the fields of one raw event. `None` for comment-only or empty events.
fn parse_event(raw: &str) -> Option<SseEvent> {
    let mut event = None;
    let mut data: Option<String> = None;

    for line in raw.lines() {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if let Some(rest) = line.strip_prefix("data:") {
            let rest = rest.strip_prefix(' ').unwrap_or(rest);
            match data.as_mut() {
                Some(d) => {
                    d.push('\n');
                    d.push_str(rest);
                }
                None => data = Some(rest.to_string()),
            }
        } else if let Some(rest) = line.strip_prefix("event:") {
            event = Some(rest.trim().to_string());
        }
    }

    data.map(|data| SseEvent { event, data })
}

/// Decode one raw event. Invalid UTF-8 is a parse error wherever the event
/// sits in the body.
fn decode_event(raw: &[u8]) -> Result<Option<SseEvent>, ProviderError> {
    let raw = std::str::from_utf8(raw)
        .map_err(|e| ProviderError::Parse(format!("invalid UTF-8 in SSE event: {e}")))?;
    Ok(parse_event(raw))
}

/// Decode an HTTP response body into SSE events.
///
/// A trailing event without a terminating blank line is still delivered when
/// the body ends.
pub(crate) fn events(response: reqwest::Response) -> SseStream {
    let mut body = response.bytes_stream();
    Box::pin(async_stream::try_stream! {
        let mut buffer: Vec<u8> = Vec::new();

        while let Some(bytes) = body.next().await {
            let bytes = bytes.map_err(|e| ProviderError::Network(e.to_string()))?;
            buffer.extend_from_slice(&bytes);

            while let Some(raw) = drain_next_event(&mut buffer) {
                if let Some(event) = decode_event(&raw)? {
                    yield event;
                }
            }
        }

        if !buffer.is_empty() {
            if let Some(event) = decode_event(&buffer)? {
                yield event;
            }
        }
    })
}
