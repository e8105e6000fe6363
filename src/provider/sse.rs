//! Server-sent event decoding for streamed chat completions.

use std::fmt::Display;

use futures::{Stream, StreamExt};

use crate::error::BatonError;

/// Payload of one SSE line.
#[derive(Debug, PartialEq, Eq)]
pub enum SseLine<'a> {
    Data(&'a str),
    Done,
    /// Comments, blank lines, and non-data fields.
    Ignored,
}

/// Classify a single SSE line.
pub fn parse_sse_line(line: &str) -> SseLine<'_> {
    let line = line.trim();
    if line.is_empty() || line.starts_with(':') {
        return SseLine::Ignored;
    }
    match line.strip_prefix("data:") {
        Some(data) if data.trim_start() == "[DONE]" => SseLine::Done,
        Some(data) => SseLine::Data(data.trim_start()),
        None => SseLine::Ignored,
    }
}

/// Text fragment at `choices[0].delta.content`, if the payload carries one.
/// Unparseable payloads yield `None`.
pub fn delta_content(data: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(data).ok()?;
    value
        .get("choices")?
        .get(0)?
        .get("delta")?
        .get("content")?
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Drain an SSE byte stream, forwarding each text fragment to `on_delta`
/// and returning the accumulated text once `[DONE]` arrives.
///
/// If the transport fails or the stream ends early after at least one
/// fragment was received, the partial text is returned as a success.
pub async fn consume_sse<S, B, E, F>(stream: S, on_delta: &mut F) -> Result<String, BatonError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
    F: FnMut(&str) + Send + ?Sized,
{
    futures::pin_mut!(stream);
    let mut buffer: Vec<u8> = Vec::new();
    let mut text = String::new();

    while let Some(chunk) = stream.next().await {
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) if text.is_empty() => return Err(BatonError::Stream(e.to_string())),
            Err(e) => {
                tracing::warn!(error = %e, chars = text.len(), "stream interrupted, keeping partial response");
                return Ok(text);
            }
        };
        buffer.extend_from_slice(chunk.as_ref());

        while let Some(pos) = buffer.iter().position(|&b| b == b'\n') {
            let line_bytes: Vec<u8> = buffer.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&line_bytes);
            if handle_line(&line, &mut text, on_delta) {
                return Ok(text);
            }
        }
    }

    // A final line without a trailing newline.
    if !buffer.is_empty() {
        let line = String::from_utf8_lossy(&buffer).into_owned();
        if handle_line(&line, &mut text, on_delta) {
            return Ok(text);
        }
    }

    if text.is_empty() {
        return Err(BatonError::Stream(
            "stream ended before any content was received".into(),
        ));
    }
    tracing::warn!(chars = text.len(), "stream ended without [DONE], keeping partial response");
    Ok(text)
}

/// Returns `true` when the line terminates the stream.
fn handle_line<F>(line: &str, text: &mut String, on_delta: &mut F) -> bool
where
    F: FnMut(&str) + Send + ?Sized,
{
    match parse_sse_line(line) {
        SseLine::Done => true,
        SseLine::Data(data) => {
            if let Some(fragment) = delta_content(data) {
                text.push_str(&fragment);
                on_delta(&fragment);
            }
            false
        }
        SseLine::Ignored => false,
    }
}
