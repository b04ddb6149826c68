//! Aggregation of newline-delimited JSON response streams.

use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use tracing::trace;

use crate::error::OracleError;

/// One streamed response object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct GenerateFragment {
    /// Partial answer text.
    #[serde(default)]
    pub response: Option<String>,

    /// Set on the final fragment.
    #[serde(default)]
    pub done: bool,

    /// Error reported by the server mid-stream.
    #[serde(default)]
    pub error: Option<String>,
}

/// Splits arbitrary byte chunks into complete NDJSON fragments.
///
/// A line may be split across chunks; incomplete tails are buffered until
/// the next newline or [`finish`](Self::finish).
#[derive(Debug, Default)]
pub struct FragmentDecoder {
    buffer: Vec<u8>,
}

impl FragmentDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk and return every fragment completed by it.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<GenerateFragment>, OracleError> {
        self.buffer.extend_from_slice(chunk);

        let mut fragments = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(fragment) = parse_line(&line)? {
                fragments.push(fragment);
            }
        }

        Ok(fragments)
    }

    /// Flush a final line that had no trailing newline.
    pub fn finish(&mut self) -> Result<Option<GenerateFragment>, OracleError> {
        let line = std::mem::take(&mut self.buffer);
        parse_line(&line)
    }
}

fn parse_line(line: &[u8]) -> Result<Option<GenerateFragment>, OracleError> {
    let text = String::from_utf8_lossy(line);
    let text = text.trim();
    if text.is_empty() {
        return Ok(None);
    }

    let fragment: GenerateFragment =
        serde_json::from_str(text).map_err(|e| OracleError::MalformedFragment {
            line: text.to_string(),
            reason: e.to_string(),
        })?;

    if let Some(message) = &fragment.error {
        return Err(OracleError::Remote(message.clone()));
    }

    Ok(Some(fragment))
}

/// Consume a response body stream and concatenate every `response` field.
///
/// Stops at the first fragment marked `done` or at end of stream. The
/// stream is consumed and cannot be restarted.
pub async fn collect_response<S, B, E>(stream: S) -> Result<String, OracleError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<OracleError>,
{
    let mut stream = std::pin::pin!(stream);
    let mut decoder = FragmentDecoder::new();
    let mut collected = String::new();

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(Into::into)?;
        for fragment in decoder.push(chunk.as_ref())? {
            if let Some(text) = fragment.response {
                collected.push_str(&text);
            }
            if fragment.done {
                trace!("Stream signalled completion");
                return Ok(collected);
            }
        }
    }

    if let Some(fragment) = decoder.finish()? {
        if let Some(text) = fragment.response {
            collected.push_str(&text);
        }
    }

    Ok(collected)
}
