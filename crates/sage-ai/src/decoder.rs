//! Incremental decoding of `data: {json}` completion streams
//!
//! Network reads can split a record anywhere, including inside a multi-byte
//! character, so bytes are buffered until a full `\n`-terminated line is
//! available. Each line is decoded into at most one [`Delta`] of formatted
//! markup.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use memchr::memchr;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::format::{self, ListKind};

/// Termination marker sent by the endpoint after the last record
pub const SENTINEL: &str = "data: [DONE]";

/// Carry-over buffer that turns arbitrary byte chunks into complete lines
#[derive(Debug, Default)]
pub struct LineBuffer {
    buffer: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a chunk and return every line it completed
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut lines = Vec::new();
        let mut start = 0;
        while let Some(offset) = memchr(b'\n', &self.buffer[start..]) {
            let end = start + offset;
            if let Some(line) = decode_line_bytes(&self.buffer[start..end]) {
                lines.push(line);
            }
            start = end + 1;
        }
        self.buffer.drain(..start);
        lines
    }

    /// Take the unterminated remainder at end of data
    pub fn finish(&mut self) -> Option<String> {
        if self.buffer.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buffer);
        decode_line_bytes(&rest)
    }

    /// Bytes held back waiting for a newline
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }
}

fn decode_line_bytes(bytes: &[u8]) -> Option<String> {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(line) => Some(line.to_string()),
        Err(e) => {
            tracing::warn!("Skipping stream line with invalid UTF-8: {}", e);
            None
        }
    }
}

/// One piece of assistant output, as received and as rendered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delta {
    /// Raw text from the record (empty for container bookkeeping)
    pub text: String,
    /// Markup appended to the running output
    pub markup: String,
}

/// Stateful decoder for a single response body. Not reusable: create a new
/// one per request.
#[derive(Debug, Default)]
pub struct StreamDecoder {
    lines: LineBuffer,
    output: String,
    open_list: Option<ListKind>,
    skipped: usize,
    finished: bool,
}

impl StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw body bytes, returning the deltas of every completed line
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Delta> {
        if self.finished {
            tracing::warn!("Ignoring {} bytes pushed after end of stream", chunk.len());
            return Vec::new();
        }
        self.lines
            .push(chunk)
            .into_iter()
            .filter_map(|line| self.decode_line(&line))
            .collect()
    }

    /// Decode one complete protocol line
    pub fn decode_line(&mut self, line: &str) -> Option<Delta> {
        let line = line.trim();
        if line.is_empty() || line.starts_with(':') || line == SENTINEL {
            return None;
        }

        let payload = match line.strip_prefix("data:") {
            Some(rest) => rest.strip_prefix(' ').unwrap_or(rest),
            None => line,
        };
        if payload == "[DONE]" {
            return None;
        }

        match serde_json::from_str::<StreamChunk>(payload) {
            Ok(chunk) => {
                let text = chunk
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|choice| choice.delta.content)
                    .filter(|text| !text.is_empty())?;
                Some(self.append(text))
            }
            Err(e) => {
                self.skipped += 1;
                tracing::warn!("Skipping malformed stream record {:?}: {}", line, e);
                None
            }
        }
    }

    /// Flush the trailing line and close any open list container
    pub fn finish(&mut self) -> Option<Delta> {
        if self.finished {
            return None;
        }
        let mut closing = String::new();
        if let Some(delta) = self.lines.finish().and_then(|line| self.decode_line(&line)) {
            closing.push_str(&delta.markup);
        }
        self.finished = true;

        if let Some(open) = self.open_list.take() {
            self.output.push_str(open.close_tag());
            closing.push_str(open.close_tag());
        }
        if closing.is_empty() {
            None
        } else {
            Some(Delta {
                text: String::new(),
                markup: closing,
            })
        }
    }

    /// Markup accumulated so far
    pub fn output(&self) -> &str {
        &self.output
    }

    /// Number of malformed records skipped
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Whether a list container is open
    pub fn in_list(&self) -> bool {
        self.open_list.is_some()
    }

    fn append(&mut self, text: String) -> Delta {
        let mut markup = String::new();

        match format::list_item_kind(&text) {
            Some(kind) if self.open_list != Some(kind) => {
                if let Some(open) = self.open_list.take() {
                    markup.push_str(open.close_tag());
                }
                markup.push_str(kind.open_tag());
                self.open_list = Some(kind);
            }
            Some(_) => {}
            // Any non-blank delta that is not an item ends the run.
            None if !text.trim().is_empty() && self.in_list() => {
                if let Some(open) = self.open_list.take() {
                    markup.push_str(open.close_tag());
                }
            }
            None => {}
        }

        markup.push_str(&format::format(&text));
        self.output.push_str(&markup);
        Delta { text, markup }
    }
}

/// Decode a response body into a lazy sequence of deltas.
///
/// A transport error is yielded once and ends the sequence.
pub fn decode<S, E>(body: S) -> impl Stream<Item = Result<Delta>>
where
    S: Stream<Item = std::result::Result<Bytes, E>>,
    E: Into<Error>,
{
    async_stream::stream! {
        let mut decoder = StreamDecoder::new();
        futures::pin_mut!(body);

        while let Some(chunk) = body.next().await {
            match chunk {
                Ok(bytes) => {
                    for delta in decoder.push(&bytes) {
                        yield Ok(delta);
                    }
                }
                Err(e) => {
                    yield Err(e.into());
                    return;
                }
            }
        }

        if let Some(delta) = decoder.finish() {
            yield Ok(delta);
        }
        if decoder.skipped() > 0 {
            tracing::debug!("Stream finished with {} malformed records skipped", decoder.skipped());
        }
    }
}

// Streaming response types

#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: StreamDelta,
}

#[derive(Debug, Default, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}
