use async_trait::async_trait;
use futures_util::{future, stream, Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{CompletionError, CompletionService, FragmentStream};
use crate::config::CompletionConfig;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    temperature: f32,
    max_completion_tokens: u32,
    top_p: f32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

/// One `data:` payload of a streamed chat completion
#[derive(Debug, Deserialize)]
struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    error: Option<StreamErrorBody>,
}

#[derive(Debug, Default, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Delta,
}

#[derive(Debug, Default, Deserialize)]
struct Delta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamErrorBody {
    message: String,
}

/// Client for OpenAI-compatible streaming chat completion endpoints (Groq by default)
pub struct ChatCompletionClient {
    client: Client,
    api_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_completion_tokens: u32,
    top_p: f32,
}

impl ChatCompletionClient {
    pub fn new(config: &CompletionConfig, api_key: String) -> Self {
        Self {
            client: Client::new(),
            api_url: config.api_url.clone(),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_completion_tokens: config.max_completion_tokens,
            top_p: config.top_p,
        }
    }
}

#[async_trait]
impl CompletionService for ChatCompletionClient {
    async fn stream_completion(&self, prompt: &str) -> Result<FragmentStream, CompletionError> {
        let request = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: self.temperature,
            max_completion_tokens: self.max_completion_tokens,
            top_p: self.top_p,
            stream: true,
        };

        tracing::debug!("Requesting completion from {} ({} chars)", self.model, prompt.len());

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(decode_event_stream(response.bytes_stream()))
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Turn a raw response body stream into text fragments.
///
/// The decoder is flushed once the body ends, so a final event without a
/// trailing newline is still delivered.
fn decode_event_stream<S, B, E>(body: S) -> FragmentStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: Into<CompletionError> + Send + 'static,
{
    body.map(Some)
        .chain(stream::once(future::ready(None)))
        .scan(SseDecoder::default(), |decoder, chunk| {
            let items = match chunk {
                Some(Ok(bytes)) => decoder.feed(bytes.as_ref()),
                Some(Err(e)) => vec![Err(e.into())],
                None => decoder.finish(),
            };
            future::ready(Some(stream::iter(items)))
        })
        .flatten()
        .boxed()
}

/// Incremental decoder for server-sent completion events.
///
/// Network reads may split lines anywhere, including inside a UTF-8 sequence,
/// so bytes are buffered until a full line is available.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    done: bool,
}

impl SseDecoder {
    /// Consume a network read and return the text fragments it completed
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Result<String, CompletionError>> {
        self.buffer.extend_from_slice(bytes);
        let mut fragments = Vec::new();

        while let Some(pos) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(item) = self.decode_line(&line) {
                fragments.push(item);
            }
        }

        fragments
    }

    /// Decode whatever is left in the buffer once the body has ended
    pub fn finish(&mut self) -> Vec<Result<String, CompletionError>> {
        let line = std::mem::take(&mut self.buffer);
        self.decode_line(&line).into_iter().collect()
    }

    fn decode_line(&mut self, line: &[u8]) -> Option<Result<String, CompletionError>> {
        if self.done {
            return None;
        }

        let line = String::from_utf8_lossy(line);
        let data = line.trim().strip_prefix("data:")?.trim();
        if data == "[DONE]" {
            self.done = true;
            return None;
        }

        match parse_delta(data) {
            Ok(Some(content)) if !content.is_empty() => Some(Ok(content)),
            Ok(_) => None,
            Err(e) => Some(Err(e)),
        }
    }

    /// Whether the `[DONE]` marker has been seen
    pub fn is_done(&self) -> bool {
        self.done
    }
}

fn parse_delta(data: &str) -> Result<Option<String>, CompletionError> {
    let chunk: StreamChunk =
        serde_json::from_str(data).map_err(|e| CompletionError::Decode(e.to_string()))?;

    if let Some(error) = chunk.error {
        return Err(CompletionError::Stream(error.message));
    }

    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content))
}
