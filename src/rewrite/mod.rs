use async_trait::async_trait;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;

pub mod groq;

pub use groq::ChatCompletionClient;

/// Placeholder replaced by the chunk text in a prompt template
pub const TEXT_PLACEHOLDER: &str = "{text}";

/// Default instructions sent with every chunk
pub const DEFAULT_PROMPT_TEMPLATE: &str = "\
Below is a fragment of an automatically transcribed YouTube video. \
The transcription contains recognition, spelling and punctuation errors. \
Correct and rewrite the text so that it reads clearly, naturally and coherently, \
keeping the original meaning of the message and the language it is written in. \
If you find words or phrases that make no sense, infer what the speaker meant from the context. \
Reply only with the corrected text and nothing else.

Original text:
{text}
";

/// Incremental text fragments of one completion, in emission order
pub type FragmentStream = BoxStream<'static, Result<String, CompletionError>>;

#[derive(thiserror::Error, Debug)]
pub enum CompletionError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Completion endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Completion stream reported an error: {0}")]
    Stream(String),

    #[error("Failed to decode completion stream: {0}")]
    Decode(String),
}

/// Remote text generation endpoint that answers incrementally
#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Start a completion for `prompt` and return its fragments as they arrive
    async fn stream_completion(&self, prompt: &str) -> Result<FragmentStream, CompletionError>;

    /// Model used for completions
    fn model(&self) -> &str;
}

/// Corrects transcript chunks through a completion service
pub struct Rewriter {
    service: Box<dyn CompletionService>,
    prompt_template: String,
}

impl Rewriter {
    pub fn new(service: Box<dyn CompletionService>, prompt_template: impl Into<String>) -> Self {
        Self {
            service,
            prompt_template: prompt_template.into(),
        }
    }

    pub fn model(&self) -> &str {
        self.service.model()
    }

    pub fn render_prompt(&self, chunk: &str) -> String {
        self.prompt_template.replace(TEXT_PLACEHOLDER, chunk)
    }

    /// Correct one chunk, returning `None` if the request fails at any point
    pub async fn rewrite(&self, chunk: &str) -> Option<String> {
        let prompt = self.render_prompt(chunk);

        match self.complete(&prompt).await {
            Ok(text) => Some(text.trim().to_string()),
            Err(e) => {
                tracing::warn!("Completion request to {} failed: {}", self.model(), e);
                None
            }
        }
    }

    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let mut fragments = self.service.stream_completion(prompt).await?;
        let mut text = String::new();

        while let Some(fragment) = fragments.next().await {
            text.push_str(&fragment?);
        }

        Ok(text)
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{Reply, ScriptedCompletion};
    use super::*;

    #[test]
    fn test_render_prompt() {
        let rewriter = Rewriter::new(Box::new(ScriptedCompletion::default()), "Fix: {text}!");
        assert_eq!(rewriter.render_prompt("hola mundo"), "Fix: hola mundo!");

        let rewriter = Rewriter::new(Box::new(ScriptedCompletion::default()), DEFAULT_PROMPT_TEMPLATE);
        let prompt = rewriter.render_prompt("some words");
        assert!(prompt.ends_with("Original text:\nsome words\n"));
    }

    #[test]
    fn test_fragments_are_accumulated_and_trimmed() {
        let service = ScriptedCompletion::new(vec![Reply::text(&["\n  Hello", ", wor", "ld.", "  \n"])]);
        let rewriter = Rewriter::new(Box::new(service.clone()), "{text}");

        let result = tokio_test::block_on(rewriter.rewrite("helo wrld"));

        assert_eq!(result.as_deref(), Some("Hello, world."));
        assert_eq!(service.prompts(), vec!["helo wrld".to_string()]);
    }

    #[test]
    fn test_request_failure_returns_none() {
        let service = ScriptedCompletion::new(vec![Reply::Fail(CompletionError::Status {
            status: 401,
            body: "invalid api key".to_string(),
        })]);
        let rewriter = Rewriter::new(Box::new(service), "{text}");

        assert_eq!(tokio_test::block_on(rewriter.rewrite("chunk")), None);
    }

    #[test]
    fn test_mid_stream_failure_discards_partial_text() {
        let service = ScriptedCompletion::new(vec![Reply::Fragments(vec![
            Ok("partial".to_string()),
            Err(CompletionError::Stream("rate limit exceeded".to_string())),
            Ok("never seen".to_string()),
        ])]);
        let rewriter = Rewriter::new(Box::new(service), "{text}");

        assert_eq!(tokio_test::block_on(rewriter.rewrite("chunk")), None);
    }
}
