// Answer generation module
// Prompt assembly from retrieved context and the remote completion call

#[cfg(test)]
mod tests;

use itertools::Itertools;
use std::sync::Arc;
use tracing::debug;

use crate::Result;
use crate::index::RetrievalResult;

/// Sentinel placed between retrieved chunks in the assembled context. Chosen
/// so it cannot collide with content inside a single markdown chunk.
pub const CONTEXT_DELIMITER: &str = "\n\n---\n\n";

const PROMPT_TEMPLATE: &str = "\
You are a helpful assistant. Use the following context to answer the user's question.

Context:
{context}

Question:
{question}
";

/// Single request/response completion capability, e.g. a remote LLM endpoint.
pub trait CompletionProvider: Send + Sync {
    fn complete(&self, prompt: &str) -> Result<String>;
}

/// Answer returned to the caller: the completion text plus the ordered list
/// of source paths of the chunks that were used as context. A document cited
/// by multiple chunks appears multiple times.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<String>,
}

/// Builds a prompt from retrieved context and invokes the completion
/// capability.
pub struct AnswerGenerator {
    completion: Arc<dyn CompletionProvider>,
}

impl AnswerGenerator {
    #[inline]
    pub fn new(completion: Arc<dyn CompletionProvider>) -> Self {
        Self { completion }
    }

    /// Generate an answer for `question` using `results` as context, in the
    /// order provided. Completion failures surface as `RagError::Generation`; no
    /// automatic retry beyond what the provider itself does.
    #[inline]
    pub fn generate(&self, question: &str, results: &[RetrievalResult]) -> Result<Answer> {
        let prompt = build_prompt(question, results);
        debug!(
            "Assembled prompt from {} chunks ({} characters)",
            results.len(),
            prompt.len()
        );

        let text = self.completion.complete(&prompt)?;

        let sources = results
            .iter()
            .map(|result| result.chunk.source_path.clone())
            .collect();

        Ok(Answer { text, sources })
    }
}

/// Render the fixed two-slot prompt template with the concatenated context
/// and the question. Placeholders are expanded on the template text only, so
/// a retrieved chunk containing a literal `{question}` or `{context}` is
/// passed through unchanged.
pub(crate) fn build_prompt(question: &str, results: &[RetrievalResult]) -> String {
    let context = results
        .iter()
        .map(|result| result.chunk.text.as_str())
        .join(CONTEXT_DELIMITER);

    PROMPT_TEMPLATE
        .split("{context}")
        .map(|fragment| fragment.replace("{question}", question))
        .join(&context)
}
