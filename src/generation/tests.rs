use super::*;
use crate::RagError;
use crate::embeddings::chunking::Chunk;
use std::sync::Mutex;

struct CannedCompletion {
    response: String,
    last_prompt: Mutex<Option<String>>,
}

impl CannedCompletion {
    fn new(response: &str) -> Self {
        Self {
            response: response.to_string(),
            last_prompt: Mutex::new(None),
        }
    }
}

impl CompletionProvider for CannedCompletion {
    fn complete(&self, prompt: &str) -> crate::Result<String> {
        *self.last_prompt.lock().expect("lock should not be poisoned") = Some(prompt.to_string());
        Ok(self.response.clone())
    }
}

struct FailingCompletion;

impl CompletionProvider for FailingCompletion {
    fn complete(&self, _prompt: &str) -> crate::Result<String> {
        Err(RagError::Generation("completion endpoint timed out".to_string()))
    }
}

fn result(text: &str, source_path: &str, score: f32) -> RetrievalResult {
    RetrievalResult {
        chunk: Chunk {
            text: text.to_string(),
            source_path: source_path.to_string(),
            start_offset: 0,
            chunk_index: 0,
        },
        relevance_score: score,
    }
}

#[test]
fn prompt_contains_context_and_question() {
    let results = vec![
        result("Alice likes apples.", "a.md", 0.9),
        result("Apples are fruit.", "b.md", 0.8),
    ];

    let prompt = build_prompt("who likes apples", &results);

    assert!(prompt.contains("Alice likes apples."));
    assert!(prompt.contains("Apples are fruit."));
    assert!(prompt.contains("who likes apples"));
    assert!(!prompt.contains("{context}"));
    assert!(!prompt.contains("{question}"));
}

#[test]
fn context_chunks_joined_with_delimiter() {
    let results = vec![
        result("first chunk", "a.md", 0.9),
        result("second chunk", "b.md", 0.8),
    ];

    let prompt = build_prompt("q", &results);

    assert!(prompt.contains(&format!("first chunk{}second chunk", CONTEXT_DELIMITER)));
}

#[test]
fn placeholders_in_chunks_stay_literal() {
    let results = vec![
        result(
            "Use the {question} and {context} markers in your template.",
            "templates.md",
            0.9,
        ),
        result("Plain second chunk.", "b.md", 0.8),
    ];

    let prompt = build_prompt("how do templates work", &results);

    // Chunk content passes through verbatim; only the template's own slots
    // are expanded.
    assert!(prompt.contains("Use the {question} and {context} markers in your template."));
    assert!(prompt.contains("how do templates work"));
    assert!(!prompt.contains("Use the how do templates work"));
}

#[test]
fn generate_returns_completion_and_sources() {
    let completion = Arc::new(CannedCompletion::new("Alice does."));
    let generator = AnswerGenerator::new(Arc::clone(&completion) as Arc<dyn CompletionProvider>);

    let results = vec![
        result("Alice likes apples.", "a.md", 0.9),
        result("More about Alice.", "a.md", 0.7),
        result("Bob likes oranges.", "b.md", 0.6),
    ];

    let answer = generator
        .generate("who likes apples", &results)
        .expect("generate should succeed");

    assert_eq!(answer.text, "Alice does.");
    // Sources mirror retrieval order and preserve duplicates.
    assert_eq!(answer.sources, vec!["a.md", "a.md", "b.md"]);

    let prompt = completion
        .last_prompt
        .lock()
        .expect("lock should not be poisoned")
        .clone()
        .expect("prompt should have been captured");
    assert!(prompt.contains("Alice likes apples."));
}

#[test]
fn generate_with_no_results_has_empty_context() {
    let completion = Arc::new(CannedCompletion::new("I don't know."));
    let generator = AnswerGenerator::new(completion);

    let answer = generator.generate("q", &[]).expect("generate should succeed");

    assert_eq!(answer.text, "I don't know.");
    assert!(answer.sources.is_empty());
}

#[test]
fn completion_failure_surfaces_as_generation_error() {
    let generator = AnswerGenerator::new(Arc::new(FailingCompletion));

    let results = vec![result("chunk", "a.md", 0.9)];
    let error = generator
        .generate("q", &results)
        .expect_err("generate should fail");

    assert!(matches!(error, RagError::Generation(_)));
}
