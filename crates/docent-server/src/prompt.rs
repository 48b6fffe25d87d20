//! Prompt assembly for the generation pipeline.
//!
//! Combines the assistant persona, the most recent conversation turns, and
//! the retrieved document context into a single prompt string for the
//! language-model backend.

use docent_retrieval::RetrievedChunk;

/// One finished query/answer pair kept as in-memory conversation context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub query: String,
    pub answer: String,
}

const PERSONA: &str = "You are Docent, an assistant that answers questions \
about an indexed document collection. Ground every answer in the provided \
context, keep answers concise, and say so plainly when the context does not \
cover the question.";

/// Build the backend prompt for one query.
pub fn build_prompt(recent: &[Turn], context: &[RetrievedChunk], query: &str) -> String {
    let mut prompt = String::from(PERSONA);
    prompt.push_str("\n\n");

    if !recent.is_empty() {
        prompt.push_str("Previous conversation:\n");
        for turn in recent {
            prompt.push_str("User: ");
            prompt.push_str(&turn.query);
            prompt.push_str("\nAssistant: ");
            prompt.push_str(&turn.answer);
            prompt.push_str("\n\n");
        }
    }

    prompt.push_str("Relevant context:\n");
    if context.is_empty() {
        prompt.push_str("No relevant context found.\n");
    } else {
        for chunk in context {
            prompt.push_str(&chunk.text);
            prompt.push_str("\n\n");
        }
    }

    prompt.push_str("\nCurrent user query: ");
    prompt.push_str(query);
    prompt.push_str("\n\nAnswer:");
    prompt
}
