// Prompt template
// Fixed grounding instructions wrapped around retrieved passages

use super::NO_INFORMATION_ANSWER;

/// Separator between passages in the context block
pub const PASSAGE_SEPARATOR: &str = "\n\n";

/// Join retrieved passages into a single context block
#[inline]
pub fn build_context(passages: &[String]) -> String {
    passages.join(PASSAGE_SEPARATOR)
}

/// Render the grounded question-answering prompt
#[inline]
pub fn build_prompt(context: &str, question: &str) -> String {
    format!(
        "### Football Knowledge Assistant

You are a football expert. Answer the following question ONLY using the provided articles.
- If the answer is not found in the articles, respond with: \"{NO_INFORMATION_ANSWER}\"
- Keep your response concise and factual.
- If multiple players or teams are mentioned, compare them briefly.

#### Articles:
{context}

#### Question: {question}

Answer:
"
    )
}
