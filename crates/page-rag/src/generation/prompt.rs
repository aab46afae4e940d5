//! Prompt texts for page summaries and grounded answers

/// System prompt for describing one page image for the summary index
pub const SUMMARY_PROMPT: &str = r#"Analyze the image and produce a text description that is as useful as possible for a retrieval-augmented generation (RAG) system. Write it as connected prose that covers:

1. All text visible in the image, keeping its structure and context (headings, paragraphs, notes, captions).
2. Graphical content (charts, tables, pictures) as a short description: the key data, trends or characteristics a reader can take from them.
3. The context of the image: if it looks like part of a document (a report, an article, technical documentation), state what the content is about overall.
4. Anything else useful for search, such as key terms, dates, names or titles.

Do not quote specific figures or metrics. Answer only the question "what does this image show?", briefly and clearly. Follow the example output strictly.

Example output:
"The image shows a document page titled 'Sales Report 2024'. The text describes quarterly results with the emphasis on revenue growth in Q2. A line chart shows monthly sales with a visible jump in April. A table breaks results down by region, highlighting North America, Europe and Asia. A note at the bottom outlines plans for the next quarter.""#;

/// User text sent alongside the page image
pub const SUMMARY_REQUEST: &str = "summary";

/// System prompt for answering over retrieved page images
pub const SYSTEM_PROMPT: &str = r#"You are an assistant that answers questions about the user's documents.

The pages most relevant to the latest question are attached to it as images. Base your answer on what those pages show. If the pages do not contain the answer, say that the documents do not cover it instead of guessing.

Refer to the page a fact comes from when that helps the user find it. Keep answers concise and answer in the language of the question."#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompts_are_non_empty() {
        assert!(SUMMARY_PROMPT.contains("retrieval-augmented generation"));
        assert!(!SUMMARY_REQUEST.is_empty());
        assert!(SYSTEM_PROMPT.contains("attached"));
    }
}
