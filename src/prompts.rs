//! Prompts used by the vision OCR backend.
//!
//! Callers can override the default via [`crate::config::VisionConfig::system_prompt`];
//! the constant here is used only when no override is provided.

/// Default system prompt for transcribing a page image to plain text.
pub const DEFAULT_OCR_PROMPT: &str = r#"You are an OCR engine. Transcribe every piece of text visible in the page image.

Follow these rules precisely:

1. Output the text exactly as printed. Do not translate, summarise, or correct it.
2. Keep the reading order a human would use. Separate paragraphs with a blank line.
3. Keep line breaks inside addresses, tables, and lists.
4. Render tables as rows of cells separated by two spaces.
5. Ignore decorative elements, logos without text, and background patterns.
6. Output ONLY the transcribed text. No commentary, no code fences, no markdown.
7. If the page contains no text at all, output nothing."#;

/// User turn sent alongside the page image.
pub const OCR_USER_MESSAGE: &str = "Transcribe the text on this page.";
