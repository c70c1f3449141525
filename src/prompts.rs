//! Instruction prompts sent to the recognition service with every page.
//!
//! Callers can override the default via
//! [`crate::config::TranscriptionConfig::prompt`]; the constants here are used
//! only when no override is provided.

/// Default instruction for transcribing one handwritten questionnaire page.
pub const DEFAULT_PROMPT: &str = r#"You are an expert at reading handwritten Japanese and English. Transcribe the handwritten text in this scanned questionnaire page faithfully.

1. FIDELITY
   - Write every character exactly as it appears, including misspellings
   - Do not guess, correct, summarise or translate
   - Mark characters you cannot read with ？
   - Watch for similar shapes: る/ろ, は/ば/ぱ, き/さ, ソ/ン, シ/ツ, and dakuten

2. LAYOUT
   - Preserve line breaks as written
   - Keep the order a human would read the page in
   - Write each printed question as "Q<number>: <question text>"
   - Put the handwritten answer on the lines directly below its question
   - Write （無回答） for a question left blank

3. OUTPUT FORMAT
   - Output ONLY the transcription
   - Do NOT wrap it in code fences
   - Do NOT add commentary, headings or page numbers"#;

/// Page-specific suffix appended after the base instruction.
///
/// Naming the page keeps the model from merging content it remembers from a
/// neighbouring image when a provider batches requests internally.
pub fn page_instruction(base: &str, page_num: usize) -> String {
    format!("{base}\n\nThis image is page {page_num}. Transcribe this page only.")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_prompt_asks_for_line_breaks() {
        assert!(DEFAULT_PROMPT.contains("Preserve line breaks"));
        assert!(DEFAULT_PROMPT.contains("faithfully"));
    }

    #[test]
    fn page_instruction_names_page() {
        let p = page_instruction("base", 3);
        assert!(p.starts_with("base"));
        assert!(p.contains("page 3"));
    }
}
