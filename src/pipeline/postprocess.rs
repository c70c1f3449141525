//! Post-processing: deterministic cleanup of recognised handwriting text.
//!
//! Even with a strict prompt the service sometimes returns the transcription
//! inside a code fence, with Windows line endings, or with spaces the model
//! inserted between handwritten Japanese characters. These rules fix such
//! quirks without touching the words themselves.
//!
//! ## Rule Order
//!
//! Line endings are normalised before fence stripping so the fence pattern
//! only has to match `\n`. Per-line rules run after invisible characters are
//! gone, so a zero-width space cannot hide a gap between two kanji.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all post-processing rules to one page of recognised text.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF → LF)
/// 2. Strip outer code fences
/// 3. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 4. Per line: trim, drop a leading `回答：` label, collapse whitespace,
///    tighten Japanese punctuation, join split Japanese runs
/// 5. Collapse 3+ consecutive blank lines
/// 6. Trim leading and trailing blank lines
///
/// The result may be empty; callers treat that as a failed recognition.
pub fn clean_transcript(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = strip_code_fences(&s);
    let s = remove_invisible_chars(&s);
    let s = s.lines().map(clean_line).collect::<Vec<_>>().join("\n");
    let s = collapse_blank_lines(&s);
    s.trim_matches('\n').to_string()
}

// ── Rule 1: Normalise line endings ───────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 2: Strip outer code fences ──────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```[A-Za-z]*\n(.*?)\n?```$").unwrap());

fn strip_code_fences(input: &str) -> String {
    let trimmed = input.trim();
    match RE_OUTER_FENCES.captures(trimmed) {
        Some(caps) => caps[1].to_string(),
        None => input.to_string(),
    }
}

// ── Rule 3: Remove invisible Unicode characters ──────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule 4: Per-line cleanup ─────────────────────────────────────────────────

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

static RE_JA_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*([。、！？：；])\s*").unwrap());

fn clean_line(line: &str) -> String {
    let line = line.trim();
    let line = strip_answer_label(line);
    let line = RE_WHITESPACE.replace_all(line, " ");
    let line = RE_JA_PUNCT.replace_all(&line, "$1");
    join_japanese_runs(&line)
}

/// The model sometimes echoes the `回答：` label from the prompt.
fn strip_answer_label(line: &str) -> &str {
    line.strip_prefix("回答：")
        .or_else(|| line.strip_prefix("回答:"))
        .map(str::trim_start)
        .unwrap_or(line)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Script {
    Hiragana,
    Katakana,
    Han,
}

fn script_of(c: char) -> Option<Script> {
    match c {
        '\u{3041}'..='\u{309F}' => Some(Script::Hiragana),
        '\u{30A0}'..='\u{30FF}' => Some(Script::Katakana),
        '\u{3400}'..='\u{4DBF}' | '\u{4E00}'..='\u{9FFF}' => Some(Script::Han),
        _ => None,
    }
}

/// Drop whitespace between two characters of the same Japanese script.
fn join_japanese_runs(line: &str) -> String {
    let chars: Vec<char> = line.chars().collect();
    let mut out = String::with_capacity(line.len());
    let mut prev: Option<char> = None;
    let mut i = 0;

    while i < chars.len() {
        if chars[i].is_whitespace() {
            let start = i;
            while i < chars.len() && chars[i].is_whitespace() {
                i += 1;
            }
            let joined = match (prev.and_then(script_of), chars.get(i).and_then(|&c| script_of(c))) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            };
            if !joined {
                out.extend(&chars[start..i]);
            }
            continue;
        }
        out.push(chars[i]);
        prev = Some(chars[i]);
        i += 1;
    }
    out
}

// ── Rule 5: Collapse excessive blank lines ───────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{4,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n\n").to_string()
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_fences() {
        assert_eq!(strip_code_fences("```\nQ1: はい\n```"), "Q1: はい");
        assert_eq!(strip_code_fences("```text\nQ1: はい\n```"), "Q1: はい");
    }

    #[test]
    fn test_no_fences_passthrough() {
        assert_eq!(strip_code_fences("Q1: はい"), "Q1: はい");
    }

    #[test]
    fn test_normalise_line_endings() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_remove_invisible() {
        let input = "hello\u{200B}world\u{FEFF}foo\u{00AD}bar";
        assert_eq!(remove_invisible_chars(input), "helloworldfoobar");
    }

    #[test]
    fn test_answer_label_dropped() {
        assert_eq!(clean_line("回答：とても良い"), "とても良い");
        assert_eq!(clean_line("  回答:  満足"), "満足");
        assert_eq!(clean_line("Q1: 回答：はい"), "Q1: 回答：はい");
    }

    #[test]
    fn test_punctuation_spacing() {
        assert_eq!(clean_line("良かった 。 また 、 来たい"), "良かった。また、来たい");
    }

    #[test]
    fn test_japanese_runs_joined() {
        assert_eq!(clean_line("あ い う"), "あいう");
        assert_eq!(clean_line("カ タ カ ナ"), "カタカナ");
        assert_eq!(clean_line("満 足 度"), "満足度");
        assert_eq!(clean_line("ひらがな カタカナ"), "ひらがな カタカナ");
        assert_eq!(clean_line("Q1: very good"), "Q1: very good");
    }

    #[test]
    fn test_ideographic_space_collapsed() {
        assert_eq!(clean_line("good\u{3000}\u{3000}day"), "good day");
    }

    #[test]
    fn test_collapse_blank_lines() {
        assert_eq!(collapse_blank_lines("a\n\n\n\n\n\nb"), "a\n\n\nb");
    }

    #[test]
    fn test_clean_transcript_full_pipeline() {
        let input = "```\r\nQ1: ご意見\r\n回答：と て も\u{200B}良い\r\n\r\n\r\n\r\n\r\nQ2: 年齢\r\n```";
        assert_eq!(clean_transcript(input), "Q1: ご意見\nとても良い\n\n\nQ2: 年齢");
    }

    #[test]
    fn test_blank_input_is_empty() {
        assert_eq!(clean_transcript(" \n\t\n"), "");
    }
}
