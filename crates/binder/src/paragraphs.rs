use std::sync::LazyLock;

use regex::Regex;

static SPACE_BEFORE_PUNCTUATION: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"\s+([,.!?;:])").expect("static pattern"));
static WHITESPACE_RUN: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"\s+").expect("static pattern"));

/// Split one page body into normalized paragraph strings.
///
/// A paragraph ends at two or more consecutive line breaks, or at a single
/// line break followed by optional whitespace and an uppercase letter or an
/// opening quotation mark. The second rule recovers paragraphs from source
/// text that was hard-wrapped by hand.
pub fn split_paragraphs(raw: &str) -> Vec<String> {
	let text = raw.replace('\r', "");

	let mut parts: Vec<&str> = Vec::new();
	let mut start = 0usize;
	let mut search = 0usize;
	while let Some(found) = text[search..].find('\n') {
		let at = search + found;
		let mut run_end = at + 1;
		while text[run_end..].starts_with('\n') {
			run_end += 1;
		}
		let break_here = if run_end - at >= 2 {
			true
		} else {
			text[run_end..]
				.trim_start()
				.chars()
				.next()
				.is_some_and(starts_paragraph)
		};
		if break_here {
			parts.push(&text[start..at]);
			start = run_end;
		}
		search = run_end;
	}
	parts.push(&text[start..]);

	parts
		.into_iter()
		.map(normalize)
		.filter(|p| !p.is_empty())
		.collect()
}

fn starts_paragraph(c: char) -> bool {
	c.is_ascii_uppercase() || matches!(c, '"' | '\u{201C}' | '\u{201D}' | '\'')
}

/// Collapse interior whitespace runs to single spaces and drop whitespace
/// that precedes punctuation, then trim.
fn normalize(part: &str) -> String {
	let tightened = SPACE_BEFORE_PUNCTUATION.replace_all(part, "$1");
	let collapsed = WHITESPACE_RUN.replace_all(&tightened, " ");
	collapsed.trim().to_string()
}
