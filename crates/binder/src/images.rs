use std::sync::LazyLock;

use regex::Regex;
use regex::RegexBuilder;

/// Placeholder written into page text where a directive was lifted out.
/// Text processing never breaks on it, so figures survive paragraph
/// formatting and glossary annotation untouched.
pub(crate) const FIGURE_SENTINEL: char = '\u{FFFC}';

static INLINE_DIRECTIVE: LazyLock<Regex> = LazyLock::new(|| {
	RegexBuilder::new(
		r"\[image:\s*([^|\]\s]+)(?:\s*\|\s*([^|\]\s]+))?(?:\s*\|\s*(left|right|center))?\s*\]",
	)
	.case_insensitive(true)
	.build()
	.expect("static pattern")
});
static LEGACY_DIRECTIVE: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"\[IMG:([^\]]+)\]").expect("static pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Alignment {
	Left,
	Right,
	Center,
}

impl Alignment {
	fn parse(raw: &str) -> Option<Self> {
		match raw.to_ascii_lowercase().as_str() {
			"left" => Some(Alignment::Left),
			"right" => Some(Alignment::Right),
			"center" => Some(Alignment::Center),
			_ => None,
		}
	}
}

/// Render descriptor for one inline image: resolved source path plus the
/// optional width and alignment the directive carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFigure {
	pub src: String,
	pub width: Option<String>,
	pub alignment: Option<Alignment>,
}

impl ImageFigure {
	/// Inline style declarations for the figure. Alignment maps through a
	/// fixed lookup table; an omitted alignment adds no positioning rule.
	pub fn style_rules(&self) -> String {
		let mut style = String::new();
		if let Some(width) = &self.width {
			style.push_str("width:");
			style.push_str(width);
			style.push(';');
		}
		match self.alignment {
			Some(Alignment::Center) => style.push_str("display:block;margin:1.5rem auto;"),
			Some(Alignment::Left) => style.push_str("float:left;margin:0 1rem 1rem 0;"),
			Some(Alignment::Right) => style.push_str("float:right;margin:0 0 1rem 1rem;"),
			None => {}
		}
		style
	}
}

/// One recognized image directive form. Books carry their own rule set, so
/// the legacy form stays confined to the content set that needs it instead
/// of leaking into every new book.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectiveRule {
	/// `[image: file | width? | align?]`, resolved against the book asset
	/// root.
	Inline { asset_root: String },
	/// Legacy `[IMG:file]`: fixed centered block against an absolute asset
	/// root. Kept for backward compatibility with one existing content set.
	LegacyBlock { asset_root: String },
}

impl DirectiveRule {
	fn collect(&self, content: &str, found: &mut Vec<(usize, usize, ImageFigure)>) {
		match self {
			DirectiveRule::Inline { asset_root } => {
				for captures in INLINE_DIRECTIVE.captures_iter(content) {
					let all = captures.get(0).expect("whole match");
					let file = &captures[1];
					found.push((
						all.start(),
						all.end(),
						ImageFigure {
							src: format!("{asset_root}/{file}"),
							width: captures.get(2).map(|w| w.as_str().to_string()),
							alignment: captures.get(3).and_then(|a| Alignment::parse(a.as_str())),
						},
					));
				}
			}
			DirectiveRule::LegacyBlock { asset_root } => {
				for captures in LEGACY_DIRECTIVE.captures_iter(content) {
					let all = captures.get(0).expect("whole match");
					let file = &captures[1];
					found.push((
						all.start(),
						all.end(),
						ImageFigure {
							src: format!("{asset_root}/{file}"),
							width: None,
							alignment: Some(Alignment::Center),
						},
					));
				}
			}
		}
	}
}

/// Replace every directive a rule recognizes with a figure sentinel and
/// return the lifted descriptors in text order.
pub fn expand_directives(content: &str, rules: &[DirectiveRule]) -> (String, Vec<ImageFigure>) {
	let mut found: Vec<(usize, usize, ImageFigure)> = Vec::new();
	for rule in rules {
		rule.collect(content, &mut found);
	}
	found.sort_by_key(|&(start, _, _)| start);

	let mut text = String::with_capacity(content.len());
	let mut figures = Vec::with_capacity(found.len());
	let mut cursor = 0usize;
	for (start, end, figure) in found {
		if start < cursor {
			// Overlapping match from a later rule loses.
			continue;
		}
		text.push_str(&content[cursor..start]);
		text.push(FIGURE_SENTINEL);
		figures.push(figure);
		cursor = end;
	}
	text.push_str(&content[cursor..]);
	(text, figures)
}
