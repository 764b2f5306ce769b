use std::collections::BTreeMap;

use regex::Regex;
use regex::RegexBuilder;
use serde::Deserialize;

use crate::Fragment;

/// One glossary definition, either a bare string or a definition with an
/// accompanying image.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum GlossaryEntry {
	Definition(String),
	Detailed {
		definition: String,
		#[serde(default)]
		image: Option<String>,
	},
}

impl GlossaryEntry {
	pub fn definition(&self) -> &str {
		match self {
			GlossaryEntry::Definition(d) => d,
			GlossaryEntry::Detailed { definition, .. } => definition,
		}
	}

	pub fn image(&self) -> Option<&str> {
		match self {
			GlossaryEntry::Definition(_) => None,
			GlossaryEntry::Detailed { image, .. } => image.as_deref(),
		}
	}
}

/// Term-to-definition mapping with case-insensitive lookup. Keys are stored
/// lowercased; the original term spelling is kept for matching.
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(from = "BTreeMap<String, GlossaryEntry>")]
pub struct Glossary {
	terms: BTreeMap<String, (String, GlossaryEntry)>,
}

impl From<BTreeMap<String, GlossaryEntry>> for Glossary {
	fn from(map: BTreeMap<String, GlossaryEntry>) -> Self {
		let terms = map
			.into_iter()
			.map(|(term, entry)| (term.to_lowercase(), (term, entry)))
			.collect();
		Glossary { terms }
	}
}

impl Glossary {
	pub fn is_empty(&self) -> bool {
		self.terms.is_empty()
	}

	pub fn len(&self) -> usize {
		self.terms.len()
	}

	pub fn lookup(&self, term: &str) -> Option<&GlossaryEntry> {
		self.terms
			.get(term)
			.or_else(|| self.terms.get(&term.to_lowercase()))
			.map(|(_, entry)| entry)
	}

	/// Terms in descending length order, so multi-word terms are matched
	/// before their substrings.
	fn terms_longest_first(&self) -> Vec<(&str, &str)> {
		let mut terms: Vec<(&str, &str)> = self
			.terms
			.iter()
			.map(|(key, (term, _))| (key.as_str(), term.as_str()))
			.collect();
		terms.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then(a.0.cmp(b.0)));
		terms
	}
}

/// Whether a term is wrapped at its first occurrence in a paragraph only,
/// or at every occurrence. First-occurrence is the historical behavior and
/// keeps prose with common terms readable.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnnotationPolicy {
	#[default]
	FirstOccurrence,
	EveryOccurrence,
}

struct TermMatcher {
	key: String,
	pattern: Regex,
}

/// Wraps glossary terms found in paragraph text into annotation fragments.
///
/// Matching is case-insensitive and word-boundary anchored. Claimed byte
/// ranges are tracked explicitly so that once a longer term owns a span, no
/// shorter term can re-match inside it and spans never overlap.
pub struct Annotator {
	policy: AnnotationPolicy,
	matchers: Vec<TermMatcher>,
}

impl Annotator {
	pub fn new(glossary: &Glossary, policy: AnnotationPolicy) -> Self {
		let matchers = glossary
			.terms_longest_first()
			.into_iter()
			.filter_map(|(key, term)| match word_matcher(term) {
				Ok(pattern) => Some(TermMatcher {
					key: key.to_string(),
					pattern,
				}),
				Err(e) => {
					log::warn!("Skipping unmatchable glossary term {term:?}: {e}");
					None
				}
			})
			.collect();
		Annotator { policy, matchers }
	}

	/// Annotate one paragraph. The result always covers the full input
	/// text; a paragraph without matches comes back as a single text
	/// fragment.
	pub fn annotate(&self, paragraph: &str) -> Vec<Fragment> {
		if paragraph.is_empty() {
			return Vec::new();
		}
		if self.matchers.is_empty() {
			return vec![Fragment::Text(paragraph.to_string())];
		}

		let mut claimed: Vec<(usize, usize, &str)> = Vec::new();
		for TermMatcher { key, pattern } in &self.matchers {
			for found in pattern.find_iter(paragraph) {
				let overlaps = claimed
					.iter()
					.any(|&(start, end, _)| found.start() < end && start < found.end());
				if overlaps {
					continue;
				}
				claimed.push((found.start(), found.end(), key));
				if self.policy == AnnotationPolicy::FirstOccurrence {
					break;
				}
			}
		}
		claimed.sort_by_key(|&(start, _, _)| start);

		let mut fragments = Vec::new();
		let mut cursor = 0usize;
		for (start, end, key) in claimed {
			if start > cursor {
				fragments.push(Fragment::Text(paragraph[cursor..start].to_string()));
			}
			fragments.push(Fragment::Term {
				key: key.to_string(),
				display: paragraph[start..end].to_string(),
			});
			cursor = end;
		}
		if cursor < paragraph.len() {
			fragments.push(Fragment::Text(paragraph[cursor..].to_string()));
		}
		fragments
	}
}

fn word_matcher(term: &str) -> Result<Regex, regex::Error> {
	RegexBuilder::new(&format!(r"\b{}\b", regex::escape(term)))
		.case_insensitive(true)
		.build()
}
