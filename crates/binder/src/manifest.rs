use std::sync::LazyLock;

use quick_xml::escape::escape;
use regex::Regex;
use serde::Deserialize;

static PART_SUFFIX: LazyLock<Regex> =
	LazyLock::new(|| Regex::new(r"(?i)\(Part\s*\d+\)").expect("static pattern"));

/// Manifest metadata for one chapter. Only `file` is required; every other
/// field renders with a per-field fallback when absent.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChapterManifestEntry {
	pub file: String,
	#[serde(default, alias = "chapterTitle")]
	pub title: Option<String>,
	#[serde(default)]
	pub number: Option<u32>,
	#[serde(default)]
	pub display_number: Option<u32>,
	#[serde(default)]
	pub series: Option<String>,
	#[serde(default)]
	pub book_title: Option<String>,
	#[serde(default)]
	pub author: Option<String>,
}

impl ChapterManifestEntry {
	fn display_number(&self) -> Option<u32> {
		self.display_number.or(self.number)
	}

	/// Contents listing label: `Chapter N: Title` when a number is known,
	/// the bare title otherwise.
	pub fn label(&self) -> String {
		let title = self.title.as_deref().unwrap_or(&self.file);
		match self.display_number() {
			Some(number) => format!("Chapter {number}: {title}"),
			None => title.to_string(),
		}
	}
}

/// A book's chapter manifest. Two shapes exist in the wild and both are
/// accepted: a bare ordered entry array, and an object wrapping the array
/// with optional book title and author.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Manifest {
	Chapters(Vec<ChapterManifestEntry>),
	Titled {
		#[serde(default)]
		title: Option<String>,
		#[serde(default)]
		author: Option<String>,
		chapters: Vec<ChapterManifestEntry>,
	},
}

impl Default for Manifest {
	fn default() -> Self {
		Manifest::Chapters(Vec::new())
	}
}

impl Manifest {
	pub fn chapters(&self) -> &[ChapterManifestEntry] {
		match self {
			Manifest::Chapters(chapters) => chapters,
			Manifest::Titled { chapters, .. } => chapters,
		}
	}

	pub fn title(&self) -> Option<&str> {
		match self {
			Manifest::Chapters(_) => None,
			Manifest::Titled { title, .. } => title.as_deref(),
		}
	}

	pub fn author(&self) -> Option<&str> {
		match self {
			Manifest::Chapters(_) => None,
			Manifest::Titled { author, .. } => author.as_deref(),
		}
	}

	pub fn entry(&self, file: &str) -> Option<&ChapterManifestEntry> {
		self.chapters().iter().find(|ch| ch.file == file)
	}
}

/// Resolved header metadata for the chapter being displayed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterHeader {
	pub number: u32,
	pub title: String,
	pub book_title: String,
	pub series: Option<String>,
	pub author: Option<String>,
}

impl ChapterHeader {
	pub fn heading(&self) -> String {
		format!("Chapter {}: {}", self.number, self.title)
	}

	/// Window/document title line.
	pub fn document_title(&self) -> String {
		format!("{} — Chapter {}", self.book_title, self.number)
	}

	/// Header block markup. Series and author lines are omitted entirely
	/// when the manifest carries no value for them.
	pub fn to_html(&self) -> String {
		let mut html = String::from("<div class=\"chapter-header\">");
		if let Some(series) = &self.series {
			html.push_str(&format!(
				"<p class=\"book-series\">{}</p>",
				escape(series.as_str())
			));
		}
		html.push_str(&format!(
			"<h1 class=\"book-main-title\">{}</h1>",
			escape(self.book_title.as_str())
		));
		html.push_str(&format!(
			"<h2 class=\"chapter-subtitle\">{}</h2>",
			escape(self.heading().as_str())
		));
		if let Some(author) = &self.author {
			html.push_str(&format!(
				"<p class=\"chapter-author\">by {}</p>",
				escape(author.as_str())
			));
		}
		html.push_str("</div>\n<hr class=\"title-divider\">");
		html
	}
}

/// Compute the displayed header for `file`, or `None` when the manifest has
/// no entry for it.
///
/// A multi-part chapter keeps the base chapter's number: when the title
/// carries a `(Part N)` suffix and the immediately preceding entry has the
/// same title once both suffixes are stripped, the preceding entry's display
/// number wins.
pub fn resolve_header(manifest: &Manifest, file: &str) -> Option<ChapterHeader> {
	let chapters = manifest.chapters();
	let index = chapters.iter().position(|ch| ch.file == file)?;
	let entry = &chapters[index];

	let title = entry.title.clone().unwrap_or_else(|| "Untitled".to_string());
	let mut number = entry.display_number().unwrap_or(1);
	if PART_SUFFIX.is_match(&title) && index > 0 {
		let previous = &chapters[index - 1];
		let base = base_title(&title);
		let previous_base = previous.title.as_deref().map(base_title);
		if !base.is_empty() && previous_base == Some(base) {
			number = previous.display_number().unwrap_or(number);
		}
	}

	Some(ChapterHeader {
		number,
		title,
		book_title: manifest
			.title()
			.map(str::to_string)
			.or_else(|| entry.book_title.clone())
			.unwrap_or_else(|| "Untitled".to_string()),
		series: entry.series.clone(),
		author: manifest
			.author()
			.map(str::to_string)
			.or_else(|| entry.author.clone()),
	})
}

fn base_title(title: &str) -> &str {
	title.split("(Part").next().unwrap_or(title).trim()
}
