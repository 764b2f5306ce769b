pub mod error;
pub mod glossary;
pub mod images;
pub mod manifest;
pub mod pages;
pub mod paragraphs;
pub mod popup;

use quick_xml::escape::escape;
use regex::Regex;

use crate::error::BinderError;
use crate::error::RenderConfigError;
use crate::glossary::AnnotationPolicy;
use crate::glossary::Annotator;
use crate::glossary::Glossary;
use crate::images::DirectiveRule;
use crate::images::FIGURE_SENTINEL;
use crate::images::ImageFigure;
use crate::manifest::ChapterHeader;
use crate::manifest::Manifest;
use crate::pages::Page;
use crate::popup::SpanId;

/// One run of page content: plain text, an annotated glossary term, or an
/// inline figure.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment {
	Text(String),
	Term { key: String, display: String },
	Image(ImageFigure),
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedParagraph {
	pub fragments: Vec<Fragment>,
}

/// Render payload for one displayed page. Everything a presentation shell
/// needs, already escaped at the HTML boundary and nothing else.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedPage {
	/// Author-assigned marker number, for the `Page N` label.
	pub number: u32,
	pub first: bool,
	pub last: bool,
	pub paragraphs: Vec<RenderedParagraph>,
}

impl RenderedPage {
	pub fn page_label(&self) -> String {
		format!("Page {}", self.number)
	}

	/// Annotation spans in fragment order, keyed for glossary lookup.
	pub fn spans(&self) -> Vec<(SpanId, &str)> {
		self.paragraphs
			.iter()
			.flat_map(|p| p.fragments.iter())
			.filter_map(|f| match f {
				Fragment::Term { key, .. } => Some(key.as_str()),
				_ => None,
			})
			.enumerate()
			.map(|(index, key)| (SpanId(index as u32), key))
			.collect()
	}

	pub fn to_html(&self) -> String {
		let mut span = 0u32;
		let paragraphs: Vec<String> = self
			.paragraphs
			.iter()
			.map(|p| {
				let mut html = String::from("<p>");
				for fragment in &p.fragments {
					match fragment {
						Fragment::Text(text) => html.push_str(&escape(text.as_str())),
						Fragment::Term { key, display } => {
							html.push_str(&format!(
								"<span class=\"glossary-wrap glossary-term\" data-term=\"{}\" data-span=\"{span}\" role=\"button\" tabindex=\"0\">{}</span>",
								escape(key.as_str()),
								escape(display.as_str()),
							));
							span += 1;
						}
						Fragment::Image(figure) => {
							let style = figure.style_rules();
							html.push_str(&format!(
								"<img src=\"{}\" alt=\"\" class=\"chapter-illustration\"",
								escape(figure.src.as_str()),
							));
							if !style.is_empty() {
								html.push_str(&format!(" style=\"{}\"", escape(style.as_str())));
							}
							html.push('>');
						}
					}
				}
				html.push_str("</p>");
				html
			})
			.collect();
		paragraphs.join("\n\n")
	}
}

/// Per-book rendering configuration: which directive forms are recognized,
/// which boilerplate banner to strip, and the annotation policy. Books get
/// a record of their own quirks instead of branches keyed on identity.
#[derive(Debug, Clone)]
pub struct BookRenderConfig {
	pub directive_rules: Vec<DirectiveRule>,
	pub strip_pattern: Option<Regex>,
	pub annotation_policy: AnnotationPolicy,
}

impl BookRenderConfig {
	/// Standard configuration: the inline image directive against the given
	/// asset root, no banner stripping, first-occurrence annotation.
	pub fn new(asset_root: impl Into<String>) -> Self {
		BookRenderConfig {
			directive_rules: vec![DirectiveRule::Inline {
				asset_root: asset_root.into(),
			}],
			strip_pattern: None,
			annotation_policy: AnnotationPolicy::default(),
		}
	}

	pub fn with_legacy_images(mut self, asset_root: impl Into<String>) -> Self {
		self.directive_rules.push(DirectiveRule::LegacyBlock {
			asset_root: asset_root.into(),
		});
		self
	}

	pub fn with_strip_pattern(mut self, pattern: &str) -> Result<Self, RenderConfigError> {
		self.strip_pattern = Some(Regex::new(pattern)?);
		Ok(self)
	}

	pub fn with_annotation_policy(mut self, policy: AnnotationPolicy) -> Self {
		self.annotation_policy = policy;
		self
	}
}

/// All state for one loaded chapter. Each load owns its own glossary,
/// pages and position; nothing is shared across navigations.
pub struct ChapterSession {
	header: Option<ChapterHeader>,
	glossary: Glossary,
	annotator: Annotator,
	pages: Vec<Page>,
	current_page: usize,
	config: BookRenderConfig,
}

impl ChapterSession {
	/// Assemble a session from the three fetched artifacts. Requires all
	/// three to be present, so a partially loaded chapter can never render.
	pub fn create(
		chapter_file: &str,
		manifest: &Manifest,
		glossary: Glossary,
		chapter_text: &str,
		config: BookRenderConfig,
	) -> Result<Self, BinderError> {
		let pages = pages::split_pages(chapter_text, config.strip_pattern.as_ref())?;
		let header = manifest::resolve_header(manifest, chapter_file);
		if header.is_none() {
			log::warn!("No manifest entry for {chapter_file:?}, rendering without header");
		}
		let annotator = Annotator::new(&glossary, config.annotation_policy);
		log::info!(
			"Chapter {chapter_file:?} loaded: {} pages, {} glossary terms",
			pages.len(),
			glossary.len()
		);
		Ok(ChapterSession {
			header,
			glossary,
			annotator,
			pages,
			current_page: 0,
			config,
		})
	}

	/// Apply a stored reading position. Missing or out-of-range values
	/// reset to the first page.
	pub fn restore_position(&mut self, stored: Option<u32>) {
		self.current_page = match stored {
			Some(index) if (index as usize) < self.pages.len() => index as usize,
			Some(index) => {
				log::info!(
					"Stored page {index} out of range for {} pages, reset to start",
					self.pages.len()
				);
				0
			}
			None => 0,
		};
	}

	pub fn header(&self) -> Option<&ChapterHeader> {
		self.header.as_ref()
	}

	pub fn glossary(&self) -> &Glossary {
		&self.glossary
	}

	pub fn page_count(&self) -> usize {
		self.pages.len()
	}

	pub fn current_page(&self) -> usize {
		self.current_page
	}

	pub fn has_previous(&self) -> bool {
		self.current_page > 0
	}

	pub fn has_next(&self) -> bool {
		self.current_page + 1 < self.pages.len()
	}

	pub fn next_page(&mut self) -> bool {
		if self.has_next() {
			self.current_page += 1;
			true
		} else {
			false
		}
	}

	pub fn previous_page(&mut self) -> bool {
		if self.has_previous() {
			self.current_page -= 1;
			true
		} else {
			false
		}
	}

	pub fn goto_page(&mut self, index: usize) -> bool {
		if index < self.pages.len() {
			self.current_page = index;
			true
		} else {
			false
		}
	}

	/// Render the current page: image directives lifted out first, then
	/// paragraph formatting, then glossary annotation, then the figures
	/// spliced back in place.
	pub fn render_current(&self) -> RenderedPage {
		let page = &self.pages[self.current_page];
		let (text, figures) = images::expand_directives(&page.content, &self.config.directive_rules);
		let mut figures = figures.into_iter();
		let paragraphs = paragraphs::split_paragraphs(&text)
			.iter()
			.map(|paragraph| RenderedParagraph {
				fragments: splice_figures(self.annotator.annotate(paragraph), &mut figures),
			})
			.collect();
		RenderedPage {
			number: page.number,
			first: self.current_page == 0,
			last: self.current_page + 1 == self.pages.len(),
			paragraphs,
		}
	}
}

fn splice_figures(
	fragments: Vec<Fragment>,
	figures: &mut impl Iterator<Item = ImageFigure>,
) -> Vec<Fragment> {
	let mut spliced = Vec::with_capacity(fragments.len());
	for fragment in fragments {
		match fragment {
			Fragment::Text(text) if text.contains(FIGURE_SENTINEL) => {
				for (i, piece) in text.split(FIGURE_SENTINEL).enumerate() {
					if i > 0 {
						if let Some(figure) = figures.next() {
							spliced.push(Fragment::Image(figure));
						}
					}
					if !piece.is_empty() {
						spliced.push(Fragment::Text(piece.to_string()));
					}
				}
			}
			other => spliced.push(other),
		}
	}
	spliced
}

#[cfg(test)]
mod tests {
	use std::collections::BTreeMap;

	use crate::BookRenderConfig;
	use crate::ChapterSession;
	use crate::Fragment;
	use crate::glossary::Glossary;
	use crate::glossary::GlossaryEntry;
	use crate::manifest::Manifest;
	use crate::popup::SpanId;

	fn manifest() -> Manifest {
		serde_json::from_str(
			r#"{
				"title": "Test Book",
				"author": "T. Author",
				"chapters": [{ "file": "ch1.txt", "title": "Openings", "number": 1 }]
			}"#,
		)
		.unwrap()
	}

	fn glossary() -> Glossary {
		[(
			"current".to_string(),
			GlossaryEntry::Definition("a steady flow of water".to_string()),
		)]
		.into_iter()
		.collect::<BTreeMap<_, _>>()
		.into()
	}

	fn session(text: &str) -> ChapterSession {
		ChapterSession::create(
			"ch1.txt",
			&manifest(),
			glossary(),
			text,
			BookRenderConfig::new("books/test/assets"),
		)
		.unwrap()
	}

	const TWO_PAGES: &str = "[startPage=1]The current carried them.[endPage=1]\
		[startPage=2]Landfall at last.[endPage=2]";

	#[test]
	fn test_full_render_pipeline() {
		let _ = env_logger::try_init();
		let session = session(
			"[startPage=1]The current was strong.\n\n[image: canoe.jpg | 200px | left]\nThey paddled on.[endPage=1]",
		);

		let page = session.render_current();
		assert_eq!(page.number, 1);
		assert!(page.first);
		assert!(page.last);
		assert_eq!(page.paragraphs.len(), 3);
		assert!(matches!(
			&page.paragraphs[0].fragments[1],
			Fragment::Term { key, .. } if key == "current"
		));
		assert!(matches!(
			&page.paragraphs[1].fragments[0],
			Fragment::Image(figure) if figure.src == "books/test/assets/canoe.jpg"
		));
	}

	#[test]
	fn test_restore_position_clamps() {
		let _ = env_logger::try_init();
		let mut session = session(TWO_PAGES);

		session.restore_position(Some(1));
		assert_eq!(session.current_page(), 1);

		session.restore_position(Some(2));
		assert_eq!(session.current_page(), 0);

		session.restore_position(None);
		assert_eq!(session.current_page(), 0);
	}

	#[test]
	fn test_page_navigation_bounds() {
		let _ = env_logger::try_init();
		let mut session = session(TWO_PAGES);

		assert!(!session.has_previous());
		assert!(session.has_next());
		assert!(session.next_page());
		assert!(!session.has_next());
		assert!(!session.next_page());
		assert_eq!(session.current_page(), 1);
		assert!(session.previous_page());
		assert!(!session.previous_page());
		assert!(!session.goto_page(5));
		assert!(session.goto_page(1));
	}

	#[test]
	fn test_header_resolution() {
		let _ = env_logger::try_init();
		let session = session(TWO_PAGES);
		let header = session.header().unwrap();
		assert_eq!(header.heading(), "Chapter 1: Openings");
		assert_eq!(header.book_title, "Test Book");
		assert_eq!(header.author.as_deref(), Some("T. Author"));
	}

	#[test]
	fn test_html_output_is_escaped() {
		let _ = env_logger::try_init();
		let session = session("[startPage=1]Tides & currents are < stronger > here.[endPage=1]");

		let html = session.render_current().to_html();
		assert!(html.contains("Tides &amp;"));
		assert!(html.contains("&lt; stronger &gt;"));
		assert!(html.starts_with("<p>"));
	}

	#[test]
	fn test_html_wraps_terms_with_metadata() {
		let _ = env_logger::try_init();
		let session = session("[startPage=1]Against the Current.[endPage=1]");

		let page = session.render_current();
		let html = page.to_html();
		assert!(html.contains("data-term=\"current\""));
		assert!(html.contains(">Current</span>"));
		assert_eq!(page.spans(), vec![(SpanId(0), "current")]);
		assert_eq!(page.page_label(), "Page 1");
	}

	#[test]
	fn test_second_page_is_not_first() {
		let _ = env_logger::try_init();
		let mut session = session(TWO_PAGES);
		session.next_page();

		let page = session.render_current();
		assert!(!page.first);
		assert!(page.last);
		assert_eq!(page.number, 2);
	}
}
