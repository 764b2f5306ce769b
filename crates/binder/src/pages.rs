use std::borrow::Cow;

use regex::Regex;

use crate::error::BinderError;

/// One displayable unit of a chapter, delimited in source by a
/// `[startPage=N]...[endPage=N]` marker pair. The number is author-assigned
/// and not necessarily contiguous; page order is source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
	pub number: u32,
	pub content: String,
}

const START_MARKER: &str = "[startPage=";

/// Split raw chapter text into pages. An optional strip pattern removes a
/// known boilerplate banner before any marker scanning happens.
///
/// Markers are matched left-to-right, non-overlapping and non-nested: a
/// start marker is only closed by an end marker carrying the same number.
/// A start marker without its own end does not open a page.
pub fn split_pages(raw: &str, strip: Option<&Regex>) -> Result<Vec<Page>, BinderError> {
	let text: Cow<'_, str> = match strip {
		Some(pattern) => pattern.replace(raw, ""),
		None => Cow::Borrowed(raw),
	};

	let mut pages: Vec<Page> = Vec::new();
	let mut cursor = 0usize;
	while let Some(found) = text[cursor..].find(START_MARKER) {
		let number_at = cursor + found + START_MARKER.len();
		let Some((number, body_start)) = read_marker_number(&text, number_at) else {
			cursor = number_at;
			continue;
		};
		let end_marker = format!("[endPage={number}]");
		let Some(end) = text[body_start..].find(end_marker.as_str()) else {
			cursor = number_at;
			continue;
		};
		if pages.iter().any(|p| p.number == number) {
			log::warn!("Duplicate page number {number} in chapter text");
		}
		pages.push(Page {
			number,
			content: text[body_start..body_start + end].trim().to_string(),
		});
		cursor = body_start + end + end_marker.len();
	}

	if pages.is_empty() {
		return Err(BinderError::NoPagesFound);
	}
	log::trace!("Split chapter into {} pages", pages.len());
	Ok(pages)
}

fn read_marker_number(text: &str, at: usize) -> Option<(u32, usize)> {
	let digits = text[at..]
		.bytes()
		.take_while(|b| b.is_ascii_digit())
		.count();
	if digits == 0 {
		return None;
	}
	let number = text[at..at + digits].parse().ok()?;
	text[at + digits..]
		.starts_with(']')
		.then_some((number, at + digits + 1))
}

#[cfg(test)]
mod tests {
	use regex::Regex;

	use crate::error::BinderError;
	use crate::pages::Page;
	use crate::pages::split_pages;

	#[test]
	fn test_split_pages_in_source_order() {
		let _ = env_logger::try_init();
		let text = "[startPage=1]Hello world.[endPage=1][startPage=5]Bye now.[endPage=5]";

		let pages = split_pages(text, None).unwrap();
		assert_eq!(
			pages,
			vec![
				Page {
					number: 1,
					content: "Hello world.".to_string(),
				},
				Page {
					number: 5,
					content: "Bye now.".to_string(),
				},
			]
		);
	}

	#[test]
	fn test_split_pages_trims_content() {
		let _ = env_logger::try_init();
		let text = "[startPage=2]\n\n  Some text here.  \n[endPage=2]";

		let pages = split_pages(text, None).unwrap();
		assert_eq!(pages[0].content, "Some text here.");
		assert_eq!(pages[0].number, 2);
	}

	#[test]
	fn test_mismatched_end_number_does_not_close() {
		let _ = env_logger::try_init();
		// The first start never finds its own end, the second pair is valid.
		let text = "[startPage=1]lost[endPage=2][startPage=3]found[endPage=3]";

		let pages = split_pages(text, None).unwrap();
		assert_eq!(pages.len(), 1);
		assert_eq!(pages[0].number, 3);
		assert_eq!(pages[0].content, "found");
	}

	#[test]
	fn test_no_markers_is_an_error() {
		let _ = env_logger::try_init();
		let result = split_pages("Just some prose without any markers.", None);
		assert!(matches!(result, Err(BinderError::NoPagesFound)));
	}

	#[test]
	fn test_strip_pattern_removes_banner() {
		let _ = env_logger::try_init();
		let strip = Regex::new(r"(?is)Small Steps:.*?by Peg Kehret\s*").unwrap();
		let text = "Small Steps: The Year I Got Polio\nby Peg Kehret\n[startPage=1]Body.[endPage=1]";

		let pages = split_pages(text, Some(&strip)).unwrap();
		assert_eq!(pages.len(), 1);
		assert_eq!(pages[0].content, "Body.");
	}

	#[test]
	fn test_duplicate_numbers_are_kept_in_order() {
		let _ = env_logger::try_init();
		let text = "[startPage=4]first[endPage=4][startPage=4]second[endPage=4]";

		let pages = split_pages(text, None).unwrap();
		assert_eq!(pages.len(), 2);
		assert_eq!(pages[0].content, "first");
		assert_eq!(pages[1].content, "second");
	}

	#[test]
	fn test_malformed_start_marker_is_skipped() {
		let _ = env_logger::try_init();
		let text = "[startPage=abc] nope [startPage=7]yes[endPage=7]";

		let pages = split_pages(text, None).unwrap();
		assert_eq!(pages.len(), 1);
		assert_eq!(pages[0].number, 7);
	}
}
