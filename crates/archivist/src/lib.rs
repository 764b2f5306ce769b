pub mod record_keeper;
pub mod settings;

use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;

use binder::BookRenderConfig;
use binder::glossary::Glossary;
use binder::manifest::Manifest;

use crate::settings::BookConfig;
use crate::settings::BookConfigError;

#[derive(Debug, thiserror::Error)]
pub enum ArchivistError {
	#[error("chapter {chapter:?} not found in book {book:?}")]
	ChapterNotFound { book: String, chapter: String },
	#[error("invalid manifest for book {0:?}: {1}")]
	Manifest(String, serde_json::Error),
	#[error("invalid glossary for book {0:?}: {1}")]
	Glossary(String, serde_json::Error),
	#[error(transparent)]
	BookConfig(#[from] BookConfigError),
	#[error("at {1}: {0}")]
	Io(io::Error, &'static std::panic::Location<'static>),
}

impl From<io::Error> for ArchivistError {
	#[track_caller]
	fn from(err: io::Error) -> Self {
		Self::Io(err, std::panic::Location::caller())
	}
}

/// Everything a chapter load needs, fetched as one atomic group. Rendering
/// never starts from a partially available bundle.
#[derive(Debug)]
pub struct ChapterSource {
	pub manifest: Manifest,
	pub glossary: Glossary,
	pub text: String,
	pub render_config: BookRenderConfig,
}

/// Filesystem content store. A book lives under
/// `<library>/<book>/` with `chapters/manifest.json`, `glossary.json`,
/// `chapters/<file>` and an optional `book.toml`.
pub struct Archivist {
	library_path: PathBuf,
}

impl Archivist {
	pub fn new(library_path: impl Into<PathBuf>) -> Self {
		Archivist {
			library_path: library_path.into(),
		}
	}

	fn book_dir(&self, book: &str) -> PathBuf {
		self.library_path.join(book)
	}

	/// Fetch a chapter's full source bundle. Missing manifest or glossary
	/// files degrade to empty values; a missing chapter text or any read or
	/// parse failure fails the whole load.
	pub fn fetch_chapter(
		&self,
		book: &str,
		chapter_file: &str,
	) -> Result<ChapterSource, ArchivistError> {
		let manifest = self.fetch_manifest(book)?;
		let glossary = self.fetch_glossary(book)?;
		let text = self.fetch_chapter_text(book, chapter_file)?;
		let render_config = BookConfig::load(&self.book_dir(book))?.into_render_config(book)?;
		Ok(ChapterSource {
			manifest,
			glossary,
			text,
			render_config,
		})
	}

	pub fn fetch_manifest(&self, book: &str) -> Result<Manifest, ArchivistError> {
		let path = self.book_dir(book).join("chapters").join("manifest.json");
		match fs::read_to_string(&path) {
			Ok(raw) => serde_json::from_str(&raw)
				.map_err(|e| ArchivistError::Manifest(book.to_string(), e)),
			Err(e) if e.kind() == io::ErrorKind::NotFound => {
				log::warn!("No manifest for book {book:?}, proceeding without chapter metadata");
				Ok(Manifest::default())
			}
			Err(e) => Err(e.into()),
		}
	}

	pub fn fetch_glossary(&self, book: &str) -> Result<Glossary, ArchivistError> {
		let path = self.book_dir(book).join("glossary.json");
		match fs::read_to_string(&path) {
			Ok(raw) => serde_json::from_str(&raw)
				.map_err(|e| ArchivistError::Glossary(book.to_string(), e)),
			Err(e) if e.kind() == io::ErrorKind::NotFound => {
				log::warn!("No glossary for book {book:?}, proceeding without annotations");
				Ok(Glossary::default())
			}
			Err(e) => Err(e.into()),
		}
	}

	pub fn fetch_chapter_text(
		&self,
		book: &str,
		chapter_file: &str,
	) -> Result<String, ArchivistError> {
		let path = self.book_dir(book).join("chapters").join(chapter_file);
		match fs::read_to_string(&path) {
			Ok(text) => Ok(text),
			Err(e) if e.kind() == io::ErrorKind::NotFound => {
				Err(ArchivistError::ChapterNotFound {
					book: book.to_string(),
					chapter: chapter_file.to_string(),
				})
			}
			Err(e) => Err(e.into()),
		}
	}
}

#[cfg(test)]
mod tests {
	use std::fs;
	use std::path::Path;

	use crate::Archivist;
	use crate::ArchivistError;

	fn write_book(dir: &Path) {
		let book = dir.join("suqua");
		fs::create_dir_all(book.join("chapters")).unwrap();
		fs::write(
			book.join("chapters").join("manifest.json"),
			r#"[{ "file": "ch1.txt", "title": "Beginnings", "number": 1 }]"#,
		)
		.unwrap();
		fs::write(
			book.join("glossary.json"),
			r#"{ "canoe": "a narrow open boat" }"#,
		)
		.unwrap();
		fs::write(
			book.join("chapters").join("ch1.txt"),
			"[startPage=1]The canoe waited.[endPage=1]",
		)
		.unwrap();
	}

	#[test]
	fn test_fetch_chapter_bundle() {
		let _ = env_logger::try_init();
		let dir = tempfile::tempdir().unwrap();
		write_book(dir.path());

		let archivist = Archivist::new(dir.path());
		let source = archivist.fetch_chapter("suqua", "ch1.txt").unwrap();
		assert_eq!(source.manifest.chapters().len(), 1);
		assert!(source.glossary.lookup("canoe").is_some());
		assert!(source.text.contains("[startPage=1]"));
	}

	#[test]
	fn test_missing_manifest_and_glossary_degrade_to_empty() {
		let _ = env_logger::try_init();
		let dir = tempfile::tempdir().unwrap();
		let book = dir.path().join("bare");
		fs::create_dir_all(book.join("chapters")).unwrap();
		fs::write(
			book.join("chapters").join("ch1.txt"),
			"[startPage=1]Plain text.[endPage=1]",
		)
		.unwrap();

		let archivist = Archivist::new(dir.path());
		let source = archivist.fetch_chapter("bare", "ch1.txt").unwrap();
		assert!(source.manifest.chapters().is_empty());
		assert!(source.glossary.is_empty());
	}

	#[test]
	fn test_missing_chapter_text_fails_the_load() {
		let _ = env_logger::try_init();
		let dir = tempfile::tempdir().unwrap();
		write_book(dir.path());

		let archivist = Archivist::new(dir.path());
		let result = archivist.fetch_chapter("suqua", "ch9.txt");
		assert!(matches!(
			result,
			Err(ArchivistError::ChapterNotFound { chapter, .. }) if chapter == "ch9.txt"
		));
	}

	#[test]
	fn test_malformed_manifest_fails_the_load() {
		let _ = env_logger::try_init();
		let dir = tempfile::tempdir().unwrap();
		write_book(dir.path());
		fs::write(
			dir.path().join("suqua").join("chapters").join("manifest.json"),
			"not json",
		)
		.unwrap();

		let archivist = Archivist::new(dir.path());
		assert!(matches!(
			archivist.fetch_chapter("suqua", "ch1.txt"),
			Err(ArchivistError::Manifest(..))
		));
	}
}
