use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;

use binder::BookRenderConfig;
use binder::error::RenderConfigError;
use binder::glossary::AnnotationPolicy;

pub(crate) const DEFAULT_CONFIG: &str = r#"
[library]
path = "./books"

[state]
path = "./state"
"#;

const DEFAULT_BOOK_CONFIG: &str = r#"
[directives]
inline = true
"#;

#[derive(Debug, Deserialize)]
pub struct Library {
	pub path: PathBuf,
}

#[derive(Debug, Deserialize)]
pub struct State {
	pub path: PathBuf,
}

/// Application settings: where the book library lives and where reading
/// state is kept.
#[derive(Debug, Deserialize)]
pub struct Settings {
	pub library: Library,
	pub state: State,
}

impl Settings {
	/// Layered load: built-in defaults, then an optional `config.toml`,
	/// then `READER_*` environment overrides.
	pub fn load(config_path: Option<&Path>) -> Result<Self, config::ConfigError> {
		let mut builder = config::Config::builder().add_source(config::File::from_str(
			DEFAULT_CONFIG,
			config::FileFormat::Toml,
		));
		if let Some(path) = config_path {
			builder = builder.add_source(config::File::from(path).required(false));
		}
		builder
			.add_source(config::Environment::with_prefix("READER").separator("_"))
			.build()?
			.try_deserialize()
	}
}

#[derive(Debug, Default, Deserialize)]
pub struct Directives {
	#[serde(default = "default_true")]
	pub inline: bool,
	/// Absolute asset root for the legacy `[IMG:]` form; absent means the
	/// form is not recognized for this book.
	#[serde(default)]
	pub legacy_block: Option<String>,
}

fn default_true() -> bool {
	true
}

/// Per-book quirks record, read from an optional `book.toml` beside the
/// book's chapters. Replaces conditional branches keyed on book identity.
#[derive(Debug, Deserialize)]
pub struct BookConfig {
	#[serde(default)]
	pub asset_root: Option<String>,
	#[serde(default)]
	pub strip_pattern: Option<String>,
	#[serde(default)]
	pub annotation_policy: AnnotationPolicy,
	#[serde(default)]
	pub directives: Directives,
}

#[derive(Debug, thiserror::Error)]
pub enum BookConfigError {
	#[error(transparent)]
	Config(#[from] config::ConfigError),
	#[error(transparent)]
	Render(#[from] RenderConfigError),
}

impl BookConfig {
	pub fn load(book_dir: &Path) -> Result<Self, BookConfigError> {
		Ok(config::Config::builder()
			.add_source(config::File::from_str(
				DEFAULT_BOOK_CONFIG,
				config::FileFormat::Toml,
			))
			.add_source(config::File::from(book_dir.join("book.toml")).required(false))
			.build()?
			.try_deserialize()?)
	}

	/// Resolve into the engine's render configuration for `book`. The
	/// default asset root is the book's own assets directory.
	pub fn into_render_config(self, book: &str) -> Result<BookRenderConfig, BookConfigError> {
		let asset_root = self
			.asset_root
			.unwrap_or_else(|| format!("books/{book}/assets"));
		let mut render = BookRenderConfig::new(asset_root);
		if !self.directives.inline {
			render.directive_rules.clear();
		}
		if let Some(root) = self.directives.legacy_block {
			render = render.with_legacy_images(root);
		}
		if let Some(pattern) = &self.strip_pattern {
			render = render.with_strip_pattern(pattern)?;
		}
		Ok(render.with_annotation_policy(self.annotation_policy))
	}
}

#[cfg(test)]
mod tests {
	use std::fs;

	use binder::glossary::AnnotationPolicy;
	use binder::images::DirectiveRule;

	use crate::settings::BookConfig;
	use crate::settings::Settings;

	#[test]
	fn test_settings_defaults() {
		let _ = env_logger::try_init();
		let settings = Settings::load(None).unwrap();
		assert_eq!(settings.library.path.to_str(), Some("./books"));
		assert_eq!(settings.state.path.to_str(), Some("./state"));
	}

	#[test]
	fn test_book_config_defaults_to_inline_rule() {
		let _ = env_logger::try_init();
		let dir = tempfile::tempdir().unwrap();

		let render = BookConfig::load(dir.path())
			.unwrap()
			.into_render_config("suqua")
			.unwrap();
		assert_eq!(
			render.directive_rules,
			vec![DirectiveRule::Inline {
				asset_root: "books/suqua/assets".to_string(),
			}]
		);
		assert!(render.strip_pattern.is_none());
		assert_eq!(render.annotation_policy, AnnotationPolicy::FirstOccurrence);
	}

	#[test]
	fn test_book_config_enables_legacy_rule_and_strip() {
		let _ = env_logger::try_init();
		let dir = tempfile::tempdir().unwrap();
		fs::write(
			dir.path().join("book.toml"),
			r#"
strip_pattern = "(?is)Small Steps:.*?by Peg Kehret\\s*"
annotation_policy = "every-occurrence"

[directives]
legacy_block = "/reader/books/geology/assets"
"#,
		)
		.unwrap();

		let render = BookConfig::load(dir.path())
			.unwrap()
			.into_render_config("geology")
			.unwrap();
		assert_eq!(render.directive_rules.len(), 2);
		assert!(render.directive_rules.contains(&DirectiveRule::LegacyBlock {
			asset_root: "/reader/books/geology/assets".to_string(),
		}));
		assert!(render.strip_pattern.is_some());
		assert_eq!(render.annotation_policy, AnnotationPolicy::EveryOccurrence);
	}
}
