use std::fs;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::mpsc::RecvError;
use std::sync::mpsc::Sender;
use std::sync::mpsc::channel;

use clap::Parser;
use clap::Subcommand;

use archivist::Archivist;
use archivist::ArchivistError;
use archivist::record_keeper;
use archivist::record_keeper::RecordKeeperError;
use archivist::settings::Settings;
use binder::glossary::Glossary;
use binder::popup::PopupController;
use binder::popup::PopupEffect;
use binder::popup::PopupEvent;
use chapbook_reader::host::Bell;
use chapbook_reader::host::Host;
use chapbook_reader::host::HostError;
use chapbook_reader::host::HostRequestError;
use chapbook_reader::host::LoadGeneration;
use chapbook_reader::host::PageView;

#[derive(Parser)]
#[command(version, about = "Paginated reader for annotated book chapters")]
struct Cli {
	/// Config file layered over the built-in defaults
	#[arg(long)]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand)]
enum Command {
	/// List the chapters of a book
	Chapters { book: String },
	/// Render a chapter page to stdout
	Read {
		book: String,
		chapter: String,

		/// Page index to show instead of the stored reading position
		#[arg(long)]
		page: Option<u32>,

		/// Look up a glossary term annotated on the shown page
		#[arg(long)]
		define: Option<String>,
	},
}

#[derive(Debug, thiserror::Error)]
enum CliError {
	#[error("invalid settings: {0}")]
	Settings(#[from] config::ConfigError),
	#[error(transparent)]
	Archivist(#[from] ArchivistError),
	#[error(transparent)]
	RecordKeeper(#[from] RecordKeeperError),
	#[error(transparent)]
	Host(#[from] HostError),
	#[error(transparent)]
	HostRequest(#[from] HostRequestError),
	#[error("reader host stopped unexpectedly")]
	HostStopped(#[from] RecvError),
	#[error("{0}")]
	Load(String),
	#[error("page {0} does not exist, chapter has {1} pages")]
	PageOutOfRange(u32, usize),
	#[error("term {0:?} is not annotated on this page")]
	TermNotOnPage(String),
	#[error("could not create state directory: {0}")]
	StateDir(std::io::Error),
}

#[derive(Debug)]
enum Note {
	Ready(LoadGeneration, PageView, Glossary),
	Turned(PageView),
	Failed(LoadGeneration, String),
}

struct ChannelBell(Sender<Note>);

impl Bell for ChannelBell {
	fn chapter_ready(&self, generation: LoadGeneration, view: PageView, glossary: Glossary) {
		let _ = self.0.send(Note::Ready(generation, view, glossary));
	}

	fn page_turned(&self, view: PageView) {
		let _ = self.0.send(Note::Turned(view));
	}

	fn load_failed(&self, generation: LoadGeneration, message: String) {
		let _ = self.0.send(Note::Failed(generation, message));
	}
}

fn main() -> ExitCode {
	env_logger::builder()
		.filter_level(log::LevelFilter::Warn) // Default Log Level
		.parse_default_env()
		.init();
	let cli = Cli::parse();
	match run(cli) {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			eprintln!("{e}");
			ExitCode::FAILURE
		}
	}
}

fn run(cli: Cli) -> Result<(), CliError> {
	let settings = Settings::load(cli.config.as_deref())?;
	match cli.command {
		Command::Chapters { book } => list_chapters(&settings, &book),
		Command::Read {
			book,
			chapter,
			page,
			define,
		} => read_chapter(&settings, &book, &chapter, page, define.as_deref()),
	}
}

fn list_chapters(settings: &Settings, book: &str) -> Result<(), CliError> {
	let archivist = Archivist::new(&settings.library.path);
	let manifest = archivist.fetch_manifest(book)?;
	if let Some(title) = manifest.title() {
		match manifest.author() {
			Some(author) => println!("{title} by {author}"),
			None => println!("{title}"),
		}
	}
	for entry in manifest.chapters() {
		println!("{}", entry.label());
	}
	Ok(())
}

fn read_chapter(
	settings: &Settings,
	book: &str,
	chapter: &str,
	page: Option<u32>,
	define: Option<&str>,
) -> Result<(), CliError> {
	fs::create_dir_all(&settings.state.path).map_err(CliError::StateDir)?;
	let records = record_keeper::create(&settings.state.path.join("reader.db"))?;
	let archivist = Archivist::new(&settings.library.path);
	let (tx, rx) = channel();
	let mut host = Host::create(ChannelBell(tx), archivist, records);

	let generation = host.open(book, chapter)?;
	let (mut view, glossary) = loop {
		match rx.recv()? {
			Note::Ready(g, view, glossary) if g == generation => break (view, glossary),
			Note::Failed(g, message) if g == generation => {
				let _ = host.quit();
				return Err(CliError::Load(message));
			}
			note => log::trace!("Ignoring notification {note:?}"),
		}
	};

	if let Some(index) = page {
		if index as usize >= view.page_count {
			let _ = host.quit();
			return Err(CliError::PageOutOfRange(index, view.page_count));
		}
		if index as usize != view.page_index {
			host.goto_page(index)?;
			view = loop {
				match rx.recv()? {
					Note::Turned(view) => break view,
					note => log::trace!("Ignoring notification {note:?}"),
				}
			};
		}
	}

	if let Some(header) = &view.header {
		println!("{}", header.to_html());
	}
	println!("{}", view.page.to_html());
	println!(
		"{} ({} of {})",
		view.page.page_label(),
		view.page_index + 1,
		view.page_count
	);

	if let Some(term) = define {
		show_definition(&view, &glossary, term)?;
	}

	host.quit()?;
	Ok(())
}

/// Drive the popup state machine from the shell: activate the first span
/// on the page matching `term` and print what the popup would show.
fn show_definition(view: &PageView, glossary: &Glossary, term: &str) -> Result<(), CliError> {
	let wanted = term.to_lowercase();
	let (span, key) = view
		.page
		.spans()
		.into_iter()
		.find(|(_, key)| *key == wanted)
		.ok_or_else(|| CliError::TermNotOnPage(term.to_string()))?;
	let mut popup = PopupController::default();
	for effect in popup.handle(
		PopupEvent::Activate {
			span,
			term: key.to_string(),
		},
		glossary,
	) {
		if let PopupEffect::Show {
			definition, image, ..
		} = effect
		{
			println!();
			println!("{term}: {definition}");
			if let Some(image) = image {
				println!("[illustration: {image}]");
			}
		}
	}
	Ok(())
}
