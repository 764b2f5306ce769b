use std::sync::Arc;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::sync::mpsc::Sender;
use std::sync::mpsc::channel;
use std::thread;
use std::thread::JoinHandle;

use archivist::Archivist;
use archivist::ArchivistError;
use archivist::record_keeper::RecordKeeper;
use archivist::record_keeper::RecordKeeperError;
use binder::ChapterSession;
use binder::RenderedPage;
use binder::error::BinderError;
use binder::glossary::Glossary;
use binder::manifest::ChapterHeader;

/// Token identifying one chapter load. A slow load whose token no longer
/// matches the latest request is discarded instead of clobbering the state
/// of a newer navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LoadGeneration(u64);

#[derive(Debug, thiserror::Error)]
pub enum HostError {
	#[error(transparent)]
	RecordKeeper(#[from] RecordKeeperError),
}

#[derive(Debug, thiserror::Error)]
pub enum HostRequestError {
	#[error("reader host not running")]
	NotRunning,
}

#[derive(Debug, thiserror::Error)]
enum LoadError {
	#[error("Error loading chapter: {0}")]
	Fetch(#[from] ArchivistError),
	#[error("Error: {0}")]
	Render(#[from] BinderError),
}

/// Notifications from the host worker back to the shell.
pub trait Bell {
	fn chapter_ready(&self, generation: LoadGeneration, view: PageView, glossary: Glossary);
	fn page_turned(&self, view: PageView);
	fn load_failed(&self, generation: LoadGeneration, message: String);
}

/// One displayable page plus the navigation facts a shell needs.
#[derive(Debug, Clone)]
pub struct PageView {
	pub header: Option<ChapterHeader>,
	pub page: RenderedPage,
	pub page_index: usize,
	pub page_count: usize,
	pub has_previous: bool,
	pub has_next: bool,
}

#[derive(Debug)]
enum Request {
	Open {
		generation: LoadGeneration,
		book: String,
		chapter_file: String,
	},
	NextPage,
	PreviousPage,
	Goto(u32),
}

/// Drives chapter loads and page turns on a worker thread, one session at
/// a time. Page turns are persisted through the record keeper.
pub struct Host {
	req_tx: Sender<Request>,
	handle: JoinHandle<Result<(), HostError>>,
	latest: Arc<AtomicU64>,
	generation_count: u64,
}

impl Host {
	pub fn create(
		bell: impl Bell + Send + 'static,
		archivist: Archivist,
		records: RecordKeeper,
	) -> Self {
		let (req_tx, req_rx) = channel();
		let latest = Arc::new(AtomicU64::new(0));
		let worker_latest = latest.clone();
		let handle = thread::spawn(move || -> Result<(), HostError> {
			log::info!("Started reader host worker");
			let mut records = records;
			let mut current: Option<(String, String, ChapterSession)> = None;
			for request in req_rx.iter() {
				log::trace!("Request received: {request:?}");
				match request {
					Request::Open {
						generation,
						book,
						chapter_file,
					} => {
						match load_session(&archivist, &records, &book, &chapter_file) {
							Ok(session) => {
								if !is_current(&worker_latest, generation) {
									log::info!(
										"Discarding stale load of {book}/{chapter_file} ({generation:?})"
									);
									continue;
								}
								records.record_position(
									&book,
									&chapter_file,
									session.current_page() as u32,
								)?;
								let view = page_view(&session);
								let glossary = session.glossary().clone();
								current = Some((book, chapter_file, session));
								bell.chapter_ready(generation, view, glossary);
							}
							Err(e) => {
								log::error!("Load failed for {book}/{chapter_file}: {e}");
								if is_current(&worker_latest, generation) {
									bell.load_failed(generation, e.to_string());
								}
							}
						}
					}
					Request::NextPage => {
						if let Some((book, chapter_file, session)) = &mut current {
							if session.next_page() {
								records.record_position(
									book,
									chapter_file,
									session.current_page() as u32,
								)?;
								bell.page_turned(page_view(session));
							} else {
								log::trace!("Already on the last page");
							}
						}
					}
					Request::PreviousPage => {
						if let Some((book, chapter_file, session)) = &mut current {
							if session.previous_page() {
								records.record_position(
									book,
									chapter_file,
									session.current_page() as u32,
								)?;
								bell.page_turned(page_view(session));
							} else {
								log::trace!("Already on the first page");
							}
						}
					}
					Request::Goto(index) => {
						if let Some((book, chapter_file, session)) = &mut current {
							if session.goto_page(index as usize) {
								records.record_position(
									book,
									chapter_file,
									session.current_page() as u32,
								)?;
								bell.page_turned(page_view(session));
							} else {
								log::warn!("Page {index} out of range, ignored");
							}
						}
					}
				}
			}
			log::info!("Reader host worker terminated");
			Ok(())
		});
		Host {
			req_tx,
			handle,
			latest,
			generation_count: 0,
		}
	}

	/// Request a chapter load. Returns the generation token that the
	/// matching `chapter_ready`/`load_failed` notification will carry.
	pub fn open(
		&mut self,
		book: impl Into<String>,
		chapter_file: impl Into<String>,
	) -> Result<LoadGeneration, HostRequestError> {
		self.generation_count += 1;
		let generation = LoadGeneration(self.generation_count);
		// Publish before sending so the worker can never see the request
		// without the token.
		self.latest.store(generation.0, Ordering::SeqCst);
		self.req_tx
			.send(Request::Open {
				generation,
				book: book.into(),
				chapter_file: chapter_file.into(),
			})
			.map_err(|_| HostRequestError::NotRunning)?;
		Ok(generation)
	}

	pub fn next_page(&mut self) -> Result<(), HostRequestError> {
		self.req_tx
			.send(Request::NextPage)
			.map_err(|_| HostRequestError::NotRunning)
	}

	pub fn previous_page(&mut self) -> Result<(), HostRequestError> {
		self.req_tx
			.send(Request::PreviousPage)
			.map_err(|_| HostRequestError::NotRunning)
	}

	pub fn goto_page(&mut self, index: u32) -> Result<(), HostRequestError> {
		self.req_tx
			.send(Request::Goto(index))
			.map_err(|_| HostRequestError::NotRunning)
	}

	pub fn quit(self) -> Result<(), HostError> {
		drop(self.req_tx);
		self.handle.join().unwrap()?;
		Ok(())
	}
}

fn is_current(latest: &AtomicU64, generation: LoadGeneration) -> bool {
	latest.load(Ordering::SeqCst) == generation.0
}

fn load_session(
	archivist: &Archivist,
	records: &RecordKeeper,
	book: &str,
	chapter_file: &str,
) -> Result<ChapterSession, LoadError> {
	let source = archivist.fetch_chapter(book, chapter_file)?;
	let mut session = ChapterSession::create(
		chapter_file,
		&source.manifest,
		source.glossary,
		&source.text,
		source.render_config,
	)?;
	let stored = records
		.fetch_position(book, chapter_file)
		.inspect_err(|e| log::warn!("Could not read stored position: {e}"))
		.unwrap_or_default();
	session.restore_position(stored);
	Ok(session)
}

fn page_view(session: &ChapterSession) -> PageView {
	PageView {
		header: session.header().cloned(),
		page: session.render_current(),
		page_index: session.current_page(),
		page_count: session.page_count(),
		has_previous: session.has_previous(),
		has_next: session.has_next(),
	}
}
