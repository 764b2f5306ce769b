use std::path::Path;

use chrono::DateTime;
use chrono::Utc;
use chrono::serde::ts_seconds;
use rusqlite_migration::M;
use rusqlite_migration::Migrations;
use serde::Serialize;
use serde_rusqlite::to_params_named;

const MIGRATIONS_SLICE: &[M<'_>] = &[M::up(
	"create table reading_positions (
		book text not null,
		chapter_file text not null,
		page_index integer not null,
		opened_at integer not null,
		primary key (book, chapter_file)
	);",
)];
const MIGRATIONS: Migrations<'_> = Migrations::from_slice(MIGRATIONS_SLICE);

#[derive(Debug, thiserror::Error)]
pub enum RecordKeeperError {
	#[error("at {1}: {0}")]
	Rusqlite(rusqlite::Error, &'static std::panic::Location<'static>),
	#[error(transparent)]
	Migration(#[from] rusqlite_migration::Error),
	#[error(transparent)]
	SerdeRusqlite(#[from] serde_rusqlite::Error),
}

impl From<rusqlite::Error> for RecordKeeperError {
	#[track_caller]
	fn from(err: rusqlite::Error) -> Self {
		Self::Rusqlite(err, std::panic::Location::caller())
	}
}

#[derive(Debug, Serialize)]
struct InsertPosition<'a> {
	book: &'a str,
	chapter_file: &'a str,
	page_index: u32,
	#[serde(with = "ts_seconds")]
	opened_at: DateTime<Utc>,
}

/// Reading-position store: one row per (book, chapter) pair, holding the
/// zero-based index of the last viewed page.
pub struct RecordKeeper {
	conn: rusqlite::Connection,
}

pub fn create(db_path: &Path) -> Result<RecordKeeper, RecordKeeperError> {
	let mut conn = rusqlite::Connection::open(db_path)?;

	conn.pragma_update(None, "foreign_keys", "on")?;
	conn.pragma_update(None, "journal_mode", "WAL")?;

	MIGRATIONS.to_latest(&mut conn)?;

	Ok(RecordKeeper { conn })
}

impl RecordKeeper {
	pub fn fetch_position(
		&self,
		book: &str,
		chapter_file: &str,
	) -> Result<Option<u32>, RecordKeeperError> {
		let mut stmt = self.conn.prepare(
			"select page_index
			from reading_positions
			where book = ?1 and chapter_file = ?2;
			",
		)?;
		let mut rows = stmt.query((book, chapter_file))?;
		rows.next()?
			.map(|row| row.get(0))
			.transpose()
			.map_err(Into::into)
	}

	pub fn record_position(
		&mut self,
		book: &str,
		chapter_file: &str,
		page_index: u32,
	) -> Result<(), RecordKeeperError> {
		let mut stmt = self.conn.prepare(
			"insert into reading_positions (book, chapter_file, page_index, opened_at)
				values (:book, :chapter_file, :page_index, :opened_at)
			on conflict (book, chapter_file)
			do update set
				page_index = :page_index,
				opened_at = :opened_at;
			",
		)?;
		let position = InsertPosition {
			book,
			chapter_file,
			page_index,
			opened_at: Utc::now(),
		};
		stmt.execute(to_params_named(position)?.to_slice().as_slice())?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use crate::record_keeper::create;

	#[test]
	fn test_missing_position_is_none() {
		let _ = env_logger::try_init();
		let dir = tempfile::tempdir().unwrap();
		let keeper = create(&dir.path().join("state.db")).unwrap();

		let stored = keeper.fetch_position("suqua", "ch1.txt").unwrap();
		assert_eq!(stored, None);
	}

	#[test]
	fn test_record_and_fetch_roundtrip() {
		let _ = env_logger::try_init();
		let dir = tempfile::tempdir().unwrap();
		let mut keeper = create(&dir.path().join("state.db")).unwrap();

		keeper.record_position("suqua", "ch1.txt", 3).unwrap();
		assert_eq!(keeper.fetch_position("suqua", "ch1.txt").unwrap(), Some(3));

		// Other chapters are unaffected.
		assert_eq!(keeper.fetch_position("suqua", "ch2.txt").unwrap(), None);
	}

	#[test]
	fn test_record_upserts_existing_row() {
		let _ = env_logger::try_init();
		let dir = tempfile::tempdir().unwrap();
		let mut keeper = create(&dir.path().join("state.db")).unwrap();

		keeper.record_position("suqua", "ch1.txt", 1).unwrap();
		keeper.record_position("suqua", "ch1.txt", 4).unwrap();
		assert_eq!(keeper.fetch_position("suqua", "ch1.txt").unwrap(), Some(4));
	}
}
