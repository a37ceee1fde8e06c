//! SQLite-backed [`DataConnector`] built on `rusqlite`.

// std
use std::path::Path;
// crates.io
use rusqlite::{
	Connection, ErrorCode, OptionalExtension, Row, Transaction, params, types::Type,
};
use time::Date;
// self
use crate::{
	_prelude::*,
	auth::{ConsumerKey, ConsumerSecret, IdentifierError, NonceRecord, ResourceLinkId, UserId},
	model::{
		Consumer, IdScope, LtiVersion, ResourceLink, ResourceLinkKey, ResourceLinkShare, ShareKey,
		User, UserKey,
	},
	store::{DataConnector, NonceOutcome, StoreError, StoreFuture},
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS lti_consumer (
	consumer_key TEXT PRIMARY KEY,
	name TEXT NOT NULL,
	secret TEXT NOT NULL,
	lti_version TEXT,
	consumer_name TEXT,
	consumer_version TEXT,
	consumer_guid TEXT,
	css_path TEXT,
	protected INTEGER NOT NULL,
	enabled INTEGER NOT NULL,
	enable_from INTEGER,
	enable_until INTEGER,
	last_access INTEGER,
	id_scope INTEGER NOT NULL,
	created INTEGER NOT NULL,
	updated INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS lti_resource_link (
	consumer_key TEXT NOT NULL REFERENCES lti_consumer (consumer_key),
	link_id TEXT NOT NULL,
	context_id TEXT,
	title TEXT NOT NULL,
	settings TEXT NOT NULL,
	primary_consumer_key TEXT,
	primary_link_id TEXT,
	share_approved INTEGER,
	created INTEGER NOT NULL,
	updated INTEGER NOT NULL,
	PRIMARY KEY (consumer_key, link_id),
	FOREIGN KEY (primary_consumer_key, primary_link_id)
		REFERENCES lti_resource_link (consumer_key, link_id) ON UPDATE CASCADE
);
CREATE TABLE IF NOT EXISTS lti_nonce (
	consumer_key TEXT NOT NULL REFERENCES lti_consumer (consumer_key),
	value TEXT NOT NULL,
	expires INTEGER NOT NULL,
	PRIMARY KEY (consumer_key, value)
);
CREATE TABLE IF NOT EXISTS lti_share_key (
	share_key_id TEXT PRIMARY KEY,
	primary_consumer_key TEXT NOT NULL,
	primary_link_id TEXT NOT NULL,
	auto_approve INTEGER NOT NULL,
	life INTEGER NOT NULL,
	expires INTEGER NOT NULL,
	FOREIGN KEY (primary_consumer_key, primary_link_id)
		REFERENCES lti_resource_link (consumer_key, link_id) ON UPDATE CASCADE
);
CREATE TABLE IF NOT EXISTS lti_user (
	consumer_key TEXT NOT NULL,
	link_id TEXT NOT NULL,
	user_id TEXT NOT NULL,
	firstname TEXT NOT NULL,
	lastname TEXT NOT NULL,
	fullname TEXT NOT NULL,
	email TEXT NOT NULL,
	roles TEXT NOT NULL,
	groups TEXT NOT NULL,
	result_sourcedid TEXT,
	created INTEGER NOT NULL,
	updated INTEGER NOT NULL,
	PRIMARY KEY (consumer_key, link_id, user_id),
	FOREIGN KEY (consumer_key, link_id)
		REFERENCES lti_resource_link (consumer_key, link_id) ON UPDATE CASCADE
);
"#;

const CONSUMER_COLUMNS: &str = "consumer_key, name, secret, lti_version, consumer_name, \
	consumer_version, consumer_guid, css_path, protected, enabled, enable_from, enable_until, \
	last_access, id_scope, created, updated";
const LINK_COLUMNS: &str = "consumer_key, link_id, context_id, title, settings, \
	primary_consumer_key, primary_link_id, share_approved, created, updated";
const USER_COLUMNS: &str = "u.consumer_key, u.link_id, u.user_id, u.firstname, u.lastname, \
	u.fullname, u.email, u.roles, u.groups, u.result_sourcedid, u.created, u.updated";

impl From<rusqlite::Error> for StoreError {
	fn from(e: rusqlite::Error) -> Self {
		match e.sqlite_error_code() {
			Some(ErrorCode::ConstraintViolation) => Self::Integrity { message: e.to_string() },
			_ => Self::Backend { message: e.to_string() },
		}
	}
}

/// Relational adapter storing each collection in its own table.
#[derive(Clone, Debug)]
pub struct SqliteStore {
	conn: Arc<Mutex<Connection>>,
}
impl SqliteStore {
	/// Opens (or creates) a database file and applies the schema.
	pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
		Self::from_connection(Connection::open(path)?)
	}

	/// Opens a private in-memory database.
	pub fn open_in_memory() -> Result<Self, StoreError> {
		Self::from_connection(Connection::open_in_memory()?)
	}

	/// Wraps an existing connection and applies the schema.
	pub fn from_connection(conn: Connection) -> Result<Self, StoreError> {
		conn.execute_batch("PRAGMA foreign_keys = ON;")?;
		conn.execute_batch(SCHEMA)?;

		Ok(Self { conn: Arc::new(Mutex::new(conn)) })
	}

	fn with_tx<T>(
		&self,
		f: impl FnOnce(&Transaction<'_>) -> Result<T, StoreError>,
	) -> Result<T, StoreError> {
		let mut conn = self.conn.lock();
		let tx = conn.transaction()?;
		let value = f(&tx)?;

		tx.commit()?;

		Ok(value)
	}
}
impl DataConnector for SqliteStore {
	fn load_consumer<'a>(&'a self, key: &'a ConsumerKey) -> StoreFuture<'a, Option<Consumer>> {
		Box::pin(async move {
			let conn = self.conn.lock();
			let consumer = conn
				.query_row(
					&format!("SELECT {CONSUMER_COLUMNS} FROM lti_consumer WHERE consumer_key = ?1"),
					[key.as_ref()],
					consumer_from_row,
				)
				.optional()?;

			Ok(consumer)
		})
	}

	fn save_consumer(&self, consumer: Consumer) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			let conn = self.conn.lock();

			conn.execute(
				&format!(
					"INSERT INTO lti_consumer ({CONSUMER_COLUMNS}) \
					VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16) \
					ON CONFLICT (consumer_key) DO UPDATE SET name = excluded.name, \
					secret = excluded.secret, lti_version = excluded.lti_version, \
					consumer_name = excluded.consumer_name, \
					consumer_version = excluded.consumer_version, \
					consumer_guid = excluded.consumer_guid, css_path = excluded.css_path, \
					protected = excluded.protected, enabled = excluded.enabled, \
					enable_from = excluded.enable_from, enable_until = excluded.enable_until, \
					last_access = excluded.last_access, id_scope = excluded.id_scope, \
					updated = excluded.updated"
				),
				params![
					consumer.key().as_ref(),
					consumer.name,
					consumer.secret.expose(),
					consumer.lti_version.map(LtiVersion::as_str),
					consumer.consumer_name,
					consumer.consumer_version,
					consumer.consumer_guid,
					consumer.css_path,
					consumer.protected,
					consumer.enabled,
					consumer.enable_from.map(OffsetDateTime::unix_timestamp),
					consumer.enable_until.map(OffsetDateTime::unix_timestamp),
					consumer.last_access.map(Date::to_julian_day),
					consumer.id_scope.code(),
					consumer.created.unix_timestamp(),
					consumer.updated.unix_timestamp(),
				],
			)?;

			Ok(())
		})
	}

	fn delete_consumer<'a>(&'a self, key: &'a ConsumerKey) -> StoreFuture<'a, bool> {
		Box::pin(async move {
			self.with_tx(|tx| {
				let key = key.as_ref();

				tx.execute("DELETE FROM lti_nonce WHERE consumer_key = ?1", [key])?;
				tx.execute("DELETE FROM lti_share_key WHERE primary_consumer_key = ?1", [key])?;
				tx.execute("DELETE FROM lti_user WHERE consumer_key = ?1", [key])?;
				tx.execute(
					"UPDATE lti_resource_link SET primary_consumer_key = NULL, \
					primary_link_id = NULL, share_approved = NULL WHERE primary_consumer_key = ?1",
					[key],
				)?;
				tx.execute("DELETE FROM lti_resource_link WHERE consumer_key = ?1", [key])?;

				let removed = tx.execute("DELETE FROM lti_consumer WHERE consumer_key = ?1", [key])?;

				Ok(removed > 0)
			})
		})
	}

	fn list_consumers(&self) -> StoreFuture<'_, Vec<Consumer>> {
		Box::pin(async move {
			let conn = self.conn.lock();
			let mut stmt = conn.prepare(&format!(
				"SELECT {CONSUMER_COLUMNS} FROM lti_consumer ORDER BY consumer_key"
			))?;
			let consumers = stmt.query_map([], consumer_from_row)?.collect::<Result<_, _>>()?;

			Ok(consumers)
		})
	}

	fn load_resource_link<'a>(
		&'a self,
		key: &'a ResourceLinkKey,
	) -> StoreFuture<'a, Option<ResourceLink>> {
		Box::pin(async move {
			let conn = self.conn.lock();
			let link = conn
				.query_row(
					&format!(
						"SELECT {LINK_COLUMNS} FROM lti_resource_link \
						WHERE consumer_key = ?1 AND link_id = ?2"
					),
					[key.consumer.as_ref(), key.link.as_ref()],
					link_from_row,
				)
				.optional()?;

			Ok(link)
		})
	}

	fn save_resource_link(&self, link: ResourceLink) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			let settings = serde_json::to_string(&link.settings)
				.map_err(|e| StoreError::Serialization { message: e.to_string() })?;
			let conn = self.conn.lock();

			conn.execute(
				&format!(
					"INSERT INTO lti_resource_link ({LINK_COLUMNS}) \
					VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10) \
					ON CONFLICT (consumer_key, link_id) DO UPDATE SET \
					context_id = excluded.context_id, title = excluded.title, \
					settings = excluded.settings, \
					primary_consumer_key = excluded.primary_consumer_key, \
					primary_link_id = excluded.primary_link_id, \
					share_approved = excluded.share_approved, updated = excluded.updated"
				),
				params![
					link.consumer_key().as_ref(),
					link.id().as_ref(),
					link.context_id,
					link.title,
					settings,
					link.primary().map(|p| p.consumer.to_string()),
					link.primary().map(|p| p.link.to_string()),
					link.share_approved(),
					link.created.unix_timestamp(),
					link.updated.unix_timestamp(),
				],
			)?;

			Ok(())
		})
	}

	fn rekey_resource_link<'a>(
		&'a self,
		from: &'a ResourceLinkKey,
		to: &'a ResourceLinkId,
	) -> StoreFuture<'a, bool> {
		Box::pin(async move {
			self.with_tx(|tx| {
				let taken = tx
					.query_row(
						"SELECT 1 FROM lti_resource_link WHERE consumer_key = ?1 AND link_id = ?2",
						[from.consumer.as_ref(), to.as_ref()],
						|_| Ok(()),
					)
					.optional()?
					.is_some();

				if taken {
					return Err(StoreError::integrity(format!(
						"resource link {}/{to} already exists",
						from.consumer
					)));
				}

				let moved = tx.execute(
					"UPDATE lti_resource_link SET link_id = ?3 \
					WHERE consumer_key = ?1 AND link_id = ?2",
					[from.consumer.as_ref(), from.link.as_ref(), to.as_ref()],
				)?;

				Ok(moved > 0)
			})
		})
	}

	fn delete_resource_link<'a>(&'a self, key: &'a ResourceLinkKey) -> StoreFuture<'a, bool> {
		Box::pin(async move {
			self.with_tx(|tx| {
				let args = [key.consumer.as_ref(), key.link.as_ref()];

				tx.execute(
					"DELETE FROM lti_share_key \
					WHERE primary_consumer_key = ?1 AND primary_link_id = ?2",
					args,
				)?;
				tx.execute("DELETE FROM lti_user WHERE consumer_key = ?1 AND link_id = ?2", args)?;
				tx.execute(
					"UPDATE lti_resource_link SET primary_consumer_key = NULL, \
					primary_link_id = NULL, share_approved = NULL \
					WHERE primary_consumer_key = ?1 AND primary_link_id = ?2",
					args,
				)?;

				let removed = tx.execute(
					"DELETE FROM lti_resource_link WHERE consumer_key = ?1 AND link_id = ?2",
					args,
				)?;

				Ok(removed > 0)
			})
		})
	}

	fn list_shares<'a>(
		&'a self,
		primary: &'a ResourceLinkKey,
	) -> StoreFuture<'a, Vec<ResourceLinkShare>> {
		Box::pin(async move {
			let conn = self.conn.lock();
			let mut stmt = conn.prepare(
				"SELECT consumer_key, link_id, title, share_approved FROM lti_resource_link \
				WHERE primary_consumer_key = ?1 AND primary_link_id = ?2 \
				ORDER BY consumer_key, link_id",
			)?;
			let shares = stmt
				.query_map([primary.consumer.as_ref(), primary.link.as_ref()], |row| {
					Ok(ResourceLinkShare {
						key: ResourceLinkKey::new(identifier(row, 0)?, identifier(row, 1)?),
						title: row.get(2)?,
						approved: row.get(3)?,
					})
				})?
				.collect::<Result<_, _>>()?;

			Ok(shares)
		})
	}

	fn list_users<'a>(
		&'a self,
		link: &'a ResourceLinkKey,
		include_shared: bool,
	) -> StoreFuture<'a, Vec<User>> {
		Box::pin(async move {
			let conn = self.conn.lock();
			let mut stmt = conn.prepare(&format!(
				"SELECT {USER_COLUMNS} FROM lti_user u \
				WHERE (u.consumer_key = ?1 AND u.link_id = ?2) \
				OR (?3 AND EXISTS (SELECT 1 FROM lti_resource_link l \
				WHERE l.consumer_key = u.consumer_key AND l.link_id = u.link_id \
				AND l.primary_consumer_key = ?1 AND l.primary_link_id = ?2 \
				AND l.share_approved = 1)) \
				ORDER BY u.consumer_key, u.link_id, u.user_id"
			))?;
			let users = stmt
				.query_map(
					params![link.consumer.as_ref(), link.link.as_ref(), include_shared],
					user_from_row,
				)?
				.collect::<Result<_, _>>()?;

			Ok(users)
		})
	}

	fn consume_nonce(
		&self,
		record: NonceRecord,
		now: OffsetDateTime,
	) -> StoreFuture<'_, NonceOutcome> {
		Box::pin(async move {
			self.with_tx(|tx| {
				tx.execute("DELETE FROM lti_nonce WHERE expires <= ?1", [now.unix_timestamp()])?;

				let inserted = tx.execute(
					"INSERT OR IGNORE INTO lti_nonce (consumer_key, value, expires) \
					VALUES (?1, ?2, ?3)",
					params![
						record.consumer_key.as_ref(),
						record.value,
						record.expires_at.unix_timestamp()
					],
				)?;

				Ok(if inserted == 0 { NonceOutcome::Replayed } else { NonceOutcome::Fresh })
			})
		})
	}

	fn load_share_key<'a>(
		&'a self,
		id: &'a str,
		now: OffsetDateTime,
	) -> StoreFuture<'a, Option<ShareKey>> {
		Box::pin(async move {
			self.with_tx(|tx| {
				tx.execute("DELETE FROM lti_share_key WHERE expires <= ?1", [now.unix_timestamp()])?;

				let share = tx
					.query_row(
						"SELECT share_key_id, primary_consumer_key, primary_link_id, \
						auto_approve, life, expires FROM lti_share_key WHERE share_key_id = ?1",
						[id],
						|row| {
							Ok(ShareKey {
								id: row.get(0)?,
								primary: ResourceLinkKey::new(
									identifier(row, 1)?,
									identifier(row, 2)?,
								),
								auto_approve: row.get(3)?,
								life_hours: row.get(4)?,
								expires_at: instant(row, 5)?,
							})
						},
					)
					.optional()?;

				Ok(share)
			})
		})
	}

	fn save_share_key(&self, key: ShareKey) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			let conn = self.conn.lock();

			conn.execute(
				"INSERT INTO lti_share_key (share_key_id, primary_consumer_key, primary_link_id, \
				auto_approve, life, expires) VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
				ON CONFLICT (share_key_id) DO UPDATE SET \
				primary_consumer_key = excluded.primary_consumer_key, \
				primary_link_id = excluded.primary_link_id, \
				auto_approve = excluded.auto_approve, life = excluded.life, \
				expires = excluded.expires",
				params![
					key.id,
					key.primary.consumer.as_ref(),
					key.primary.link.as_ref(),
					key.auto_approve,
					key.life_hours,
					key.expires_at.unix_timestamp(),
				],
			)?;

			Ok(())
		})
	}

	fn delete_share_key<'a>(&'a self, id: &'a str) -> StoreFuture<'a, bool> {
		Box::pin(async move {
			let conn = self.conn.lock();
			let removed = conn.execute("DELETE FROM lti_share_key WHERE share_key_id = ?1", [id])?;

			Ok(removed > 0)
		})
	}

	fn load_user<'a>(&'a self, key: &'a UserKey) -> StoreFuture<'a, Option<User>> {
		Box::pin(async move {
			let conn = self.conn.lock();
			let user = conn
				.query_row(
					&format!(
						"SELECT {USER_COLUMNS} FROM lti_user u \
						WHERE u.consumer_key = ?1 AND u.link_id = ?2 AND u.user_id = ?3"
					),
					[key.link.consumer.as_ref(), key.link.link.as_ref(), key.user.as_ref()],
					user_from_row,
				)
				.optional()?;

			Ok(user)
		})
	}

	fn save_user(&self, user: User) -> StoreFuture<'_, ()> {
		Box::pin(async move {
			let encode = |values: &Vec<String>| {
				serde_json::to_string(values)
					.map_err(|e| StoreError::Serialization { message: e.to_string() })
			};
			let roles = encode(&user.roles)?;
			let groups = encode(&user.groups)?;
			let key = user.key();
			let conn = self.conn.lock();

			conn.execute(
				"INSERT INTO lti_user (consumer_key, link_id, user_id, firstname, lastname, \
				fullname, email, roles, groups, result_sourcedid, created, updated) \
				VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12) \
				ON CONFLICT (consumer_key, link_id, user_id) DO UPDATE SET \
				firstname = excluded.firstname, lastname = excluded.lastname, \
				fullname = excluded.fullname, email = excluded.email, roles = excluded.roles, \
				groups = excluded.groups, result_sourcedid = excluded.result_sourcedid, \
				updated = excluded.updated",
				params![
					key.link.consumer.as_ref(),
					key.link.link.as_ref(),
					key.user.as_ref(),
					user.firstname,
					user.lastname,
					user.fullname,
					user.email,
					roles,
					groups,
					user.result_sourcedid,
					user.created.unix_timestamp(),
					user.updated.unix_timestamp(),
				],
			)?;

			Ok(())
		})
	}

	fn delete_user<'a>(&'a self, key: &'a UserKey) -> StoreFuture<'a, bool> {
		Box::pin(async move {
			let conn = self.conn.lock();
			let removed = conn.execute(
				"DELETE FROM lti_user WHERE consumer_key = ?1 AND link_id = ?2 AND user_id = ?3",
				[key.link.consumer.as_ref(), key.link.link.as_ref(), key.user.as_ref()],
			)?;

			Ok(removed > 0)
		})
	}
}

fn conversion(idx: usize, kind: Type, e: impl 'static + Send + Sync + StdError) -> rusqlite::Error {
	rusqlite::Error::FromSqlConversionFailure(idx, kind, Box::new(e))
}

fn identifier<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
	T: TryFrom<String, Error = IdentifierError>,
{
	T::try_from(row.get::<_, String>(idx)?).map_err(|e| conversion(idx, Type::Text, e))
}

fn instant(row: &Row<'_>, idx: usize) -> rusqlite::Result<OffsetDateTime> {
	OffsetDateTime::from_unix_timestamp(row.get(idx)?).map_err(|e| conversion(idx, Type::Integer, e))
}

fn optional_instant(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<OffsetDateTime>> {
	row.get::<_, Option<i64>>(idx)?
		.map(|secs| {
			OffsetDateTime::from_unix_timestamp(secs).map_err(|e| conversion(idx, Type::Integer, e))
		})
		.transpose()
}

fn json<T: serde::de::DeserializeOwned>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T> {
	serde_json::from_str(&row.get::<_, String>(idx)?).map_err(|e| conversion(idx, Type::Text, e))
}

fn consumer_from_row(row: &Row<'_>) -> rusqlite::Result<Consumer> {
	let mut consumer = Consumer::restore(
		identifier(row, 0)?,
		ConsumerSecret::new(row.get::<_, String>(2)?),
		row.get(1)?,
	);

	consumer.lti_version = row
		.get::<_, Option<String>>(3)?
		.map(|raw| raw.parse::<LtiVersion>().map_err(|e| conversion(3, Type::Text, e)))
		.transpose()?;
	consumer.consumer_name = row.get(4)?;
	consumer.consumer_version = row.get(5)?;
	consumer.consumer_guid = row.get(6)?;
	consumer.css_path = row.get(7)?;
	consumer.protected = row.get(8)?;
	consumer.enabled = row.get(9)?;
	consumer.enable_from = optional_instant(row, 10)?;
	consumer.enable_until = optional_instant(row, 11)?;
	consumer.last_access = row
		.get::<_, Option<i32>>(12)?
		.map(|day| Date::from_julian_day(day).map_err(|e| conversion(12, Type::Integer, e)))
		.transpose()?;
	let scope = row.get::<_, u8>(13)?;

	consumer.id_scope = IdScope::from_code(scope).ok_or_else(|| {
		conversion(13, Type::Integer, StoreError::Serialization {
			message: format!("unknown id scope code {scope}"),
		})
	})?;
	consumer.created = instant(row, 14)?;
	consumer.updated = instant(row, 15)?;

	Ok(consumer)
}

fn link_from_row(row: &Row<'_>) -> rusqlite::Result<ResourceLink> {
	let key = ResourceLinkKey::new(identifier(row, 0)?, identifier(row, 1)?);
	let mut link = ResourceLink::new(key, instant(row, 8)?);

	link.context_id = row.get(2)?;
	link.title = row.get(3)?;
	link.settings = json(row, 4)?;
	link.updated = instant(row, 9)?;

	let primary_consumer = row.get::<_, Option<String>>(5)?;
	let primary_link = row.get::<_, Option<String>>(6)?;

	if let (Some(consumer), Some(primary)) = (primary_consumer, primary_link) {
		let primary = ResourceLinkKey::new(
			ConsumerKey::try_from(consumer).map_err(|e| conversion(5, Type::Text, e))?,
			ResourceLinkId::try_from(primary).map_err(|e| conversion(6, Type::Text, e))?,
		);

		link.share_with(primary, row.get(7)?).map_err(|e| conversion(6, Type::Text, e))?;
	}

	Ok(link)
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
	let link = ResourceLinkKey::new(identifier(row, 0)?, identifier(row, 1)?);
	let user_id: UserId = identifier(row, 2)?;
	let mut user = User::new(UserKey::new(link, user_id), instant(row, 10)?);

	user.firstname = row.get(3)?;
	user.lastname = row.get(4)?;
	user.fullname = row.get(5)?;
	user.email = row.get(6)?;
	user.roles = json(row, 7)?;
	user.groups = json(row, 8)?;
	user.result_sourcedid = row.get(9)?;
	user.updated = instant(row, 11)?;

	Ok(user)
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	use tokio::runtime::Runtime;
	// self
	use super::*;

	fn link_key(consumer: &str, link: &str) -> ResourceLinkKey {
		ResourceLinkKey::new(
			ConsumerKey::new(consumer).expect("Consumer key fixture should be valid."),
			ResourceLinkId::new(link).expect("Resource link id fixture should be valid."),
		)
	}

	fn seeded(rt: &Runtime) -> SqliteStore {
		let store = SqliteStore::open_in_memory().expect("In-memory database should open.");
		let now = macros::datetime!(2025-03-01 12:00 UTC);

		for key in ["K1", "K2"] {
			let consumer = Consumer::builder(
				ConsumerKey::new(key).expect("Consumer key fixture should be valid."),
				key,
			)
			.created_at(now)
			.build()
			.expect("Consumer fixture should build.");

			rt.block_on(store.save_consumer(consumer)).expect("Consumer should save.");
		}

		rt.block_on(store.save_resource_link(ResourceLink::new(link_key("K1", "R1"), now)))
			.expect("Primary link should save.");

		store
	}

	#[test]
	fn nonce_insert_is_unique_per_consumer() {
		let rt = Runtime::new().expect("Failed to build Tokio runtime for sqlite test.");
		let store = seeded(&rt);
		let now = macros::datetime!(2025-03-01 12:00 UTC);
		let record = |consumer: &str| {
			NonceRecord::new(
				ConsumerKey::new(consumer).expect("Consumer key fixture should be valid."),
				"n-1",
				now,
				Duration::minutes(30),
			)
		};

		assert_eq!(rt.block_on(store.consume_nonce(record("K1"), now)), Ok(NonceOutcome::Fresh));
		assert_eq!(
			rt.block_on(store.consume_nonce(record("K1"), now)),
			Ok(NonceOutcome::Replayed)
		);
		assert_eq!(rt.block_on(store.consume_nonce(record("K2"), now)), Ok(NonceOutcome::Fresh));
		assert_eq!(
			rt.block_on(store.consume_nonce(record("K1"), now + Duration::minutes(31))),
			Ok(NonceOutcome::Fresh)
		);
		assert!(matches!(
			rt.block_on(store.consume_nonce(record("K9"), now)),
			Err(StoreError::Integrity { .. })
		));
	}

	#[test]
	fn rekey_moves_users_and_pointers() {
		let rt = Runtime::new().expect("Failed to build Tokio runtime for sqlite test.");
		let store = seeded(&rt);
		let now = macros::datetime!(2025-03-01 12:00 UTC);
		let mut sharing = ResourceLink::new(link_key("K2", "R7"), now);

		sharing.share_with(link_key("K1", "R1"), Some(true)).expect("Pointer should be valid.");
		rt.block_on(store.save_resource_link(sharing)).expect("Sharing link should save.");

		let user_key = UserKey::new(
			link_key("K1", "R1"),
			UserId::new("U1").expect("User id fixture should be valid."),
		);
		let mut user = User::new(user_key, now);

		user.result_sourcedid = Some("sid".into());
		rt.block_on(store.save_user(user)).expect("User should save.");

		let renamed = ResourceLinkId::new("R2").expect("Resource link id fixture should be valid.");

		assert_eq!(rt.block_on(store.rekey_resource_link(&link_key("K1", "R1"), &renamed)), Ok(true));

		let users = rt
			.block_on(store.list_users(&link_key("K1", "R2"), false))
			.expect("Users should list.");
		let shares = rt
			.block_on(store.list_shares(&link_key("K1", "R2")))
			.expect("Shares should list.");

		assert_eq!(users.len(), 1);
		assert_eq!(shares.len(), 1);
		assert_eq!(shares[0].key, link_key("K2", "R7"));
	}

	#[test]
	fn expired_share_keys_are_purged_on_load() {
		let rt = Runtime::new().expect("Failed to build Tokio runtime for sqlite test.");
		let store = seeded(&rt);
		let now = macros::datetime!(2025-03-01 12:00 UTC);
		let share = ShareKey {
			id: "abcde".into(),
			primary: link_key("K1", "R1"),
			auto_approve: false,
			life_hours: 1,
			expires_at: now + Duration::hours(1),
		};

		rt.block_on(store.save_share_key(share.clone())).expect("Share key should save.");

		assert_eq!(rt.block_on(store.load_share_key("abcde", now)), Ok(Some(share)));
		assert_eq!(
			rt.block_on(store.load_share_key("abcde", now + Duration::hours(1))),
			Ok(None)
		);
	}

	#[test]
	fn unknown_id_scope_codes_fail_to_load() {
		let rt = Runtime::new().expect("Failed to build Tokio runtime for sqlite test.");
		let store = seeded(&rt);
		let key = ConsumerKey::new("K2").expect("Consumer key fixture should be valid.");

		store
			.conn
			.lock()
			.execute("UPDATE lti_consumer SET id_scope = 9 WHERE consumer_key = ?1", ["K2"])
			.expect("Corrupting the scope column should succeed.");

		assert!(matches!(
			rt.block_on(store.load_consumer(&key)),
			Err(StoreError::Backend { ref message }) if message.contains("unknown id scope code 9")
		));
	}
}
