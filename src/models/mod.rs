//! Models and types related to the database.

use std::fmt::Debug;

use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool, PooledConnection};
use diesel::sql_query;
use diesel::sql_types::Text;

use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};

use log::{debug, info};

use serde::Serialize;

use crate::config::Config;
use crate::store::AdminStore;
use crate::{Error, Result};

pub mod forum;
pub mod post;
pub mod thread;
pub mod user;
pub mod vote;

pub use forum::*;
pub use post::*;
pub use thread::*;
pub use user::*;
pub use vote::*;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// How many items a page holds when the caller doesn't say.
pub const DEFAULT_LIMIT: i64 = 100;

define_sql_function!(fn lower(x: Text) -> Text);

/// A page location for a cursor-paginated resource.
///
/// `since` is the cursor: a post id for posts, a creation time for threads
/// and a nickname for users. Without a cursor the page starts at the
/// beginning (or the end, for descending pages).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<C> {
    /// The maximum number of items on the page.
    pub limit: i64,
    /// Where the page starts.
    pub since: Option<C>,
    /// Whether the page walks backwards.
    pub desc: bool,
}

impl<C> Page<C> {
    /// The first page, ascending, holding up to `limit` items.
    pub fn first(limit: i64) -> Page<C> {
        Page {
            limit,
            since: None,
            desc: false,
        }
    }

    pub fn since(mut self, since: C) -> Page<C> {
        self.since = Some(since);
        self
    }

    pub fn descending(mut self) -> Page<C> {
        self.desc = true;
        self
    }
}

impl<C> Default for Page<C> {
    fn default() -> Page<C> {
        Page::first(DEFAULT_LIMIT)
    }
}

/// The result of an idempotent create.
///
/// A create that collides with an existing unique key isn't a hard failure:
/// the caller gets the record that already holds the key.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Outcome<T, C = T> {
    /// The record was inserted.
    Created(T),
    /// The key was taken; these are the records that hold it.
    Conflict(C),
}

impl<T, C> Outcome<T, C> {
    pub fn is_conflict(&self) -> bool {
        matches!(self, Outcome::Conflict(_))
    }

    pub fn created(self) -> Option<T> {
        match self {
            Outcome::Created(created) => Some(created),
            Outcome::Conflict(_) => None,
        }
    }

    pub fn conflict(self) -> Option<C> {
        match self {
            Outcome::Created(_) => None,
            Outcome::Conflict(existing) => Some(existing),
        }
    }
}

impl<T> Outcome<T> {
    /// The canonical record, whether it was just created or already there.
    pub fn into_inner(self) -> T {
        match self {
            Outcome::Created(inner) | Outcome::Conflict(inner) => inner,
        }
    }
}

/// Row counts for the whole database.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Status {
    pub user: i64,
    pub forum: i64,
    pub thread: i64,
    pub post: i64,
}

/// A pooled connection to the database.
pub type PgPooled = PooledConnection<ConnectionManager<PgConnection>>;

/// A connection pool to the database. Used for creating and retrieving data.
pub struct Database {
    pub pool: Pool<ConnectionManager<PgConnection>>,
}

impl Debug for Database {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        let state = self.pool.state();

        write!(
            fmt,
            "<#Database connections={} idle_connections={}>",
            state.connections, state.idle_connections,
        )?;

        Ok(())
    }
}

impl Database {
    /// Open a connection pool to the database and bring the schema up to
    /// date.
    pub fn open(config: &Config) -> Result<Database> {
        let manager = ConnectionManager::<PgConnection>::new(config.database_url.as_str());
        let pool = Pool::builder()
            .max_size(config.pool_size)
            .connection_timeout(config.connection_timeout)
            .build(manager)?;

        let applied = pool.get()?.run_pending_migrations(MIGRATIONS)?.len();
        if applied > 0 {
            info!("Applied {} database migration(s)", applied);
        }

        debug!("Opened database pool of {} connections", config.pool_size);

        Ok(Database { pool })
    }

    /// Check a connection out of the pool.
    ///
    /// Fails once the configured connection timeout passes rather than
    /// waiting forever on an exhausted pool.
    pub fn conn(&self) -> Result<PgPooled> {
        Ok(self.pool.get()?)
    }
}

impl AdminStore for Database {
    /// Get the number of rows of each entity.
    fn status(&self) -> Result<Status> {
        use crate::schema::{forum, post, thread, users};

        let mut conn = self.conn()?;

        conn.transaction::<_, Error, _>(|conn| {
            Ok(Status {
                user: users::table.count().get_result(conn)?,
                forum: forum::table.count().get_result(conn)?,
                thread: thread::table.count().get_result(conn)?,
                post: post::table.count().get_result(conn)?,
            })
        })
    }

    /// Delete everything.
    fn clear(&self) -> Result<()> {
        let query = "TRUNCATE forum_user, vote, post, thread, forum, users \
                     RESTART IDENTITY CASCADE";
        sql_query(query).execute(&mut self.conn()?)?;

        info!("Cleared the database");

        Ok(())
    }
}
