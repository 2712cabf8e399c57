//! Types related to threads.

use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use chrono::offset::Utc;
use chrono::DateTime;

use diesel::{insert_into, prelude::*, update};

use serde::{Deserialize, Serialize};

use crate::models::forum::{add_forum_users, bump_forum_counters};
use crate::models::{lower, Database, Page};
use crate::schema::thread;
use crate::store::ThreadStore;
use crate::{Error, Result};

/// A thread ID.
pub type ThreadId = i32;

/// A way of addressing a thread: by its numeric ID or by its slug.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ThreadRef {
    ById(ThreadId),
    BySlug(String),
}

impl fmt::Display for ThreadRef {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ThreadRef::ById(id) => write!(f, "#{}", id),
            ThreadRef::BySlug(slug) => write!(f, "'{}'", slug),
        }
    }
}

impl FromStr for ThreadRef {
    type Err = Infallible;

    /// All-digit strings are IDs; anything else is a slug.
    fn from_str(s: &str) -> std::result::Result<ThreadRef, Infallible> {
        if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(id) = s.parse() {
                return Ok(ThreadRef::ById(id));
            }
        }

        Ok(ThreadRef::BySlug(s.to_string()))
    }
}

impl From<ThreadId> for ThreadRef {
    fn from(id: ThreadId) -> ThreadRef {
        ThreadRef::ById(id)
    }
}

impl From<&str> for ThreadRef {
    fn from(s: &str) -> ThreadRef {
        match s.parse() {
            Ok(thread_ref) => thread_ref,
            Err(infallible) => match infallible {},
        }
    }
}

/// A series of posts about a specific subject.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Serialize)]
pub struct Thread {
    /// The ID of the thread.
    pub id: ThreadId,
    /// The unique, case-insensitive name of the thread.
    pub slug: String,
    /// The subject of the thread.
    pub title: String,
    /// The opening message.
    pub message: String,
    /// The nickname of the user that opened the thread.
    pub author: String,
    /// The forum that this thread was created on.
    pub forum: String,
    /// When the thread was created.
    pub created: DateTime<Utc>,
    /// The sum of all current votes on the thread.
    pub votes: i32,
}

/// A new thread to be inserted in the database.
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = thread)]
pub struct NewThread {
    pub slug: String,
    pub title: String,
    pub message: String,
    pub author: String,
    pub forum: String,
    pub created: DateTime<Utc>,
}

/// A change to a thread. Fields left as `None` keep their value.
#[derive(Debug, Default, Clone, PartialEq, Eq, AsChangeset, Deserialize)]
#[diesel(table_name = thread)]
pub struct ThreadUpdate {
    pub title: Option<String>,
    pub message: Option<String>,
}

impl ThreadUpdate {
    /// Drop empty strings, which mean "leave unchanged".
    pub fn normalized(self) -> ThreadUpdate {
        ThreadUpdate {
            title: self.title.filter(|title| !title.is_empty()),
            message: self.message.filter(|message| !message.is_empty()),
        }
    }

    /// Whether the update changes nothing.
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.message.is_none()
    }

    /// Apply the update to a thread in memory.
    pub fn apply(&self, thread: &mut Thread) {
        if let Some(ref title) = self.title {
            thread.title = title.clone();
        }
        if let Some(ref message) = self.message {
            thread.message = message.clone();
        }
    }
}

/// Convenience function to convert from diesel's error type into our error
/// type, when we're querying for a thread.
pub(crate) fn conv_thread_error(
    thread_ref: ThreadRef,
) -> impl FnOnce(diesel::result::Error) -> Error {
    move |e: diesel::result::Error| match e {
        diesel::result::Error::NotFound => Error::ThreadNotFound { thread: thread_ref },
        _ => Error::from(e),
    }
}

/// Get a thread on an open connection.
pub(crate) fn find_thread(conn: &mut PgConnection, thread_ref: &ThreadRef) -> Result<Thread> {
    use crate::schema::thread::columns::{id, slug};
    use crate::schema::thread::dsl::thread;

    let found = match thread_ref {
        ThreadRef::ById(thread_id) => thread.filter(id.eq(thread_id)).first(conn),
        ThreadRef::BySlug(thread_slug) => thread
            .filter(lower(slug).eq(lower(thread_slug.as_str())))
            .first(conn),
    };

    found.map_err(conv_thread_error(thread_ref.clone()))
}

impl ThreadStore for Database {
    fn thread(&self, thread_ref: &ThreadRef) -> Result<Thread> {
        let mut conn = self.conn()?;
        find_thread(&mut conn, thread_ref)
    }

    fn insert_thread(&self, new_thread: &NewThread) -> Result<Thread> {
        use crate::schema::thread::dsl::thread;

        self.conn()?.transaction::<_, Error, _>(|conn| {
            let inserted: Thread = insert_into(thread).values(new_thread).get_result(conn)?;

            bump_forum_counters(conn, &inserted.forum, 1, 0)?;
            add_forum_users(conn, &inserted.forum, &[inserted.author.clone()])?;

            Ok(inserted)
        })
    }

    fn forum_threads(&self, forum_slug: &str, page: &Page<DateTime<Utc>>) -> Result<Vec<Thread>> {
        use crate::schema::thread::columns::{created, forum, id};
        use crate::schema::thread::dsl::thread;

        let mut query = thread.filter(forum.eq(forum_slug)).into_boxed();

        query = match (page.since, page.desc) {
            (Some(since), false) => query.filter(created.ge(since)),
            (Some(since), true) => query.filter(created.le(since)),
            (None, _) => query,
        };

        query = if page.desc {
            query.order((created.desc(), id.desc()))
        } else {
            query.order((created.asc(), id.asc()))
        };

        Ok(query.limit(page.limit).load(&mut self.conn()?)?)
    }

    fn update_thread(&self, thread_id: ThreadId, changes: &ThreadUpdate) -> Result<Thread> {
        use crate::schema::thread::columns::id;
        use crate::schema::thread::dsl::thread;

        let mut conn = self.conn()?;

        if changes.is_empty() {
            return find_thread(&mut conn, &ThreadRef::ById(thread_id));
        }

        update(thread.filter(id.eq(thread_id)))
            .set(changes)
            .get_result(&mut conn)
            .map_err(conv_thread_error(ThreadRef::ById(thread_id)))
    }
}
