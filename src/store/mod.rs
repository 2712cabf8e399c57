//! The storage port.
//!
//! The service talks to storage only through these traits. `Database` is the
//! PostgreSQL implementation; `MemoryStore` keeps everything in process.

use chrono::offset::Utc;
use chrono::DateTime;

use crate::models::{
    Forum, NewForum, NewPost, NewThread, Page, Post, PostId, SortMode, Status, Thread, ThreadId,
    ThreadRef, ThreadUpdate, User, UserUpdate, Vote,
};
use crate::Result;

pub mod memory;

pub use memory::MemoryStore;

pub trait UserStore {
    /// Get a user by their exact nickname.
    fn user(&self, nickname: &str) -> Result<User>;

    /// Every user holding either the nickname or (case-insensitively) the
    /// email. At most two.
    fn users_conflicting(&self, nickname: &str, email: &str) -> Result<Vec<User>>;

    /// Insert a user. Fails with `UniqueViolation` when the nickname or email
    /// is taken.
    fn insert_user(&self, user: &User) -> Result<()>;

    fn update_user(&self, nickname: &str, changes: &UserUpdate) -> Result<User>;
}

pub trait ForumStore {
    /// Get a forum by its slug, ignoring case.
    fn forum(&self, slug: &str) -> Result<Forum>;

    /// Insert a forum with zeroed counters. Fails with `UniqueViolation` when
    /// the slug is taken.
    fn insert_forum(&self, forum: &NewForum) -> Result<Forum>;

    /// The users who made a thread or post in the forum, by nickname.
    fn forum_users(&self, slug: &str, page: &Page<String>) -> Result<Vec<User>>;
}

pub trait ThreadStore {
    fn thread(&self, thread: &ThreadRef) -> Result<Thread>;

    /// Insert a thread, bump its forum's thread counter and record the
    /// author as a forum member, all at once.
    fn insert_thread(&self, thread: &NewThread) -> Result<Thread>;

    /// A forum's threads, by creation time. The cursor is inclusive.
    fn forum_threads(&self, forum: &str, page: &Page<DateTime<Utc>>) -> Result<Vec<Thread>>;

    fn update_thread(&self, thread: ThreadId, changes: &ThreadUpdate) -> Result<Thread>;
}

pub trait PostStore {
    fn post(&self, post: PostId) -> Result<Post>;

    /// Insert a batch of posts into a thread, or nothing at all.
    ///
    /// Every author must exist and every parent must already be a post of
    /// the thread. The posts get increasing IDs in input order and share the
    /// `created` timestamp.
    fn insert_posts(
        &self,
        thread: &Thread,
        posts: &[NewPost],
        created: DateTime<Utc>,
    ) -> Result<Vec<Post>>;

    /// Replace a post's message. An empty or identical message changes
    /// nothing.
    fn update_post(&self, post: PostId, message: &str) -> Result<Post>;

    fn thread_posts(
        &self,
        thread: ThreadId,
        page: &Page<PostId>,
        sort: SortMode,
    ) -> Result<Vec<Post>>;
}

pub trait VoteStore {
    /// Record a vote, replacing any earlier vote by the same user, and return
    /// the thread with its refreshed total.
    fn cast_vote(&self, vote: &Vote) -> Result<Thread>;

    fn vote_total(&self, thread: ThreadId) -> Result<i64>;
}

pub trait AdminStore {
    fn status(&self) -> Result<Status>;

    /// Delete everything.
    fn clear(&self) -> Result<()>;
}

/// Everything the service needs from storage.
pub trait Store: UserStore + ForumStore + ThreadStore + PostStore + VoteStore + AdminStore {}

impl<T> Store for T where
    T: UserStore + ForumStore + ThreadStore + PostStore + VoteStore + AdminStore
{
}
