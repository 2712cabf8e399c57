//! A storage backend that keeps everything in process.
//!
//! It follows the same rules as the database: the same unique keys, the same
//! reference checks and the same orderings (through [`crate::tree`]). A
//! single mutex makes every operation atomic.

use std::collections::{BTreeSet, HashMap};
use std::fmt::Debug;
use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::offset::Utc;
use chrono::DateTime;

use crate::models::{
    Forum, NewForum, NewPost, NewThread, Page, Post, PostId, SortMode, Status, Thread, ThreadId,
    ThreadRef, ThreadUpdate, User, UserUpdate, Vote,
};
use crate::store::{AdminStore, ForumStore, PostStore, ThreadStore, UserStore, VoteStore};
use crate::tree;
use crate::{Error, Result};

fn same_key(a: &str, b: &str) -> bool {
    a == b || a.to_lowercase() == b.to_lowercase()
}

fn missing(constraint: &str) -> Error {
    Error::MissingReference {
        constraint: constraint.to_string(),
    }
}

fn taken(constraint: &str) -> Error {
    Error::UniqueViolation {
        constraint: constraint.to_string(),
    }
}

#[derive(Debug, Default)]
struct State {
    users: Vec<User>,
    forums: Vec<Forum>,
    threads: Vec<Thread>,
    /// Indexed by post ID minus one.
    posts: Vec<Post>,
    votes: HashMap<(ThreadId, String), i32>,
    /// (forum slug, nickname)
    members: BTreeSet<(String, String)>,
}

impl State {
    fn user(&self, nickname: &str) -> Option<&User> {
        self.users.iter().find(|user| user.nickname == nickname)
    }

    fn user_mut(&mut self, nickname: &str) -> Option<&mut User> {
        self.users.iter_mut().find(|user| user.nickname == nickname)
    }

    fn forum_mut(&mut self, slug: &str) -> Option<&mut Forum> {
        self.forums.iter_mut().find(|forum| same_key(&forum.slug, slug))
    }

    fn thread(&self, thread_ref: &ThreadRef) -> Option<&Thread> {
        match thread_ref {
            ThreadRef::ById(id) => self.threads.iter().find(|thread| thread.id == *id),
            ThreadRef::BySlug(slug) => self
                .threads
                .iter()
                .find(|thread| same_key(&thread.slug, slug)),
        }
    }

    fn thread_mut(&mut self, id: ThreadId) -> Option<&mut Thread> {
        self.threads.iter_mut().find(|thread| thread.id == id)
    }

    fn post(&self, id: PostId) -> Option<&Post> {
        let index = usize::try_from(id).ok()?.checked_sub(1)?;
        self.posts.get(index)
    }

    fn post_mut(&mut self, id: PostId) -> Option<&mut Post> {
        let index = usize::try_from(id).ok()?.checked_sub(1)?;
        self.posts.get_mut(index)
    }

    fn vote_total(&self, thread: ThreadId) -> i64 {
        self.votes
            .iter()
            .filter(|((voted, _), _)| *voted == thread)
            .map(|(_, &voice)| voice as i64)
            .sum()
    }
}

/// An in-memory store.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl Debug for MemoryStore {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::fmt::Result {
        let state = self.lock();

        write!(
            fmt,
            "<#MemoryStore users={} forums={} threads={} posts={}>",
            state.users.len(),
            state.forums.len(),
            state.threads.len(),
            state.posts.len(),
        )
    }
}

impl MemoryStore {
    pub fn new() -> MemoryStore {
        MemoryStore::default()
    }

    /// A panic while holding the lock can't leave the state half-written, as
    /// every operation validates before it mutates.
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl UserStore for MemoryStore {
    fn user(&self, nickname: &str) -> Result<User> {
        self.lock()
            .user(nickname)
            .cloned()
            .ok_or_else(|| Error::UserNotFound {
                nickname: nickname.to_string(),
            })
    }

    fn users_conflicting(&self, nickname: &str, email: &str) -> Result<Vec<User>> {
        let state = self.lock();

        let mut conflicting: Vec<User> = state
            .users
            .iter()
            .filter(|user| user.nickname == nickname || same_key(&user.email, email))
            .cloned()
            .collect();
        conflicting.sort_by(|a, b| a.nickname.cmp(&b.nickname));
        conflicting.truncate(2);

        Ok(conflicting)
    }

    fn insert_user(&self, user: &User) -> Result<()> {
        let mut state = self.lock();

        if state.user(&user.nickname).is_some() {
            return Err(taken("users_pkey"));
        }
        if state.users.iter().any(|other| same_key(&other.email, &user.email)) {
            return Err(taken("users_email_key"));
        }

        state.users.push(user.clone());

        Ok(())
    }

    fn update_user(&self, nickname: &str, changes: &UserUpdate) -> Result<User> {
        let mut state = self.lock();

        if state.user(nickname).is_none() {
            return Err(Error::UserNotFound {
                nickname: nickname.to_string(),
            });
        }

        if let Some(ref email) = changes.email {
            let owner = state
                .users
                .iter()
                .find(|other| other.nickname != nickname && same_key(&other.email, email));

            if let Some(owner) = owner {
                return Err(Error::EmailTaken {
                    email: email.clone(),
                    owner: owner.nickname.clone(),
                });
            }
        }

        let user = state.user_mut(nickname).ok_or_else(|| Error::UserNotFound {
            nickname: nickname.to_string(),
        })?;
        changes.apply(user);

        Ok(user.clone())
    }
}

impl ForumStore for MemoryStore {
    fn forum(&self, slug: &str) -> Result<Forum> {
        self.lock()
            .forums
            .iter()
            .find(|forum| same_key(&forum.slug, slug))
            .cloned()
            .ok_or_else(|| Error::ForumNotFound {
                slug: slug.to_string(),
            })
    }

    fn insert_forum(&self, new_forum: &NewForum) -> Result<Forum> {
        let mut state = self.lock();

        if state.user(&new_forum.owner).is_none() {
            return Err(missing("forum_owner_fkey"));
        }
        if state.forum_mut(&new_forum.slug).is_some() {
            return Err(taken("forum_slug_key"));
        }

        let forum = Forum::from(new_forum.clone());
        state.forums.push(forum.clone());

        Ok(forum)
    }

    fn forum_users(&self, slug: &str, page: &Page<String>) -> Result<Vec<User>> {
        let state = self.lock();

        let mut nicknames: Vec<&String> = state
            .members
            .iter()
            .filter(|(forum, _)| forum == slug)
            .map(|(_, nickname)| nickname)
            .filter(|nickname| match page.since {
                Some(ref since) if page.desc => nickname.as_str() < since.as_str(),
                Some(ref since) => nickname.as_str() > since.as_str(),
                None => true,
            })
            .collect();

        if page.desc {
            nicknames.reverse();
        }

        Ok(nicknames
            .into_iter()
            .take(page.limit.max(0) as usize)
            .filter_map(|nickname| state.user(nickname).cloned())
            .collect())
    }
}

impl ThreadStore for MemoryStore {
    fn thread(&self, thread_ref: &ThreadRef) -> Result<Thread> {
        self.lock()
            .thread(thread_ref)
            .cloned()
            .ok_or_else(|| Error::ThreadNotFound {
                thread: thread_ref.clone(),
            })
    }

    fn insert_thread(&self, new_thread: &NewThread) -> Result<Thread> {
        let mut state = self.lock();

        if state.user(&new_thread.author).is_none() {
            return Err(missing("thread_author_fkey"));
        }
        if !state.forums.iter().any(|forum| forum.slug == new_thread.forum) {
            return Err(missing("thread_forum_fkey"));
        }
        if state
            .thread(&ThreadRef::BySlug(new_thread.slug.clone()))
            .is_some()
        {
            return Err(taken("thread_slug_key"));
        }

        let thread = Thread {
            id: state.threads.len() as ThreadId + 1,
            slug: new_thread.slug.clone(),
            title: new_thread.title.clone(),
            message: new_thread.message.clone(),
            author: new_thread.author.clone(),
            forum: new_thread.forum.clone(),
            created: new_thread.created,
            votes: 0,
        };
        state.threads.push(thread.clone());

        if let Some(forum) = state.forum_mut(&thread.forum) {
            forum.threads += 1;
        }
        state
            .members
            .insert((thread.forum.clone(), thread.author.clone()));

        Ok(thread)
    }

    fn forum_threads(&self, forum: &str, page: &Page<DateTime<Utc>>) -> Result<Vec<Thread>> {
        let state = self.lock();

        let mut threads: Vec<&Thread> = state
            .threads
            .iter()
            .filter(|thread| thread.forum == forum)
            .filter(|thread| match page.since {
                Some(since) if page.desc => thread.created <= since,
                Some(since) => thread.created >= since,
                None => true,
            })
            .collect();

        threads.sort_by(|a, b| a.created.cmp(&b.created).then(a.id.cmp(&b.id)));
        if page.desc {
            threads.reverse();
        }

        Ok(threads
            .into_iter()
            .take(page.limit.max(0) as usize)
            .cloned()
            .collect())
    }

    fn update_thread(&self, thread_id: ThreadId, changes: &ThreadUpdate) -> Result<Thread> {
        let mut state = self.lock();

        let thread = state
            .thread_mut(thread_id)
            .ok_or(Error::ThreadNotFound {
                thread: ThreadRef::ById(thread_id),
            })?;
        changes.apply(thread);

        Ok(thread.clone())
    }
}

impl PostStore for MemoryStore {
    fn post(&self, post_id: PostId) -> Result<Post> {
        self.lock()
            .post(post_id)
            .cloned()
            .ok_or(Error::PostNotFound { post_id })
    }

    fn insert_posts(
        &self,
        thread: &Thread,
        new_posts: &[NewPost],
        created: DateTime<Utc>,
    ) -> Result<Vec<Post>> {
        let mut state = self.lock();

        for new_post in new_posts {
            if state.user(&new_post.author).is_none() {
                return Err(Error::UserNotFound {
                    nickname: new_post.author.clone(),
                });
            }
        }

        let mut parent_paths: HashMap<PostId, Vec<PostId>> = HashMap::new();
        for parent_id in new_posts.iter().filter_map(|new_post| new_post.parent) {
            match state.post(parent_id) {
                Some(parent) if parent.thread == thread.id => {
                    parent_paths.insert(parent_id, parent.path.clone());
                }
                _ => {
                    return Err(Error::ParentNotInThread {
                        parent_id,
                        thread_id: thread.id,
                    })
                }
            }
        }

        let first_id = state.posts.len() as PostId + 1;

        let posts: Vec<Post> = new_posts
            .iter()
            .zip(first_id..)
            .map(|(new_post, id)| {
                let parent_path = new_post
                    .parent
                    .and_then(|parent_id| parent_paths.get(&parent_id))
                    .map(Vec::as_slice);
                let path = tree::child_path(parent_path, id);

                Post {
                    id,
                    parent: new_post.parent,
                    root: tree::root_of(&path, id),
                    path,
                    author: new_post.author.clone(),
                    message: new_post.message.clone(),
                    is_edited: false,
                    forum: thread.forum.clone(),
                    thread: thread.id,
                    created,
                }
            })
            .collect();

        state.posts.extend(posts.iter().cloned());

        if let Some(forum) = state.forum_mut(&thread.forum) {
            forum.posts += posts.len() as i64;
        }
        for post in &posts {
            state
                .members
                .insert((thread.forum.clone(), post.author.clone()));
        }

        Ok(posts)
    }

    fn update_post(&self, post_id: PostId, message: &str) -> Result<Post> {
        let mut state = self.lock();

        let post = state
            .post_mut(post_id)
            .ok_or(Error::PostNotFound { post_id })?;

        if !message.is_empty() && message != post.message {
            post.message = message.to_string();
            post.is_edited = true;
        }

        Ok(post.clone())
    }

    fn thread_posts(
        &self,
        thread: ThreadId,
        page: &Page<PostId>,
        sort: SortMode,
    ) -> Result<Vec<Post>> {
        let state = self.lock();

        let posts: Vec<Post> = state
            .posts
            .iter()
            .filter(|post| post.thread == thread)
            .cloned()
            .collect();

        Ok(tree::page(&posts, page, sort))
    }
}

impl VoteStore for MemoryStore {
    fn cast_vote(&self, vote: &Vote) -> Result<Thread> {
        let mut state = self.lock();

        if state.thread(&ThreadRef::ById(vote.thread)).is_none() {
            return Err(Error::ThreadNotFound {
                thread: ThreadRef::ById(vote.thread),
            });
        }
        if state.user(&vote.nickname).is_none() {
            return Err(Error::UserNotFound {
                nickname: vote.nickname.clone(),
            });
        }

        state
            .votes
            .insert((vote.thread, vote.nickname.clone()), vote.voice);
        let total = state.vote_total(vote.thread);

        let thread = state
            .thread_mut(vote.thread)
            .ok_or(Error::ThreadNotFound {
                thread: ThreadRef::ById(vote.thread),
            })?;
        thread.votes = total as i32;

        Ok(thread.clone())
    }

    fn vote_total(&self, thread: ThreadId) -> Result<i64> {
        Ok(self.lock().vote_total(thread))
    }
}

impl AdminStore for MemoryStore {
    fn status(&self) -> Result<Status> {
        let state = self.lock();

        Ok(Status {
            user: state.users.len() as i64,
            forum: state.forums.len() as i64,
            thread: state.threads.len() as i64,
            post: state.posts.len() as i64,
        })
    }

    fn clear(&self) -> Result<()> {
        *self.lock() = State::default();
        Ok(())
    }
}
