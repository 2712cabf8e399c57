//! The forum service.
//!
//! Every operation a delivery layer needs: it resolves references, validates
//! input, and turns unique-key collisions on creation into [`Outcome`]s.

use chrono::offset::Utc;
use chrono::DateTime;

use log::{debug, info, warn};

use rand::{thread_rng, Rng};

use crate::models::{
    Forum, NewForum, NewPost, NewThread, Outcome, Page, Post, PostFull, PostId, Related, SortMode,
    Status, Thread, ThreadId, ThreadRef, ThreadUpdate, User, UserUpdate, Vote,
};
use crate::store::Store;
use crate::{Error, Result};

/// A thread to be created. Leave `slug` empty to have one generated.
#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct ThreadDraft {
    pub title: String,
    pub author: String,
    pub message: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
}

/// Generate a slug for a thread that wasn't given one.
///
/// This is a random 128-bit value written like a UUID. It always contains a
/// hyphen, so it can't be mistaken for a thread ID.
pub fn generate_slug() -> String {
    let value: u128 = thread_rng().gen();
    let hex = format!("{:032x}", value);

    format!(
        "{}-{}-{}-{}-{}",
        &hex[0..8],
        &hex[8..12],
        &hex[12..16],
        &hex[16..20],
        &hex[20..32]
    )
}

/// The forum service, over some storage backend.
#[derive(Debug)]
pub struct ForumService<S> {
    store: S,
}

impl<S: Store> ForumService<S> {
    pub fn new(store: S) -> ForumService<S> {
        ForumService { store }
    }

    /// Create a user. If the nickname or email is taken, get every user that
    /// holds either.
    pub fn create_user(&self, user: User) -> Result<Outcome<User, Vec<User>>> {
        match self.store.insert_user(&user) {
            Ok(()) => {
                info!("Created user '{}'", user.nickname);
                Ok(Outcome::Created(user))
            }
            Err(err) if err.is_conflict() => {
                let existing = self.store.users_conflicting(&user.nickname, &user.email)?;
                warn!("User '{}' conflicts with {} user(s)", user.nickname, existing.len());
                Ok(Outcome::Conflict(existing))
            }
            Err(err) => Err(err),
        }
    }

    pub fn user(&self, nickname: &str) -> Result<User> {
        self.store.user(nickname)
    }

    /// Change a user's profile. Empty fields are left as they are.
    pub fn update_user(&self, nickname: &str, changes: UserUpdate) -> Result<User> {
        self.store.update_user(nickname, &changes.normalized())
    }

    /// Create a forum. If the slug is taken, get the forum that holds it.
    pub fn create_forum(&self, slug: &str, title: &str, owner: &str) -> Result<Outcome<Forum>> {
        let owner = self.store.user(owner)?;

        let new_forum = NewForum {
            slug: slug.to_string(),
            title: title.to_string(),
            owner: owner.nickname,
        };

        match self.store.insert_forum(&new_forum) {
            Ok(forum) => {
                info!("Created forum '{}'", forum.slug);
                Ok(Outcome::Created(forum))
            }
            Err(Error::UniqueViolation { .. }) => {
                warn!("Forum '{}' already exists", slug);
                Ok(Outcome::Conflict(self.store.forum(slug)?))
            }
            Err(err) => Err(err),
        }
    }

    pub fn forum(&self, slug: &str) -> Result<Forum> {
        self.store.forum(slug)
    }

    /// Create a thread on a forum. If the slug is taken, get the thread that
    /// holds it.
    pub fn create_thread(&self, forum_slug: &str, draft: ThreadDraft) -> Result<Outcome<Thread>> {
        let author = self.store.user(&draft.author)?;
        let forum = self.store.forum(forum_slug)?;

        let slug = if draft.slug.is_empty() {
            generate_slug()
        } else {
            draft.slug
        };

        let new_thread = NewThread {
            slug,
            title: draft.title,
            message: draft.message,
            author: author.nickname,
            forum: forum.slug,
            created: draft.created.unwrap_or_else(Utc::now),
        };

        match self.store.insert_thread(&new_thread) {
            Ok(thread) => {
                info!("Created thread #{} '{}' on '{}'", thread.id, thread.slug, thread.forum);
                Ok(Outcome::Created(thread))
            }
            Err(Error::UniqueViolation { .. }) => {
                warn!("Thread '{}' already exists", new_thread.slug);
                let existing = self.store.thread(&ThreadRef::BySlug(new_thread.slug))?;
                Ok(Outcome::Conflict(existing))
            }
            Err(err) => Err(err),
        }
    }

    pub fn thread(&self, thread: &ThreadRef) -> Result<Thread> {
        self.store.thread(thread)
    }

    /// Change a thread's title or message. Empty fields are left as they
    /// are.
    pub fn update_thread(&self, thread: &ThreadRef, changes: ThreadUpdate) -> Result<Thread> {
        let thread = self.store.thread(thread)?;
        self.store.update_thread(thread.id, &changes.normalized())
    }

    /// A forum's threads, by creation time.
    pub fn forum_threads(&self, forum_slug: &str, page: &Page<DateTime<Utc>>) -> Result<Vec<Thread>> {
        let forum = self.store.forum(forum_slug)?;
        self.store.forum_threads(&forum.slug, page)
    }

    /// The users who have made a thread or post in a forum.
    pub fn forum_users(&self, forum_slug: &str, page: &Page<String>) -> Result<Vec<User>> {
        let forum = self.store.forum(forum_slug)?;
        self.store.forum_users(&forum.slug, page)
    }

    /// Add a batch of posts to a thread. Either every post is created or
    /// none are.
    pub fn create_posts(&self, thread: &ThreadRef, posts: Vec<NewPost>) -> Result<Vec<Post>> {
        let thread = self.store.thread(thread)?;

        if posts.is_empty() {
            debug!("Empty post batch for thread #{}", thread.id);
            return Ok(Vec::new());
        }

        let posts: Vec<NewPost> = posts
            .into_iter()
            .map(|post| NewPost {
                parent: post.parent.filter(|&parent| parent != 0),
                ..post
            })
            .collect();

        let created = self.store.insert_posts(&thread, &posts, Utc::now())?;

        info!("Created {} post(s) in thread #{}", created.len(), thread.id);

        Ok(created)
    }

    pub fn post(&self, post_id: PostId) -> Result<Post> {
        self.store.post(post_id)
    }

    /// A post along with whichever related objects were asked for.
    pub fn post_full(&self, post_id: PostId, related: Related) -> Result<PostFull> {
        let post = self.store.post(post_id)?;

        let author = if related.include_author {
            Some(self.store.user(&post.author)?)
        } else {
            None
        };

        let thread = if related.include_thread {
            Some(self.store.thread(&ThreadRef::ById(post.thread))?)
        } else {
            None
        };

        let forum = if related.include_forum {
            Some(self.store.forum(&post.forum)?)
        } else {
            None
        };

        Ok(PostFull {
            post,
            author,
            thread,
            forum,
        })
    }

    pub fn update_post(&self, post_id: PostId, message: &str) -> Result<Post> {
        self.store.update_post(post_id, message)
    }

    /// A page of a thread's posts in the given order.
    pub fn posts(&self, thread: &ThreadRef, page: &Page<PostId>, sort: SortMode) -> Result<Vec<Post>> {
        let thread = self.store.thread(thread)?;

        debug!("Listing posts of thread #{} ({}, {:?})", thread.id, sort, page);

        self.store.thread_posts(thread.id, page, sort)
    }

    /// Vote on a thread, replacing the user's earlier vote if any.
    pub fn vote(&self, thread: &ThreadRef, nickname: &str, voice: i32) -> Result<Thread> {
        if voice != 1 && voice != -1 {
            return Err(Error::InvalidVoice { voice });
        }

        let thread = self.store.thread(thread)?;

        self.store.cast_vote(&Vote {
            nickname: nickname.to_string(),
            thread: thread.id,
            voice,
        })
    }

    pub fn vote_total(&self, thread: ThreadId) -> Result<i64> {
        self.store.vote_total(thread)
    }

    pub fn status(&self) -> Result<Status> {
        self.store.status()
    }

    /// Delete everything.
    pub fn clear(&self) -> Result<()> {
        self.store.clear()?;
        info!("Cleared all forum data");
        Ok(())
    }
}
