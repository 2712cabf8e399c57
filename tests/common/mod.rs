//! Shared setup for the integration tests.

#![allow(dead_code)]

use chrono::offset::Utc;
use chrono::{DateTime, Duration, TimeZone};

use forumdb::models::{NewPost, Post, PostId, Thread, ThreadRef, User};
use forumdb::service::{ForumService, ThreadDraft};
use forumdb::store::{MemoryStore, Store};

pub fn user(nickname: &str) -> User {
    User {
        nickname: nickname.into(),
        fullname: format!("{} Testington", nickname),
        about: format!("I am {}", nickname),
        email: format!("{}@example.org", nickname),
    }
}

/// A service with users `alice` and `bob` and a forum `news` owned by alice.
pub fn service() -> ForumService<MemoryStore> {
    seeded(ForumService::new(MemoryStore::new()))
}

/// Add `alice`, `bob` and the forum `news` to an empty service.
pub fn seeded<S: Store>(service: ForumService<S>) -> ForumService<S> {
    service.create_user(user("alice")).unwrap();
    service.create_user(user("bob")).unwrap();
    service.create_forum("news", "News", "alice").unwrap();

    service
}

pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2020, 6, 1, 12, 0, 0).unwrap()
}

pub fn draft(slug: &str, minutes: i64) -> ThreadDraft {
    ThreadDraft {
        title: format!("Thread {}", slug),
        author: "alice".into(),
        message: "Opening message".into(),
        slug: slug.into(),
        created: Some(base_time() + Duration::minutes(minutes)),
    }
}

pub fn thread<S: Store>(service: &ForumService<S>, slug: &str) -> Thread {
    service
        .create_thread("news", draft(slug, 0))
        .unwrap()
        .created()
        .unwrap()
}

/// Post a single message, optionally as a reply.
pub fn post<S: Store>(
    service: &ForumService<S>,
    thread: &Thread,
    parent: Option<PostId>,
) -> Post {
    let mut created = service
        .create_posts(
            &ThreadRef::ById(thread.id),
            vec![NewPost::new("bob", parent, "message")],
        )
        .unwrap();

    created.remove(0)
}

pub fn ids(posts: &[Post]) -> Vec<PostId> {
    posts.iter().map(|post| post.id).collect()
}
