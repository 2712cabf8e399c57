//! Users, forums, threads and votes, through the service.

mod common;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::thread as std_thread;

use chrono::Duration;

use maplit::btreeset;

use forumdb::models::{Page, ThreadRef, ThreadUpdate, UserUpdate};
use forumdb::service::ForumService;
use forumdb::store::MemoryStore;
use forumdb::{Error, ErrorKind};

use common::{base_time, draft, service, thread, user};

#[test]
fn create_forum_is_idempotent() {
    let service = service();

    let first = service.forum("news").unwrap();
    let again = service.create_forum("NEWS", "Other title", "bob").unwrap();

    assert!(again.is_conflict());
    assert_eq!(again.into_inner(), first);
    assert_eq!(service.status().unwrap().forum, 1);
}

#[test]
fn forum_owner_is_canonical() {
    let service = service();

    let err = service.create_forum("empty", "Nobody's", "nobody").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let forum = service
        .create_forum("pets", "Pets", "bob")
        .unwrap()
        .created()
        .unwrap();
    assert_eq!(forum.owner, "bob");
    assert_eq!((forum.posts, forum.threads), (0, 0));
}

#[test]
fn user_conflicts() {
    let service = service();

    let mut clash = user("carol");
    clash.email = "ALICE@example.org".into();
    let outcome = service.create_user(clash).unwrap();
    let existing = outcome.conflict().unwrap();
    assert_eq!(existing.len(), 1);
    assert_eq!(existing[0].nickname, "alice");

    let mut both = user("bob");
    both.email = "alice@example.org".into();
    let existing = service.create_user(both).unwrap().conflict().unwrap();
    let nicknames: BTreeSet<&str> = existing.iter().map(|u| u.nickname.as_str()).collect();
    assert_eq!(nicknames, btreeset! {"alice", "bob"});

    assert!(!service.create_user(user("carol")).unwrap().is_conflict());
}

#[test]
fn update_user_profile() {
    let service = service();

    let updated = service
        .update_user(
            "bob",
            UserUpdate {
                fullname: Some("Robert".into()),
                about: Some(String::new()),
                email: None,
            },
        )
        .unwrap();
    assert_eq!(updated.fullname, "Robert");
    assert_eq!(updated.about, "I am bob");

    let err = service
        .update_user(
            "bob",
            UserUpdate {
                email: Some("Alice@Example.org".into()),
                ..UserUpdate::default()
            },
        )
        .unwrap_err();
    assert!(matches!(err, Error::EmailTaken { ref owner, .. } if owner == "alice"));

    let err = service.update_user("nobody", UserUpdate::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn thread_slugs() {
    let service = service();

    let generated = service
        .create_thread("news", draft("", 0))
        .unwrap()
        .created()
        .unwrap();
    assert!(!generated.slug.is_empty());
    assert_eq!(
        service.thread(&ThreadRef::from(generated.slug.as_str())).unwrap(),
        generated
    );

    let named = thread(&service, "Hello");
    let again = service.create_thread("news", draft("hello", 5)).unwrap();
    assert!(again.is_conflict());
    assert_eq!(again.into_inner(), named);

    assert_eq!(service.forum("news").unwrap().threads, 2);
    assert_eq!(service.thread(&ThreadRef::from("2")).unwrap(), named);
}

#[test]
fn thread_needs_forum_and_author() {
    let service = service();

    let err = service.create_thread("nowhere", draft("a", 0)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let mut anonymous = draft("b", 0);
    anonymous.author = "nobody".into();
    let err = service.create_thread("news", anonymous).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn list_threads() {
    let service = service();
    for (minutes, slug) in [(0, "one"), (10, "two"), (20, "three")] {
        service.create_thread("News", draft(slug, minutes)).unwrap();
    }

    let slugs = |page: Page<_>| -> Vec<String> {
        service
            .forum_threads("news", &page)
            .unwrap()
            .into_iter()
            .map(|t| t.slug)
            .collect()
    };

    assert_eq!(slugs(Page::first(2)), vec!["one", "two"]);

    let second = base_time() + Duration::minutes(10);
    assert_eq!(slugs(Page::first(2).since(second)), vec!["two", "three"]);
    assert_eq!(slugs(Page::first(1).since(second)), vec!["two"]);
    assert_eq!(
        slugs(Page::first(5).since(second).descending()),
        vec!["two", "one"]
    );
    assert_eq!(slugs(Page::first(5).descending()), vec!["three", "two", "one"]);

    let err = service.forum_threads("missing", &Page::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn update_thread_fields() {
    let service = service();
    let t = thread(&service, "edit-me");

    let updated = service
        .update_thread(
            &ThreadRef::from("edit-me"),
            ThreadUpdate {
                title: Some("New title".into()),
                message: Some(String::new()),
            },
        )
        .unwrap();

    assert_eq!(updated.id, t.id);
    assert_eq!(updated.title, "New title");
    assert_eq!(updated.message, t.message);
}

#[test]
fn votes_converge() {
    let service = service();
    let t = thread(&service, "vote");
    let by_slug = ThreadRef::from("vote");

    assert_eq!(service.vote(&by_slug, "bob", 1).unwrap().votes, 1);
    assert_eq!(service.vote(&by_slug, "alice", 1).unwrap().votes, 2);

    let before = service.vote_total(t.id).unwrap();
    service.vote(&by_slug, "bob", 1).unwrap();
    let after = service.vote(&by_slug, "bob", -1).unwrap();
    assert_eq!(after.votes as i64, before - 2);
    assert_eq!(service.vote_total(t.id).unwrap(), 0);
    assert_eq!(service.thread(&by_slug).unwrap().votes, 0);
}

#[test]
fn bad_votes() {
    let service = service();
    thread(&service, "vote");

    let err = service.vote(&ThreadRef::from("vote"), "bob", 2).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BadRequest);

    let err = service.vote(&ThreadRef::from("vote"), "nobody", 1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let err = service.vote(&ThreadRef::ById(99), "bob", 1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn concurrent_votes_count_each_user_once() {
    let service = Arc::new(ForumService::new(MemoryStore::new()));
    service.create_user(user("owner")).unwrap();
    service.create_forum("news", "News", "owner").unwrap();
    let mut d = draft("race", 0);
    d.author = "owner".into();
    service.create_thread("news", d).unwrap();

    let voters: Vec<String> = (0..8).map(|i| format!("voter{}", i)).collect();
    for voter in &voters {
        service.create_user(user(voter)).unwrap();
    }

    let handles: Vec<_> = voters
        .into_iter()
        .map(|voter| {
            let service = Arc::clone(&service);
            std_thread::spawn(move || {
                for round in 0..50 {
                    let voice = if round % 2 == 0 { 1 } else { -1 };
                    let thread = service.vote(&ThreadRef::ById(1), &voter, voice).unwrap();
                    assert!(thread.votes.abs() <= 8);
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    // Every voter's last voice was -1.
    assert_eq!(service.vote_total(1).unwrap(), -8);
    assert_eq!(service.thread(&ThreadRef::ById(1)).unwrap().votes, -8);
}

#[test]
fn status_and_clear() {
    let service = service();
    let t = thread(&service, "status");
    common::post(&service, &t, None);

    let status = service.status().unwrap();
    assert_eq!((status.user, status.forum, status.thread, status.post), (2, 1, 1, 1));

    service.clear().unwrap();
    let status = service.status().unwrap();
    assert_eq!((status.user, status.forum, status.thread, status.post), (0, 0, 0, 0));
    assert!(service.forum("news").is_err());
}
