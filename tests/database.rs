//! The PostgreSQL store, through the service.
//!
//! These run against the database named by `DATABASE_URL` and are skipped
//! when it isn't set. Every test truncates all tables first.

mod common;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread as std_thread;

use forumdb::config::Config;
use forumdb::models::{Database, NewPost, Page, SortMode, ThreadRef, UserUpdate};
use forumdb::service::ForumService;
use forumdb::ErrorKind;

use common::{draft, ids, post, seeded, thread, user};

static SERIAL: Mutex<()> = Mutex::new(());

/// An emptied, seeded database service, and the guard that keeps other
/// tests off the database until it is dropped.
fn database() -> Option<(MutexGuard<'static, ()>, ForumService<Database>)> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("DATABASE_URL is not set; skipping");
            return None;
        }
    };

    let guard = SERIAL.lock().unwrap_or_else(PoisonError::into_inner);

    let config = Config {
        database_url: url,
        pool_size: 4,
        ..Config::default()
    };
    let service = ForumService::new(Database::open(&config).unwrap());
    service.clear().unwrap();

    Some((guard, seeded(service)))
}

#[test]
fn paths_and_ids_come_from_the_sequence() {
    let Some((_guard, service)) = database() else {
        return;
    };
    let t = thread(&service, "paths");

    let root = post(&service, &t, None);
    let created = service
        .create_posts(
            &ThreadRef::ById(t.id),
            vec![
                NewPost::new("alice", Some(root.id), "one"),
                NewPost::new("bob", Some(root.id), "two"),
                NewPost::new("alice", None, "three"),
            ],
        )
        .unwrap();

    assert_eq!(ids(&created), vec![2, 3, 4]);
    assert_eq!(created[0].path, vec![1, 2]);
    assert_eq!(created[1].path, vec![1, 3]);
    assert_eq!(created[2].path, vec![4]);
    assert!(created.iter().all(|p| p.created == created[0].created));

    let nested = post(&service, &t, Some(created[1].id));
    assert_eq!(nested.path, vec![1, 3, 5]);
    assert_eq!(nested.root, 1);
    assert_eq!(service.post(nested.id).unwrap(), nested);
    assert_eq!(service.forum("news").unwrap().posts, 5);
}

#[test]
fn tree_orders_by_integer_path() {
    let Some((_guard, service)) = database() else {
        return;
    };
    let t = thread(&service, "numeric");
    let by_id = ThreadRef::ById(t.id);

    let root = post(&service, &t, None);
    let mut replies = Vec::new();
    for _ in 0..10 {
        replies.push(post(&service, &t, Some(root.id)));
    }
    // 12 goes under 2, 13 is a second root with reply 14.
    post(&service, &t, Some(replies[0].id));
    let second = post(&service, &t, None);
    post(&service, &t, Some(second.id));

    let asc = service.posts(&by_id, &Page::default(), SortMode::Tree).unwrap();
    assert_eq!(ids(&asc), vec![1, 2, 12, 3, 4, 5, 6, 7, 8, 9, 10, 11, 13, 14]);

    let desc = service
        .posts(&by_id, &Page::default().descending(), SortMode::Tree)
        .unwrap();
    assert_eq!(ids(&desc), vec![14, 13, 11, 10, 9, 8, 7, 6, 5, 4, 3, 12, 2, 1]);

    let after = service
        .posts(&by_id, &Page::first(3).since(12), SortMode::Tree)
        .unwrap();
    assert_eq!(ids(&after), vec![3, 4, 5]);

    let roots = service
        .posts(&by_id, &Page::first(1).descending(), SortMode::ParentTree)
        .unwrap();
    assert_eq!(ids(&roots), vec![13, 14]);

    let roots = service
        .posts(&by_id, &Page::first(2).descending(), SortMode::ParentTree)
        .unwrap();
    assert_eq!(ids(&roots), vec![13, 14, 1, 2, 12, 3, 4, 5, 6, 7, 8, 9, 10, 11]);

    let roots = service
        .posts(&by_id, &Page::first(1).since(1), SortMode::ParentTree)
        .unwrap();
    assert_eq!(ids(&roots), vec![13, 14]);

    let flat = service
        .posts(&by_id, &Page::first(3).since(10).descending(), SortMode::Flat)
        .unwrap();
    assert_eq!(ids(&flat), vec![9, 8, 7]);
}

#[test]
fn bad_parent_rolls_back_the_batch() {
    let Some((_guard, service)) = database() else {
        return;
    };
    let t = thread(&service, "atomic");
    let other = thread(&service, "other");
    let root = post(&service, &t, None);
    let elsewhere = post(&service, &other, None);

    for parent in [999, elsewhere.id] {
        let err = service
            .create_posts(
                &ThreadRef::ById(t.id),
                vec![
                    NewPost::new("alice", None, "valid"),
                    NewPost::new("bob", Some(root.id), "valid"),
                    NewPost::new("bob", Some(parent), "invalid parent"),
                ],
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
    }

    let err = service
        .create_posts(
            &ThreadRef::ById(t.id),
            vec![NewPost::new("nobody", None, "who?")],
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);

    assert_eq!(service.status().unwrap().post, 2);
    assert_eq!(service.forum("news").unwrap().posts, 2);

    // Rolled back batches may burn ids, but never reuse them.
    let next = post(&service, &t, None);
    assert!(next.id > elsewhere.id);
}

#[test]
fn creates_are_idempotent() {
    let Some((_guard, service)) = database() else {
        return;
    };

    let forum = service.create_forum("NEWS", "Other", "bob").unwrap();
    assert!(forum.is_conflict());
    assert_eq!(forum.into_inner().owner, "alice");

    let mut clash = user("carol");
    clash.email = "BOB@example.org".into();
    let existing = service.create_user(clash).unwrap().conflict().unwrap();
    assert_eq!(existing.len(), 1);
    assert_eq!(existing[0].nickname, "bob");

    let err = service
        .update_user(
            "alice",
            UserUpdate {
                email: Some("Bob@Example.org".into()),
                ..UserUpdate::default()
            },
        )
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let first = thread(&service, "Hello");
    let again = service.create_thread("news", draft("HELLO", 3)).unwrap();
    assert!(again.is_conflict());
    assert_eq!(again.into_inner(), first);
    assert_eq!(service.thread(&ThreadRef::from("hello")).unwrap(), first);
    assert_eq!(service.forum("news").unwrap().threads, 1);

    let err = service.create_thread("news", {
        let mut d = draft("x", 0);
        d.author = "nobody".into();
        d
    });
    assert_eq!(err.unwrap_err().kind(), ErrorKind::NotFound);
}

#[test]
fn forum_users_in_byte_order() {
    let Some((_guard, service)) = database() else {
        return;
    };
    service.create_user(user("Zed")).unwrap();
    let t = thread(&service, "members");

    service
        .create_posts(
            &ThreadRef::ById(t.id),
            vec![
                NewPost::new("bob", None, "b"),
                NewPost::new("Zed", None, "z"),
            ],
        )
        .unwrap();

    let nicknames = |page: Page<String>| -> Vec<String> {
        service
            .forum_users("news", &page)
            .unwrap()
            .into_iter()
            .map(|u| u.nickname)
            .collect()
    };

    assert_eq!(nicknames(Page::default()), vec!["Zed", "alice", "bob"]);
    assert_eq!(nicknames(Page::first(5).since("Zed".into())), vec!["alice", "bob"]);
    assert_eq!(
        nicknames(Page::first(5).since("alice".into()).descending()),
        vec!["Zed"]
    );
}

#[test]
fn edits_and_votes() {
    let Some((_guard, service)) = database() else {
        return;
    };
    let t = thread(&service, "vote");
    let by_slug = ThreadRef::from("VOTE");

    let p = post(&service, &t, None);
    assert!(!service.update_post(p.id, "").unwrap().is_edited);
    assert!(!service.update_post(p.id, "message").unwrap().is_edited);
    let edited = service.update_post(p.id, "changed").unwrap();
    assert!(edited.is_edited);
    assert_eq!(edited.message, "changed");

    assert_eq!(service.vote(&by_slug, "bob", 1).unwrap().votes, 1);
    assert_eq!(service.vote(&by_slug, "alice", 1).unwrap().votes, 2);
    assert_eq!(service.vote(&by_slug, "bob", -1).unwrap().votes, 0);
    assert_eq!(service.vote(&by_slug, "bob", -1).unwrap().votes, 0);
    assert_eq!(service.vote_total(t.id).unwrap(), 0);

    let err = service.vote(&by_slug, "nobody", 1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn concurrent_votes_converge() {
    let Some((_guard, service)) = database() else {
        return;
    };
    let t = thread(&service, "race");
    let voters: Vec<String> = (0..6).map(|i| format!("voter{}", i)).collect();
    for voter in &voters {
        service.create_user(user(voter)).unwrap();
    }

    let service = Arc::new(service);
    let handles: Vec<_> = voters
        .into_iter()
        .map(|voter| {
            let service = Arc::clone(&service);
            std_thread::spawn(move || {
                for round in 0..10 {
                    let voice = if round % 2 == 0 { -1 } else { 1 };
                    service.vote(&ThreadRef::ById(t.id), &voter, voice).unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(service.vote_total(t.id).unwrap(), 6);
    assert_eq!(service.thread(&ThreadRef::ById(t.id)).unwrap().votes, 6);
}

#[test]
fn clear_empties_everything() {
    let Some((_guard, service)) = database() else {
        return;
    };
    let t = thread(&service, "status");
    post(&service, &t, None);

    let status = service.status().unwrap();
    assert_eq!((status.user, status.forum, status.thread, status.post), (2, 1, 1, 1));

    service.clear().unwrap();
    let status = service.status().unwrap();
    assert_eq!((status.user, status.forum, status.thread, status.post), (0, 0, 0, 0));
}
