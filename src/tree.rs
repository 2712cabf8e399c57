//! Materialized paths and the orderings of a thread's posts.
//!
//! A post's path lists the IDs of its ancestors, root first, and ends with
//! its own ID. Comparing paths as integer sequences (a prefix sorts before
//! everything it is a prefix of) gives a depth-first order of the thread,
//! which is how PostgreSQL compares `integer[]` values too.
//!
//! The functions here work on the posts of a single thread held in memory.

use std::cmp::Ordering;

use crate::models::{Page, Post, PostId, SortMode};

/// The path of a new post with the given parent path.
pub fn child_path(parent: Option<&[PostId]>, id: PostId) -> Vec<PostId> {
    let mut path = parent.map(<[PostId]>::to_vec).unwrap_or_default();
    path.push(id);
    path
}

/// The root of a path. An empty path is its own root, `id`.
pub fn root_of(path: &[PostId], id: PostId) -> PostId {
    path.first().copied().unwrap_or(id)
}

fn limit(page: &Page<PostId>) -> usize {
    page.limit.max(0) as usize
}

fn by_id(a: &Post, b: &Post) -> Ordering {
    a.id.cmp(&b.id)
}

fn by_path(a: &Post, b: &Post) -> Ordering {
    a.path.cmp(&b.path).then(a.id.cmp(&b.id))
}

/// Posts by ID. The cursor is an exclusive ID bound.
pub fn flat(posts: &[Post], page: &Page<PostId>) -> Vec<Post> {
    let mut selected: Vec<&Post> = posts
        .iter()
        .filter(|post| match page.since {
            Some(since) if page.desc => post.id < since,
            Some(since) => post.id > since,
            None => true,
        })
        .collect();

    if page.desc {
        selected.sort_by(|a, b| by_id(b, a));
    } else {
        selected.sort_by(|a, b| by_id(a, b));
    }

    selected.into_iter().take(limit(page)).cloned().collect()
}

/// Posts in depth-first order, a reply right after its parent and any
/// earlier siblings' subtrees. The cursor is the ID of a post; the page
/// starts after that post's path. An unknown cursor gives an empty page.
pub fn tree(posts: &[Post], page: &Page<PostId>) -> Vec<Post> {
    let cursor = match page.since {
        Some(since) => match posts.iter().find(|post| post.id == since) {
            Some(cursor) => Some(&cursor.path),
            None => return Vec::new(),
        },
        None => None,
    };

    let mut selected: Vec<&Post> = posts
        .iter()
        .filter(|post| match cursor {
            Some(cursor) if page.desc => post.path < *cursor,
            Some(cursor) => post.path > *cursor,
            None => true,
        })
        .collect();

    if page.desc {
        selected.sort_by(|a, b| by_path(b, a));
    } else {
        selected.sort_by(|a, b| by_path(a, b));
    }

    selected.into_iter().take(limit(page)).cloned().collect()
}

/// Whole root subtrees, `page.limit` roots at a time.
///
/// Groups are ordered by root in the page's direction; inside a group the
/// posts are always in ascending depth-first order. The cursor is the ID of
/// any post, and paging resumes after that post's root.
pub fn parent_tree(posts: &[Post], page: &Page<PostId>) -> Vec<Post> {
    let cursor_root = match page.since {
        Some(since) => match posts.iter().find(|post| post.id == since) {
            Some(cursor) => Some(cursor.root),
            None => return Vec::new(),
        },
        None => None,
    };

    let mut roots: Vec<PostId> = posts
        .iter()
        .filter(|post| post.parent.is_none())
        .map(|post| post.id)
        .filter(|&id| match cursor_root {
            Some(cursor_root) if page.desc => id < cursor_root,
            Some(cursor_root) => id > cursor_root,
            None => true,
        })
        .collect();

    if page.desc {
        roots.sort_unstable_by(|a, b| b.cmp(a));
    } else {
        roots.sort_unstable();
    }
    roots.truncate(limit(page));

    let mut selected: Vec<&Post> = posts
        .iter()
        .filter(|post| roots.contains(&post.root))
        .collect();

    selected.sort_by(|a, b| {
        let by_root = if page.desc {
            b.root.cmp(&a.root)
        } else {
            a.root.cmp(&b.root)
        };

        by_root.then_with(|| by_path(a, b))
    });

    selected.into_iter().cloned().collect()
}

/// A page of posts in the given order.
pub fn page(posts: &[Post], page: &Page<PostId>, sort: SortMode) -> Vec<Post> {
    match sort {
        SortMode::Flat => flat(posts, page),
        SortMode::Tree => tree(posts, page),
        SortMode::ParentTree => parent_tree(posts, page),
    }
}
