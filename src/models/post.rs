//! Types related to posts.

use std::collections::HashMap;
use std::convert::Infallible;
use std::fmt;
use std::str::FromStr;

use chrono::offset::Utc;
use chrono::DateTime;

use diesel::sql_types::{BigInt, Integer};
use diesel::{insert_into, prelude::*, sql_query, update};

use log::debug;

use serde::{Deserialize, Serialize};

use crate::models::forum::{add_forum_users, bump_forum_counters};
use crate::models::user::check_users_exist;
use crate::models::{Database, Forum, Page, Thread, ThreadId, User};
use crate::schema::post;
use crate::store::PostStore;
use crate::tree;
use crate::{Error, Result};

/// A post ID.
pub type PostId = i32;

/// How many rows go into a single multi-row insert.
const INSERT_CHUNK: usize = 1000;

/// A user-made post.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Serialize)]
pub struct Post {
    /// The ID of the post.
    pub id: PostId,
    /// The post this one replies to, if any.
    pub parent: Option<PostId>,
    /// The IDs of every ancestor, root first, ending with this post's ID.
    #[serde(skip)]
    pub path: Vec<PostId>,
    /// The first element of `path`.
    #[serde(skip)]
    pub root: PostId,
    /// The nickname of the author.
    pub author: String,
    /// The contents of the post.
    pub message: String,
    /// Whether the message has been replaced since the post was made.
    #[serde(rename = "isEdited")]
    pub is_edited: bool,
    /// The forum of the post's thread.
    pub forum: String,
    /// The thread that this post was posted on.
    pub thread: ThreadId,
    /// When the post was created.
    pub created: DateTime<Utc>,
}

/// A post submitted for creation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct NewPost {
    pub author: String,
    #[serde(default)]
    pub parent: Option<PostId>,
    pub message: String,
}

impl NewPost {
    pub fn new<A, M>(author: A, parent: Option<PostId>, message: M) -> NewPost
    where
        A: Into<String>,
        M: Into<String>,
    {
        NewPost {
            author: author.into(),
            parent,
            message: message.into(),
        }
    }
}

/// A post row with its ID and path already decided.
#[derive(Debug, Insertable)]
#[diesel(table_name = post)]
struct PostRow<'a> {
    id: PostId,
    parent: Option<PostId>,
    path: Vec<PostId>,
    root: PostId,
    author: &'a str,
    message: &'a str,
    forum: &'a str,
    thread: ThreadId,
    created: DateTime<Utc>,
}

#[derive(Debug, QueryableByName)]
struct ReservedId {
    #[diesel(sql_type = Integer)]
    id: PostId,
}

/// An ordering of the posts in a thread.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SortMode {
    /// By ID.
    #[default]
    Flat,
    /// Depth-first, replies right after their parent.
    Tree,
    /// Like `Tree`, but paged by whole root posts.
    ParentTree,
}

impl fmt::Display for SortMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            SortMode::Flat => "flat",
            SortMode::Tree => "tree",
            SortMode::ParentTree => "parent_tree",
        };

        f.write_str(name)
    }
}

impl FromStr for SortMode {
    type Err = Infallible;

    /// Unknown names fall back to `Flat`.
    fn from_str(s: &str) -> std::result::Result<SortMode, Infallible> {
        Ok(match s {
            "tree" => SortMode::Tree,
            "parent_tree" => SortMode::ParentTree,
            _ => SortMode::Flat,
        })
    }
}

/// Which related objects to load along with a post.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Related {
    pub include_author: bool,
    pub include_thread: bool,
    pub include_forum: bool,
}

/// A post together with the related objects that were asked for.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostFull {
    pub post: Post,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<User>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread: Option<Thread>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forum: Option<Forum>,
}

/// Convenience function to convert from diesel's error type into our error
/// type, when we're querying for a post.
fn conv_post_error(post_id: PostId) -> impl FnOnce(diesel::result::Error) -> Error {
    move |e: diesel::result::Error| match e {
        diesel::result::Error::NotFound => Error::PostNotFound { post_id },
        _ => Error::from(e),
    }
}

/// Reserve `count` post IDs from the post sequence, in increasing order.
fn reserve_post_ids(conn: &mut PgConnection, count: usize) -> Result<Vec<PostId>> {
    let query = "SELECT nextval('post_id_seq')::int4 AS id FROM generate_series(1, $1)";

    let mut ids: Vec<PostId> = sql_query(query)
        .bind::<BigInt, _>(count as i64)
        .load::<ReservedId>(conn)?
        .into_iter()
        .map(|reserved| reserved.id)
        .collect();
    ids.sort_unstable();

    Ok(ids)
}

impl Database {
    fn flat_posts(
        &self,
        thread_id: ThreadId,
        page: &Page<PostId>,
        conn: &mut PgConnection,
    ) -> Result<Vec<Post>> {
        use crate::schema::post::columns::{id, thread};
        use crate::schema::post::dsl::post;

        let mut query = post.filter(thread.eq(thread_id)).into_boxed();

        query = match (page.since, page.desc) {
            (Some(since), false) => query.filter(id.gt(since)),
            (Some(since), true) => query.filter(id.lt(since)),
            (None, _) => query,
        };

        query = if page.desc {
            query.order(id.desc())
        } else {
            query.order(id.asc())
        };

        Ok(query.limit(page.limit).load(conn)?)
    }

    fn tree_posts(
        &self,
        thread_id: ThreadId,
        page: &Page<PostId>,
        conn: &mut PgConnection,
    ) -> Result<Vec<Post>> {
        use crate::schema::post::columns::{id, path, thread};
        use crate::schema::post::dsl::post;

        let mut query = post.filter(thread.eq(thread_id)).into_boxed();

        if let Some(since) = page.since {
            let cursor: Option<Vec<PostId>> = post
                .filter(thread.eq(thread_id))
                .filter(id.eq(since))
                .select(path)
                .first(conn)
                .optional()?;

            let cursor = match cursor {
                Some(cursor) => cursor,
                None => {
                    debug!("Tree cursor #{} isn't in thread #{}", since, thread_id);
                    return Ok(Vec::new());
                }
            };

            query = if page.desc {
                query.filter(path.lt(cursor))
            } else {
                query.filter(path.gt(cursor))
            };
        }

        query = if page.desc {
            query.order((path.desc(), id.desc()))
        } else {
            query.order((path.asc(), id.asc()))
        };

        Ok(query.limit(page.limit).load(conn)?)
    }

    fn parent_tree_posts(
        &self,
        thread_id: ThreadId,
        page: &Page<PostId>,
        conn: &mut PgConnection,
    ) -> Result<Vec<Post>> {
        use crate::schema::post::columns::{id, parent, path, root, thread};
        use crate::schema::post::dsl::post;

        let mut roots_query = post
            .filter(thread.eq(thread_id))
            .filter(parent.is_null())
            .select(id)
            .into_boxed();

        if let Some(since) = page.since {
            let cursor_root: Option<PostId> = post
                .filter(thread.eq(thread_id))
                .filter(id.eq(since))
                .select(root)
                .first(conn)
                .optional()?;

            let cursor_root = match cursor_root {
                Some(cursor_root) => cursor_root,
                None => {
                    debug!("Parent tree cursor #{} isn't in thread #{}", since, thread_id);
                    return Ok(Vec::new());
                }
            };

            roots_query = if page.desc {
                roots_query.filter(id.lt(cursor_root))
            } else {
                roots_query.filter(id.gt(cursor_root))
            };
        }

        roots_query = if page.desc {
            roots_query.order(id.desc())
        } else {
            roots_query.order(id.asc())
        };

        let roots: Vec<PostId> = roots_query.limit(page.limit).load(conn)?;

        if roots.is_empty() {
            return Ok(Vec::new());
        }

        let query = post.filter(root.eq_any(&roots)).into_boxed();

        let query = if page.desc {
            query.order((root.desc(), path.asc(), id.asc()))
        } else {
            query.order((root.asc(), path.asc(), id.asc()))
        };

        Ok(query.load(conn)?)
    }
}

impl PostStore for Database {
    fn post(&self, post_id: PostId) -> Result<Post> {
        use crate::schema::post::columns::id;
        use crate::schema::post::dsl::post;

        post.filter(id.eq(post_id))
            .first(&mut self.conn()?)
            .map_err(conv_post_error(post_id))
    }

    fn insert_posts(
        &self,
        target: &Thread,
        new_posts: &[NewPost],
        created: DateTime<Utc>,
    ) -> Result<Vec<Post>> {
        use crate::schema::post::columns::{id, path, thread};
        use crate::schema::post::dsl::post;

        if new_posts.is_empty() {
            return Ok(Vec::new());
        }

        self.conn()?.transaction::<_, Error, _>(|conn| {
            let mut authors: Vec<String> = Vec::new();
            for new_post in new_posts {
                if !authors.contains(&new_post.author) {
                    authors.push(new_post.author.clone());
                }
            }
            check_users_exist(conn, &authors)?;

            let parent_ids: Vec<PostId> = new_posts.iter().filter_map(|p| p.parent).collect();

            let parents: HashMap<PostId, Vec<PostId>> = if parent_ids.is_empty() {
                HashMap::new()
            } else {
                post.filter(thread.eq(target.id))
                    .filter(id.eq_any(&parent_ids))
                    .select((id, path))
                    .load::<(PostId, Vec<PostId>)>(conn)?
                    .into_iter()
                    .collect()
            };

            if let Some(&parent_id) = parent_ids.iter().find(|pid| !parents.contains_key(*pid)) {
                return Err(Error::ParentNotInThread {
                    parent_id,
                    thread_id: target.id,
                });
            }

            let ids = reserve_post_ids(conn, new_posts.len())?;

            let rows: Vec<PostRow> = new_posts
                .iter()
                .zip(ids)
                .map(|(new_post, post_id)| {
                    let parent_path = new_post
                        .parent
                        .and_then(|pid| parents.get(&pid))
                        .map(Vec::as_slice);
                    let path_value = tree::child_path(parent_path, post_id);

                    PostRow {
                        id: post_id,
                        parent: new_post.parent,
                        root: tree::root_of(&path_value, post_id),
                        path: path_value,
                        author: &new_post.author,
                        message: &new_post.message,
                        forum: &target.forum,
                        thread: target.id,
                        created,
                    }
                })
                .collect();

            let mut inserted: Vec<Post> = Vec::with_capacity(rows.len());
            for chunk in rows.chunks(INSERT_CHUNK) {
                inserted.extend(insert_into(post).values(chunk).get_results::<Post>(conn)?);
            }
            inserted.sort_by_key(|p| p.id);

            bump_forum_counters(conn, &target.forum, 0, inserted.len() as i64)?;
            add_forum_users(conn, &target.forum, &authors)?;

            Ok(inserted)
        })
    }

    fn update_post(&self, post_id: PostId, new_message: &str) -> Result<Post> {
        use crate::schema::post::columns::{id, is_edited, message};
        use crate::schema::post::dsl::post;

        self.conn()?.transaction::<_, Error, _>(|conn| {
            let current: Post = post
                .filter(id.eq(post_id))
                .for_update()
                .first(conn)
                .map_err(conv_post_error(post_id))?;

            if new_message.is_empty() || new_message == current.message {
                return Ok(current);
            }

            Ok(update(post.filter(id.eq(post_id)))
                .set((message.eq(new_message), is_edited.eq(true)))
                .get_result(conn)?)
        })
    }

    fn thread_posts(
        &self,
        thread_id: ThreadId,
        page: &Page<PostId>,
        sort: SortMode,
    ) -> Result<Vec<Post>> {
        let mut conn = self.conn()?;

        match sort {
            SortMode::Flat => self.flat_posts(thread_id, page, &mut conn),
            SortMode::Tree => self.tree_posts(thread_id, page, &mut conn),
            SortMode::ParentTree => self.parent_tree_posts(thread_id, page, &mut conn),
        }
    }
}
