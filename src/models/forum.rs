//! Types related to forums.

use diesel::sql_types::{BigInt, Nullable, Text};
use diesel::{insert_into, prelude::*, sql_query, update};

use serde::{Deserialize, Serialize};

use crate::models::{lower, Database, Page, User};
use crate::schema::forum;
use crate::store::ForumStore;
use crate::{Error, Result};

/// A collection of threads about a similar topic.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Serialize)]
pub struct Forum {
    /// The unique name of the forum, used in URLs.
    pub slug: String,
    /// The title of the forum.
    pub title: String,
    /// The nickname of the user that created the forum.
    #[serde(rename = "user")]
    pub owner: String,
    /// How many posts have been made in the forum.
    pub posts: i64,
    /// How many threads have been made in the forum.
    pub threads: i64,
}

/// A new forum to be inserted in the database.
#[derive(Debug, Clone, Insertable, Deserialize)]
#[diesel(table_name = forum)]
pub struct NewForum {
    pub slug: String,
    pub title: String,
    #[serde(rename = "user")]
    pub owner: String,
}

impl From<NewForum> for Forum {
    fn from(new_forum: NewForum) -> Forum {
        Forum {
            slug: new_forum.slug,
            title: new_forum.title,
            owner: new_forum.owner,
            posts: 0,
            threads: 0,
        }
    }
}

/// Convenience function to convert from diesel's error type into our error
/// type, when we're querying for a forum.
fn conv_forum_error<S>(slug: S) -> impl FnOnce(diesel::result::Error) -> Error
where
    S: Into<String>,
{
    move |e: diesel::result::Error| match e {
        diesel::result::Error::NotFound => Error::ForumNotFound { slug: slug.into() },
        _ => Error::from(e),
    }
}

/// Record that a user has been active in a forum.
pub(crate) fn add_forum_users(
    conn: &mut PgConnection,
    forum_slug: &str,
    nicknames: &[String],
) -> Result<()> {
    use crate::schema::forum_user::columns::{forum, nickname};
    use crate::schema::forum_user::dsl::forum_user;

    if nicknames.is_empty() {
        return Ok(());
    }

    let rows: Vec<_> = nicknames
        .iter()
        .map(|name| (forum.eq(forum_slug), nickname.eq(name)))
        .collect();

    insert_into(forum_user)
        .values(&rows)
        .on_conflict_do_nothing()
        .execute(conn)?;

    Ok(())
}

/// Bump a forum's counters by the given amounts.
pub(crate) fn bump_forum_counters(
    conn: &mut PgConnection,
    forum_slug: &str,
    new_threads: i64,
    new_posts: i64,
) -> Result<()> {
    use crate::schema::forum::columns::{posts, slug, threads};
    use crate::schema::forum::dsl::forum;

    update(forum.filter(slug.eq(forum_slug)))
        .set((threads.eq(threads + new_threads), posts.eq(posts + new_posts)))
        .execute(conn)?;

    Ok(())
}

impl ForumStore for Database {
    fn forum(&self, forum_slug: &str) -> Result<Forum> {
        use crate::schema::forum::columns::slug;
        use crate::schema::forum::dsl::forum;

        forum
            .filter(lower(slug).eq(lower(forum_slug)))
            .first(&mut self.conn()?)
            .map_err(conv_forum_error(forum_slug))
    }

    fn insert_forum(&self, new_forum: &NewForum) -> Result<Forum> {
        use crate::schema::forum::dsl::forum;

        Ok(insert_into(forum)
            .values(new_forum)
            .get_result(&mut self.conn()?)?)
    }

    fn forum_users(&self, forum_slug: &str, page: &Page<String>) -> Result<Vec<User>> {
        let query = if page.desc {
            "SELECT U.nickname, U.fullname, U.about, U.email \
               FROM users U \
               JOIN forum_user F ON F.nickname = U.nickname \
              WHERE F.forum = $1 \
                AND ($2 IS NULL OR U.nickname COLLATE \"C\" < $2) \
           ORDER BY U.nickname COLLATE \"C\" DESC \
              LIMIT $3"
        } else {
            "SELECT U.nickname, U.fullname, U.about, U.email \
               FROM users U \
               JOIN forum_user F ON F.nickname = U.nickname \
              WHERE F.forum = $1 \
                AND ($2 IS NULL OR U.nickname COLLATE \"C\" > $2) \
           ORDER BY U.nickname COLLATE \"C\" ASC \
              LIMIT $3"
        };

        Ok(sql_query(query)
            .bind::<Text, _>(forum_slug)
            .bind::<Nullable<Text>, _>(page.since.as_deref())
            .bind::<BigInt, _>(page.limit)
            .load(&mut self.conn()?)?)
    }
}
