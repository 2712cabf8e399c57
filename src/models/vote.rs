//! Types related to votes.

use diesel::dsl::sum;
use diesel::pg::upsert::excluded;
use diesel::{insert_into, prelude::*, update};

use serde::{Deserialize, Serialize};

use crate::models::thread::conv_thread_error;
use crate::models::user::find_user;
use crate::models::{Database, Thread, ThreadId, ThreadRef};
use crate::schema::vote;
use crate::store::VoteStore;
use crate::{Error, Result};

/// A user's opinion of a thread.
#[derive(Debug, Clone, PartialEq, Eq, Queryable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = vote)]
pub struct Vote {
    /// The nickname of the voter.
    pub nickname: String,
    /// The thread being voted on.
    #[serde(default)]
    pub thread: ThreadId,
    /// Either 1 or -1.
    pub voice: i32,
}

impl VoteStore for Database {
    fn cast_vote(&self, cast: &Vote) -> Result<Thread> {
        use crate::schema::thread::columns as thread_columns;
        use crate::schema::thread::dsl::thread as thread_table;
        use crate::schema::vote::columns::{nickname, thread, voice};
        use crate::schema::vote::dsl::vote;

        self.conn()?.transaction::<_, Error, _>(|conn| {
            thread_table
                .filter(thread_columns::id.eq(cast.thread))
                .select(thread_columns::id)
                .for_update()
                .first::<ThreadId>(conn)
                .map_err(conv_thread_error(ThreadRef::ById(cast.thread)))?;

            find_user(conn, &cast.nickname)?;

            insert_into(vote)
                .values(cast)
                .on_conflict((nickname, thread))
                .do_update()
                .set(voice.eq(excluded(voice)))
                .execute(conn)?;

            let total: Option<i64> = vote
                .filter(thread.eq(cast.thread))
                .select(sum(voice))
                .first(conn)?;

            Ok(update(thread_table.filter(thread_columns::id.eq(cast.thread)))
                .set(thread_columns::votes.eq(total.unwrap_or(0) as i32))
                .get_result(conn)?)
        })
    }

    fn vote_total(&self, thread_id: ThreadId) -> Result<i64> {
        use crate::schema::vote::columns::{thread, voice};
        use crate::schema::vote::dsl::vote;

        let total: Option<i64> = vote
            .filter(thread.eq(thread_id))
            .select(sum(voice))
            .first(&mut self.conn()?)?;

        Ok(total.unwrap_or(0))
    }
}
