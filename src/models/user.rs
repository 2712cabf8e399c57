//! Types related to users.

use diesel::{insert_into, prelude::*, update};

use serde::{Deserialize, Serialize};

use crate::models::{lower, Database};
use crate::schema::users;
use crate::store::UserStore;
use crate::{Error, Result};

/// A forum member.
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    Queryable,
    QueryableByName,
    Insertable,
    Serialize,
    Deserialize,
)]
#[diesel(table_name = users)]
pub struct User {
    /// The unique, case-sensitive name of the user.
    pub nickname: String,
    /// The user's full name.
    pub fullname: String,
    /// A short biography.
    #[serde(default)]
    pub about: String,
    /// The user's e-mail address. Unique regardless of case.
    pub email: String,
}

/// A change to a user's profile. Fields left as `None` keep their value.
#[derive(Debug, Default, Clone, PartialEq, Eq, AsChangeset, Deserialize)]
#[diesel(table_name = users)]
pub struct UserUpdate {
    pub fullname: Option<String>,
    pub about: Option<String>,
    pub email: Option<String>,
}

impl UserUpdate {
    /// Drop empty strings, which mean "leave unchanged".
    pub fn normalized(self) -> UserUpdate {
        fn keep(field: Option<String>) -> Option<String> {
            field.filter(|value| !value.is_empty())
        }

        UserUpdate {
            fullname: keep(self.fullname),
            about: keep(self.about),
            email: keep(self.email),
        }
    }

    /// Whether the update changes nothing.
    pub fn is_empty(&self) -> bool {
        self.fullname.is_none() && self.about.is_none() && self.email.is_none()
    }

    /// Apply the update to a user in memory.
    pub fn apply(&self, user: &mut User) {
        if let Some(ref fullname) = self.fullname {
            user.fullname = fullname.clone();
        }
        if let Some(ref about) = self.about {
            user.about = about.clone();
        }
        if let Some(ref email) = self.email {
            user.email = email.clone();
        }
    }
}

/// Convenience function to convert from diesel's error type into our error
/// type, when we're querying for a user.
fn conv_user_error<S>(nickname: S) -> impl FnOnce(diesel::result::Error) -> Error
where
    S: Into<String>,
{
    move |e: diesel::result::Error| match e {
        diesel::result::Error::NotFound => Error::UserNotFound {
            nickname: nickname.into(),
        },
        _ => Error::from(e),
    }
}

/// Get a user on an open connection.
pub(crate) fn find_user(conn: &mut PgConnection, name: &str) -> Result<User> {
    use crate::schema::users::columns::nickname;
    use crate::schema::users::dsl::users;

    users
        .filter(nickname.eq(name))
        .first(conn)
        .map_err(conv_user_error(name))
}

/// Check that every nickname belongs to a user.
///
/// Fails with the first unknown nickname, in the order given.
pub(crate) fn check_users_exist(conn: &mut PgConnection, names: &[String]) -> Result<()> {
    use crate::schema::users::columns::nickname;
    use crate::schema::users::dsl::users;

    let found: Vec<String> = users
        .filter(nickname.eq_any(names))
        .select(nickname)
        .load(conn)?;

    match names.iter().find(|name| !found.contains(name)) {
        Some(missing) => Err(Error::UserNotFound {
            nickname: missing.clone(),
        }),
        None => Ok(()),
    }
}

impl UserStore for Database {
    fn user(&self, name: &str) -> Result<User> {
        let mut conn = self.conn()?;
        find_user(&mut conn, name)
    }

    fn users_conflicting(&self, name: &str, mail: &str) -> Result<Vec<User>> {
        use crate::schema::users::columns::{email, nickname};
        use crate::schema::users::dsl::users;

        Ok(users
            .filter(nickname.eq(name).or(lower(email).eq(lower(mail))))
            .order(nickname.asc())
            .limit(2)
            .load(&mut self.conn()?)?)
    }

    fn insert_user(&self, new_user: &User) -> Result<()> {
        use crate::schema::users::dsl::users;

        insert_into(users)
            .values(new_user)
            .execute(&mut self.conn()?)?;

        Ok(())
    }

    fn update_user(&self, name: &str, changes: &UserUpdate) -> Result<User> {
        use crate::schema::users::columns::{email, nickname};
        use crate::schema::users::dsl::users;

        self.conn()?.transaction::<_, Error, _>(|conn| {
            let current = find_user(conn, name)?;

            if changes.is_empty() {
                return Ok(current);
            }

            if let Some(ref mail) = changes.email {
                let owner: Option<String> = users
                    .filter(lower(email).eq(lower(mail.as_str())))
                    .filter(nickname.ne(name))
                    .select(nickname)
                    .first(conn)
                    .optional()?;

                if let Some(owner) = owner {
                    return Err(Error::EmailTaken {
                        email: mail.clone(),
                        owner,
                    });
                }
            }

            Ok(update(users.filter(nickname.eq(name)))
                .set(changes)
                .get_result(conn)?)
        })
    }
}
