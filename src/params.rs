//! Turning raw query-string values into typed options.
//!
//! Bad values never fail a request; they fall back to the defaults.

use std::str::FromStr;

use log::debug;

use crate::models::{Page, Related, SortMode, DEFAULT_LIMIT};

impl<C: FromStr> Page<C> {
    /// Build a page from the raw `limit`, `since` and `desc` values.
    pub fn from_query(limit: Option<&str>, since: Option<&str>, desc: Option<&str>) -> Page<C> {
        let limit = match limit.map(str::parse::<i64>) {
            Some(Ok(limit)) if limit > 0 => limit,
            Some(_) => {
                debug!("Ignoring bad page limit {:?}", limit);
                DEFAULT_LIMIT
            }
            None => DEFAULT_LIMIT,
        };

        let since = since.and_then(|since| since.parse().ok());

        let desc = match desc {
            Some("true") => true,
            Some("false") | None => false,
            Some(other) => {
                debug!("Ignoring bad page direction {:?}", other);
                false
            }
        };

        Page { limit, since, desc }
    }
}

impl SortMode {
    pub fn from_query(sort: Option<&str>) -> SortMode {
        sort.and_then(|sort| sort.parse().ok()).unwrap_or_default()
    }
}

impl Related {
    /// Parse a comma-separated list of `user`, `thread` and `forum`.
    pub fn from_query(related: Option<&str>) -> Related {
        let mut parsed = Related::default();

        for token in related.unwrap_or_default().split(',') {
            match token.trim() {
                "user" => parsed.include_author = true,
                "thread" => parsed.include_thread = true,
                "forum" => parsed.include_forum = true,
                _ => (),
            }
        }

        parsed
    }
}
