use chrono::NaiveDateTime;
use diesel::prelude::*;
use std::collections::HashMap;

use super::Query;
use crate::error::Result;
use crate::models::{NewUser, Session, User, UserRecord};
use crate::schema::{favorites, login_session, user_reviews, users};

/*************************************/
/** Users                           **/
/*************************************/

/// Inserts a user. Yields `false` when the username is already taken.
pub struct InsertUser {
    pub username: String,
    pub id: String,
    pub password: String,
    pub created_at: NaiveDateTime,
}

impl Query for InsertUser {
    type Item = bool;

    fn execute(&self, conn: &mut SqliteConnection) -> Result<bool> {
        let new_user = NewUser {
            username: &self.username,
            id: &self.id,
            password: &self.password,
            created_at: self.created_at,
        };

        let inserted = diesel::insert_or_ignore_into(users::table)
            .values(&new_user)
            .execute(conn)?;

        Ok(inserted == 1)
    }
}

pub struct FindUser {
    pub username: String,
}

impl Query for FindUser {
    type Item = Option<User>;

    fn execute(&self, conn: &mut SqliteConnection) -> Result<Option<User>> {
        let record = users::table
            .filter(users::username.eq(&self.username))
            .select((users::username, users::id, users::password, users::created_at))
            .first::<UserRecord>(conn)
            .optional()?;

        let record = match record {
            Some(record) => record,
            None => return Ok(None),
        };

        let fav_beers = favorites::table
            .filter(favorites::username.eq(&self.username))
            .order(favorites::seq.asc())
            .select(favorites::beer_id)
            .load::<String>(conn)?;

        let reviews = user_reviews::table
            .filter(user_reviews::username.eq(&self.username))
            .order(user_reviews::seq.asc())
            .select(user_reviews::review_id)
            .load::<String>(conn)?;

        Ok(Some(record.into_user(fav_beers, reviews)))
    }
}

/// Resolves user ids to usernames. Ids with no matching user are absent
/// from the result.
pub struct FindUsernames {
    pub ids: Vec<String>,
}

impl Query for FindUsernames {
    type Item = HashMap<String, String>;

    fn execute(&self, conn: &mut SqliteConnection) -> Result<HashMap<String, String>> {
        let pairs = users::table
            .filter(users::id.eq_any(&self.ids))
            .select((users::id, users::username))
            .load::<(String, String)>(conn)?;

        Ok(pairs.into_iter().collect())
    }
}

/*************************************/
/** Favourites                      **/
/*************************************/

/// Appends a favourite unless it is already present. Yields whether a row
/// was added.
pub struct AddFavorite {
    pub username: String,
    pub beer_id: String,
}

impl Query for AddFavorite {
    type Item = bool;

    fn execute(&self, conn: &mut SqliteConnection) -> Result<bool> {
        let inserted = diesel::insert_or_ignore_into(favorites::table)
            .values((
                favorites::username.eq(&self.username),
                favorites::beer_id.eq(&self.beer_id),
            ))
            .execute(conn)?;

        Ok(inserted == 1)
    }
}

/// Removes a favourite if present. Yields whether a row was removed.
pub struct RemoveFavorite {
    pub username: String,
    pub beer_id: String,
}

impl Query for RemoveFavorite {
    type Item = bool;

    fn execute(&self, conn: &mut SqliteConnection) -> Result<bool> {
        let deleted = diesel::delete(
            favorites::table
                .filter(favorites::username.eq(&self.username))
                .filter(favorites::beer_id.eq(&self.beer_id)),
        )
        .execute(conn)?;

        Ok(deleted > 0)
    }
}

/*************************************/
/** Review back-references          **/
/*************************************/

pub struct LinkReview {
    pub username: String,
    pub review_id: String,
}

impl Query for LinkReview {
    type Item = bool;

    fn execute(&self, conn: &mut SqliteConnection) -> Result<bool> {
        let inserted = diesel::insert_or_ignore_into(user_reviews::table)
            .values((
                user_reviews::username.eq(&self.username),
                user_reviews::review_id.eq(&self.review_id),
            ))
            .execute(conn)?;

        Ok(inserted == 1)
    }
}

pub struct UnlinkReviews {
    pub username: String,
    pub review_ids: Vec<String>,
}

impl Query for UnlinkReviews {
    type Item = usize;

    fn execute(&self, conn: &mut SqliteConnection) -> Result<usize> {
        Ok(diesel::delete(
            user_reviews::table
                .filter(user_reviews::username.eq(&self.username))
                .filter(user_reviews::review_id.eq_any(&self.review_ids)),
        )
        .execute(conn)?)
    }
}

/*************************************/
/** Login sessions                  **/
/*************************************/

pub struct InsertSession(pub Session);

impl Query for InsertSession {
    type Item = ();

    fn execute(&self, conn: &mut SqliteConnection) -> Result<()> {
        diesel::insert_into(login_session::table)
            .values(&self.0)
            .execute(conn)?;

        Ok(())
    }
}

pub struct FindSession {
    pub token: String,
}

impl Query for FindSession {
    type Item = Option<Session>;

    fn execute(&self, conn: &mut SqliteConnection) -> Result<Option<Session>> {
        Ok(login_session::table
            .filter(login_session::id.eq(&self.token))
            .first::<Session>(conn)
            .optional()?)
    }
}

/// Deletes every session that expired at or before `now`. Yields the number
/// of sessions removed.
pub struct PurgeSessions {
    pub now: NaiveDateTime,
}

impl Query for PurgeSessions {
    type Item = usize;

    fn execute(&self, conn: &mut SqliteConnection) -> Result<usize> {
        Ok(diesel::delete(
            login_session::table.filter(login_session::expires_at.le(self.now)),
        )
        .execute(conn)?)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use std::thread;

    use super::*;
    use crate::store::testing::temp_store;
    use chrono::Duration;

    fn insert_user(store: &crate::store::Store, username: &str) -> bool {
        store
            .run(InsertUser {
                username: username.into(),
                id: format!("id-{}", username),
                password: "hash".into(),
                created_at: Utc::now().naive_utc(),
            })
            .unwrap()
    }

    #[test]
    fn duplicate_username_is_not_inserted() {
        let (_dir, store) = temp_store();

        assert!(insert_user(&store, "ada"));
        assert!(!insert_user(&store, "ada"));
    }

    #[test]
    fn favourites_keep_insertion_order_without_duplicates() {
        let (_dir, store) = temp_store();
        insert_user(&store, "ada");

        for beer_id in ["3", "1", "3", "2"] {
            store
                .run(AddFavorite {
                    username: "ada".into(),
                    beer_id: beer_id.into(),
                })
                .unwrap();
        }

        let user = store.run(FindUser { username: "ada".into() }).unwrap().unwrap();
        assert_eq!(user.fav_beers, vec!["3", "1", "2"]);

        assert!(store
            .run(RemoveFavorite {
                username: "ada".into(),
                beer_id: "1".into()
            })
            .unwrap());
        assert!(!store
            .run(RemoveFavorite {
                username: "ada".into(),
                beer_id: "1".into()
            })
            .unwrap());
    }

    #[test]
    fn concurrent_favourite_adds_are_not_lost() {
        let (_dir, store) = temp_store();
        insert_user(&store, "ada");

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                thread::spawn(move || {
                    store
                        .run(AddFavorite {
                            username: "ada".into(),
                            beer_id: i.to_string(),
                        })
                        .unwrap()
                })
            })
            .collect();

        for handle in handles {
            assert!(handle.join().unwrap());
        }

        let user = store.run(FindUser { username: "ada".into() }).unwrap().unwrap();
        assert_eq!(user.fav_beers.len(), 8);
    }

    #[test]
    fn usernames_resolve_by_id() {
        let (_dir, store) = temp_store();
        insert_user(&store, "ada");

        let names = store
            .run(FindUsernames {
                ids: vec!["id-ada".into(), "id-ghost".into()],
            })
            .unwrap();

        assert_eq!(names.get("id-ada").map(String::as_str), Some("ada"));
        assert!(!names.contains_key("id-ghost"));
    }

    #[test]
    fn purge_removes_only_expired_sessions() {
        let (_dir, store) = temp_store();
        let now = Utc::now().naive_utc();
        let session = |token: &str, expires_at| Session {
            token: token.into(),
            username: "ada".into(),
            created_at: now,
            expires_at,
        };

        store.run(InsertSession(session("old", Some(now - Duration::hours(1))))).unwrap();
        store.run(InsertSession(session("fresh", Some(now + Duration::hours(1))))).unwrap();
        store.run(InsertSession(session("forever", None))).unwrap();

        assert_eq!(store.run(PurgeSessions { now }).unwrap(), 1);

        let exists = |token: &str| {
            store
                .run(FindSession { token: token.into() })
                .unwrap()
                .is_some()
        };
        assert!(!exists("old"));
        assert!(exists("fresh"));
        assert!(exists("forever"));
    }
}
