use diesel::prelude::*;

use super::Query;
use crate::error::{Error, Result};
use crate::models::{NewReview, Review, ReviewRecord};
use crate::schema::{reviews, user_reviews};

const REVIEW_COLUMNS: (
    reviews::id,
    reviews::beer_id,
    reviews::user_id,
    reviews::rating,
    reviews::review,
    reviews::tastes,
    reviews::created_at,
) = (
    reviews::id,
    reviews::beer_id,
    reviews::user_id,
    reviews::rating,
    reviews::review,
    reviews::tastes,
    reviews::created_at,
);

fn into_reviews(records: Vec<ReviewRecord>) -> Result<Vec<Review>> {
    records
        .into_iter()
        .map(|record| record.into_review().map_err(Error::from))
        .collect()
}

/*************************************/
/** Create / delete                 **/
/*************************************/

/// Writes a review and its author's back-reference in one transaction.
///
/// Yields `false`, writing nothing, when the author already has a review
/// for the same beer.
pub struct InsertReview {
    pub username: String,
    pub review: Review,
}

impl Query for InsertReview {
    type Item = bool;

    fn execute(&self, conn: &mut SqliteConnection) -> Result<bool> {
        let review = &self.review;
        let new_review = NewReview {
            id: &review.id,
            beer_id: &review.beer_id,
            user_id: &review.user_id,
            rating: review.rating,
            review: &review.review,
            tastes: serde_json::to_string(&review.tastes)?,
            created_at: review.created_at,
        };

        conn.immediate_transaction::<_, Error, _>(|conn| {
            let inserted = diesel::insert_or_ignore_into(reviews::table)
                .values(&new_review)
                .execute(conn)?;

            if inserted == 0 {
                return Ok(false);
            }

            diesel::insert_into(user_reviews::table)
                .values((
                    user_reviews::username.eq(&self.username),
                    user_reviews::review_id.eq(&review.id),
                ))
                .execute(conn)?;

            Ok(true)
        })
    }
}

/// Deletes a review and every back-reference to it in one transaction.
/// Yields whether the review existed.
pub struct DeleteReview {
    pub review_id: String,
}

impl Query for DeleteReview {
    type Item = bool;

    fn execute(&self, conn: &mut SqliteConnection) -> Result<bool> {
        conn.immediate_transaction::<_, Error, _>(|conn| {
            let deleted = diesel::delete(reviews::table.filter(reviews::id.eq(&self.review_id)))
                .execute(conn)?;

            diesel::delete(user_reviews::table.filter(user_reviews::review_id.eq(&self.review_id)))
                .execute(conn)?;

            Ok(deleted > 0)
        })
    }
}

/*************************************/
/** Lookups                         **/
/*************************************/

pub struct FindReview {
    pub id: String,
}

impl Query for FindReview {
    type Item = Option<Review>;

    fn execute(&self, conn: &mut SqliteConnection) -> Result<Option<Review>> {
        let record = reviews::table
            .filter(reviews::id.eq(&self.id))
            .select(REVIEW_COLUMNS)
            .first::<ReviewRecord>(conn)
            .optional()?;

        Ok(record.map(ReviewRecord::into_review).transpose()?)
    }
}

/// Reviews whose id is in `ids`, oldest first. Unknown ids are skipped.
pub struct FindReviewsByIds {
    pub ids: Vec<String>,
}

impl Query for FindReviewsByIds {
    type Item = Vec<Review>;

    fn execute(&self, conn: &mut SqliteConnection) -> Result<Vec<Review>> {
        let records = reviews::table
            .filter(reviews::id.eq_any(&self.ids))
            .order(reviews::seq.asc())
            .select(REVIEW_COLUMNS)
            .load::<ReviewRecord>(conn)?;

        into_reviews(records)
    }
}

pub struct FindReviewsForBeer {
    pub beer_id: String,
}

impl Query for FindReviewsForBeer {
    type Item = Vec<Review>;

    fn execute(&self, conn: &mut SqliteConnection) -> Result<Vec<Review>> {
        let records = reviews::table
            .filter(reviews::beer_id.eq(&self.beer_id))
            .order(reviews::seq.asc())
            .select(REVIEW_COLUMNS)
            .load::<ReviewRecord>(conn)?;

        into_reviews(records)
    }
}

/// Every review written by the user with id `user_id`, whether or not the
/// user's back-references point at it.
pub struct FindReviewsByAuthor {
    pub user_id: String,
}

impl Query for FindReviewsByAuthor {
    type Item = Vec<Review>;

    fn execute(&self, conn: &mut SqliteConnection) -> Result<Vec<Review>> {
        let records = reviews::table
            .filter(reviews::user_id.eq(&self.user_id))
            .order(reviews::seq.asc())
            .select(REVIEW_COLUMNS)
            .load::<ReviewRecord>(conn)?;

        into_reviews(records)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::store::testing::temp_store;
    use crate::store::{FindUser, InsertUser, Store};

    fn review(id: &str, beer_id: &str, user_id: &str) -> Review {
        Review {
            id: id.into(),
            beer_id: beer_id.into(),
            rating: 4,
            review: "Bright and resinous".into(),
            tastes: vec!["pine".into(), "citrus".into()],
            user_id: user_id.into(),
            created_at: Utc::now().naive_utc(),
        }
    }

    fn store_with_user() -> (tempfile::TempDir, Store) {
        let (dir, store) = temp_store();
        store
            .run(InsertUser {
                username: "ada".into(),
                id: "u-ada".into(),
                password: "hash".into(),
                created_at: Utc::now().naive_utc(),
            })
            .unwrap();

        (dir, store)
    }

    #[test]
    fn insert_writes_review_and_back_reference() {
        let (_dir, store) = store_with_user();

        assert!(store
            .run(InsertReview {
                username: "ada".into(),
                review: review("r1", "1", "u-ada"),
            })
            .unwrap());

        let user = store.run(FindUser { username: "ada".into() }).unwrap().unwrap();
        assert_eq!(user.reviews, vec!["r1"]);

        let stored = store.run(FindReview { id: "r1".into() }).unwrap().unwrap();
        assert_eq!(stored.tastes, vec!["pine", "citrus"]);
    }

    #[test]
    fn second_review_of_same_beer_writes_nothing() {
        let (_dir, store) = store_with_user();

        store
            .run(InsertReview {
                username: "ada".into(),
                review: review("r1", "1", "u-ada"),
            })
            .unwrap();
        let inserted = store
            .run(InsertReview {
                username: "ada".into(),
                review: review("r2", "1", "u-ada"),
            })
            .unwrap();

        assert!(!inserted);
        assert!(store.run(FindReview { id: "r2".into() }).unwrap().is_none());
        let user = store.run(FindUser { username: "ada".into() }).unwrap().unwrap();
        assert_eq!(user.reviews, vec!["r1"]);
    }

    #[test]
    fn delete_removes_review_and_back_reference() {
        let (_dir, store) = store_with_user();
        store
            .run(InsertReview {
                username: "ada".into(),
                review: review("r1", "1", "u-ada"),
            })
            .unwrap();

        assert!(store.run(DeleteReview { review_id: "r1".into() }).unwrap());
        assert!(!store.run(DeleteReview { review_id: "r1".into() }).unwrap());

        let user = store.run(FindUser { username: "ada".into() }).unwrap().unwrap();
        assert!(user.reviews.is_empty());
        assert!(store
            .run(FindReviewsForBeer { beer_id: "1".into() })
            .unwrap()
            .is_empty());
    }
}
