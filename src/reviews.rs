//! The review ledger.
//!
//! A review lives in the `reviews` collection and is referenced from its
//! author's back-reference list. Both are written together in one store
//! transaction; [`ReviewLedger::reviews_for_user`] additionally reconciles
//! the two before reading, so a reference to a missing review is dropped and
//! a review its author no longer references is linked again.

use chrono::Utc;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use super::error::{Error, Result};
use super::models::{Review, ReviewForm, ReviewWithBeer, ReviewWithUser, User};
use super::store::{
    DeleteReview, FindBeer, FindBeersByIds, FindReview, FindReviewsByAuthor, FindReviewsByIds,
    FindReviewsForBeer, FindUser, FindUsernames, InsertReview, LinkReview, Store, UnlinkReviews,
};

#[derive(Clone)]
pub struct ReviewLedger {
    store: Store,
}

impl ReviewLedger {
    pub fn new(store: Store) -> ReviewLedger {
        ReviewLedger { store }
    }

    fn user(&self, username: &str) -> Result<User> {
        self.store
            .run(FindUser {
                username: username.to_owned(),
            })?
            .ok_or_else(|| Error::UserNotFound(username.to_owned()))
    }

    fn require_beer(&self, beer_id: &str) -> Result<()> {
        self.store
            .run(FindBeer {
                id: beer_id.to_owned(),
            })?
            .map(|_| ())
            .ok_or_else(|| Error::BeerNotFound(beer_id.to_owned()))
    }

    pub fn add_review(&self, username: &str, form: ReviewForm) -> Result<Review> {
        let beer_id = form
            .beer_id
            .filter(|id| !id.is_empty())
            .ok_or(Error::MissingField("beer_id"))?;
        let rating = form.rating.ok_or(Error::MissingField("rating"))?;
        let text = form
            .review
            .filter(|text| !text.trim().is_empty())
            .ok_or(Error::MissingField("review"))?;
        let tastes = form
            .tastes
            .filter(|tastes| !tastes.is_empty())
            .ok_or(Error::MissingField("tastes"))?;

        if !(1..=5).contains(&rating) {
            return Err(Error::InvalidRating(rating));
        }

        self.require_beer(&beer_id)?;
        let user = self.user(username)?;

        let existing = self.store.run(FindReviewsByIds {
            ids: user.reviews.clone(),
        })?;
        if existing.iter().any(|review| review.beer_id == beer_id) {
            return Err(Error::DuplicateReview(beer_id));
        }

        let review = Review {
            id: Uuid::new_v4().to_string(),
            beer_id,
            rating,
            review: text,
            tastes,
            user_id: user.id,
            created_at: Utc::now().naive_utc(),
        };

        // The unique (user_id, beer_id) key catches a concurrent duplicate.
        let inserted = self.store.run(InsertReview {
            username: username.to_owned(),
            review: review.clone(),
        })?;
        if !inserted {
            return Err(Error::DuplicateReview(review.beer_id));
        }

        info!("{} reviewed beer {} ({})", username, review.beer_id, review.id);
        Ok(review)
    }

    /// All reviews of a beer, each with its author's username.
    pub fn reviews_for_beer(&self, beer_id: &str) -> Result<Vec<ReviewWithUser>> {
        self.require_beer(beer_id)?;

        let reviews = self.store.run(FindReviewsForBeer {
            beer_id: beer_id.to_owned(),
        })?;

        let mut user_ids: Vec<String> = reviews.iter().map(|r| r.user_id.clone()).collect();
        user_ids.sort();
        user_ids.dedup();
        let usernames = self.store.run(FindUsernames { ids: user_ids })?;

        reviews
            .into_iter()
            .map(|review| match usernames.get(&review.user_id) {
                Some(username) => Ok(ReviewWithUser {
                    username: username.clone(),
                    review,
                }),
                None => Err(Error::DanglingReviewer {
                    review_id: review.id,
                    user_id: review.user_id,
                }),
            })
            .collect()
    }

    /// The user's reviews in the order they were linked, each with the
    /// reviewed beer (`None` if it has left the catalog).
    pub fn reviews_for_user(&self, username: &str) -> Result<Vec<ReviewWithBeer>> {
        let user = self.reconcile(self.user(username)?)?;

        let mut reviews: HashMap<String, Review> = self
            .store
            .run(FindReviewsByIds {
                ids: user.reviews.clone(),
            })?
            .into_iter()
            .map(|review| (review.id.clone(), review))
            .collect();

        let beer_ids: Vec<String> = reviews.values().map(|r| r.beer_id.clone()).collect();
        let beers: HashMap<_, _> = self
            .store
            .run(FindBeersByIds { ids: beer_ids })?
            .into_iter()
            .map(|beer| (beer.id.clone(), beer))
            .collect();

        Ok(user
            .reviews
            .iter()
            .filter_map(|id| reviews.remove(id))
            .map(|review| ReviewWithBeer {
                beer: beers.get(&review.beer_id).cloned(),
                review: ReviewWithUser {
                    username: user.username.clone(),
                    review,
                },
            })
            .collect())
    }

    /// Aligns the user's back-references with the reviews they wrote.
    /// Idempotent; returns the user as it stands afterwards.
    fn reconcile(&self, user: User) -> Result<User> {
        let authored = self.store.run(FindReviewsByAuthor {
            user_id: user.id.clone(),
        })?;
        let authored_ids: HashSet<&str> = authored.iter().map(|r| r.id.as_str()).collect();
        let linked_ids: HashSet<&str> = user.reviews.iter().map(String::as_str).collect();

        let dangling: Vec<String> = user
            .reviews
            .iter()
            .filter(|id| !authored_ids.contains(id.as_str()))
            .cloned()
            .collect();
        let orphaned: Vec<&Review> = authored
            .iter()
            .filter(|review| !linked_ids.contains(review.id.as_str()))
            .collect();

        if dangling.is_empty() && orphaned.is_empty() {
            return Ok(user);
        }

        if !dangling.is_empty() {
            warn!(
                "Dropping {} dangling review reference(s) from {}",
                dangling.len(),
                user.username
            );
            self.store.run(UnlinkReviews {
                username: user.username.clone(),
                review_ids: dangling,
            })?;
        }

        for review in orphaned {
            warn!("Relinking orphaned review {} to {}", review.id, user.username);
            self.store.run(LinkReview {
                username: user.username.clone(),
                review_id: review.id.clone(),
            })?;
        }

        self.user(&user.username)
    }

    /// Deletes a review on behalf of its author.
    pub fn delete_review(&self, username: &str, review_id: &str) -> Result<()> {
        let review = self
            .store
            .run(FindReview {
                id: review_id.to_owned(),
            })?
            .ok_or_else(|| Error::ReviewNotFound(review_id.to_owned()))?;
        let user = self.user(username)?;

        if review.user_id != user.id {
            warn!("{} tried to delete review {} owned by someone else", username, review_id);
            return Err(Error::Forbidden);
        }

        let deleted = self.store.run(DeleteReview {
            review_id: review_id.to_owned(),
        })?;
        if !deleted {
            return Err(Error::ReviewNotFound(review_id.to_owned()));
        }

        info!("{} deleted review {}", username, review_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use diesel::prelude::*;

    use super::*;
    use crate::catalog::Catalog;
    use crate::error::ErrorKind;
    use crate::identity::Identity;
    use crate::store::testing::seeded_store;
    use crate::store::Query;

    fn form(beer_id: &str, rating: i16) -> ReviewForm {
        ReviewForm {
            beer_id: Some(beer_id.into()),
            rating: Some(rating),
            review: Some("Crisp, with a long bitter finish".into()),
            tastes: Some(vec!["bitter".into(), "citrus".into()]),
        }
    }

    fn setup() -> (tempfile::TempDir, Store, ReviewLedger) {
        let (dir, store) = seeded_store();
        let identity = Identity::new(store.clone(), Catalog::new(store.clone()), None);
        identity.register("ada", "pw").unwrap();
        identity.register("bob", "pw").unwrap();

        let ledger = ReviewLedger::new(store.clone());
        (dir, store, ledger)
    }

    /// Runs raw SQL, bypassing the ledger, to simulate a crash mid-protocol.
    struct Raw(&'static str);

    impl Query for Raw {
        type Item = usize;

        fn execute(&self, conn: &mut SqliteConnection) -> Result<usize> {
            Ok(diesel::sql_query(self.0).execute(conn)?)
        }
    }

    #[test]
    fn missing_fields_are_reported_before_store_access() {
        let (_dir, _store, ledger) = setup();

        let mut no_tastes = form("1", 4);
        no_tastes.tastes = Some(vec![]);
        assert!(matches!(
            ledger.add_review("ada", no_tastes),
            Err(Error::MissingField("tastes"))
        ));

        let mut no_rating = form("1", 4);
        no_rating.rating = None;
        assert!(matches!(
            ledger.add_review("ada", no_rating),
            Err(Error::MissingField("rating"))
        ));

        assert!(matches!(
            ledger.add_review("ada", ReviewForm::default()),
            Err(Error::MissingField("beer_id"))
        ));
        assert!(matches!(ledger.add_review("ada", form("1", 9)), Err(Error::InvalidRating(9))));
        assert!(matches!(ledger.add_review("ada", form("404", 3)), Err(Error::BeerNotFound(_))));
    }

    #[test]
    fn one_review_per_user_and_beer() {
        let (_dir, _store, ledger) = setup();

        ledger.add_review("ada", form("1", 4)).unwrap();
        let err = ledger.add_review("ada", form("1", 2)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);

        // Another user may still review the same beer.
        ledger.add_review("bob", form("1", 5)).unwrap();

        let mine = ledger.reviews_for_user("ada").unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].review.review.beer_id, "1");
        assert_eq!(mine[0].review.review.rating, 4);
        assert_eq!(mine[0].beer.as_ref().unwrap().id, "1");
    }

    #[test]
    fn beer_reviews_round_trip_with_usernames() {
        let (_dir, _store, ledger) = setup();

        let review = ledger.add_review("ada", form("3", 4)).unwrap();
        let listed = ledger.reviews_for_beer("3").unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].review.id, review.id);
        assert_eq!(listed[0].username, "ada");

        ledger.delete_review("ada", &review.id).unwrap();
        assert!(ledger.reviews_for_beer("3").unwrap().is_empty());
        assert!(ledger.reviews_for_user("ada").unwrap().is_empty());
    }

    #[test]
    fn only_the_author_may_delete() {
        let (_dir, _store, ledger) = setup();
        let review = ledger.add_review("ada", form("1", 4)).unwrap();

        let err = ledger.delete_review("bob", &review.id).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Authorization);
        assert_eq!(ledger.reviews_for_beer("1").unwrap().len(), 1);

        assert!(matches!(
            ledger.delete_review("ada", "no-such-review"),
            Err(Error::ReviewNotFound(_))
        ));
    }

    #[test]
    fn unknown_beer_has_no_review_listing() {
        let (_dir, _store, ledger) = setup();

        assert!(matches!(ledger.reviews_for_beer("404"), Err(Error::BeerNotFound(_))));
    }

    #[test]
    fn review_by_vanished_user_fails_loudly() {
        let (_dir, store, ledger) = setup();
        ledger.add_review("bob", form("2", 3)).unwrap();
        store.run(Raw("DELETE FROM users WHERE username = 'bob'")).unwrap();

        assert!(matches!(
            ledger.reviews_for_beer("2"),
            Err(Error::DanglingReviewer { .. })
        ));
    }

    #[test]
    fn reconciliation_heals_back_references() {
        let (_dir, store, ledger) = setup();
        let kept = ledger.add_review("ada", form("1", 4)).unwrap();
        let orphan = ledger.add_review("ada", form("2", 3)).unwrap();

        // A reference whose review is gone, and a review nobody references.
        store
            .run(Raw("INSERT INTO user_reviews (username, review_id) VALUES ('ada', 'ghost')"))
            .unwrap();
        store
            .run(Raw("DELETE FROM user_reviews WHERE review_id IN (SELECT id FROM reviews WHERE beer_id = '2')"))
            .unwrap();

        let reviews = ledger.reviews_for_user("ada").unwrap();
        let ids: Vec<_> = reviews.iter().map(|r| r.review.review.id.as_str()).collect();
        assert_eq!(ids, vec![kept.id.as_str(), orphan.id.as_str()]);

        let user = ledger.user("ada").unwrap();
        assert_eq!(user.reviews, vec![kept.id.clone(), orphan.id.clone()]);

        // A second pass changes nothing.
        ledger.reviews_for_user("ada").unwrap();
        assert_eq!(ledger.user("ada").unwrap().reviews, user.reviews);
    }
}
