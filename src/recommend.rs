use super::catalog::Catalog;
use super::error::{Error, Result};
use super::models::BeerWithBrewery;
use super::store::{FindBeersByIds, FindBeersByStyles, FindUser, Store};

pub const MAX_PER_PAGE: i64 = 100;

#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    pub page: i64,
    pub per_page: i64,
    /// Style of each favourite, one entry per favourite.
    pub styles: Vec<String>,
    pub beers: Vec<BeerWithBrewery>,
}

/// Suggests catalog beers sharing a style with the user's favourites.
#[derive(Clone)]
pub struct Recommender {
    store: Store,
    catalog: Catalog,
}

impl Recommender {
    pub fn new(store: Store, catalog: Catalog) -> Recommender {
        Recommender { store, catalog }
    }

    /// Styles of the user's favourites in catalog order. Repeated styles are
    /// kept; a favourite without a style contributes nothing.
    pub fn favourite_styles(&self, username: &str) -> Result<Vec<String>> {
        let user = self
            .store
            .run(FindUser {
                username: username.to_owned(),
            })?
            .ok_or_else(|| Error::UserNotFound(username.to_owned()))?;

        Ok(self
            .store
            .run(FindBeersByIds {
                ids: user.fav_beers,
            })?
            .into_iter()
            .filter_map(|beer| beer.style_name)
            .collect())
    }

    /// Page `page` (1-based) of beers matching the user's favourite styles.
    /// Favourites themselves are not excluded.
    pub fn recommend(&self, username: &str, page: i64, per_page: i64) -> Result<Recommendation> {
        if page < 1 || !(1..=MAX_PER_PAGE).contains(&per_page) {
            return Err(Error::InvalidPage);
        }

        let offset = (page - 1).checked_mul(per_page).ok_or(Error::InvalidPage)?;

        let styles = self.favourite_styles(username)?;
        let beers = self.store.run(FindBeersByStyles {
            styles: styles.clone(),
            offset,
            limit: per_page,
        })?;

        Ok(Recommendation {
            page,
            per_page,
            styles,
            beers: self.catalog.with_breweries(beers)?,
        })
    }
}
