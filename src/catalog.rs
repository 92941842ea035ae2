use std::collections::HashMap;

use super::error::Result;
use super::models::{Beer, BeerWithBrewery, Brewery, Category, Filter};
use super::store::{
    CategoryStyles, FindBeers, FindBreweries, FindBreweriesByIds, FindBrewery, Store,
};

/// Read-only views over the beer and brewery catalog.
#[derive(Clone)]
pub struct Catalog {
    store: Store,
}

impl Catalog {
    pub fn new(store: Store) -> Catalog {
        Catalog { store }
    }

    pub fn query_beers(&self, filter: &Filter) -> Result<Vec<BeerWithBrewery>> {
        let beers = self.store.run(FindBeers {
            filter: filter.clone(),
        })?;

        self.with_breweries(beers)
    }

    /// One entry per category, each listing its distinct styles.
    pub fn list_categories(&self) -> Result<Vec<Category>> {
        let mut categories: Vec<Category> = Vec::new();

        for (name, style) in self.store.run(CategoryStyles)? {
            let is_current = categories.last().map_or(false, |last| last.name == name);
            if !is_current {
                categories.push(Category {
                    name,
                    styles: Vec::new(),
                });
            }

            if let (Some(style), Some(category)) = (style, categories.last_mut()) {
                category.styles.push(style);
            }
        }

        Ok(categories)
    }

    pub fn query_breweries(&self, filter: &Filter) -> Result<Vec<Brewery>> {
        self.store.run(FindBreweries {
            filter: filter.clone(),
        })
    }

    pub fn get_brewery(&self, id: &str) -> Result<Option<Brewery>> {
        self.store.run(FindBrewery { id: id.to_owned() })
    }

    /// Attaches each beer's brewery, or `None` when the brewery is unknown.
    pub fn with_breweries(&self, beers: Vec<Beer>) -> Result<Vec<BeerWithBrewery>> {
        let mut ids: Vec<String> = beers.iter().filter_map(|b| b.brewery_id.clone()).collect();
        ids.sort();
        ids.dedup();

        let breweries: HashMap<String, Brewery> = if ids.is_empty() {
            HashMap::new()
        } else {
            self.store
                .run(FindBreweriesByIds { ids })?
                .into_iter()
                .map(|brewery| (brewery.id.clone(), brewery))
                .collect()
        };

        Ok(beers
            .into_iter()
            .map(|beer| {
                let brewery = beer
                    .brewery_id
                    .as_ref()
                    .and_then(|id| breweries.get(id))
                    .cloned();

                BeerWithBrewery { beer, brewery }
            })
            .collect())
    }
}
