use diesel::dsl::sql;
use diesel::prelude::*;
use diesel::sql_types::{Bool, Text};
use diesel::sqlite::Sqlite;
use serde::de::DeserializeOwned;

use super::Query;
use crate::error::{Error, Result};
use crate::models::{Beer, Brewery, Filter, NewBeer, NewBrewery};
use crate::schema::{beers, breweries};

/// JSON path addressing a top-level document field, or `None` when the
/// field name cannot be expressed as a quoted path label.
fn json_path(field: &str) -> Option<String> {
    if field.contains('"') {
        return None;
    }

    Some(format!("$.\"{}\"", field))
}

fn parse_docs<T: DeserializeOwned>(docs: Vec<String>) -> Result<Vec<T>> {
    docs.iter()
        .map(|doc| serde_json::from_str(doc).map_err(Error::from))
        .collect()
}

/*************************************/
/** Beers                           **/
/*************************************/

pub struct CountBeers;

impl Query for CountBeers {
    type Item = i64;

    fn execute(&self, conn: &mut SqliteConnection) -> Result<i64> {
        Ok(beers::table.count().get_result(conn)?)
    }
}

/// Loads beers in one transaction, skipping ids that are already present.
/// Yields the number of beers added.
pub struct InsertBeers {
    pub beers: Vec<Beer>,
}

impl Query for InsertBeers {
    type Item = usize;

    fn execute(&self, conn: &mut SqliteConnection) -> Result<usize> {
        conn.immediate_transaction::<_, Error, _>(|conn| {
            let mut inserted = 0;

            for beer in &self.beers {
                let new_beer = NewBeer {
                    id: &beer.id,
                    cat_name: beer.cat_name.as_deref(),
                    style_name: beer.style_name.as_deref(),
                    brewery_id: beer.brewery_id.as_deref(),
                    doc: serde_json::to_string(beer)?,
                };

                inserted += diesel::insert_or_ignore_into(beers::table)
                    .values(&new_beer)
                    .execute(conn)?;
            }

            Ok(inserted)
        })
    }
}

/// Beers matching every field of `filter`, in natural (load) order.
pub struct FindBeers {
    pub filter: Filter,
}

impl Query for FindBeers {
    type Item = Vec<Beer>;

    fn execute(&self, conn: &mut SqliteConnection) -> Result<Vec<Beer>> {
        let mut query = beers::table
            .select(beers::doc)
            .order(beers::seq.asc())
            .into_boxed::<Sqlite>();

        for (field, value) in self.filter.iter() {
            // No document has a field by that name.
            let path = match json_path(field) {
                Some(path) => path,
                None => return Ok(Vec::new()),
            };

            query = query.filter(
                sql::<Bool>("CAST(json_extract(doc, ")
                    .bind::<Text, _>(path)
                    .sql(") AS TEXT) = ")
                    .bind::<Text, _>(value.clone()),
            );
        }

        parse_docs(query.load::<String>(conn)?)
    }
}

pub struct FindBeer {
    pub id: String,
}

impl Query for FindBeer {
    type Item = Option<Beer>;

    fn execute(&self, conn: &mut SqliteConnection) -> Result<Option<Beer>> {
        let doc = beers::table
            .filter(beers::id.eq(&self.id))
            .select(beers::doc)
            .first::<String>(conn)
            .optional()?;

        Ok(doc.map(|doc| serde_json::from_str(&doc)).transpose()?)
    }
}

/// Beers whose id is in `ids`, in natural order rather than the order of `ids`.
pub struct FindBeersByIds {
    pub ids: Vec<String>,
}

impl Query for FindBeersByIds {
    type Item = Vec<Beer>;

    fn execute(&self, conn: &mut SqliteConnection) -> Result<Vec<Beer>> {
        let docs = beers::table
            .filter(beers::id.eq_any(&self.ids))
            .order(beers::seq.asc())
            .select(beers::doc)
            .load::<String>(conn)?;

        parse_docs(docs)
    }
}

/// One page of beers whose style is in `styles`, in natural order.
pub struct FindBeersByStyles {
    pub styles: Vec<String>,
    pub offset: i64,
    pub limit: i64,
}

impl Query for FindBeersByStyles {
    type Item = Vec<Beer>;

    fn execute(&self, conn: &mut SqliteConnection) -> Result<Vec<Beer>> {
        let docs = beers::table
            .filter(beers::style_name.eq_any(&self.styles))
            .order(beers::seq.asc())
            .select(beers::doc)
            .offset(self.offset)
            .limit(self.limit)
            .load::<String>(conn)?;

        parse_docs(docs)
    }
}

/// Distinct `(cat_name, style_name)` pairs sorted by category then style.
/// A category whose beers have no style yields a single `(name, None)` pair.
pub struct CategoryStyles;

impl Query for CategoryStyles {
    type Item = Vec<(String, Option<String>)>;

    fn execute(&self, conn: &mut SqliteConnection) -> Result<Vec<(String, Option<String>)>> {
        let pairs = beers::table
            .filter(beers::cat_name.is_not_null())
            .select((beers::cat_name, beers::style_name))
            .distinct()
            .order((beers::cat_name.asc(), beers::style_name.asc()))
            .load::<(Option<String>, Option<String>)>(conn)?;

        Ok(pairs
            .into_iter()
            .filter_map(|(cat_name, style_name)| cat_name.map(|cat_name| (cat_name, style_name)))
            .collect())
    }
}

/*************************************/
/** Breweries                       **/
/*************************************/

pub struct CountBreweries;

impl Query for CountBreweries {
    type Item = i64;

    fn execute(&self, conn: &mut SqliteConnection) -> Result<i64> {
        Ok(breweries::table.count().get_result(conn)?)
    }
}

pub struct InsertBreweries {
    pub breweries: Vec<Brewery>,
}

impl Query for InsertBreweries {
    type Item = usize;

    fn execute(&self, conn: &mut SqliteConnection) -> Result<usize> {
        conn.immediate_transaction::<_, Error, _>(|conn| {
            let mut inserted = 0;

            for brewery in &self.breweries {
                let new_brewery = NewBrewery {
                    id: &brewery.id,
                    doc: serde_json::to_string(brewery)?,
                };

                inserted += diesel::insert_or_ignore_into(breweries::table)
                    .values(&new_brewery)
                    .execute(conn)?;
            }

            Ok(inserted)
        })
    }
}

pub struct FindBreweries {
    pub filter: Filter,
}

impl Query for FindBreweries {
    type Item = Vec<Brewery>;

    fn execute(&self, conn: &mut SqliteConnection) -> Result<Vec<Brewery>> {
        let mut query = breweries::table
            .select(breweries::doc)
            .order(breweries::seq.asc())
            .into_boxed::<Sqlite>();

        for (field, value) in self.filter.iter() {
            // No document has a field by that name.
            let path = match json_path(field) {
                Some(path) => path,
                None => return Ok(Vec::new()),
            };

            query = query.filter(
                sql::<Bool>("CAST(json_extract(doc, ")
                    .bind::<Text, _>(path)
                    .sql(") AS TEXT) = ")
                    .bind::<Text, _>(value.clone()),
            );
        }

        parse_docs(query.load::<String>(conn)?)
    }
}

pub struct FindBrewery {
    pub id: String,
}

impl Query for FindBrewery {
    type Item = Option<Brewery>;

    fn execute(&self, conn: &mut SqliteConnection) -> Result<Option<Brewery>> {
        let doc = breweries::table
            .filter(breweries::id.eq(&self.id))
            .select(breweries::doc)
            .first::<String>(conn)
            .optional()?;

        Ok(doc.map(|doc| serde_json::from_str(&doc)).transpose()?)
    }
}

pub struct FindBreweriesByIds {
    pub ids: Vec<String>,
}

impl Query for FindBreweriesByIds {
    type Item = Vec<Brewery>;

    fn execute(&self, conn: &mut SqliteConnection) -> Result<Vec<Brewery>> {
        let docs = breweries::table
            .filter(breweries::id.eq_any(&self.ids))
            .order(breweries::seq.asc())
            .select(breweries::doc)
            .load::<String>(conn)?;

        parse_docs(docs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::{beer, seeded_store};

    #[test]
    fn filters_compare_document_fields_as_text() {
        let (_dir, store) = seeded_store();

        let ipas = store
            .run(FindBeers {
                filter: Filter::new().with("style_name", "IPA"),
            })
            .unwrap();
        assert_eq!(
            ipas.iter().map(|b| b.id.as_str()).collect::<Vec<_>>(),
            vec!["1", "3"]
        );

        let from_rogue = store
            .run(FindBeers {
                filter: Filter::new().with("style_name", "IPA").with("brewery_id", "11"),
            })
            .unwrap();
        assert_eq!(from_rogue.len(), 1);
        assert_eq!(from_rogue[0].id, "3");

        let nothing = store
            .run(FindBeers {
                filter: Filter::new().with("no_such_field", "x"),
            })
            .unwrap();
        assert!(nothing.is_empty());
        let quoted = store
            .run(FindBeers {
                filter: Filter::new().with("na\"me", "Beer 1"),
            })
            .unwrap();
        assert!(quoted.is_empty());

        let quoted_breweries = store
            .run(FindBreweries {
                filter: Filter::new().with("na\"me", "Hopworks"),
            })
            .unwrap();
        assert!(quoted_breweries.is_empty());
    }

    #[test]
    fn reloading_the_catalog_skips_known_ids() {
        let (_dir, store) = seeded_store();

        let added = store
            .run(InsertBeers {
                beers: vec![beer("1", "Ale", "IPA", "10"), beer("5", "Ale", "Porter", "10")],
            })
            .unwrap();

        assert_eq!(added, 1);
        assert_eq!(store.run(CountBeers).unwrap(), 5);
    }

    #[test]
    fn style_pages_follow_load_order() {
        let (_dir, store) = seeded_store();
        let styles = vec!["IPA".to_owned(), "Pilsner".to_owned()];

        let first = store
            .run(FindBeersByStyles {
                styles: styles.clone(),
                offset: 0,
                limit: 2,
            })
            .unwrap();
        let second = store
            .run(FindBeersByStyles {
                styles,
                offset: 2,
                limit: 2,
            })
            .unwrap();

        assert_eq!(
            first.iter().map(|b| b.id.as_str()).collect::<Vec<_>>(),
            vec!["1", "3"]
        );
        assert_eq!(
            second.iter().map(|b| b.id.as_str()).collect::<Vec<_>>(),
            vec!["4"]
        );
    }

    #[test]
    fn category_pairs_are_distinct_and_sorted() {
        let (_dir, store) = seeded_store();

        let pairs = store.run(CategoryStyles).unwrap();

        assert_eq!(
            pairs,
            vec![
                ("Ale".to_owned(), Some("IPA".to_owned())),
                ("Ale".to_owned(), Some("Stout".to_owned())),
                ("Lager".to_owned(), Some("Pilsner".to_owned())),
            ]
        );
    }
}
