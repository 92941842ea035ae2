//! First-start population of the catalog from bundled JSON files.

use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;

use super::error::{Error, Result};
use super::identity::Identity;
use super::models::{Beer, Brewery};
use super::store::{CountBeers, CountBreweries, InsertBeers, InsertBreweries, Store};

pub const ADMIN_USERNAME: &str = "admin";

#[derive(Debug, Clone)]
pub struct SeedConfig {
    pub beers_path: PathBuf,
    pub breweries_path: PathBuf,
    /// Creates an `admin` account with this password when set.
    pub admin_password: Option<String>,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub beers: usize,
    pub breweries: usize,
    pub admin_created: bool,
}

/// Loads a JSON array of documents, or `None` when the file does not exist.
fn load<T: DeserializeOwned>(path: &Path) -> Result<Option<Vec<T>>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(ref e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!("Seed file {} not found, skipping", path.display());
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };

    Ok(Some(serde_json::from_str(&contents)?))
}

/// Fills each empty collection from its seed file. Collections that already
/// hold records are left alone, so running this on every start is safe.
pub fn run(store: &Store, identity: &Identity, config: &SeedConfig) -> Result<SeedReport> {
    let mut report = SeedReport::default();

    if store.run(CountBeers)? == 0 {
        if let Some(beers) = load::<Beer>(&config.beers_path)? {
            report.beers = store.run(InsertBeers { beers })?;
            info!("Seeded {} beers", report.beers);
        }
    }

    if store.run(CountBreweries)? == 0 {
        if let Some(breweries) = load::<Brewery>(&config.breweries_path)? {
            report.breweries = store.run(InsertBreweries { breweries })?;
            info!("Seeded {} breweries", report.breweries);
        }
    }

    if let Some(password) = &config.admin_password {
        match identity.register(ADMIN_USERNAME, password) {
            Ok(_) => report.admin_created = true,
            Err(Error::DuplicateUser(_)) => {}
            Err(e) => return Err(e),
        }
    }

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::models::Filter;
    use crate::store::testing::temp_store;

    fn write(dir: &Path, name: &str, json: serde_json::Value) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, json.to_string()).unwrap();
        path
    }

    fn config(dir: &Path) -> SeedConfig {
        SeedConfig {
            beers_path: write(
                dir,
                "beers.json",
                serde_json::json!([
                    {"id": 1, "name": "Hop Bomb", "cat_name": "Ale", "style_name": "IPA", "brewery_id": 10},
                    {"id": 2, "name": "Dark Star", "cat_name": "Ale", "style_name": "Stout", "brewery_id": 10}
                ]),
            ),
            breweries_path: write(
                dir,
                "breweries.json",
                serde_json::json!([{"id": 10, "name": "Hopworks"}]),
            ),
            admin_password: Some("admin".to_owned()),
        }
    }

    #[test]
    fn empty_store_is_seeded_once() {
        let (dir, store) = temp_store();
        let catalog = Catalog::new(store.clone());
        let identity = Identity::new(store.clone(), catalog.clone(), None);
        let config = config(dir.path());

        let first = run(&store, &identity, &config).unwrap();
        assert_eq!(
            first,
            SeedReport {
                beers: 2,
                breweries: 1,
                admin_created: true
            }
        );

        let second = run(&store, &identity, &config).unwrap();
        assert_eq!(second, SeedReport::default());

        let beers = catalog.query_beers(&Filter::new()).unwrap();
        assert_eq!(beers.len(), 2);
        assert_eq!(beers[0].beer.id, "1");
        assert_eq!(beers[0].brewery.as_ref().unwrap().id, "10");
        assert!(identity.authenticate(ADMIN_USERNAME, "admin").is_ok());
    }

    #[test]
    fn missing_files_are_skipped() {
        let (dir, store) = temp_store();
        let identity = Identity::new(store.clone(), Catalog::new(store.clone()), None);
        let config = SeedConfig {
            beers_path: dir.path().join("nope.json"),
            breweries_path: dir.path().join("nope-either.json"),
            admin_password: None,
        };

        assert_eq!(run(&store, &identity, &config).unwrap(), SeedReport::default());
        assert_eq!(store.run(CountBeers).unwrap(), 0);
    }

    #[test]
    fn malformed_seed_file_is_an_error() {
        let (dir, store) = temp_store();
        let identity = Identity::new(store.clone(), Catalog::new(store.clone()), None);
        let path = dir.path().join("beers.json");
        fs::write(&path, "{not json").unwrap();
        let config = SeedConfig {
            beers_path: path,
            breweries_path: dir.path().join("breweries.json"),
            admin_password: None,
        };

        assert!(matches!(run(&store, &identity, &config), Err(Error::JsonError(_))));
    }
}
