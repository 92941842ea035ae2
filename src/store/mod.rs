//! Record store: Users, Beers, Breweries and Reviews on a pooled SQLite database.
//!
//! Every store operation is a value implementing [`Query`]; the services
//! build those values and hand them to [`Store::run`]. Nothing in the schema
//! declares a foreign key: references between collections are kept honest by
//! the services, and single-statement writes against `UNIQUE` keys stand in
//! for the atomic set-add / set-remove a document store would offer.

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{self, ConnectionManager, CustomizeConnection};
use std::time::Duration;

use super::error::Result;

pub mod catalog;
pub mod reviews;
pub mod users;

pub use self::catalog::*;
pub use self::reviews::*;
pub use self::users::*;

pub type Pool = r2d2::Pool<ConnectionManager<SqliteConnection>>;
pub type Connection = r2d2::PooledConnection<ConnectionManager<SqliteConnection>>;

const MIGRATION: &str = include_str!("../../migrations/2024-05-01-000000_create_taproom/up.sql");

pub trait Query {
    type Item;

    fn execute(&self, conn: &mut SqliteConnection) -> Result<Self::Item>;
}

#[derive(Debug, Clone)]
pub struct StoreOptions {
    pub pool_size: u32,
    /// How long a writer waits on SQLite's lock before giving up.
    pub busy_timeout: Duration,
    /// How long a caller waits for a free pooled connection.
    pub connection_timeout: Duration,
}

impl Default for StoreOptions {
    fn default() -> StoreOptions {
        StoreOptions {
            pool_size: 8,
            busy_timeout: Duration::from_secs(5),
            connection_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug)]
struct ConnectionOptions {
    busy_timeout: Duration,
}

impl CustomizeConnection<SqliteConnection, r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> std::result::Result<(), r2d2::Error> {
        conn.batch_execute(&format!(
            "PRAGMA busy_timeout = {}; PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;",
            self.busy_timeout.as_millis()
        ))
        .map_err(r2d2::Error::QueryError)
    }
}

/// Handle to the record store. Cheap to clone; clones share one pool.
#[derive(Clone)]
pub struct Store {
    pool: Pool,
}

impl Store {
    /// Open (creating if needed) the database at `database_url` and bring
    /// its schema up to date.
    ///
    /// `:memory:` is not useful here: every pooled connection would get its
    /// own private database.
    pub fn open(database_url: &str, options: &StoreOptions) -> Result<Store> {
        let manager = ConnectionManager::<SqliteConnection>::new(database_url);
        let pool = Pool::builder()
            .max_size(options.pool_size)
            .connection_timeout(options.connection_timeout)
            .connection_customizer(Box::new(ConnectionOptions {
                busy_timeout: options.busy_timeout,
            }))
            .build(manager)?;

        let store = Store { pool };
        store.migrate()?;

        Ok(store)
    }

    fn migrate(&self) -> Result<()> {
        let mut conn = self.pool.get()?;
        conn.batch_execute(MIGRATION)?;

        debug!("Store schema is up to date");
        Ok(())
    }

    pub fn run<Q: Query>(&self, query: Q) -> Result<Q::Item> {
        let mut conn = self.pool.get()?;

        query.execute(&mut conn)
    }
}
