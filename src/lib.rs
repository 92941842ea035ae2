//! Beer catalog and community service: accounts, favourites, catalog
//! queries, reviews and style-based recommendations over a pooled SQLite
//! store, served through actix-web.

#[macro_use]
extern crate serde_derive;
#[macro_use]
extern crate log;
#[macro_use]
extern crate lazy_static;

pub mod api;
pub mod catalog;
pub mod config;
pub mod error;
pub mod identity;
pub mod models;
pub mod narrator;
pub mod password;
pub mod recommend;
pub mod reviews;
pub mod schema;
pub mod seed;
pub mod state;
pub mod store;

pub use self::error::{Error, ErrorKind, Result};
