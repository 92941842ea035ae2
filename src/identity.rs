//! Accounts, login sessions and favourites.

use chrono::{Duration, Utc};
use regex::Regex;
use textnonce::TextNonce;
use uuid::Uuid;

use super::catalog::Catalog;
use super::error::{Error, Result};
use super::models::{BeerWithBrewery, Session, User};
use super::password;
use super::store::{
    AddFavorite, FindBeer, FindBeersByIds, FindSession, FindUser, InsertSession, InsertUser,
    PurgeSessions, RemoveFavorite, Store,
};

lazy_static! {
    static ref USERNAME: Regex =
        Regex::new(r"^[A-Za-z0-9_.\-]{1,64}$").expect("username pattern compiles");

    /// Verified against when the user does not exist, so that a failed login
    /// costs the same whether or not the username is registered.
    static ref DUMMY_HASH: Option<String> = password::hash("taproom").ok();
}

#[derive(Clone)]
pub struct Identity {
    store: Store,
    catalog: Catalog,
    session_ttl: Option<Duration>,
}

impl Identity {
    /// `session_ttl` of `None` issues sessions that never expire.
    pub fn new(store: Store, catalog: Catalog, session_ttl: Option<Duration>) -> Identity {
        Identity {
            store,
            catalog,
            session_ttl,
        }
    }

    pub fn register(&self, username: &str, password: &str) -> Result<User> {
        if username.is_empty() {
            return Err(Error::MissingField("username"));
        }
        if password.is_empty() {
            return Err(Error::MissingField("password"));
        }
        if !USERNAME.is_match(username) {
            return Err(Error::InvalidUsername);
        }

        let insert = InsertUser {
            username: username.to_owned(),
            id: Uuid::new_v4().to_string(),
            password: password::hash(password)?,
            created_at: Utc::now().naive_utc(),
        };

        if !self.store.run(insert)? {
            return Err(Error::DuplicateUser(username.to_owned()));
        }

        info!("Registered user {}", username);
        self.user(username)
    }

    /// Checks credentials and issues a new session token.
    pub fn authenticate(&self, username: &str, password: &str) -> Result<Session> {
        if username.is_empty() {
            return Err(Error::MissingField("username"));
        }
        if password.is_empty() {
            return Err(Error::MissingField("password"));
        }

        let user = self.store.run(FindUser {
            username: username.to_owned(),
        })?;

        let verified = match (&user, DUMMY_HASH.as_ref()) {
            (Some(user), _) => password::verify(password, &user.password)?,
            (None, Some(dummy)) => password::verify(password, dummy).map(|_| false)?,
            (None, None) => false,
        };

        if !verified {
            debug!("Rejected login for {}", username);
            return Err(Error::InvalidCredentials);
        }

        let now = Utc::now().naive_utc();
        let expires_at = match self.session_ttl {
            Some(ttl) => Some(
                now.checked_add_signed(ttl)
                    .ok_or_else(|| Error::Config("session lifetime out of range".into()))?,
            ),
            None => None,
        };
        let session = Session {
            token: TextNonce::sized_urlsafe(32)
                .map_err(Error::Config)?
                .into_string(),
            username: username.to_owned(),
            created_at: now,
            expires_at,
        };

        if self.session_ttl.is_some() {
            let purged = self.store.run(PurgeSessions { now })?;
            if purged > 0 {
                debug!("Purged {} expired session(s)", purged);
            }
        }
        self.store.run(InsertSession(session.clone()))?;

        Ok(session)
    }

    /// Maps a session token back to its username.
    pub fn resolve_session(&self, token: &str) -> Result<String> {
        let session = self
            .store
            .run(FindSession {
                token: token.to_owned(),
            })?
            .ok_or(Error::SessionNotFound)?;

        let now = Utc::now().naive_utc();
        match session.expires_at {
            Some(expires_at) if expires_at <= now => {
                self.store.run(PurgeSessions { now })?;
                Err(Error::SessionNotFound)
            }
            _ => Ok(session.username),
        }
    }

    pub fn user(&self, username: &str) -> Result<User> {
        self.store
            .run(FindUser {
                username: username.to_owned(),
            })?
            .ok_or_else(|| Error::UserNotFound(username.to_owned()))
    }

    pub fn add_favorite(&self, username: &str, beer_id: &str) -> Result<()> {
        if beer_id.is_empty() {
            return Err(Error::MissingField("beer_id"));
        }

        self.store
            .run(FindBeer {
                id: beer_id.to_owned(),
            })?
            .ok_or_else(|| Error::BeerNotFound(beer_id.to_owned()))?;
        self.user(username)?;

        let added = self.store.run(AddFavorite {
            username: username.to_owned(),
            beer_id: beer_id.to_owned(),
        })?;

        if !added {
            return Err(Error::AlreadyFavorite(beer_id.to_owned()));
        }

        Ok(())
    }

    pub fn remove_favorite(&self, username: &str, beer_id: &str) -> Result<()> {
        let removed = self.store.run(RemoveFavorite {
            username: username.to_owned(),
            beer_id: beer_id.to_owned(),
        })?;

        if !removed {
            return Err(Error::NotFavorite(beer_id.to_owned()));
        }

        Ok(())
    }

    /// The user's favourite beers with their breweries, in catalog order.
    pub fn list_favorites(&self, username: &str) -> Result<Vec<BeerWithBrewery>> {
        let user = self.user(username)?;
        let beers = self.store.run(FindBeersByIds {
            ids: user.fav_beers,
        })?;

        self.catalog.with_breweries(beers)
    }
}
