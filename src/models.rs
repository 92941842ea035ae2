use chrono::NaiveDateTime;
use diesel::prelude::*;
use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use super::schema::*;

/// A registered account together with its favourites and review back-references.
///
/// `fav_beers` and `reviews` keep the order in which entries were added.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub username: String,
    pub id: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub fav_beers: Vec<String>,
    pub reviews: Vec<String>,
    pub created_at: NaiveDateTime,
}

#[derive(Queryable)]
pub struct UserRecord {
    pub username: String,
    pub id: String,
    pub password: String,
    pub created_at: NaiveDateTime,
}

impl UserRecord {
    pub fn into_user(self, fav_beers: Vec<String>, reviews: Vec<String>) -> User {
        User {
            username: self.username,
            id: self.id,
            password: self.password,
            fav_beers,
            reviews,
            created_at: self.created_at,
        }
    }
}

#[derive(Insertable)]
#[diesel(table_name = users)]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub id: &'a str,
    pub password: &'a str,
    pub created_at: NaiveDateTime,
}

/// A catalog beer.
///
/// Only the fields the service joins or filters on are typed; everything
/// else from the catalog document is kept verbatim in `details`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Beer {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cat_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_name: Option<String>,
    #[serde(
        default,
        deserialize_with = "opt_string_or_number",
        skip_serializing_if = "Option::is_none"
    )]
    pub brewery_id: Option<String>,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

#[derive(Insertable)]
#[diesel(table_name = beers)]
pub struct NewBeer<'a> {
    pub id: &'a str,
    pub cat_name: Option<&'a str>,
    pub style_name: Option<&'a str>,
    pub brewery_id: Option<&'a str>,
    pub doc: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Brewery {
    #[serde(deserialize_with = "string_or_number")]
    pub id: String,
    #[serde(flatten)]
    pub details: Map<String, Value>,
}

#[derive(Insertable)]
#[diesel(table_name = breweries)]
pub struct NewBrewery<'a> {
    pub id: &'a str,
    pub doc: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub id: String,
    pub beer_id: String,
    pub rating: i16,
    pub review: String,
    pub tastes: Vec<String>,
    pub user_id: String,
    pub created_at: NaiveDateTime,
}

/// `tastes` is stored as a JSON array in a text column.
#[derive(Queryable)]
pub struct ReviewRecord {
    pub id: String,
    pub beer_id: String,
    pub user_id: String,
    pub rating: i16,
    pub review: String,
    pub tastes: String,
    pub created_at: NaiveDateTime,
}

impl ReviewRecord {
    pub fn into_review(self) -> Result<Review, serde_json::Error> {
        Ok(Review {
            tastes: serde_json::from_str(&self.tastes)?,
            id: self.id,
            beer_id: self.beer_id,
            rating: self.rating,
            review: self.review,
            user_id: self.user_id,
            created_at: self.created_at,
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = reviews)]
pub struct NewReview<'a> {
    pub id: &'a str,
    pub beer_id: &'a str,
    pub user_id: &'a str,
    pub rating: i16,
    pub review: &'a str,
    pub tastes: String,
    pub created_at: NaiveDateTime,
}

/// Review submission as it arrives from a client. Every field is optional
/// here so that absence can be reported as a validation error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReviewForm {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub beer_id: Option<String>,
    #[serde(default)]
    pub rating: Option<i16>,
    #[serde(default)]
    pub review: Option<String>,
    #[serde(default)]
    pub tastes: Option<Vec<String>>,
}

#[derive(Debug, Clone, Queryable, Insertable)]
#[diesel(table_name = login_session)]
pub struct Session {
    #[diesel(column_name = id)]
    pub token: String,
    pub username: String,
    pub created_at: NaiveDateTime,
    pub expires_at: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BeerWithBrewery {
    #[serde(flatten)]
    pub beer: Beer,
    pub brewery: Option<Brewery>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewWithUser {
    #[serde(flatten)]
    pub review: Review,
    pub username: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReviewWithBeer {
    #[serde(flatten)]
    pub review: ReviewWithUser,
    pub beer: Option<Beer>,
}

/// One catalog category and the distinct styles brewed under it.
///
/// Serializes as a single-key object, `{"Ale": ["IPA", "Stout"]}`.
#[derive(Debug, Clone, PartialEq)]
pub struct Category {
    pub name: String,
    pub styles: Vec<String>,
}

impl serde::Serialize for Category {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.name, &self.styles)?;
        map.end()
    }
}

/// Field-equality filters over catalog documents.
///
/// Values are compared against the text form of the document field, so
/// `abv=5.0` matches a numeric `5.0` and `brewery_id=10` matches `"10"`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter(BTreeMap<String, String>);

impl Filter {
    pub fn new() -> Filter {
        Filter::default()
    }

    pub fn with(mut self, field: &str, value: &str) -> Filter {
        self.0.insert(field.to_owned(), value.to_owned());
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &String)> {
        self.0.iter()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Filter {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Filter {
        Filter(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Catalog identifiers show up both as JSON strings and numbers.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match <Value as serde::Deserialize>::deserialize(deserializer)? {
        Value::String(s) => Ok(s),
        Value::Number(n) => Ok(n.to_string()),
        other => Err(de::Error::custom(format!(
            "expected a string or number identifier, got {}",
            other
        ))),
    }
}

pub(crate) fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match <Value as serde::Deserialize>::deserialize(deserializer)? {
        Value::Null => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        other => Err(de::Error::custom(format!(
            "expected a string or number identifier, got {}",
            other
        ))),
    }
}
