//! # Catalog
//!
//! Thin GraphQL client for the Rick & Morty dataset. Supplies the location
//! pages the UI browses, location lookups by id, and the full character and
//! location lists the search index is built from.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;

use crate::narration::{LocationDescriptor, ResidentRef};

pub const DEFAULT_GRAPHQL_URL: &str = "https://rickandmortyapi.com/graphql";

const LOCATION_FIELDS: &str = r#"
    id
    name
    type
    dimension
    residents {
      id
      name
      status
      species
      image
    }
"#;

const CHARACTER_FIELDS: &str = r#"
    id
    name
    status
    species
    type
    gender
    origin { name }
    location { name }
"#;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("catalog returned status {0}")]
    Status(u16),
    #[error("catalog query failed: {0}")]
    GraphQl(String),
    #[error("catalog response had no data")]
    MissingData,
    #[error("could not decode catalog response: {0}")]
    Decode(#[from] serde_json::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resident {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub species: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

impl Resident {
    /// Keep every known field so the caller gets it back untouched
    pub fn to_ref(&self) -> ResidentRef {
        let mut resident = ResidentRef::named(self.name.clone());
        resident.extra.insert("id".to_string(), json!(self.id));
        for (key, value) in [
            ("status", &self.status),
            ("species", &self.species),
            ("image", &self.image),
        ] {
            if let Some(value) = value {
                resident.extra.insert(key.to_string(), json!(value));
            }
        }
        resident
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub dimension: Option<String>,
    #[serde(default)]
    pub residents: Vec<Resident>,
}

impl Location {
    pub fn descriptor(&self) -> LocationDescriptor {
        LocationDescriptor::new(
            self.name.clone(),
            self.kind.clone().unwrap_or_else(|| "unknown".to_string()),
            self.residents.iter().map(Resident::to_ref).collect(),
        )
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedRef {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Character {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub species: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub origin: Option<NamedRef>,
    #[serde(default)]
    pub location: Option<NamedRef>,
}

#[derive(Debug, Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct PageInfo {
    #[serde(default)]
    next: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct Page<T> {
    #[serde(default)]
    info: Option<PageInfo>,
    #[serde(default)]
    results: Vec<T>,
}

pub struct CatalogClient {
    http: reqwest::Client,
    endpoint: String,
}

impl Default for CatalogClient {
    fn default() -> Self {
        Self::new(DEFAULT_GRAPHQL_URL)
    }
}

impl CatalogClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
        }
    }

    async fn query(&self, query: &str, variables: Value) -> Result<Value, CatalogError> {
        let response = self
            .http
            .post(&self.endpoint)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Status(status.as_u16()));
        }
        extract_data(response.json().await?)
    }

    /// One page of locations with their residents
    pub async fn fetch_page(&self, page: u32) -> Result<Vec<Location>, CatalogError> {
        let query = format!(
            "query ($page: Int) {{ locations(page: $page) {{ results {{ {} }} }} }}",
            LOCATION_FIELDS
        );
        let data = self.query(&query, json!({ "page": page })).await?;
        let page: Page<Location> = field(data, "locations")?;
        Ok(page.results)
    }

    /// Locations by id, in the order the catalog returns them
    pub async fn fetch_by_ids(&self, ids: &[String]) -> Result<Vec<Location>, CatalogError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = format!(
            "query ($ids: [ID!]!) {{ locationsByIds(ids: $ids) {{ {} }} }}",
            LOCATION_FIELDS
        );
        let data = self.query(&query, json!({ "ids": ids })).await?;
        field(data, "locationsByIds")
    }

    pub async fn fetch_all_locations(&self) -> Result<Vec<Location>, CatalogError> {
        self.fetch_all("locations", LOCATION_FIELDS).await
    }

    pub async fn fetch_all_characters(&self) -> Result<Vec<Character>, CatalogError> {
        self.fetch_all("characters", CHARACTER_FIELDS).await
    }

    /// Follow `info.next` until the last page
    async fn fetch_all<T: DeserializeOwned>(
        &self,
        key: &str,
        fields: &str,
    ) -> Result<Vec<T>, CatalogError> {
        let query = format!(
            "query ($page: Int) {{ {}(page: $page) {{ info {{ next }} results {{ {} }} }} }}",
            key, fields
        );

        let mut all = Vec::new();
        let mut page = 1;
        loop {
            tracing::info!("Fetching {} page {}...", key, page);
            let data = self.query(&query, json!({ "page": page })).await?;
            let current: Page<T> = field(data, key)?;
            all.extend(current.results);

            match current.info.and_then(|info| info.next) {
                Some(next) => page = next,
                None => break,
            }
        }
        Ok(all)
    }
}

fn extract_data(response: Value) -> Result<Value, CatalogError> {
    let response: GraphQlResponse = serde_json::from_value(response)?;
    if !response.errors.is_empty() {
        let messages: Vec<String> = response.errors.into_iter().map(|e| e.message).collect();
        return Err(CatalogError::GraphQl(messages.join("; ")));
    }
    response.data.ok_or(CatalogError::MissingData)
}

fn field<T: DeserializeOwned>(mut data: Value, key: &str) -> Result<T, CatalogError> {
    let value = data
        .get_mut(key)
        .map(Value::take)
        .filter(|v| !v.is_null())
        .ok_or(CatalogError::MissingData)?;
    Ok(serde_json::from_value(value)?)
}
