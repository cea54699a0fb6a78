//! City name to coordinates via the Open-Meteo geocoding API

use crate::http::{HttpAdapter, HttpRequest};
use crate::tools::{parse_params, ParamSpec, ParamType, Payload, Tool, ToolError, ToolSpec};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::debug;

const MAX_MATCHES: usize = 10;

/// A resolved place
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub name: String,
    #[serde(alias = "lat")]
    pub latitude: f64,
    #[serde(alias = "lon")]
    pub longitude: f64,
    #[serde(default)]
    pub country: Option<String>,
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub admin1: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
}

impl Location {
    /// "Paris, Ile-de-France, France"
    pub fn display_name(&self) -> String {
        [Some(&self.name), self.admin1.as_ref(), self.country.as_ref()]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .cloned()
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[derive(Debug, Deserialize)]
struct GeocodingResponse {
    #[serde(default)]
    results: Vec<Location>,
}

#[derive(Debug, Deserialize)]
struct GeocodeParams {
    city: String,
}

/// `geocode` tool
#[derive(Clone)]
pub struct GeocodingTool {
    spec: ToolSpec,
    adapter: Arc<dyn HttpAdapter>,
    endpoint: String,
}

impl GeocodingTool {
    pub fn new(adapter: Arc<dyn HttpAdapter>, endpoint: &str) -> Self {
        let spec = ToolSpec::new(
            "geocode",
            "Get latitude and longitude for a city. Pass only the city name, e.g. 'Paris' rather than 'Paris, France'.",
        )
        .param(ParamSpec::required(
            "city",
            ParamType::String,
            "Name of the city to look up",
        ));

        Self {
            spec,
            adapter,
            endpoint: endpoint.to_string(),
        }
    }

    /// Resolve a city to its matches, best first
    pub async fn lookup(&self, city: &str) -> Result<Vec<Location>, ToolError> {
        let query = normalize_city(city)?;
        let response = self
            .adapter
            .call(build_request(&self.endpoint, &query))
            .await?;
        let body: GeocodingResponse = response.json()?;

        if body.results.is_empty() {
            debug!(city = %query, "Geocoding returned no matches");
            return Err(ToolError::NoResults(format!(
                "No results found for the city '{query}'"
            )));
        }

        Ok(body.results)
    }
}

/// Keep only the part before the first comma; the API matches bare names
fn normalize_city(city: &str) -> Result<String, ToolError> {
    let name = city.split(',').next().unwrap_or_default().trim();
    if name.is_empty() {
        return Err(ToolError::Validation("city must not be empty".to_string()));
    }
    Ok(name.to_string())
}

fn build_request(endpoint: &str, city: &str) -> HttpRequest {
    HttpRequest::get(endpoint)
        .query("name", city)
        .query("count", MAX_MATCHES)
        .query("language", "en")
        .query("format", "json")
}

/// Flatten the best match and list the runners-up by display name
fn to_payload(matches: &[Location]) -> Payload {
    let mut payload = Payload::new();
    let Some(best) = matches.first() else {
        return payload;
    };

    payload.insert("lat".to_string(), json!(best.latitude));
    payload.insert("lon".to_string(), json!(best.longitude));
    if !best.name.is_empty() {
        payload.insert("name".to_string(), json!(best.name));
    }
    for (key, value) in [
        ("country", &best.country),
        ("country_code", &best.country_code),
        ("admin1", &best.admin1),
        ("timezone", &best.timezone),
    ] {
        if let Some(value) = value {
            payload.insert(key.to_string(), json!(value));
        }
    }

    let alternatives: Vec<Value> = matches
        .iter()
        .skip(1)
        .map(|m| json!(m.display_name()))
        .collect();
    if !alternatives.is_empty() {
        payload.insert("alternatives".to_string(), Value::Array(alternatives));
    }

    payload
}

#[async_trait]
impl Tool for GeocodingTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, arguments: Payload) -> Result<Payload, ToolError> {
        let params: GeocodeParams = parse_params(arguments)?;
        let matches = self.lookup(&params.city).await?;
        Ok(to_payload(&matches))
    }
}
