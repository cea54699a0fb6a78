//! Builtin tools
//!
//! Each tool wraps a single external HTTP API. Request building and response
//! normalization are pure functions; only `execute` performs I/O through the
//! shared [`HttpAdapter`](crate::http::HttpAdapter).

pub mod flight_search;
pub mod geocoding;
pub mod html;
pub mod scholar_search;
pub mod serpapi;
pub mod video_search;
pub mod weather;
pub mod web_fetch;
pub mod web_search;

pub use flight_search::FlightSearchTool;
pub use geocoding::{GeocodingTool, Location};
pub use scholar_search::ScholarSearchTool;
pub use serpapi::SerpApiClient;
pub use video_search::VideoSearchTool;
pub use weather::WeatherTool;
pub use web_fetch::WebFetchTool;
pub use web_search::WebSearchTool;

use crate::config::ServicesSection;
use crate::http::HttpAdapter;
use crate::tools::{ToolError, ToolRegistry};
use std::sync::Arc;

/// Build the standard registry with all seven tools, in prompt order
pub fn builtin_registry(
    services: &ServicesSection,
    adapter: Arc<dyn HttpAdapter>,
) -> Result<ToolRegistry, ToolError> {
    let serpapi = SerpApiClient::new(
        adapter.clone(),
        &services.serpapi_url,
        services.serpapi_api_key.clone(),
    );
    let geocoder = GeocodingTool::new(adapter.clone(), &services.geocoding_url);

    let mut registry = ToolRegistry::new();
    registry.register(Box::new(geocoder.clone()))?;
    registry.register(Box::new(WeatherTool::new(
        adapter.clone(),
        &services.forecast_url,
        geocoder,
    )))?;
    registry.register(Box::new(WebSearchTool::new(serpapi.clone())))?;
    registry.register(Box::new(WebFetchTool::new(adapter, services)))?;
    registry.register(Box::new(VideoSearchTool::new(serpapi.clone())))?;
    registry.register(Box::new(ScholarSearchTool::new(serpapi.clone())))?;
    registry.register(Box::new(FlightSearchTool::new(serpapi)))?;

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubAdapter;

    #[test]
    fn test_builtin_registry_contents() {
        let registry =
            builtin_registry(&ServicesSection::default(), Arc::new(StubAdapter::new())).unwrap();

        assert_eq!(
            registry.list_tools(),
            vec![
                "geocode",
                "get_weather",
                "web_search",
                "web_fetch",
                "youtube_search",
                "scholar_search",
                "google_flights_search",
            ]
        );
    }

    #[test]
    fn test_builtin_schemas_compile() {
        let registry =
            builtin_registry(&ServicesSection::default(), Arc::new(StubAdapter::new())).unwrap();

        for spec in registry.specs() {
            let schema = spec.json_schema();
            assert!(
                jsonschema::validator_for(&schema).is_ok(),
                "schema for {} should compile",
                spec.name
            );
            assert!(!spec.description.is_empty());
        }
    }
}
