//! Current conditions via the Open-Meteo forecast API

use super::geocoding::{GeocodingTool, Location};
use crate::http::{HttpAdapter, HttpRequest};
use crate::tools::{parse_params, ParamSpec, ParamType, Payload, Tool, ToolError, ToolSpec};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;

const CURRENT_FIELDS: &str = "temperature_2m,relative_humidity_2m,apparent_temperature,is_day,\
precipitation,weather_code,wind_speed_10m,wind_direction_10m";

#[derive(Debug, Deserialize)]
struct WeatherParams {
    city: Option<String>,
    latitude: Option<f64>,
    longitude: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct ForecastResponse {
    latitude: f64,
    longitude: f64,
    #[serde(default)]
    timezone: Option<String>,
    current: Option<Value>,
    #[serde(default)]
    current_units: Value,
}

/// `get_weather` tool
pub struct WeatherTool {
    spec: ToolSpec,
    adapter: Arc<dyn HttpAdapter>,
    endpoint: String,
    geocoder: GeocodingTool,
}

impl WeatherTool {
    pub fn new(adapter: Arc<dyn HttpAdapter>, endpoint: &str, geocoder: GeocodingTool) -> Self {
        let spec = ToolSpec::new(
            "get_weather",
            "Get the current weather for a city, or for explicit coordinates. Provide either 'city' or both 'latitude' and 'longitude'.",
        )
        .param(ParamSpec::optional(
            "city",
            ParamType::String,
            "City name; resolved to coordinates automatically",
        ))
        .param(
            ParamSpec::optional("latitude", ParamType::Number, "Latitude in degrees")
                .range(-90.0, 90.0),
        )
        .param(
            ParamSpec::optional("longitude", ParamType::Number, "Longitude in degrees")
                .range(-180.0, 180.0),
        );

        Self {
            spec,
            adapter,
            endpoint: endpoint.to_string(),
            geocoder,
        }
    }

    /// Coordinates win over a city name; the city needs one extra round trip
    async fn resolve(&self, params: &WeatherParams) -> Result<(f64, f64, Option<Location>), ToolError> {
        match (params.latitude, params.longitude, params.city.as_deref()) {
            (Some(lat), Some(lon), _) => Ok((lat, lon, None)),
            (_, _, Some(city)) => {
                let matches = self.geocoder.lookup(city).await?;
                let best = matches
                    .into_iter()
                    .next()
                    .ok_or_else(|| ToolError::NoResults(format!("No results found for the city '{city}'")))?;
                Ok((best.latitude, best.longitude, Some(best)))
            }
            _ => Err(ToolError::Validation(
                "provide either 'city' or both 'latitude' and 'longitude'".to_string(),
            )),
        }
    }
}

fn build_request(endpoint: &str, latitude: f64, longitude: f64) -> HttpRequest {
    HttpRequest::get(endpoint)
        .query("latitude", latitude)
        .query("longitude", longitude)
        .query("current", CURRENT_FIELDS)
        .query("timezone", "auto")
}

/// WMO weather interpretation codes
pub fn describe_weather_code(code: i64) -> &'static str {
    match code {
        0 => "Clear sky",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 | 48 => "Fog",
        51 => "Light drizzle",
        53 => "Moderate drizzle",
        55 => "Dense drizzle",
        56 | 57 => "Freezing drizzle",
        61 => "Slight rain",
        63 => "Moderate rain",
        65 => "Heavy rain",
        66 | 67 => "Freezing rain",
        71 => "Slight snow fall",
        73 => "Moderate snow fall",
        75 => "Heavy snow fall",
        77 => "Snow grains",
        80 => "Slight rain showers",
        81 => "Moderate rain showers",
        82 => "Violent rain showers",
        85 | 86 => "Snow showers",
        95 => "Thunderstorm",
        96 | 99 => "Thunderstorm with hail",
        _ => "Unknown",
    }
}

fn to_payload(response: ForecastResponse, location: Option<&Location>) -> Result<Payload, ToolError> {
    let current = response
        .current
        .ok_or_else(|| ToolError::Decode("forecast response has no current conditions".to_string()))?;
    let units = &response.current_units;

    let mut payload = Payload::new();
    if let Some(location) = location {
        payload.insert("location".to_string(), json!(location.display_name()));
    }
    payload.insert("latitude".to_string(), json!(response.latitude));
    payload.insert("longitude".to_string(), json!(response.longitude));
    if let Some(timezone) = response.timezone {
        payload.insert("timezone".to_string(), json!(timezone));
    }

    let fields = [
        ("time", "time"),
        ("temperature", "temperature_2m"),
        ("apparent_temperature", "apparent_temperature"),
        ("humidity", "relative_humidity_2m"),
        ("precipitation", "precipitation"),
        ("wind_speed", "wind_speed_10m"),
        ("wind_direction", "wind_direction_10m"),
    ];
    for (key, source) in fields {
        if let Some(value) = current.get(source) {
            payload.insert(key.to_string(), value.clone());
        }
    }

    for (key, source) in [
        ("temperature_unit", "temperature_2m"),
        ("precipitation_unit", "precipitation"),
        ("wind_speed_unit", "wind_speed_10m"),
    ] {
        if let Some(unit) = units.get(source) {
            payload.insert(key.to_string(), unit.clone());
        }
    }

    if let Some(is_day) = current.get("is_day").and_then(Value::as_i64) {
        payload.insert("is_day".to_string(), json!(is_day == 1));
    }

    match current.get("weather_code").and_then(Value::as_i64) {
        Some(code) => {
            payload.insert("weather_code".to_string(), json!(code));
            payload.insert("conditions".to_string(), json!(describe_weather_code(code)));
        }
        None => {
            payload.insert("conditions".to_string(), json!("Unknown"));
        }
    }

    Ok(payload)
}

#[async_trait]
impl Tool for WeatherTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, arguments: Payload) -> Result<Payload, ToolError> {
        let params: WeatherParams = parse_params(arguments)?;
        let (latitude, longitude, location) = self.resolve(&params).await?;

        let response = self
            .adapter
            .call(build_request(&self.endpoint, latitude, longitude))
            .await?;
        let forecast: ForecastResponse = response.json()?;

        to_payload(forecast, location.as_ref())
    }
}
