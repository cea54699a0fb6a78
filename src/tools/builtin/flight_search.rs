//! Google Flights search through SerpAPI

use super::serpapi::{text, SerpApiClient};
use crate::http::HttpRequest;
use crate::tools::{parse_params, ParamSpec, ParamType, Payload, Tool, ToolError, ToolSpec};
use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use serde::Deserialize;
use serde_json::{json, Value};

const DATE_FORMAT: &str = "%Y-%m-%d";
const MAX_ITINERARIES: usize = 15;

#[derive(Debug, Deserialize)]
struct FlightParams {
    origin: String,
    destination: String,
    departure_date: String,
    return_date: Option<String>,
    adults: u32,
    children: u32,
    infants: u32,
    flight_class: String,
    stops: String,
    max_price: Option<u32>,
    currency: String,
    airlines: Option<Vec<String>>,
}

/// Arguments after date and code checks
#[derive(Debug)]
struct FlightQuery {
    origin: String,
    destination: String,
    departure: NaiveDate,
    return_date: Option<NaiveDate>,
    currency: String,
    params: FlightParams,
}

/// One segment of an itinerary as SerpAPI reports it
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Segment {
    departure_airport: Airport,
    arrival_airport: Airport,
    airline: String,
    flight_number: String,
    duration: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Airport {
    id: String,
    name: String,
    time: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Itinerary {
    flights: Vec<Segment>,
    layovers: Vec<Value>,
    total_duration: Option<u64>,
    price: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FlightsResponse {
    best_flights: Vec<Itinerary>,
    other_flights: Vec<Itinerary>,
    price_insights: Option<Value>,
}

/// `google_flights_search` tool
pub struct FlightSearchTool {
    spec: ToolSpec,
    serpapi: SerpApiClient,
}

impl FlightSearchTool {
    pub fn new(serpapi: SerpApiClient) -> Self {
        let spec = ToolSpec::new(
            "google_flights_search",
            "Search Google Flights for itineraries and prices between two airports. Use IATA airport codes (e.g. 'JFK', 'LHR') and dates in YYYY-MM-DD format.",
        )
        .param(ParamSpec::required("origin", ParamType::String, "Departure airport IATA code, comma-separated codes or a location id"))
        .param(ParamSpec::required("destination", ParamType::String, "Arrival airport IATA code, comma-separated codes or a location id"))
        .param(ParamSpec::required("departure_date", ParamType::String, "Outbound date, YYYY-MM-DD"))
        .param(ParamSpec::optional(
            "return_date",
            ParamType::String,
            "Return date, YYYY-MM-DD; omit for one-way",
        ))
        .param(
            ParamSpec::optional("adults", ParamType::Integer, "Number of adult passengers")
                .with_default(json!(1))
                .range(1.0, 9.0),
        )
        .param(
            ParamSpec::optional("children", ParamType::Integer, "Number of children")
                .with_default(json!(0))
                .range(0.0, 8.0),
        )
        .param(
            ParamSpec::optional("infants", ParamType::Integer, "Number of infants in seat")
                .with_default(json!(0))
                .range(0.0, 4.0),
        )
        .param(
            ParamSpec::optional("flight_class", ParamType::String, "Cabin class")
                .with_default(json!("economy"))
                .one_of(&["economy", "premium_economy", "business", "first"]),
        )
        .param(
            ParamSpec::optional("stops", ParamType::String, "Maximum number of stops")
                .with_default(json!("any"))
                .one_of(&["any", "nonstop", "1stop", "2stops"]),
        )
        .param(
            ParamSpec::optional("max_price", ParamType::Integer, "Maximum ticket price")
                .range(1.0, 1_000_000.0),
        )
        .param(
            ParamSpec::optional("currency", ParamType::String, "Three-letter currency code")
                .with_default(json!("USD")),
        )
        .param(ParamSpec::optional(
            "airlines",
            ParamType::StringArray,
            "Only these airlines (IATA codes)",
        ));

        Self { spec, serpapi }
    }
}

fn parse_date(field: &str, value: &str) -> Result<NaiveDate, ToolError> {
    NaiveDate::parse_from_str(value.trim(), DATE_FORMAT).map_err(|_| {
        ToolError::Validation(format!("{field} '{value}' must be a date in YYYY-MM-DD format"))
    })
}

/// Upper-case each comma-separated airport code; `/m/...` location ids keep their case
fn airport_code(field: &str, value: &str) -> Result<String, ToolError> {
    let codes = value
        .split(',')
        .map(str::trim)
        .map(|code| {
            if code.starts_with('/') {
                code.to_string()
            } else {
                code.to_uppercase()
            }
        })
        .collect::<Vec<_>>();
    if codes.iter().any(String::is_empty) {
        return Err(ToolError::Validation(format!(
            "{field} '{value}' must be an airport code or a comma-separated list of codes"
        )));
    }
    Ok(codes.join(","))
}

/// Check codes and dates against `today` (pure function)
fn validate(params: FlightParams, today: NaiveDate) -> Result<FlightQuery, ToolError> {
    let origin = airport_code("origin", &params.origin)?;
    let destination = airport_code("destination", &params.destination)?;
    if origin == destination {
        return Err(ToolError::Validation(
            "origin and destination must be different airports".to_string(),
        ));
    }

    let departure = parse_date("departure_date", &params.departure_date)?;
    if departure < today {
        return Err(ToolError::Validation(format!(
            "departure_date {departure} is in the past"
        )));
    }

    let return_date = params
        .return_date
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(|d| parse_date("return_date", d))
        .transpose()?;
    if let Some(return_date) = return_date {
        if return_date < departure {
            return Err(ToolError::Validation(format!(
                "return_date {return_date} is before departure_date {departure}"
            )));
        }
    }

    let currency = params.currency.trim().to_ascii_uppercase();
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(ToolError::Validation(format!(
            "currency '{}' must be a three-letter code",
            params.currency
        )));
    }

    Ok(FlightQuery {
        origin,
        destination,
        departure,
        return_date,
        currency,
        params,
    })
}

fn cabin_code(flight_class: &str) -> &'static str {
    match flight_class {
        "premium_economy" => "PREMIUM_ECONOMY",
        "business" => "BUSINESS",
        "first" => "FIRST",
        _ => "ECONOMY",
    }
}

fn max_stops(stops: &str) -> Option<u8> {
    match stops {
        "nonstop" => Some(0),
        "1stop" => Some(1),
        "2stops" => Some(2),
        _ => None,
    }
}

fn build_request(base: HttpRequest, query: &FlightQuery) -> HttpRequest {
    let params = &query.params;
    let airlines = params
        .airlines
        .as_ref()
        .filter(|a| !a.is_empty())
        .map(|a| {
            a.iter()
                .map(|code| code.trim().to_ascii_uppercase())
                .collect::<Vec<_>>()
                .join(",")
        });

    let request = base
        .query("departure_id", &query.origin)
        .query("arrival_id", &query.destination)
        .query("outbound_date", query.departure.format(DATE_FORMAT))
        .query("currency", &query.currency)
        .query("hl", "en")
        .query("adults", params.adults);

    let request = match query.return_date {
        Some(date) => request.query("return_date", date.format(DATE_FORMAT)),
        // one-way
        None => request.query("type", 2),
    };

    request
        .query_opt("children", (params.children > 0).then_some(params.children))
        .query_opt("infants_in_seat", (params.infants > 0).then_some(params.infants))
        .query("flight_class", cabin_code(&params.flight_class))
        .query_opt("max_stops", max_stops(&params.stops))
        .query_opt("price_max", params.max_price)
        .query_opt("airlines", airlines)
}

fn itinerary(item: &Itinerary, category: &str) -> Value {
    let first = item.flights.first();
    let last = item.flights.last();

    let mut airlines: Vec<&str> = Vec::new();
    for segment in &item.flights {
        if !segment.airline.is_empty() && !airlines.contains(&segment.airline.as_str()) {
            airlines.push(&segment.airline);
        }
    }

    let flight_numbers: Vec<&str> = item
        .flights
        .iter()
        .map(|s| s.flight_number.as_str())
        .filter(|n| !n.is_empty())
        .collect();

    let layovers: Vec<String> = item
        .layovers
        .iter()
        .map(|l| {
            let id = text(l, "id");
            if id.is_empty() {
                text(l, "name")
            } else {
                id
            }
        })
        .collect();

    let duration = item
        .total_duration
        .or_else(|| item.flights.iter().map(|s| s.duration).sum::<Option<u64>>());

    json!({
        "category": category,
        "price": item.price.clone().unwrap_or(Value::Null),
        "airline": airlines.join(", "),
        "flight_numbers": flight_numbers,
        "departure_airport": first.map(|s| s.departure_airport.id.as_str()).unwrap_or_default(),
        "departure_airport_name": first.map(|s| s.departure_airport.name.as_str()).unwrap_or_default(),
        "departure_time": first.map(|s| s.departure_airport.time.as_str()).unwrap_or_default(),
        "arrival_airport": last.map(|s| s.arrival_airport.id.as_str()).unwrap_or_default(),
        "arrival_airport_name": last.map(|s| s.arrival_airport.name.as_str()).unwrap_or_default(),
        "arrival_time": last.map(|s| s.arrival_airport.time.as_str()).unwrap_or_default(),
        "duration": duration,
        "stops": item.flights.len().saturating_sub(1),
        "layovers": layovers,
    })
}

fn to_payload(response: &FlightsResponse, query: &FlightQuery) -> Payload {
    let itineraries: Vec<Value> = response
        .best_flights
        .iter()
        .map(|i| itinerary(i, "best"))
        .chain(response.other_flights.iter().map(|i| itinerary(i, "other")))
        .take(MAX_ITINERARIES)
        .collect();

    let mut payload = Payload::new();
    payload.insert("origin".to_string(), json!(query.origin));
    payload.insert("destination".to_string(), json!(query.destination));
    payload.insert(
        "departure_date".to_string(),
        json!(query.departure.format(DATE_FORMAT).to_string()),
    );
    if let Some(date) = query.return_date {
        payload.insert(
            "return_date".to_string(),
            json!(date.format(DATE_FORMAT).to_string()),
        );
    }
    payload.insert("currency".to_string(), json!(query.currency));
    payload.insert("itineraries".to_string(), Value::Array(itineraries));

    if let Some(insights) = &response.price_insights {
        for key in ["lowest_price", "price_level", "typical_price_range"] {
            if let Some(value) = insights.get(key) {
                payload.insert(key.to_string(), value.clone());
            }
        }
    }

    payload
}

#[async_trait]
impl Tool for FlightSearchTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, arguments: Payload) -> Result<Payload, ToolError> {
        let params: FlightParams = parse_params(arguments)?;
        let query = validate(params, Local::now().date_naive())?;

        let request = build_request(self.serpapi.request("google_flights")?, &query);
        let body = self.serpapi.search(request).await?;
        let response: FlightsResponse = serde_json::from_value(body)
            .map_err(|e| ToolError::Decode(format!("unexpected flights response: {e}")))?;

        Ok(to_payload(&response, &query))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubAdapter;
    use crate::tools::ToolErrorKind;
    use chrono::Duration;
    use std::sync::Arc;

    const SERPAPI: &str = "https://serpapi.com/search";

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 1).unwrap()
    }

    fn params(departure: &str, return_date: Option<&str>) -> FlightParams {
        FlightParams {
            origin: "jfk".to_string(),
            destination: "LHR".to_string(),
            departure_date: departure.to_string(),
            return_date: return_date.map(String::from),
            adults: 2,
            children: 0,
            infants: 0,
            flight_class: "business".to_string(),
            stops: "nonstop".to_string(),
            max_price: Some(1500),
            currency: "usd".to_string(),
            airlines: Some(vec!["ba".to_string(), "AA".to_string()]),
        }
    }

    fn flights_body() -> Value {
        json!({
            "best_flights": [{
                "flights": [
                    {
                        "departure_airport": {"name": "John F. Kennedy International Airport", "id": "JFK", "time": "2025-03-10 18:00"},
                        "arrival_airport": {"name": "Dublin Airport", "id": "DUB", "time": "2025-03-11 05:30"},
                        "duration": 390,
                        "airline": "Aer Lingus",
                        "flight_number": "EI 104"
                    },
                    {
                        "departure_airport": {"name": "Dublin Airport", "id": "DUB", "time": "2025-03-11 07:00"},
                        "arrival_airport": {"name": "Heathrow Airport", "id": "LHR", "time": "2025-03-11 08:20"},
                        "duration": 80,
                        "airline": "Aer Lingus",
                        "flight_number": "EI 152"
                    }
                ],
                "layovers": [{"duration": 90, "name": "Dublin Airport", "id": "DUB"}],
                "total_duration": 560,
                "price": 612
            }],
            "other_flights": [{
                "flights": [{
                    "departure_airport": {"id": "JFK", "time": "2025-03-10 21:00"},
                    "arrival_airport": {"id": "LHR", "time": "2025-03-11 09:05"},
                    "duration": 425,
                    "airline": "British Airways"
                }],
                "price": 780
            }],
            "price_insights": {"lowest_price": 612, "price_level": "low", "typical_price_range": [650, 900]}
        })
    }

    #[test]
    fn test_validate_normalizes_codes() {
        let query = validate(params("2025-03-10", Some("2025-03-17")), today()).unwrap();
        assert_eq!(query.origin, "JFK");
        assert_eq!(query.currency, "USD");
        assert_eq!(query.return_date, NaiveDate::from_ymd_opt(2025, 3, 17));
    }

    #[test]
    fn test_validate_accepts_multi_airport_codes() {
        let mut p = params("2025-03-10", None);
        p.origin = " cdg, ory ".to_string();
        p.destination = "/m/05qtj".to_string();

        let query = validate(p, today()).unwrap();
        assert_eq!(query.origin, "CDG,ORY");
        assert_eq!(query.destination, "/m/05qtj");
    }

    #[test]
    fn test_validate_rejects_empty_airport_codes() {
        let mut p = params("2025-03-10", None);
        p.origin = "CDG,,ORY".to_string();
        let err = validate(p, today()).unwrap_err();
        assert!(err.to_string().contains("origin"));

        let mut p = params("2025-03-10", None);
        p.destination = "  ".to_string();
        assert!(validate(p, today()).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_dates() {
        let err = validate(params("10/03/2025", None), today()).unwrap_err();
        assert!(err.to_string().contains("YYYY-MM-DD"));

        let err = validate(params("2025-02-20", None), today()).unwrap_err();
        assert!(err.to_string().contains("in the past"));

        let err = validate(params("2025-03-10", Some("2025-03-05")), today()).unwrap_err();
        assert!(err.to_string().contains("before departure_date"));
    }

    #[test]
    fn test_validate_allows_same_day_trip() {
        assert!(validate(params("2025-03-01", Some("2025-03-01")), today()).is_ok());
    }

    #[test]
    fn test_validate_rejects_same_airport() {
        let mut p = params("2025-03-10", None);
        p.destination = "JFK".to_string();
        assert!(matches!(validate(p, today()), Err(ToolError::Validation(_))));
    }

    #[test]
    fn test_build_request_round_trip() {
        let client = SerpApiClient::new(Arc::new(StubAdapter::new()), SERPAPI, Some("k".into()));
        let query = validate(params("2025-03-10", Some("2025-03-17")), today()).unwrap();
        let request = build_request(client.request("google_flights").unwrap(), &query);

        assert_eq!(request.query_value("engine"), Some("google_flights"));
        assert_eq!(request.query_value("departure_id"), Some("JFK"));
        assert_eq!(request.query_value("outbound_date"), Some("2025-03-10"));
        assert_eq!(request.query_value("return_date"), Some("2025-03-17"));
        assert_eq!(request.query_value("type"), None);
        assert_eq!(request.query_value("flight_class"), Some("BUSINESS"));
        assert_eq!(request.query_value("max_stops"), Some("0"));
        assert_eq!(request.query_value("price_max"), Some("1500"));
        assert_eq!(request.query_value("airlines"), Some("BA,AA"));
        assert_eq!(request.query_value("children"), None);
    }

    #[test]
    fn test_build_request_one_way() {
        let client = SerpApiClient::new(Arc::new(StubAdapter::new()), SERPAPI, Some("k".into()));
        let mut p = params("2025-03-10", None);
        p.stops = "any".to_string();
        p.children = 1;
        let query = validate(p, today()).unwrap();
        let request = build_request(client.request("google_flights").unwrap(), &query);

        assert_eq!(request.query_value("type"), Some("2"));
        assert_eq!(request.query_value("return_date"), None);
        assert_eq!(request.query_value("max_stops"), None);
        assert_eq!(request.query_value("children"), Some("1"));
    }

    #[test]
    fn test_payload_flattens_itineraries() {
        let query = validate(params("2025-03-10", None), today()).unwrap();
        let response: FlightsResponse = serde_json::from_value(flights_body()).unwrap();
        let payload = to_payload(&response, &query);

        let itineraries = payload["itineraries"].as_array().unwrap();
        assert_eq!(itineraries.len(), 2);

        let best = &itineraries[0];
        assert_eq!(best["category"], "best");
        assert_eq!(best["price"], json!(612));
        assert_eq!(best["airline"], "Aer Lingus");
        assert_eq!(best["stops"], json!(1));
        assert_eq!(best["layovers"], json!(["DUB"]));
        assert_eq!(best["departure_airport"], "JFK");
        assert_eq!(best["arrival_airport"], "LHR");
        assert_eq!(best["duration"], json!(560));

        let other = &itineraries[1];
        assert_eq!(other["category"], "other");
        assert_eq!(other["stops"], json!(0));
        assert_eq!(other["duration"], json!(425));

        assert_eq!(payload["lowest_price"], json!(612));
        assert_eq!(payload["price_level"], "low");
    }

    #[tokio::test]
    async fn test_past_departure_makes_no_request() {
        let stub = Arc::new(StubAdapter::new());
        let tool = FlightSearchTool::new(SerpApiClient::new(stub.clone(), SERPAPI, Some("k".into())));
        let yesterday = (Local::now().date_naive() - Duration::days(1))
            .format(DATE_FORMAT)
            .to_string();

        let result = tool
            .invoke(&json!({
                "origin": "JFK",
                "destination": "LHR",
                "departure_date": yesterday
            }))
            .await;

        assert_eq!(result.error_kind(), Some(ToolErrorKind::Validation));
        assert_eq!(stub.call_count(), 0);
    }

    #[tokio::test]
    async fn test_search_end_to_end() {
        let stub = Arc::new(StubAdapter::new());
        stub.respond_json(SERPAPI, flights_body());
        let tool = FlightSearchTool::new(SerpApiClient::new(stub.clone(), SERPAPI, Some("k".into())));
        let departure = (Local::now().date_naive() + Duration::days(30))
            .format(DATE_FORMAT)
            .to_string();

        let result = tool
            .invoke(&json!({
                "origin": "JFK",
                "destination": "LHR",
                "departure_date": departure,
                "airlines": "EI, BA"
            }))
            .await;

        let payload = result.payload().expect("flight search should succeed");
        assert_eq!(payload["itineraries"].as_array().unwrap().len(), 2);
        assert_eq!(stub.requests()[0].query_value("airlines"), Some("EI,BA"));
    }
}
