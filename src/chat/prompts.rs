//! System prompt and console text

use crate::tools::ToolSpec;
use chrono::{DateTime, TimeZone};
use std::fmt::Display;

/// Shown once when the REPL starts
pub const EXAMPLE_PROMPTS: &[&str] = &[
    "What's the weather like in Lisbon right now?",
    "Find me YouTube videos about machine learning tutorials",
    "Search Google Scholar for recent papers on quantum computing",
    "Find flights from JFK to LHR next month with a return a week later",
];

/// Usage notes per builtin tool
fn tool_guidance(name: &str) -> Option<&'static str> {
    match name {
        "geocode" => Some(
            "Pass only the city name to geocode, e.g. \"Paris\" and not \"Paris, France\".",
        ),
        "get_weather" => Some(
            "For weather questions call get_weather with the city, or with coordinates you already have.",
        ),
        "web_search" => Some(
            "Use web_search for general or current information; set time_period to \"any\" when recency does not matter and include_news for headlines.",
        ),
        "web_fetch" => Some(
            "Use web_fetch to read a specific page in full, for example a promising web_search result.",
        ),
        "youtube_search" => Some(
            "For videos use youtube_search. Default to sort_by=\"relevance\"; use upload_date (last_hour, today, this_week, this_month, this_year) and duration (short <4 min, medium 4-20 min, long >20 min) when the request implies them.",
        ),
        "scholar_search" => Some(
            "For academic papers use scholar_search. Use sort_by=\"date\" or publication_date (since_2023, since_2020, since_2017, since_2014) when recency matters, and author for a specific researcher.",
        ),
        "google_flights_search" => Some(
            "For flights use google_flights_search with IATA airport codes and YYYY-MM-DD dates. stops is one of any, nonstop, 1stop, 2stops; flight_class is one of economy, premium_economy, business, first; airlines is a list of IATA codes.",
        ),
        _ => None,
    }
}

/// Build the system prompt for the given tools at `now`
pub fn system_prompt<Tz>(specs: &[&ToolSpec], now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let mut prompt = format!(
        "Current date and time: {}\n\nYou are a helpful assistant with access to these tools:\n",
        now.format("%Y-%m-%d %H:%M:%S %:z")
    );

    for (i, spec) in specs.iter().enumerate() {
        prompt.push_str(&format!("{}. {}: {}\n", i + 1, spec.name, spec.description));
    }

    let guidance: Vec<&str> = specs.iter().filter_map(|s| tool_guidance(&s.name)).collect();
    if !guidance.is_empty() {
        prompt.push('\n');
        for line in guidance {
            prompt.push_str("- ");
            prompt.push_str(line);
            prompt.push('\n');
        }
    }

    prompt.push_str(
        "\nIf a tool returns an error, explain the problem or try a corrected call. \
Always be polite, informative and concise in your responses.",
    );
    prompt
}
