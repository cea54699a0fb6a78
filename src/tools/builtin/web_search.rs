//! Google web search through SerpAPI

use super::serpapi::{text, SerpApiClient};
use crate::http::HttpRequest;
use crate::tools::{parse_params, ParamSpec, ParamType, Payload, Tool, ToolError, ToolSpec};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

const MAX_RESULTS: u32 = 100;

#[derive(Debug, Deserialize)]
struct SearchParams {
    query: String,
    num_results: u32,
    include_news: bool,
    time_period: String,
}

/// `web_search` tool
pub struct WebSearchTool {
    spec: ToolSpec,
    serpapi: SerpApiClient,
}

impl WebSearchTool {
    pub fn new(serpapi: SerpApiClient) -> Self {
        let spec = ToolSpec::new(
            "web_search",
            "Search the web for current information. Use the time filter for recent events and the news option for headlines.",
        )
        .param(ParamSpec::required("query", ParamType::String, "Search query"))
        .param(
            ParamSpec::optional("num_results", ParamType::Integer, "Number of results to return")
                .with_default(json!(10))
                .range(1.0, MAX_RESULTS as f64),
        )
        .param(
            ParamSpec::optional("include_news", ParamType::Boolean, "Also return news results")
                .with_default(json!(false)),
        )
        .param(
            ParamSpec::optional("time_period", ParamType::String, "Only return results from this period")
                .with_default(json!("past_year"))
                .one_of(&["past_day", "past_week", "past_month", "past_year", "any"]),
        );

        Self { spec, serpapi }
    }
}

fn time_filter(period: &str) -> Option<&'static str> {
    match period {
        "past_day" => Some("qdr:d"),
        "past_week" => Some("qdr:w"),
        "past_month" => Some("qdr:m"),
        "past_year" => Some("qdr:y"),
        _ => None,
    }
}

fn build_request(base: HttpRequest, params: &SearchParams) -> HttpRequest {
    base.query("q", &params.query)
        .query("num", params.num_results.min(MAX_RESULTS))
        .query("safe", "active")
        .query("gl", "us")
        .query("hl", "en")
        .query_opt("tbs", time_filter(&params.time_period))
}

fn to_payload(body: &Value, params: &SearchParams) -> Payload {
    let results: Vec<Value> = body
        .get("organic_results")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .take(params.num_results as usize)
                .map(|item| {
                    json!({
                        "title": text(item, "title"),
                        "link": text(item, "link"),
                        "snippet": text(item, "snippet"),
                        "displayed_link": text(item, "displayed_link"),
                        "position": item.get("position").cloned().unwrap_or(Value::Null),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let mut payload = Payload::new();
    payload.insert("query".to_string(), json!(params.query));
    payload.insert("results".to_string(), Value::Array(results));

    if let Some(answer_box) = body.get("answer_box") {
        let answer = ["answer", "snippet", "result"]
            .iter()
            .map(|key| text(answer_box, key))
            .find(|s| !s.is_empty());
        if let Some(answer) = answer {
            payload.insert("answer".to_string(), json!(answer));
        }
    }

    if let Some(graph) = body.get("knowledge_graph") {
        payload.insert(
            "knowledge_graph".to_string(),
            json!({
                "title": text(graph, "title"),
                "type": text(graph, "type"),
                "description": text(graph, "description"),
            }),
        );
    }

    if let Some(questions) = body.get("related_questions").and_then(Value::as_array) {
        let questions: Vec<String> = questions
            .iter()
            .map(|q| text(q, "question"))
            .filter(|q| !q.is_empty())
            .collect();
        if !questions.is_empty() {
            payload.insert("related_questions".to_string(), json!(questions));
        }
    }

    if params.include_news {
        let news: Vec<Value> = body
            .get("news_results")
            .or_else(|| body.get("top_stories"))
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .take(params.num_results as usize)
                    .map(|item| {
                        json!({
                            "title": text(item, "title"),
                            "link": text(item, "link"),
                            "source": text(item, "source"),
                            "date": text(item, "date"),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();
        payload.insert("news".to_string(), Value::Array(news));
    }

    payload
}

#[async_trait]
impl Tool for WebSearchTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, arguments: Payload) -> Result<Payload, ToolError> {
        let params: SearchParams = parse_params(arguments)?;
        let request = build_request(self.serpapi.request("google")?, &params);
        let body = self.serpapi.search(request).await?;
        Ok(to_payload(&body, &params))
    }
}
