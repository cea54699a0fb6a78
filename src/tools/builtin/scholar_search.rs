//! Google Scholar search through SerpAPI

use super::serpapi::{path, text, value_text, SerpApiClient};
use crate::http::HttpRequest;
use crate::tools::{parse_params, ParamSpec, ParamType, Payload, Tool, ToolError, ToolSpec};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

/// Scholar pages hold at most 20 results
const MAX_RESULTS: u32 = 20;

#[derive(Debug, Deserialize)]
struct ScholarParams {
    query: String,
    num_results: u32,
    sort_by: String,
    publication_date: Option<String>,
    author: Option<String>,
}

/// `scholar_search` tool
pub struct ScholarSearchTool {
    spec: ToolSpec,
    serpapi: SerpApiClient,
}

impl ScholarSearchTool {
    pub fn new(serpapi: SerpApiClient) -> Self {
        let spec = ToolSpec::new(
            "scholar_search",
            "Search Google Scholar for academic papers. Returns titles, authors, publication details, citation counts and PDF links when available.",
        )
        .param(ParamSpec::required("query", ParamType::String, "Search query"))
        .param(
            ParamSpec::optional("num_results", ParamType::Integer, "Number of papers to return")
                .with_default(json!(10))
                .range(1.0, MAX_RESULTS as f64),
        )
        .param(
            ParamSpec::optional("sort_by", ParamType::String, "Order by relevance or by date")
                .with_default(json!("relevance"))
                .one_of(&["relevance", "date"]),
        )
        .param(
            ParamSpec::optional("publication_date", ParamType::String, "Only papers published since")
                .one_of(&["since_2023", "since_2020", "since_2017", "since_2014"]),
        )
        .param(ParamSpec::optional(
            "author",
            ParamType::String,
            "Restrict results to this author",
        ));

        Self { spec, serpapi }
    }
}

fn since_year(period: Option<&str>) -> Option<u16> {
    match period? {
        "since_2023" => Some(2023),
        "since_2020" => Some(2020),
        "since_2017" => Some(2017),
        "since_2014" => Some(2014),
        _ => None,
    }
}

fn build_request(base: HttpRequest, params: &ScholarParams) -> HttpRequest {
    let by_date = (params.sort_by == "date").then_some("0,5");
    let author = params.author.as_deref().map(str::trim).filter(|a| !a.is_empty());

    base.query("q", &params.query)
        .query("num", params.num_results.min(MAX_RESULTS))
        .query("hl", "en")
        .query_opt("as_user", author)
        .query_opt("as_sdt", by_date)
        .query_opt("as_ylo", since_year(params.publication_date.as_deref()))
}

fn pdf_link(item: &Value) -> Option<String> {
    item.get("resources")?
        .as_array()?
        .iter()
        .find(|r| {
            text(r, "file_format").eq_ignore_ascii_case("pdf") || text(r, "title").eq_ignore_ascii_case("pdf")
        })
        .map(|r| text(r, "link"))
}

fn paper(item: &Value) -> Value {
    let authors: Vec<String> = path(item, &["publication_info", "authors"])
        .and_then(Value::as_array)
        .map(|list| list.iter().map(value_text).filter(|a| !a.is_empty()).collect())
        .unwrap_or_default();

    let cited_by = path(item, &["inline_links", "cited_by", "total"])
        .and_then(Value::as_u64)
        .unwrap_or(0);

    json!({
        "title": text(item, "title"),
        "link": text(item, "link"),
        "snippet": text(item, "snippet"),
        "authors": authors,
        "publication": path(item, &["publication_info", "summary"]).map(value_text).unwrap_or_default(),
        "cited_by": cited_by,
        "pdf_link": pdf_link(item),
    })
}

fn to_payload(body: &Value, params: &ScholarParams) -> Payload {
    let papers: Vec<Value> = body
        .get("organic_results")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .take(params.num_results as usize)
                .map(paper)
                .collect()
        })
        .unwrap_or_default();

    let mut payload = Payload::new();
    payload.insert("query".to_string(), json!(params.query));
    payload.insert("papers".to_string(), Value::Array(papers));

    if let Some(related) = body.get("related_searches").and_then(Value::as_array) {
        let related: Vec<String> = related
            .iter()
            .map(|r| text(r, "query"))
            .filter(|q| !q.is_empty())
            .collect();
        if !related.is_empty() {
            payload.insert("related_searches".to_string(), json!(related));
        }
    }

    payload
}

#[async_trait]
impl Tool for ScholarSearchTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, arguments: Payload) -> Result<Payload, ToolError> {
        let params: ScholarParams = parse_params(arguments)?;
        let request = build_request(self.serpapi.request("google_scholar")?, &params);
        let body = self.serpapi.search(request).await?;
        Ok(to_payload(&body, &params))
    }
}
