//! YouTube search through SerpAPI

use super::serpapi::{path, text, SerpApiClient};
use crate::http::HttpRequest;
use crate::tools::{parse_params, ParamSpec, ParamType, Payload, Tool, ToolError, ToolSpec};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

const MAX_RESULTS: u32 = 100;

#[derive(Debug, Deserialize)]
struct VideoParams {
    query: String,
    num_results: u32,
    sort_by: String,
    upload_date: Option<String>,
    duration: Option<String>,
}

/// `youtube_search` tool
pub struct VideoSearchTool {
    spec: ToolSpec,
    serpapi: SerpApiClient,
}

impl VideoSearchTool {
    pub fn new(serpapi: SerpApiClient) -> Self {
        let spec = ToolSpec::new(
            "youtube_search",
            "Search YouTube for videos. Can sort by upload date, views or rating and filter by upload date or duration.",
        )
        .param(ParamSpec::required("query", ParamType::String, "Search query"))
        .param(
            ParamSpec::optional("num_results", ParamType::Integer, "Number of videos to return")
                .with_default(json!(10))
                .range(1.0, MAX_RESULTS as f64),
        )
        .param(
            ParamSpec::optional("sort_by", ParamType::String, "Result ordering")
                .with_default(json!("relevance"))
                .one_of(&["relevance", "upload_date", "view_count", "rating"]),
        )
        .param(
            ParamSpec::optional("upload_date", ParamType::String, "Only videos uploaded within this window")
                .one_of(&["last_hour", "today", "this_week", "this_month", "this_year"]),
        )
        .param(
            ParamSpec::optional("duration", ParamType::String, "short (<4 min), medium (4-20 min) or long (>20 min)")
                .one_of(&["short", "medium", "long"]),
        );

        Self { spec, serpapi }
    }
}

/// YouTube's opaque `sp` filter codes, already URL-encoded as SerpAPI expects
fn filter_codes(params: &VideoParams) -> Vec<&'static str> {
    let sort = match params.sort_by.as_str() {
        "upload_date" => Some("CAI%253D"),
        "view_count" => Some("CAM%253D"),
        "rating" => Some("CAE%253D"),
        _ => None,
    };
    let upload = params.upload_date.as_deref().and_then(|d| match d {
        "last_hour" => Some("EgIIAQ%253D%253D"),
        "today" => Some("EgQIAhAB"),
        "this_week" => Some("EgQIAxAB"),
        "this_month" => Some("EgQIBBAB"),
        "this_year" => Some("EgQIBRAB"),
        _ => None,
    });
    let duration = params.duration.as_deref().and_then(|d| match d {
        "short" => Some("EgQQARgB"),
        "medium" => Some("EgQQARgC"),
        "long" => Some("EgQQARgD"),
        _ => None,
    });

    [sort, upload, duration].into_iter().flatten().collect()
}

fn build_request(base: HttpRequest, params: &VideoParams) -> HttpRequest {
    let codes = filter_codes(params);
    let sp = (!codes.is_empty()).then(|| codes.join(","));

    base.query("search_query", &params.query)
        .query("num", params.num_results.min(MAX_RESULTS))
        .query("gl", "us")
        .query("hl", "en")
        .query_opt("sp", sp)
}

/// `v=` parameter of a watch link
fn video_id(link: &str) -> Option<String> {
    let query = link.split_once('?')?.1;
    query
        .split('&')
        .find_map(|pair| pair.strip_prefix("v="))
        .map(|id| id.to_string())
}

fn thumbnail(item: &Value) -> String {
    match item.get("thumbnail") {
        Some(Value::String(url)) => url.clone(),
        Some(object) => text(object, "static"),
        None => String::new(),
    }
}

fn to_payload(body: &Value, params: &VideoParams) -> Payload {
    let videos: Vec<Value> = body
        .get("video_results")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .take(params.num_results as usize)
                .map(|item| {
                    let link = text(item, "link");
                    json!({
                        "title": text(item, "title"),
                        "link": link,
                        "video_id": video_id(&link),
                        "channel": text(item, "channel"),
                        "published_date": text(item, "published_date"),
                        "views": item.get("views").cloned().unwrap_or(Value::Null),
                        "duration": text(item, "length"),
                        "description": text(item, "description"),
                        "thumbnail": thumbnail(item),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    let mut payload = Payload::new();
    payload.insert("query".to_string(), json!(params.query));
    payload.insert("videos".to_string(), Value::Array(videos));
    if let Some(total) = path(body, &["search_information", "total_results"]) {
        payload.insert("total_results".to_string(), total.clone());
    }
    payload
}

#[async_trait]
impl Tool for VideoSearchTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, arguments: Payload) -> Result<Payload, ToolError> {
        let params: VideoParams = parse_params(arguments)?;
        let request = build_request(self.serpapi.request("youtube")?, &params);
        let body = self.serpapi.search(request).await?;
        Ok(to_payload(&body, &params))
    }
}
