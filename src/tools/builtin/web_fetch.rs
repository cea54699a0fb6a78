//! Fetch a web page and return its readable content

use super::html::{
    extract_links, extract_meta, extract_readable_text, extract_title, truncate_chars,
};
use crate::config::ServicesSection;
use crate::http::{HttpAdapter, HttpError, HttpRequest, RawResponse};
use crate::tools::{parse_params, ParamSpec, ParamType, Payload, Tool, ToolError, ToolSpec};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Body excerpt kept in status-code errors
const ERROR_BODY_CHARS: usize = 200;

#[derive(Debug, Deserialize)]
struct FetchParams {
    url: String,
    extract_text: bool,
}

/// `web_fetch` tool
pub struct WebFetchTool {
    spec: ToolSpec,
    adapter: Arc<dyn HttpAdapter>,
    user_agent: String,
    timeout: Duration,
    max_content_chars: usize,
}

impl WebFetchTool {
    pub fn new(adapter: Arc<dyn HttpAdapter>, services: &ServicesSection) -> Self {
        let spec = ToolSpec::new(
            "web_fetch",
            "Fetch a web page by URL and return its title, description, readable text and links. Use after web_search to read a result in full.",
        )
        .param(ParamSpec::required(
            "url",
            ParamType::String,
            "Absolute http or https URL to fetch",
        ))
        .param(
            ParamSpec::optional(
                "extract_text",
                ParamType::Boolean,
                "Extract readable text from HTML instead of returning raw content",
            )
            .with_default(json!(true)),
        );

        Self {
            spec,
            adapter,
            user_agent: services.browser_user_agent.clone(),
            timeout: Duration::from_secs(services.fetch_timeout_secs),
            max_content_chars: services.max_content_chars,
        }
    }

    fn build_request(&self, url: &Url) -> HttpRequest {
        HttpRequest::get(url.as_str())
            .header("User-Agent", self.user_agent.clone())
            .header(
                "Accept",
                "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8",
            )
            .timeout(self.timeout)
    }

    async fn to_payload(&self, url: &Url, response: RawResponse, extract_text: bool) -> Payload {
        let content_type = response
            .header("content-type")
            .unwrap_or_default()
            .to_string();

        let mut payload = Payload::new();
        payload.insert("url".to_string(), json!(url.as_str()));
        payload.insert("status".to_string(), json!(response.status));
        payload.insert("content_type".to_string(), json!(content_type));
        payload.insert("size".to_string(), json!(response.body.len()));

        if extract_text && looks_like_html(&content_type, &response.body) {
            let html = &response.body;
            if let Some(title) = extract_title(html) {
                payload.insert("title".to_string(), json!(title));
            }
            if let Some(description) = extract_meta(html, &["description", "og:description"]) {
                payload.insert("description".to_string(), json!(description));
            }

            let text = extract_readable_text(html, url).await;
            let (text, truncated) = truncate_chars(&text, self.max_content_chars);
            payload.insert("text".to_string(), json!(text));
            payload.insert("truncated".to_string(), json!(truncated));
            payload.insert("links".to_string(), json!(extract_links(html, url)));
        } else {
            let (content, truncated) = truncate_chars(&response.body, self.max_content_chars);
            payload.insert("raw_content".to_string(), json!(content));
            payload.insert("truncated".to_string(), json!(truncated));
        }

        payload
    }
}

fn parse_url(raw: &str) -> Result<Url, ToolError> {
    let url = Url::parse(raw.trim())
        .map_err(|e| ToolError::Validation(format!("'{raw}' is not a valid URL: {e}")))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(ToolError::Validation(format!(
            "only http and https URLs can be fetched, got '{scheme}'"
        ))),
    }
}

fn looks_like_html(content_type: &str, body: &str) -> bool {
    if !content_type.is_empty() {
        return content_type.contains("html");
    }
    let head: String = body.chars().take(512).collect::<String>().to_ascii_lowercase();
    head.contains("<html") || head.contains("<!doctype html")
}

/// Keep status errors short; error pages can be large
fn shorten_remote_error(error: HttpError) -> ToolError {
    match error {
        HttpError::Remote { status, body } => ToolError::Remote {
            status,
            body: truncate_chars(body.trim(), ERROR_BODY_CHARS).0,
        },
        other => other.into(),
    }
}

#[async_trait]
impl Tool for WebFetchTool {
    fn spec(&self) -> &ToolSpec {
        &self.spec
    }

    async fn execute(&self, arguments: Payload) -> Result<Payload, ToolError> {
        let params: FetchParams = parse_params(arguments)?;
        let url = parse_url(&params.url)?;

        let response = self
            .adapter
            .call(self.build_request(&url))
            .await
            .map_err(shorten_remote_error)?;

        Ok(self.to_payload(&url, response, params.extract_text).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::StubAdapter;
    use crate::tools::ToolErrorKind;

    const PAGE: &str = r#"<!DOCTYPE html><html><head><title>Example Domain</title>
        <meta name="description" content="An example page"></head>
        <body><div><h1>Example Domain</h1><p>This domain is for use in illustrative examples in documents.</p>
        <a href="https://www.iana.org/domains/example">More information...</a></div></body></html>"#;

    fn tool(stub: Arc<StubAdapter>, max_chars: usize) -> WebFetchTool {
        let services = ServicesSection {
            max_content_chars: max_chars,
            ..Default::default()
        };
        WebFetchTool::new(stub, &services)
    }

    #[test]
    fn test_parse_url_rejects_other_schemes() {
        assert!(parse_url("https://example.com").is_ok());
        assert!(matches!(parse_url("ftp://example.com"), Err(ToolError::Validation(_))));
        assert!(matches!(parse_url("not a url"), Err(ToolError::Validation(_))));
    }

    #[test]
    fn test_looks_like_html() {
        assert!(looks_like_html("text/html; charset=utf-8", ""));
        assert!(!looks_like_html("application/json", "<html>"));
        assert!(looks_like_html("", "<!DOCTYPE html><html>"));
        assert!(!looks_like_html("", "{\"a\": 1}"));
    }

    #[test]
    fn test_build_request_uses_browser_user_agent() {
        let tool = tool(Arc::new(StubAdapter::new()), 100);
        let request = tool.build_request(&Url::parse("https://example.com").unwrap());

        let agent = request
            .headers
            .iter()
            .find(|(k, _)| k == "User-Agent")
            .map(|(_, v)| v.as_str());
        assert!(agent.unwrap().starts_with("Mozilla/5.0"));
        assert_eq!(request.timeout, Some(Duration::from_secs(10)));
    }

    #[tokio::test]
    async fn test_fetch_html_page() {
        let stub = Arc::new(StubAdapter::new());
        stub.respond_html("https://example.com/", 200, PAGE);

        let result = tool(stub, 20_000)
            .invoke(&json!({"url": "https://example.com/"}))
            .await;
        let payload = result.payload().expect("fetch should succeed");

        assert_eq!(payload["status"], json!(200));
        assert_eq!(payload["title"], "Example Domain");
        assert_eq!(payload["description"], "An example page");
        assert!(payload["text"].as_str().unwrap().contains("illustrative examples"));
        assert_eq!(payload["links"][0]["url"], "https://www.iana.org/domains/example");
        assert_eq!(payload["truncated"], json!(false));
    }

    #[tokio::test]
    async fn test_fetch_truncates_text() {
        let stub = Arc::new(StubAdapter::new());
        stub.respond_html("https://example.com/", 200, PAGE);

        let result = tool(stub, 20)
            .invoke(&json!({"url": "https://example.com/"}))
            .await;
        let payload = result.payload().unwrap();

        assert_eq!(payload["text"].as_str().unwrap().chars().count(), 20);
        assert_eq!(payload["truncated"], json!(true));
    }

    #[tokio::test]
    async fn test_fetch_raw_content_when_extraction_disabled() {
        let stub = Arc::new(StubAdapter::new());
        stub.respond_html("https://example.com/", 200, PAGE);

        let result = tool(stub, 20_000)
            .invoke(&json!({"url": "https://example.com/", "extract_text": false}))
            .await;
        let payload = result.payload().unwrap();

        assert!(payload["raw_content"].as_str().unwrap().starts_with("<!DOCTYPE html>"));
        assert!(!payload.contains_key("text"));
    }

    #[tokio::test]
    async fn test_fetch_404_reports_status() {
        let stub = Arc::new(StubAdapter::new());
        stub.fail(
            "https://example.com/missing",
            HttpError::Remote {
                status: 404,
                body: "x".repeat(5_000),
            },
        );

        let result = tool(stub, 20_000)
            .invoke(&json!({"url": "https://example.com/missing"}))
            .await;

        assert_eq!(result.error_kind(), Some(ToolErrorKind::Remote));
        let message = result.message().unwrap();
        assert!(message.contains("404"));
        assert!(message.len() < 300);
    }

    #[tokio::test]
    async fn test_fetch_invalid_url_makes_no_request() {
        let stub = Arc::new(StubAdapter::new());
        let result = tool(stub.clone(), 100)
            .invoke(&json!({"url": "file:///etc/passwd"}))
            .await;

        assert_eq!(result.error_kind(), Some(ToolErrorKind::Validation));
        assert_eq!(stub.call_count(), 0);
    }
}
