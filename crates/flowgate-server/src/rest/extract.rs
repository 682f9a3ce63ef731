//! `POST /api/extract` — HTML to Markdown extraction with title/description
//! metadata, for pasting a page's content into a prompt.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};

use crate::errors::ServerError;
use crate::server::AppState;

use super::RequireAuth;

const MAX_CONTENT_LENGTH: usize = 500_000;

pub fn router() -> Router<AppState> {
    Router::new().route("/extract", post(extract_handler))
}

#[derive(Deserialize)]
struct ExtractRequest {
    /// Fetch this URL and extract its body, if `html` is not given directly.
    url: Option<String>,
    /// Extract from inline HTML instead of fetching.
    html: Option<String>,
}

#[derive(Serialize)]
struct ExtractResponse {
    markdown: String,
    title: String,
    description: Option<String>,
    #[serde(rename = "originalLength")]
    original_length: usize,
    #[serde(rename = "parsedLength")]
    parsed_length: usize,
}

async fn extract_handler(_auth: RequireAuth, State(_state): State<AppState>, Json(body): Json<ExtractRequest>) -> Result<Json<ExtractResponse>, ServerError> {
    let html = match (body.html, body.url) {
        (Some(html), _) => html,
        (None, Some(url)) => fetch(&url).await?,
        (None, None) => return Err(ServerError::BadRequest("one of `html` or `url` is required".into())),
    };

    let result = parse_html(&html);
    Ok(Json(ExtractResponse {
        markdown: result.markdown,
        title: result.title,
        description: result.description,
        original_length: result.original_length,
        parsed_length: result.parsed_length,
    }))
}

async fn fetch(url: &str) -> Result<String, ServerError> {
    let response = reqwest::get(url).await.map_err(|e| ServerError::BadRequest(e.to_string()))?;
    response.text().await.map_err(|e| ServerError::BadRequest(e.to_string()))
}

struct HtmlParseResult {
    markdown: String,
    title: String,
    description: Option<String>,
    original_length: usize,
    parsed_length: usize,
}

fn parse_html(html: &str) -> HtmlParseResult {
    let original_length = html.len();
    let html = truncate_str(html, MAX_CONTENT_LENGTH);

    let document = Html::parse_document(html);
    let title = extract_title(&document);
    let description = extract_description(&document);

    let markdown = html2text::from_read(html.as_bytes(), 100).unwrap_or_default();
    let markdown = clean_markdown(&markdown);
    let parsed_length = markdown.len();

    HtmlParseResult { markdown, title, description, original_length, parsed_length }
}

fn truncate_str(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

fn extract_title(doc: &Html) -> String {
    if let Some(title_el) = Selector::parse("title").ok().and_then(|s| doc.select(&s).next()) {
        let text = title_el.text().collect::<String>().trim().to_string();
        if !text.is_empty() {
            return text;
        }
    }
    if let Some(og) = Selector::parse(r#"meta[property="og:title"]"#).ok().and_then(|s| doc.select(&s).next()) {
        if let Some(content) = og.value().attr("content") {
            let text = content.trim().to_string();
            if !text.is_empty() {
                return text;
            }
        }
    }
    if let Some(h1) = Selector::parse("h1").ok().and_then(|s| doc.select(&s).next()) {
        let text = h1.text().collect::<String>().trim().to_string();
        if !text.is_empty() {
            return text;
        }
    }
    String::new()
}

fn extract_description(doc: &Html) -> Option<String> {
    if let Some(meta) = Selector::parse(r#"meta[name="description"]"#).ok().and_then(|s| doc.select(&s).next()) {
        if let Some(content) = meta.value().attr("content") {
            let text = content.trim().to_string();
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    if let Some(og) = Selector::parse(r#"meta[property="og:description"]"#).ok().and_then(|s| doc.select(&s).next()) {
        if let Some(content) = og.value().attr("content") {
            let text = content.trim().to_string();
            if !text.is_empty() {
                return Some(text);
            }
        }
    }
    None
}

fn clean_markdown(md: &str) -> String {
    let mut result = String::with_capacity(md.len());
    let mut blank_count = 0;
    for line in md.lines() {
        if line.trim().is_empty() {
            blank_count += 1;
            if blank_count <= 2 {
                result.push('\n');
            }
        } else {
            blank_count = 0;
            result.push_str(line);
            result.push('\n');
        }
    }
    result.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn app() -> (Router<AppState>, AppState) {
        let dir = tempfile::tempdir().unwrap();
        let state_root = dir.path().to_path_buf();
        std::mem::forget(dir);
        let state = crate::test_support::test_app_state(state_root);
        (router().with_state(state.clone()), state)
    }

    #[test]
    fn title_extraction_priority() {
        let html = r#"<html><head><title>Title Tag</title><meta property="og:title" content="OG Title"></head><body><h1>H1 Title</h1></body></html>"#;
        let r = parse_html(html);
        assert_eq!(r.title, "Title Tag");
    }

    #[test]
    fn description_from_meta() {
        let html = r#"<html><head><meta name="description" content="A test page"></head><body></body></html>"#;
        let r = parse_html(html);
        assert_eq!(r.description.as_deref(), Some("A test page"));
    }

    #[tokio::test]
    async fn extract_from_inline_html() {
        let (app, state) = app();
        let token = state.auth.token().unwrap();
        let body = serde_json::json!({"html": "<html><head><title>Hi</title></head><body><p>World</p></body></html>"});
        let req = Request::builder()
            .method("POST")
            .uri("/extract")
            .header("authorization", format!("Bearer {token}"))
            .header("content-type", "application/json")
            .body(Body::from(serde_json::to_vec(&body).unwrap()))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(resp.into_body(), 10_000).await.unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed["title"], "Hi");
        assert!(parsed["markdown"].as_str().unwrap().contains("World"));
    }

    #[tokio::test]
    async fn extract_without_html_or_url_is_bad_request() {
        let (app, state) = app();
        let token = state.auth.token().unwrap();
        let req = Request::builder()
            .method("POST")
            .uri("/extract")
            .header("authorization", format!("Bearer {token}"))
            .header("content-type", "application/json")
            .body(Body::from("{}"))
            .unwrap();
        let resp = app.oneshot(req).await.unwrap();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
