//! Page rendering collaborator.
//!
//! The crawler only needs a status code, a handful of on-page fields and the
//! outgoing links of each page. [`HttpRenderer`] gets them with a plain GET
//! and an HTML parse; a browser-backed implementation can replace it behind
//! the [`PageRenderer`] trait.

use crate::error::{Result, ScanError};
use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Everything the renderer extracted from one page. Missing fields are
/// empty strings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderedPage {
    pub status_code: u16,
    pub title: String,
    pub meta_description: String,
    pub canonical: String,
    pub h1: String,
    /// Absolute hyperlink targets, unfiltered.
    pub links: Vec<String>,
}

#[async_trait]
pub trait PageRenderer: Send + Sync {
    /// Load `url`. An `Err` means no page could be produced at all; HTTP
    /// error statuses are still a rendered page.
    async fn render(&self, url: &str) -> Result<RenderedPage>;
}

pub struct HttpRenderer {
    client: Client,
}

impl HttpRenderer {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .connect_timeout(timeout / 2)
            .pool_max_idle_per_host(50)
            .pool_idle_timeout(Duration::from_secs(90))
            .tcp_keepalive(Duration::from_secs(60))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PageRenderer for HttpRenderer {
    async fn render(&self, url: &str) -> Result<RenderedPage> {
        debug!("Fetching {}", url);

        let response = self.client.get(url).send().await.map_err(|e| ScanError::Renderer {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let status_code = response.status().as_u16();
        let final_url = response.url().clone();
        let is_html = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|ct| ct.contains("text/html"))
            .unwrap_or(false);

        if !is_html {
            return Ok(RenderedPage {
                status_code,
                ..Default::default()
            });
        }

        let body = response.text().await.map_err(|e| ScanError::Renderer {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        let mut page = extract_page(&body, &final_url);
        page.status_code = status_code;
        Ok(page)
    }
}

/// Pull the SEO fields and outgoing links out of an HTML document.
pub fn extract_page(html: &str, base: &Url) -> RenderedPage {
    let document = Html::parse_document(html);

    let title = first_text(&document, "title");
    let h1 = first_text(&document, "h1");

    let meta_description = first_attr(&document, r#"meta[name="description"]"#, "content");

    let canonical = first_attr(&document, r#"link[rel="canonical"]"#, "href");
    let canonical = if canonical.is_empty() {
        canonical
    } else {
        base.join(&canonical)
            .map(|u| u.to_string())
            .unwrap_or(canonical)
    };

    let link_selector = Selector::parse("a[href]").unwrap();
    let links = document
        .select(&link_selector)
        .filter_map(|element| element.value().attr("href"))
        .filter_map(|href| resolve_href(base, href))
        .collect();

    RenderedPage {
        status_code: 0,
        title,
        meta_description,
        canonical,
        h1,
        links,
    }
}

fn first_element<'a>(document: &'a Html, selector: &str) -> Option<ElementRef<'a>> {
    let selector = Selector::parse(selector).ok()?;
    document.select(&selector).next()
}

fn first_text(document: &Html, selector: &str) -> String {
    first_element(document, selector)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .unwrap_or_default()
}

fn first_attr(document: &Html, selector: &str, attr: &str) -> String {
    first_element(document, selector)
        .and_then(|el| el.value().attr(attr))
        .map(|v| v.trim().to_string())
        .unwrap_or_default()
}

/// Resolve an href against the page URL. Pseudo-links and in-page anchors
/// resolve to nothing.
pub fn resolve_href(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty()
        || href.starts_with('#')
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
    {
        return None;
    }

    base.join(href).ok().map(|u| u.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    const PAGE: &str = r##"<html><head>
        <title> Widgets for every occasion </title>
        <meta name="description" content="We sell widgets.">
        <link rel="canonical" href="/widgets">
        </head><body>
        <h1>Widgets</h1><h1>Second heading</h1>
        <a href="/about">About</a>
        <a href="https://other.example/">Elsewhere</a>
        <a href="#top">Top</a>
        <a href="mailto:hi@example.com">Mail</a>
        </body></html>"##;

    #[test]
    fn test_extract_page_fields() {
        let base = Url::parse("https://example.com/widgets?ref=home").unwrap();
        let page = extract_page(PAGE, &base);

        assert_eq!(page.title, "Widgets for every occasion");
        assert_eq!(page.meta_description, "We sell widgets.");
        assert_eq!(page.canonical, "https://example.com/widgets");
        assert_eq!(page.h1, "Widgets");
        assert_eq!(
            page.links,
            vec!["https://example.com/about", "https://other.example/"]
        );
    }

    #[test]
    fn test_missing_fields_are_empty() {
        let base = Url::parse("https://example.com/").unwrap();
        let page = extract_page("<html><body><p>bare</p></body></html>", &base);

        assert_eq!(page.title, "");
        assert_eq!(page.meta_description, "");
        assert_eq!(page.canonical, "");
        assert_eq!(page.h1, "");
        assert!(page.links.is_empty());
    }

    #[test]
    fn test_resolve_href() {
        let base = Url::parse("https://example.com/docs/page").unwrap();
        assert_eq!(
            resolve_href(&base, "../about"),
            Some("https://example.com/about".to_string())
        );
        assert_eq!(resolve_href(&base, "#section"), None);
        assert_eq!(resolve_href(&base, "javascript:void(0)"), None);
        assert_eq!(resolve_href(&base, "tel:+15555555"), None);
        assert_eq!(resolve_href(&base, ""), None);
    }

    #[tokio::test]
    async fn test_http_renderer_reads_html() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html; charset=utf-8")
                    .set_body_bytes(PAGE.as_bytes()),
            )
            .mount(&mock_server)
            .await;

        let renderer = HttpRenderer::new(Duration::from_secs(5), crate::USER_AGENT).unwrap();
        let page = renderer.render(&format!("{}/", mock_server.uri())).await.unwrap();

        assert_eq!(page.status_code, 200);
        assert_eq!(page.h1, "Widgets");
        assert!(page.links.contains(&format!("{}/about", mock_server.uri())));
    }

    #[tokio::test]
    async fn test_http_renderer_error_status_is_a_page() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(
                ResponseTemplate::new(404)
                    .insert_header("content-type", "text/html")
                    .set_body_bytes(b"<html><head><title>Not found</title></head></html>"),
            )
            .mount(&mock_server)
            .await;

        let renderer = HttpRenderer::new(Duration::from_secs(5), crate::USER_AGENT).unwrap();
        let page = renderer
            .render(&format!("{}/gone", mock_server.uri()))
            .await
            .unwrap();

        assert_eq!(page.status_code, 404);
        assert_eq!(page.title, "Not found");
    }

    #[tokio::test]
    async fn test_http_renderer_skips_non_html() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/data.json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "application/json")
                    .set_body_bytes(br#"{"href": "/nope"}"#),
            )
            .mount(&mock_server)
            .await;

        let renderer = HttpRenderer::new(Duration::from_secs(5), crate::USER_AGENT).unwrap();
        let page = renderer
            .render(&format!("{}/data.json", mock_server.uri()))
            .await
            .unwrap();

        assert_eq!(page.status_code, 200);
        assert!(page.links.is_empty());
    }

    #[tokio::test]
    async fn test_http_renderer_connection_failure() {
        let renderer = HttpRenderer::new(Duration::from_secs(2), crate::USER_AGENT).unwrap();
        let result = renderer.render("http://127.0.0.1:9/").await;
        assert!(matches!(result, Err(ScanError::Renderer { .. })));
    }
}
