//! Confluence Cloud REST implementation of [`DocumentStore`].

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use tracing::{debug, instrument};

use recruitreport_shared::{ConfluenceConfig, ReportError, Result};

use crate::store::{DocumentStore, PageRef};

/// User-Agent string for Confluence requests.
const USER_AGENT: &str = concat!("recruitreport/", env!("CARGO_PKG_VERSION"));

/// `GET /content` search response.
#[derive(Debug, Deserialize)]
struct ContentSearch {
    #[serde(default)]
    results: Vec<PageRef>,
}

/// Basic-auth client for one Confluence site.
pub struct ConfluenceStore {
    client: Client,
    site_url: String,
    email: String,
    api_token: String,
}

impl ConfluenceStore {
    pub fn new(config: &ConfluenceConfig) -> Result<Self> {
        let missing = |name: &str| ReportError::PublishFailed(format!("{name} is not set"));

        let url = config.url.as_deref().ok_or_else(|| missing("CONFLUENCE_URL"))?;
        let email = config.email.clone().ok_or_else(|| missing("CONFLUENCE_EMAIL"))?;
        let api_token = config
            .api_token
            .clone()
            .ok_or_else(|| missing("CONFLUENCE_API_TOKEN"))?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ReportError::PublishFailed(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            site_url: site_root(url),
            email,
            api_token,
        })
    }

    fn content_url(&self, suffix: &str) -> String {
        format!("{}/wiki/rest/api/content{suffix}", self.site_url)
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request.basic_auth(&self.email, Some(&self.api_token))
    }
}

/// Normalize a configured URL to the site root.
pub fn site_root(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    trimmed
        .strip_suffix("/wiki")
        .unwrap_or(trimmed)
        .to_string()
}

/// Map transport errors and non-success statuses to `PublishFailed`.
async fn check(action: &str, sent: reqwest::Result<Response>) -> Result<Response> {
    let response = sent.map_err(|e| ReportError::PublishFailed(format!("{action}: {e}")))?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ReportError::PublishFailed(format!(
        "{action}: HTTP {status}: {body}"
    )))
}

async fn read_page(action: &str, response: Response) -> Result<PageRef> {
    response
        .json::<PageRef>()
        .await
        .map_err(|e| ReportError::PublishFailed(format!("{action}: invalid response body: {e}")))
}

fn storage_body(body: &str) -> serde_json::Value {
    serde_json::json!({
        "storage": {
            "value": body,
            "representation": "storage",
        }
    })
}

#[async_trait]
impl DocumentStore for ConfluenceStore {
    #[instrument(skip(self))]
    async fn find_by_title(&self, space: &str, title: &str) -> Result<Option<PageRef>> {
        let request = self.client.get(self.content_url("")).query(&[
            ("spaceKey", space),
            ("title", title),
            ("type", "page"),
            ("expand", "version"),
        ]);
        let response = check("find page", self.authed(request).send().await).await?;

        let search: ContentSearch = response
            .json()
            .await
            .map_err(|e| ReportError::PublishFailed(format!("find page: invalid response body: {e}")))?;

        let found = search.results.into_iter().next();
        debug!(found = found.is_some(), "page lookup");
        Ok(found)
    }

    #[instrument(skip(self, body), fields(body_len = body.len()))]
    async fn create(
        &self,
        space: &str,
        title: &str,
        body: &str,
        parent_id: Option<&str>,
    ) -> Result<PageRef> {
        let mut payload = serde_json::json!({
            "type": "page",
            "title": title,
            "space": { "key": space },
            "body": storage_body(body),
        });
        if let Some(parent) = parent_id {
            payload["ancestors"] = serde_json::json!([{ "id": parent }]);
        }

        let request = self.client.post(self.content_url("")).json(&payload);
        let response = check("create page", self.authed(request).send().await).await?;
        read_page("create page", response).await
    }

    #[instrument(skip(self, body), fields(id = %page.id, body_len = body.len()))]
    async fn update(&self, page: &PageRef, title: &str, body: &str) -> Result<PageRef> {
        let payload = serde_json::json!({
            "id": page.id,
            "type": "page",
            "title": title,
            "version": { "number": page.version + 1 },
            "body": storage_body(body),
        });

        let request = self
            .client
            .put(self.content_url(&format!("/{}", page.id)))
            .json(&payload);
        let response = check("update page", self.authed(request).send().await).await?;
        read_page("update page", response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use wiremock::matchers::{body_partial_json, header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store(server: &MockServer) -> ConfluenceStore {
        ConfluenceStore::new(&ConfluenceConfig {
            url: Some(format!("{}/wiki/", server.uri())),
            email: Some("bot@acme.io".into()),
            api_token: Some("token".into()),
            ..ConfluenceConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn site_root_strips_wiki_and_slash() {
        assert_eq!(site_root("https://acme.atlassian.net/"), "https://acme.atlassian.net");
        assert_eq!(site_root("https://acme.atlassian.net/wiki"), "https://acme.atlassian.net");
    }

    #[test]
    fn new_requires_credentials() {
        let err = ConfluenceStore::new(&ConfluenceConfig {
            url: Some("https://acme.atlassian.net".into()),
            ..ConfluenceConfig::default()
        })
        .err()
        .unwrap();
        assert!(err.to_string().contains("CONFLUENCE_EMAIL"));
    }

    #[tokio::test]
    async fn find_by_title_returns_first_result() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/wiki/rest/api/content"))
            .and(query_param("spaceKey", "DATA"))
            .and(query_param("title", "2024 Monthly Reports"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "results": [{ "id": "100", "title": "2024 Monthly Reports", "version": { "number": 2 } }],
                "size": 1
            })))
            .mount(&server)
            .await;

        let page = store(&server)
            .find_by_title("DATA", "2024 Monthly Reports")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(page.id, "100");
        assert_eq!(page.version, 2);
    }

    #[tokio::test]
    async fn find_by_title_none_when_no_results() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/wiki/rest/api/content"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "results": [], "size": 0 })),
            )
            .mount(&server)
            .await;

        assert!(store(&server).find_by_title("DATA", "x").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn create_sends_parent_and_storage_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/wiki/rest/api/content"))
            .and(body_partial_json(serde_json::json!({
                "type": "page",
                "space": { "key": "DATA" },
                "ancestors": [{ "id": "9" }],
                "body": { "storage": { "value": "<p>x</p>", "representation": "storage" } }
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "200", "title": "T", "version": { "number": 1 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let page = store(&server)
            .create("DATA", "T", "<p>x</p>", Some("9"))
            .await
            .unwrap();
        assert_eq!(page.id, "200");
    }

    #[tokio::test]
    async fn update_bumps_version() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/wiki/rest/api/content/300"))
            .and(body_partial_json(serde_json::json!({ "version": { "number": 4 } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "300", "title": "T", "version": { "number": 4 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let current = PageRef {
            id: "300".into(),
            title: "T".into(),
            version: 3,
        };
        let page = store(&server).update(&current, "T", "<p>y</p>").await.unwrap();
        assert_eq!(page.version, 4);
    }

    #[tokio::test]
    async fn http_error_is_publish_failed() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
            .mount(&server)
            .await;

        let err = store(&server).create("DATA", "T", "", None).await.unwrap_err();
        assert!(matches!(err, ReportError::PublishFailed(_)));
        assert!(err.to_string().contains("401"));
    }
}
