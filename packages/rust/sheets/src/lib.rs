//! Spreadsheet source reader.
//!
//! Reads the three fixed report tables from a Google Sheets workbook through
//! the Sheets v4 values API. Each sheet is fetched raw over the full `A:Z`
//! column range; the first row becomes the column names.

mod auth;

use std::path::Path;

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, instrument};
use url::Url;

use recruitreport_shared::{ReportError, Result, SheetNames, SheetsConfig, SourceData, Table, TableKind};

pub use auth::{GoogleCredentials, SHEETS_READONLY_SCOPE, access_token, load_credentials};

/// Fixed column range fetched from every sheet.
pub const COLUMN_RANGE: &str = "A:Z";

/// User-Agent string for spreadsheet requests.
const USER_AGENT: &str = concat!("recruitreport/", env!("CARGO_PKG_VERSION"));

/// Response body of `spreadsheets.values.get`.
#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

/// Authenticated client for one spreadsheet.
pub struct SheetsClient {
    client: Client,
    api_base: Url,
    sheet_id: String,
    sheet_names: SheetNames,
    token: String,
}

impl SheetsClient {
    /// Load credentials and obtain an access token.
    ///
    /// Fails with `SourceUnavailable` when the sheet id is unset or the
    /// credentials cannot be used.
    pub async fn connect(config: &SheetsConfig) -> Result<Self> {
        let sheet_id = config
            .sheet_id
            .clone()
            .ok_or_else(|| ReportError::SourceUnavailable("GOOGLE_SHEET_ID is not set".into()))?;

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| {
                ReportError::SourceUnavailable(format!("failed to build HTTP client: {e}"))
            })?;

        let creds = load_credentials(Path::new(&config.credentials_path))?;
        let token = access_token(&client, &creds).await?;

        Self::with_token(client, config, sheet_id, token)
    }

    /// Build a client around an already obtained access token.
    pub fn with_token(
        client: Client,
        config: &SheetsConfig,
        sheet_id: String,
        token: String,
    ) -> Result<Self> {
        let api_base = Url::parse(&config.api_base).map_err(|e| {
            ReportError::SourceUnavailable(format!("invalid sheets api base '{}': {e}", config.api_base))
        })?;

        Ok(Self {
            client,
            api_base,
            sheet_id,
            sheet_names: config.tables.clone(),
            token,
        })
    }

    /// Sheet name configured for a table kind.
    pub fn sheet_name(&self, kind: TableKind) -> &str {
        match kind {
            TableKind::Monthly => &self.sheet_names.monthly,
            TableKind::Hire => &self.sheet_names.hire,
            TableKind::Apply => &self.sheet_names.apply,
        }
    }

    /// Read one sheet as a [`Table`]. An empty sheet yields an empty table.
    #[instrument(skip(self))]
    pub async fn read_table(&self, sheet_name: &str) -> Result<Table> {
        let url = self.values_url(sheet_name)?;

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| ReportError::SourceUnavailable(format!("{sheet_name}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ReportError::SourceUnavailable(format!(
                "{sheet_name}: HTTP {status}: {body}"
            )));
        }

        let range: ValueRange = response.json().await.map_err(|e| {
            ReportError::SourceUnavailable(format!("{sheet_name}: invalid response body: {e}"))
        })?;

        let values = range
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect();

        let table = Table::from_values(values);
        debug!(
            columns = table.columns.len(),
            rows = table.len(),
            "sheet read"
        );
        Ok(table)
    }

    /// Read the monthly, hire and apply tables, in that order.
    pub async fn read_all(&self) -> Result<SourceData> {
        let mut data = SourceData::new();
        for kind in TableKind::ALL {
            let name = self.sheet_name(kind);
            info!(sheet = name, table = %kind, "reading sheet");
            data.insert(kind, self.read_table(name).await?);
        }
        Ok(data)
    }

    /// `{api_base}/v4/spreadsheets/{id}/values/{sheet}!A:Z`, with the sheet
    /// name percent-encoded as a single path segment.
    fn values_url(&self, sheet_name: &str) -> Result<Url> {
        let range = format!("{sheet_name}!{COLUMN_RANGE}");
        let mut url = self.api_base.clone();
        url.path_segments_mut()
            .map_err(|_| ReportError::SourceUnavailable("sheets api base cannot be a base URL".into()))?
            .pop_if_empty()
            .extend(["v4", "spreadsheets", &self.sheet_id, "values", &range]);
        Ok(url)
    }
}

/// Cells come back as strings under the default render option; anything else
/// is stringified so the table stays text-only.
fn cell_text(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(api_base: &str) -> SheetsConfig {
        SheetsConfig {
            api_base: api_base.to_string(),
            tables: SheetNames {
                monthly: "Monthly".into(),
                hire: "HireRaw".into(),
                apply: "ApplyRaw".into(),
            },
            ..SheetsConfig::default()
        }
    }

    fn client(server: &MockServer) -> SheetsClient {
        SheetsClient::with_token(
            Client::new(),
            &config(&server.uri()),
            "sheet-1".into(),
            "ya29.test".into(),
        )
        .unwrap()
    }

    #[test]
    fn values_url_encodes_sheet_name() {
        let c = SheetsClient::with_token(
            Client::new(),
            &config("https://sheets.googleapis.com"),
            "abc".into(),
            "t".into(),
        )
        .unwrap();
        let url = c.values_url("월통합분석").unwrap();
        assert!(url.as_str().starts_with("https://sheets.googleapis.com/v4/spreadsheets/abc/values/"));
        assert!(url.as_str().ends_with("!A:Z"));
        assert!(!url.as_str().contains('월'));
    }

    #[test]
    fn cell_text_stringifies_non_strings() {
        assert_eq!(cell_text(serde_json::json!("x")), "x");
        assert_eq!(cell_text(serde_json::json!(12)), "12");
        assert_eq!(cell_text(serde_json::Value::Null), "");
    }

    #[tokio::test]
    async fn read_table_uses_header_row() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v4/spreadsheets/sheet-1/values/Monthly!A:Z"))
            .and(header("authorization", "Bearer ya29.test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "range": "Monthly!A1:B3",
                "majorDimension": "ROWS",
                "values": [["report_month", "total_sales"], ["2024-05", "100"], ["2024-06", "110"]]
            })))
            .mount(&server)
            .await;

        let table = client(&server).read_table("Monthly").await.unwrap();
        assert_eq!(table.columns, vec!["report_month", "total_sales"]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.rows[0]["report_month"], "2024-05");
    }

    #[tokio::test]
    async fn empty_sheet_is_empty_table_not_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v4/spreadsheets/sheet-1/values/Monthly!A:Z"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "range": "Monthly!A1:Z1000" })),
            )
            .mount(&server)
            .await;

        let table = client(&server).read_table("Monthly").await.unwrap();
        assert!(table.columns.is_empty());
        assert!(table.is_empty());
    }

    #[tokio::test]
    async fn http_error_is_source_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403).set_body_string("PERMISSION_DENIED"))
            .mount(&server)
            .await;

        let err = client(&server).read_table("Monthly").await.unwrap_err();
        assert!(matches!(err, ReportError::SourceUnavailable(_)));
        assert!(err.to_string().contains("403"));
    }

    #[tokio::test]
    async fn read_all_returns_three_keyed_tables() {
        let server = MockServer::start().await;
        for (sheet, header_cell) in [("Monthly", "report_month"), ("HireRaw", "hire_month"), ("ApplyRaw", "apply_month")] {
            Mock::given(method("GET"))
                .and(path(format!("/v4/spreadsheets/sheet-1/values/{sheet}!A:Z")))
                .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                    "values": [[header_cell], ["2024-06"]]
                })))
                .expect(1)
                .mount(&server)
                .await;
        }

        let data = client(&server).read_all().await.unwrap();
        assert_eq!(data.get(TableKind::Monthly).unwrap().columns, vec!["report_month"]);
        assert_eq!(data.get(TableKind::Hire).unwrap().columns, vec!["hire_month"]);
        assert_eq!(data.get(TableKind::Apply).unwrap().columns, vec!["apply_month"]);
    }

    #[tokio::test]
    async fn connect_requires_sheet_id() {
        let err = SheetsClient::connect(&SheetsConfig::default()).await.err().unwrap();
        assert!(err.to_string().contains("GOOGLE_SHEET_ID"));
    }

    #[tokio::test]
    async fn connect_exchanges_service_account_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "access_token": "ya29.svc", "expires_in": 3599 })),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v4/spreadsheets/sheet-1/values/Monthly!A:Z"))
            .and(header("authorization", "Bearer ya29.svc"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "values": [["report_month"], ["2024-06"]]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let creds_path = dir.path().join("service-account.json");
        let key = serde_json::json!({
            "type": "service_account",
            "project_id": "proj",
            "private_key_id": "key-1",
            "private_key": include_str!("testdata/test_key.pem"),
            "client_email": "svc@proj.iam.gserviceaccount.com",
            "token_uri": format!("{}/token", server.uri())
        });
        std::fs::write(&creds_path, key.to_string()).unwrap();

        let mut cfg = config(&server.uri());
        cfg.sheet_id = Some("sheet-1".into());
        cfg.credentials_path = creds_path.to_string_lossy().into_owned();

        let c = SheetsClient::connect(&cfg).await.unwrap();
        assert_eq!(c.read_table("Monthly").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn connect_reads_credential_file() {
        let server = MockServer::start().await;
        let dir = tempfile::tempdir().unwrap();
        let creds_path = dir.path().join("creds.json");
        std::fs::write(&creds_path, r#"{"token":"ya29.file"}"#).unwrap();

        Mock::given(method("GET"))
            .and(header("authorization", "Bearer ya29.file"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "values": [] })))
            .expect(1)
            .mount(&server)
            .await;

        let mut cfg = config(&server.uri());
        cfg.sheet_id = Some("sheet-1".into());
        cfg.credentials_path = creds_path.to_string_lossy().into_owned();

        let c = SheetsClient::connect(&cfg).await.unwrap();
        assert!(c.read_table("Monthly").await.unwrap().is_empty());
    }
}
