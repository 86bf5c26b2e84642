//! Application configuration for the monthly report.
//!
//! An optional TOML file (`~/.recruitreport/recruitreport.toml` or `--config`)
//! supplies base values. Environment variables override file values, which
//! override defaults. The resolved [`AppConfig`] is passed explicitly into each
//! component constructor.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{ReportError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "recruitreport.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".recruitreport";

/// Placeholder shown in place of secrets by [`AppConfig::redacted`].
const REDACTED: &str = "<redacted>";

// ---------------------------------------------------------------------------
// Config structs (matching recruitreport.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub sheets: SheetsConfig,

    #[serde(default)]
    pub gemini: GeminiConfig,

    #[serde(default)]
    pub confluence: ConfluenceConfig,

    #[serde(default)]
    pub slack: SlackConfig,

    #[serde(default)]
    pub report: ReportConfig,
}

/// `[sheets]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetsConfig {
    /// Spreadsheet id (`GOOGLE_SHEET_ID`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet_id: Option<String>,

    /// Path to the Google credential JSON (`GOOGLE_CREDENTIALS_PATH`).
    #[serde(default = "default_credentials_path")]
    pub credentials_path: String,

    /// Sheets API base URL.
    #[serde(default = "default_sheets_api_base")]
    pub api_base: String,

    /// Sheet names for the three source tables.
    #[serde(default)]
    pub tables: SheetNames,
}

impl Default for SheetsConfig {
    fn default() -> Self {
        Self {
            sheet_id: None,
            credentials_path: default_credentials_path(),
            api_base: default_sheets_api_base(),
            tables: SheetNames::default(),
        }
    }
}

fn default_credentials_path() -> String {
    "credentials/service-account.json".into()
}
fn default_sheets_api_base() -> String {
    "https://sheets.googleapis.com".into()
}

/// `[sheets.tables]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetNames {
    #[serde(default = "default_monthly_sheet")]
    pub monthly: String,
    #[serde(default = "default_hire_sheet")]
    pub hire: String,
    #[serde(default = "default_apply_sheet")]
    pub apply: String,
}

impl Default for SheetNames {
    fn default() -> Self {
        Self {
            monthly: default_monthly_sheet(),
            hire: default_hire_sheet(),
            apply: default_apply_sheet(),
        }
    }
}

fn default_monthly_sheet() -> String {
    "월통합분석".into()
}
fn default_hire_sheet() -> String {
    "합격기준리드타임_raw".into()
}
fn default_apply_sheet() -> String {
    "지원기준리드타임_raw".into()
}

/// `[gemini]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// API key (`GEMINI_API_KEY`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model name (`GEMINI_MODEL`).
    #[serde(default = "default_model")]
    pub model: String,

    /// Generative Language API base URL.
    #[serde(default = "default_gemini_api_base")]
    pub api_base: String,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: default_model(),
            api_base: default_gemini_api_base(),
        }
    }
}

fn default_model() -> String {
    "gemini-2.0-flash".into()
}
fn default_gemini_api_base() -> String {
    "https://generativelanguage.googleapis.com".into()
}

/// `[confluence]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfluenceConfig {
    /// Site base URL, e.g. `https://acme.atlassian.net` (`CONFLUENCE_URL`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Account email for basic auth (`CONFLUENCE_EMAIL`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// API token for basic auth (`CONFLUENCE_API_TOKEN`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,

    /// Space key (`CONFLUENCE_SPACE`).
    #[serde(default = "default_space")]
    pub space: String,

    /// Root page the year containers live under (`CONFLUENCE_PARENT_PAGE_ID`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_page_id: Option<String>,
}

impl Default for ConfluenceConfig {
    fn default() -> Self {
        Self {
            url: None,
            email: None,
            api_token: None,
            space: default_space(),
            parent_page_id: None,
        }
    }
}

fn default_space() -> String {
    "DATA".into()
}

/// `[slack]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    /// Bot token, `xoxb-...` (`SLACK_BOT_TOKEN`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_token: Option<String>,

    /// Channel id, e.g. `C01234567` (`SLACK_CHANNEL_ID`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,

    /// Slack Web API base URL.
    #[serde(default = "default_slack_api_base")]
    pub api_base: String,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            channel_id: None,
            api_base: default_slack_api_base(),
        }
    }
}

fn default_slack_api_base() -> String {
    "https://slack.com".into()
}

/// `[report]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Prompt template file; the built-in template is used when it is absent
    /// (`REPORT_PROMPT_PATH`).
    #[serde(default = "default_prompt_path")]
    pub prompt_path: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            prompt_path: default_prompt_path(),
        }
    }
}

fn default_prompt_path() -> String {
    "prompts/analysis_prompt.md".into()
}

// ---------------------------------------------------------------------------
// Environment overlay and validation
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Overlay values from environment-style lookups.
    ///
    /// `lookup` returns the value of a variable; empty values are ignored.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("GOOGLE_SHEET_ID") {
            self.sheets.sheet_id = Some(v);
        }
        if let Some(v) = get("GOOGLE_CREDENTIALS_PATH") {
            self.sheets.credentials_path = v;
        }
        if let Some(v) = get("GEMINI_API_KEY") {
            self.gemini.api_key = Some(v);
        }
        if let Some(v) = get("GEMINI_MODEL") {
            self.gemini.model = v;
        }
        if let Some(v) = get("CONFLUENCE_URL") {
            self.confluence.url = Some(v);
        }
        if let Some(v) = get("CONFLUENCE_EMAIL") {
            self.confluence.email = Some(v);
        }
        if let Some(v) = get("CONFLUENCE_API_TOKEN") {
            self.confluence.api_token = Some(v);
        }
        if let Some(v) = get("CONFLUENCE_SPACE") {
            self.confluence.space = v;
        }
        if let Some(v) = get("CONFLUENCE_PARENT_PAGE_ID") {
            self.confluence.parent_page_id = Some(v);
        }
        if let Some(v) = get("SLACK_BOT_TOKEN") {
            self.slack.bot_token = Some(v);
        }
        if let Some(v) = get("SLACK_CHANNEL_ID") {
            self.slack.channel_id = Some(v);
        }
        if let Some(v) = get("REPORT_PROMPT_PATH") {
            self.report.prompt_path = v;
        }
    }

    /// Check that every required value is present, reporting all gaps at once.
    pub fn validate(&self) -> Result<()> {
        let required = [
            ("GOOGLE_SHEET_ID", &self.sheets.sheet_id),
            ("GEMINI_API_KEY", &self.gemini.api_key),
            ("CONFLUENCE_URL", &self.confluence.url),
            ("CONFLUENCE_EMAIL", &self.confluence.email),
            ("CONFLUENCE_API_TOKEN", &self.confluence.api_token),
            ("SLACK_BOT_TOKEN", &self.slack.bot_token),
            ("SLACK_CHANNEL_ID", &self.slack.channel_id),
        ];

        let missing: Vec<&str> = required
            .iter()
            .filter(|(_, value)| value.is_none())
            .map(|(name, _)| *name)
            .collect();

        if !missing.is_empty() {
            return Err(ReportError::config(format!(
                "missing required settings: {}",
                missing.join(", ")
            )));
        }

        if let Some(raw) = &self.confluence.url {
            url::Url::parse(raw).map_err(|e| {
                ReportError::config(format!("CONFLUENCE_URL '{raw}' is not a valid URL: {e}"))
            })?;
        }

        Ok(())
    }

    /// A copy with every secret replaced, for display.
    pub fn redacted(&self) -> Self {
        let mut copy = self.clone();
        let hide = |v: &mut Option<String>| {
            if v.is_some() {
                *v = Some(REDACTED.into());
            }
        };
        hide(&mut copy.gemini.api_key);
        hide(&mut copy.confluence.api_token);
        hide(&mut copy.slack.bot_token);
        copy
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.recruitreport/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| ReportError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the default config file (`~/.recruitreport/recruitreport.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Resolve configuration: explicit file (must exist), else the default file
/// if present, else defaults; then the process environment on top.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let mut config = match path {
        Some(p) => load_config_from(p)?,
        None => match config_file_path() {
            Ok(default_path) if default_path.exists() => load_config_from(&default_path)?,
            _ => {
                tracing::debug!("no config file found, using defaults and environment");
                AppConfig::default()
            }
        },
    };

    config.apply_env(|key| std::env::var(key).ok());
    Ok(config)
}

/// Write a default config file to `path` (the default location when `None`).
///
/// Refuses to overwrite an existing file.
pub fn init_config(path: Option<&Path>) -> Result<PathBuf> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => config_file_path()?,
    };
    if path.exists() {
        return Err(ReportError::config(format!(
            "config file already exists at {}",
            path.display()
        )));
    }
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|e| ReportError::io(dir, e))?;
    }

    let content = toml::to_string_pretty(&AppConfig::default())
        .map_err(|e| ReportError::config(e.to_string()))?;
    std::fs::write(&path, content).map_err(|e| ReportError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ReportError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| ReportError::config(format!("failed to parse {}: {e}", path.display())))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn full_env() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("GOOGLE_SHEET_ID", "sheet-123"),
            ("GEMINI_API_KEY", "gem-key"),
            ("CONFLUENCE_URL", "https://acme.atlassian.net"),
            ("CONFLUENCE_EMAIL", "bot@acme.io"),
            ("CONFLUENCE_API_TOKEN", "conf-token"),
            ("SLACK_BOT_TOKEN", "xoxb-1"),
            ("SLACK_CHANNEL_ID", "C0123"),
        ])
    }

    fn config_from(env: &HashMap<&'static str, &'static str>) -> AppConfig {
        let mut config = AppConfig::default();
        config.apply_env(|k| env.get(k).map(|v| v.to_string()));
        config
    }

    #[test]
    fn defaults_match_source_workbook() {
        let config = AppConfig::default();
        assert_eq!(config.sheets.tables.monthly, "월통합분석");
        assert_eq!(config.sheets.credentials_path, "credentials/service-account.json");
        assert_eq!(config.gemini.model, "gemini-2.0-flash");
        assert_eq!(config.confluence.space, "DATA");
    }

    #[test]
    fn env_overrides_defaults() {
        let mut env = full_env();
        env.insert("CONFLUENCE_SPACE", "HR");
        env.insert("GEMINI_MODEL", "gemini-1.5-pro");
        let config = config_from(&env);
        assert_eq!(config.sheets.sheet_id.as_deref(), Some("sheet-123"));
        assert_eq!(config.confluence.space, "HR");
        assert_eq!(config.gemini.model, "gemini-1.5-pro");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn empty_env_values_are_ignored() {
        let mut env = full_env();
        env.insert("CONFLUENCE_SPACE", "  ");
        let config = config_from(&env);
        assert_eq!(config.confluence.space, "DATA");
    }

    #[test]
    fn validate_lists_every_missing_key() {
        let mut env = full_env();
        env.remove("GEMINI_API_KEY");
        env.remove("SLACK_CHANNEL_ID");
        let err = config_from(&env).validate().unwrap_err().to_string();
        assert!(err.contains("GEMINI_API_KEY"));
        assert!(err.contains("SLACK_CHANNEL_ID"));
        assert!(!err.contains("GOOGLE_SHEET_ID"));
    }

    #[test]
    fn validate_rejects_bad_confluence_url() {
        let mut env = full_env();
        env.insert("CONFLUENCE_URL", "not a url");
        let err = config_from(&env).validate().unwrap_err();
        assert!(err.to_string().contains("CONFLUENCE_URL"));
    }

    #[test]
    fn toml_file_with_env_on_top() {
        let toml_str = r#"
[sheets]
sheet_id = "from-file"

[sheets.tables]
monthly = "Monthly"

[confluence]
space = "FILE"
"#;
        let mut config: AppConfig = toml::from_str(toml_str).expect("parse");
        assert_eq!(config.sheets.tables.monthly, "Monthly");
        assert_eq!(config.sheets.tables.hire, "합격기준리드타임_raw");

        config.apply_env(|k| (k == "GOOGLE_SHEET_ID").then(|| "from-env".to_string()));
        assert_eq!(config.sheets.sheet_id.as_deref(), Some("from-env"));
        assert_eq!(config.confluence.space, "FILE");
    }

    #[test]
    fn redacted_hides_secrets() {
        let config = config_from(&full_env()).redacted();
        let toml_str = toml::to_string_pretty(&config).expect("serialize");
        assert!(!toml_str.contains("gem-key"));
        assert!(!toml_str.contains("conf-token"));
        assert!(!toml_str.contains("xoxb-1"));
        assert!(toml_str.contains("bot@acme.io"));
    }

    #[test]
    fn init_config_writes_loadable_defaults_once() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("recruitreport.toml");

        let written = init_config(Some(&path)).expect("init");
        assert_eq!(written, path);

        let config = load_config_from(&path).expect("load");
        assert_eq!(config.confluence.space, "DATA");
        assert_eq!(config.gemini.model, "gemini-2.0-flash");

        let err = init_config(Some(&path)).unwrap_err();
        assert!(err.to_string().contains("already exists"));
    }
}
