//! Document store seam.

use async_trait::async_trait;
use serde::Deserialize;

use recruitreport_shared::Result;

/// A page as the store knows it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct PageRef {
    pub id: String,
    pub title: String,
    /// Current version number; updates must send `version + 1`.
    #[serde(default = "first_version", deserialize_with = "version_number")]
    pub version: u32,
}

fn first_version() -> u32 {
    1
}

/// Confluence nests the number: `"version": {"number": 3, ...}`.
fn version_number<'de, D>(deserializer: D) -> std::result::Result<u32, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    struct Version {
        number: u32,
    }
    Ok(Version::deserialize(deserializer)?.number)
}

/// Operations the publisher needs from a wiki/document store.
///
/// Titles are unique within a space, so `find_by_title` returns at most one page.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn find_by_title(&self, space: &str, title: &str) -> Result<Option<PageRef>>;

    async fn create(
        &self,
        space: &str,
        title: &str,
        body: &str,
        parent_id: Option<&str>,
    ) -> Result<PageRef>;

    /// Replace the title and body of an existing page.
    async fn update(&self, page: &PageRef, title: &str, body: &str) -> Result<PageRef>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_ref_reads_nested_version() {
        let page: PageRef = serde_json::from_str(
            r#"{"id":"42","type":"page","title":"T","version":{"number":7,"minorEdit":false}}"#,
        )
        .unwrap();
        assert_eq!(page.id, "42");
        assert_eq!(page.version, 7);
    }

    #[test]
    fn page_ref_without_version_defaults_to_one() {
        let page: PageRef = serde_json::from_str(r#"{"id":"1","title":"T"}"#).unwrap();
        assert_eq!(page.version, 1);
    }
}
