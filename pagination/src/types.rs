use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Serialize;

/// Window bookkeeping the server hands back with each page and expects on
/// the next request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Windowing {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub newest: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oldest: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<String>,
}

/// Scope-level metadata a page request needs besides the scope id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageMeta {
    pub project_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl PageMeta {
    pub fn for_project(project_id: impl Into<String>) -> Self {
        Self {
            project_id: Some(project_id.into()),
            status: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageRequest {
    pub scope_id: String,
    pub cursor: Option<String>,
    pub limit: usize,
    pub offset: usize,
    pub windowing: Option<Windowing>,
    pub meta: PageMeta,
}

impl PageRequest {
    /// Project id, when the request can be issued at all.
    pub fn project_id(&self) -> Option<&str> {
        self.meta
            .project_id
            .as_deref()
            .filter(|id| !id.is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct PageResponse {
    #[serde(default)]
    pub rows: Vec<ScenarioRecord>,
    #[serde(default)]
    pub total_count: Option<usize>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub next_cursor: Option<String>,
    #[serde(default)]
    pub next_offset: Option<usize>,
    #[serde(default)]
    pub next_windowing: Option<Windowing>,
}

impl PageResponse {
    /// The explicit "nothing here, nothing more" answer.
    pub fn empty() -> Self {
        Self {
            total_count: Some(0),
            ..Self::default()
        }
    }
}

/// One evaluation scenario as returned by the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioRecord {
    pub id: String,
    #[serde(default)]
    pub run_id: Option<String>,
    #[serde(default)]
    pub testcase_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A table row. Starts as a skeleton occupying its slot and is filled in
/// place once the page resolves; `key` never changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreviewTableRow {
    pub row_id: String,
    pub key: String,
    pub scenario_id: Option<String>,
    pub run_id: Option<String>,
    pub testcase_id: Option<String>,
    pub scenario_index: usize,
    pub status: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub is_skeleton: bool,
}

/// Deterministic key of the slot at `index` within the page starting at
/// `offset`.
pub fn skeleton_key(scope_id: &str, offset: usize, index: usize) -> String {
    format!("{scope_id}:{offset}:{index}")
}

impl PreviewTableRow {
    pub fn skeleton(scope_id: &str, offset: usize, index: usize) -> Self {
        let key = skeleton_key(scope_id, offset, index);
        Self {
            row_id: key.clone(),
            key,
            scenario_id: None,
            run_id: None,
            testcase_id: None,
            scenario_index: offset + index,
            status: None,
            created_at: None,
            updated_at: None,
            is_skeleton: true,
        }
    }

    /// Fill the slot with server data. The slot's key and index are kept.
    pub fn merge(&mut self, record: ScenarioRecord) {
        self.row_id = record.id.clone();
        self.scenario_id = Some(record.id);
        self.run_id = record.run_id;
        self.testcase_id = record.testcase_id;
        self.status = record.status;
        self.created_at = record.created_at;
        self.updated_at = record.updated_at;
        self.is_skeleton = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn merge_keeps_slot_identity() {
        let mut row = PreviewTableRow::skeleton("run-1", 50, 3);
        assert_eq!(row.key, "run-1:50:3");
        assert_eq!(row.scenario_index, 53);

        row.merge(ScenarioRecord {
            id: "sc-53".to_string(),
            run_id: Some("run-1".to_string()),
            testcase_id: None,
            status: Some("success".to_string()),
            created_at: None,
            updated_at: None,
        });

        assert_eq!(row.key, "run-1:50:3");
        assert_eq!(row.row_id, "sc-53");
        assert_eq!(row.scenario_id.as_deref(), Some("sc-53"));
        assert_eq!(row.scenario_index, 53);
        assert!(!row.is_skeleton);
    }

    #[test]
    fn response_tolerates_missing_fields() {
        let response: PageResponse = serde_json::from_value(json!({
            "rows": [{"id": "sc-1", "created_at": "2025-03-01T10:00:00Z"}],
            "has_more": true,
            "next_windowing": {"next": "sc-1", "limit": 50}
        }))
        .unwrap();

        assert_eq!(response.rows.len(), 1);
        assert!(response.rows[0].created_at.is_some());
        assert_eq!(response.next_offset, None);
        assert_eq!(
            response.next_windowing.and_then(|w| w.next).as_deref(),
            Some("sc-1")
        );
    }

    #[test]
    fn blank_project_id_counts_as_missing() {
        let request = PageRequest {
            scope_id: "run-1".to_string(),
            cursor: None,
            limit: 50,
            offset: 0,
            windowing: None,
            meta: PageMeta::for_project(""),
        };
        assert_eq!(request.project_id(), None);
    }
}
