use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub i64);
    };
}

id_newtype!(WatchId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortMode {
    #[default]
    Relevance,
    Date,
}

impl SortMode {
    pub const ALL: [SortMode; 2] = [SortMode::Relevance, SortMode::Date];

    pub fn as_str(self) -> &'static str {
        match self {
            SortMode::Relevance => "relevance",
            SortMode::Date => "date",
        }
    }
}

impl std::str::FromStr for SortMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "relevance" => Ok(SortMode::Relevance),
            "date" => Ok(SortMode::Date),
            other => Err(format!("unknown sort mode: {other}")),
        }
    }
}

/// A document as returned by either the unfiltered listing or a search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultItem {
    pub path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
    /// Present (possibly empty) only on search results.
    #[serde(
        default,
        deserialize_with = "deserialize_present_highlight",
        skip_serializing_if = "Option::is_none"
    )]
    pub highlight: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultItemKind {
    Plain,
    SearchResult,
}

impl ResultItem {
    pub fn kind(&self) -> ResultItemKind {
        if self.highlight.is_some() {
            ResultItemKind::SearchResult
        } else {
            ResultItemKind::Plain
        }
    }

    pub fn display_title(&self) -> String {
        if let Some(title) = &self.title {
            return title.clone();
        }
        self.path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .filter(|stem| !stem.is_empty())
            .unwrap_or_else(|| "Untitled".to_string())
    }
}

// A `"highlight": null` key still marks the item as a search result.
fn deserialize_present_highlight<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(Some(value.unwrap_or_default()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchStatus {
    Active,
    Adding,
    Deleting,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Watch {
    pub id: WatchId,
    pub path: PathBuf,
    pub status: WatchStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub document_count: u32,
}

impl Watch {
    /// True when `other` is this watch's path or lies beneath it (or the reverse).
    pub fn overlaps(&self, other: &Path) -> bool {
        other.starts_with(&self.path) || self.path.starts_with(other)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobType {
    #[serde(rename = "scan_watch_path")]
    Scan,
    #[serde(rename = "delete_watch")]
    Delete,
    #[serde(rename = "sync_watch")]
    Sync,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Running,
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct JobProgress {
    pub done: u64,
    pub total: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobReport {
    pub watch: Watch,
    pub progress: JobProgress,
    pub job_type: JobType,
    pub status: JobStatus,
}

impl JobReport {
    pub fn watch_id(&self) -> WatchId {
        self.watch.id
    }

    pub fn is_finished(&self) -> bool {
        self.status == JobStatus::Finished
    }
}

/// Watches plus the job reports that reference them. Always replaced as a whole.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchState {
    pub watches: Vec<Watch>,
    pub job_reports: Vec<JobReport>,
}

impl WatchState {
    pub fn job_report_for(&self, watch_id: WatchId) -> Option<&JobReport> {
        self.job_reports
            .iter()
            .find(|report| report.watch_id() == watch_id)
    }

    pub fn has_finished_job(&self) -> bool {
        self.job_reports.iter().any(JobReport::is_finished)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    Documents,
    Obsidian,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathRecommendation {
    pub path: PathBuf,
    #[serde(rename = "type")]
    pub kind: RecommendationKind,
}
