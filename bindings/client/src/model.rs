use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedFile {
    pub path: String,
}

impl StagedFile {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

/// Body of `POST /api/v1/stage`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageRequest {
    pub files: Vec<StagedFile>,
}

/// Body of `POST /api/v1/archiveinfo`. The service accepts the same `files` layout as a stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArchiveInfoRequest {
    pub files: Vec<StagedFile>,
}

/// Answer to a stage request. The id is optional so that a missing id can be reported as a
/// protocol failure rather than a parse failure.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageResponse {
    #[serde(default)]
    pub request_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageStatus {
    #[serde(default)]
    pub id: Option<String>,
    /// Seconds since the Unix epoch.
    #[serde(default)]
    pub created_at: Option<i64>,
    #[serde(default)]
    pub started_at: Option<i64>,
    #[serde(default)]
    pub completed_at: Option<i64>,
    #[serde(default)]
    pub files: Vec<FileStatus>,
}

impl StageStatus {
    /// True when no file is still waiting or in progress. A status with no files has nothing left
    /// to wait for.
    pub fn all_terminal(&self) -> bool {
        self.files.iter().all(|f| f.state.is_terminal())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FileStatus {
    pub path: String,
    pub state: FileState,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileState {
    Submitted,
    Started,
    Completed,
    Cancelled,
    Failed,
    #[serde(untagged)]
    Unknown(String),
}

impl FileState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            FileState::Completed | FileState::Failed | FileState::Cancelled
        )
    }
}

/// One entry of the archive info answer, either a locality or an error for the path.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ArchiveInfo {
    pub path: String,
    #[serde(default)]
    pub locality: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_stage_status() {
        let status: StageStatus = serde_json::from_str(
            r#"{"id":"a1b2","createdAt":1700000000,"startedAt":1700000001,"completedAt":0,
                "files":[{"path":"/tape/dir001/file002","state":"COMPLETED"},
                         {"path":"/tape/dir003/file004","state":"STARTED"},
                         {"path":"/tape/dir005/file006","state":"RECALLING"}]}"#,
        )
        .unwrap();

        assert_eq!(Some("a1b2".to_string()), status.id);
        assert_eq!(Some(1_700_000_000), status.created_at);
        assert_eq!(FileState::Completed, status.files[0].state);
        assert_eq!(FileState::Started, status.files[1].state);
        assert_eq!(
            FileState::Unknown("RECALLING".to_string()),
            status.files[2].state
        );
        assert!(!status.all_terminal());
    }

    #[test]
    fn terminal_states() {
        assert!(FileState::Completed.is_terminal());
        assert!(FileState::Failed.is_terminal());
        assert!(FileState::Cancelled.is_terminal());
        assert!(!FileState::Submitted.is_terminal());
        assert!(!FileState::Started.is_terminal());
        assert!(!FileState::Unknown("X".to_string()).is_terminal());

        let status: StageStatus = serde_json::from_str(
            r#"{"files":[{"path":"/a","state":"FAILED"},{"path":"/b","state":"CANCELLED"}]}"#,
        )
        .unwrap();
        assert!(status.all_terminal());

        let empty: StageStatus = serde_json::from_str("{}").unwrap();
        assert!(empty.all_terminal());
    }

    #[test]
    fn parse_archive_info() {
        let infos: Vec<ArchiveInfo> = serde_json::from_str(
            r#"[{"path":"/tape/dir001/file001","locality":"NEARLINE"},
                {"path":"/tape/dir002/file002","error":"No such file or directory"}]"#,
        )
        .unwrap();

        assert_eq!(Some("NEARLINE".to_string()), infos[0].locality);
        assert_eq!(
            Some("No such file or directory".to_string()),
            infos[1].error
        );
    }
}
