//! Task draft models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::id::DraftId;

/// Metadata of one file attached to a draft, as stored in `uploaded_files`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftFile {
    #[serde(default)]
    pub file_name: String,
    #[serde(default)]
    pub file_type: String,
    #[serde(default)]
    pub file_size: f64,
    #[serde(default)]
    pub file_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_location: Option<String>,
}

/// A task that was never submitted
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskDraft {
    pub id: DraftId,
    pub uploaded_files: Vec<DraftFile>,
    pub updated_at: DateTime<Utc>,
}

impl TaskDraft {
    /// Object keys referenced by the draft
    pub fn file_paths(&self) -> impl Iterator<Item = &str> {
        self.uploaded_files
            .iter()
            .map(|f| f.file_path.as_str())
            .filter(|p| !p.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_uploaded_files_column() {
        let raw = r#"[
            {"fileName":"a.pdf","fileType":"application/pdf","fileSize":12.5,"filePath":"drafts/a.pdf","storageLocation":"s3"},
            {"fileName":"b.png","filePath":""},
            {"filePath":"drafts/unnamed.bin"}
        ]"#;
        let files: Vec<DraftFile> = serde_json::from_str(raw).unwrap();

        let draft = TaskDraft {
            id: DraftId::new(),
            uploaded_files: files,
            updated_at: Utc::now(),
        };
        assert_eq!(
            draft.file_paths().collect::<Vec<_>>(),
            vec!["drafts/a.pdf", "drafts/unnamed.bin"]
        );
    }
}
