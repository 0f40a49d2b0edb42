//! File reference tables
//!
//! Every uploaded object is referenced by exactly one row in one of these
//! tables; the row's `file_path` column holds the object key.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileTable {
    TaskFiles,
    WorkspaceFiles,
    ChatFiles,
    EditorFiles,
}

impl FileTable {
    pub const ALL: [Self; 4] = [
        Self::TaskFiles,
        Self::WorkspaceFiles,
        Self::ChatFiles,
        Self::EditorFiles,
    ];

    /// SQL table name. Only these fixed names are ever interpolated into queries.
    #[must_use]
    pub const fn table_name(&self) -> &'static str {
        match self {
            Self::TaskFiles => "task_files",
            Self::WorkspaceFiles => "workspace_files",
            Self::ChatFiles => "chat_files",
            Self::EditorFiles => "editor_files",
        }
    }
}

impl std::fmt::Display for FileTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table_name())
    }
}
