pub mod draft;
pub mod file;
pub mod id;
pub mod notification;
pub mod task;

pub use draft::{DraftFile, TaskDraft};
pub use file::FileTable;
pub use id::{DraftId, TaskId, UserId};
pub use notification::{CreateNotificationRequest, Notification, NotificationMethod};
pub use task::{BlockListEntry, Task, TaskStatus};
