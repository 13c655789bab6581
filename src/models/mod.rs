pub mod task;

pub use task::{ExceptionDetail, NewTask, TaskMetaData, TaskRecord, TaskStatus};
