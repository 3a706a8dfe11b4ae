mod entry;
mod files;
mod summary;

pub use entry::{
    NAME_KEY, PARAMS_KEY, Params, StatusData, StepStatus, URL_PARAM, format_timestamp, url_to_key,
    urls_to_tasks,
};
pub use files::{
    CorruptEntry, JournalError, STATUS_FILE_SUFFIX, ScanOutcome, load, save, scan, status_path,
};
pub use summary::{JournalSnapshot, StatusHistogram, StepRow, TaskRow};
