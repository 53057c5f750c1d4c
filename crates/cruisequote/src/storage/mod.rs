pub mod staging;

pub use staging::{FileStaging, StagedFile};
