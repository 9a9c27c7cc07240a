//! File I/O, validation and dataset partitioning for the attrition pipeline.

mod domain;
mod error;
mod reader;
mod split;
mod store;

pub use domain::{StudentId, StudentRecord};
pub use error::IoError;
pub use reader::RecordReader;
pub use split::{ClassOverview, SplitConfig, StratifiedSplit, class_overview, validation_split};
pub use store::{CONTROLS_NAME, Controls, Partition, StoredStudent, StudentStore};
