pub mod charts;
pub mod highlight;
pub mod report;
pub mod summary;
