pub mod artifacts;
pub mod batch;
pub mod patient_input;
