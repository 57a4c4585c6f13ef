pub mod analyze;
pub mod convert;
