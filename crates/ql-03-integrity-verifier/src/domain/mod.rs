pub mod cancel;
pub mod checks;
pub mod report;
