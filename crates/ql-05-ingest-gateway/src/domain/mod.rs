pub mod dedup;
pub mod event;
pub mod validation;
