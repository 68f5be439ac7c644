pub mod aggregator;
pub mod bridge;
pub mod envelope;
pub mod errors;
pub mod models;
pub mod prompt_template;
pub mod providers;
pub mod router;
