pub mod health;
pub mod integrations;
pub mod metrics;
pub mod orders;
