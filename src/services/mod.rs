pub mod analytics;
pub mod audit;
pub mod batches;
pub mod catalog;
pub mod notifications;
pub mod orders;
pub mod patients;
pub mod pos;
pub mod users;
