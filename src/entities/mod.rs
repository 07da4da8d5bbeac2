//! Database entity definitions (sea-orm models).

pub mod audit_log;
pub mod notification;
pub mod order_item;
pub mod order_request;
pub mod otp_token;
pub mod patient;
pub mod payment;
pub mod product;
pub mod product_batch;
pub mod product_category;
pub mod user;
pub mod walk_in_item;
pub mod walk_in_transaction;
