//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that
//! accept `&PgPool` as the first argument.

pub mod integration_repo;
pub mod job_repo;
pub mod order_repo;
pub mod product_repo;
pub mod webhook_repo;

pub use integration_repo::IntegrationRepo;
pub use job_repo::JobRepo;
pub use order_repo::OrderRepo;
pub use product_repo::ProductRepo;
pub use webhook_repo::WebhookRepo;
