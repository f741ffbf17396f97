//! HTTP API handlers for calcol-enrich

pub mod enrich;
pub mod health;
pub mod quota;
pub mod social;

pub use enrich::enrich_routes;
pub use health::health_routes;
pub use quota::quota_routes;
pub use social::social_routes;
