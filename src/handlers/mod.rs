mod health;
mod relay;

pub use health::health_check;
pub use relay::{method_not_allowed, preflight, relay, usage};
