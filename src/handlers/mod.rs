// Gateway module - controls public API for handlers
// Modules are private, only exported symbols are public

mod health;
mod invoices;
mod metrics;
mod root;
mod shared_types;
mod sign;

// Core handlers
pub use health::health_check;
pub use metrics::metrics_handler;
pub use root::root_handler;

// Invoice document handlers
pub use invoices::{cancel_invoice, create_invoice, get_artifact, get_invoice};

// Signing flow handlers
pub use sign::{challenge_start, sign_finish};
