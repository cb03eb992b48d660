mod error_handler;
mod rate_limit;
mod response_time;

pub use error_handler::log_errors;
pub use rate_limit::{UNKNOWN_CLIENT, client_identity, rate_limit};
pub use response_time::{X_RESPONSE_TIME, response_time};
