pub mod auth;
pub mod conversation;
pub mod credentials;
pub mod error;
pub mod extract;
pub mod identity;
pub mod messages;
pub mod middleware;
pub mod routes;
pub mod service;
pub mod session;
pub mod timestamp;
pub mod users;

pub use error::ApiError;
pub use service::MessagingService;
pub use session::{Session, SessionManager};
