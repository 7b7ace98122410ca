//! 业务服务层

pub mod auth_service;
pub mod lifecycle_service;
pub mod notification_service;
pub mod user_service;
mod validators;

pub use auth_service::{AuthService, RegisterRequest};
pub use lifecycle_service::AccountLifecycleService;
pub use notification_service::{LogNotifier, Notifier};
pub use user_service::{ProfileUpdate, UserService};
