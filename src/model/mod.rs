//! 领域模型

pub mod account;

pub use account::Account;
