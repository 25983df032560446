pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod oauth;
pub mod router;
pub mod service;
pub mod session;

pub use error::LinkerError;
pub use service::link_flow::LinkFlow;
