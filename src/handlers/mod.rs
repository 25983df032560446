pub mod oauth;
pub mod redirect;
