pub mod backend;
pub mod pages;
pub mod proxy;
pub mod registry;
pub mod render;
pub mod web_session;
