pub mod error;
pub mod config;
pub mod core {
    pub mod composer;
    pub mod feedback;
    pub mod form;
    pub mod tokens;
    pub mod versions;
}
pub mod ai {
    pub mod agents;
    pub mod client;
    pub mod prompts;
    pub mod schema_utils;
    #[cfg(test)]
    pub mod testing;
}
pub mod admin;
pub mod billing;
pub mod chat;
pub mod export;
pub mod rate_limit;
pub mod sharing;
pub mod store;
pub mod studio;
pub mod upload;
pub mod workspace;

pub use error::{LabError, Result};
