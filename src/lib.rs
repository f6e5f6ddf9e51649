pub mod authz;
pub mod catalog;
pub mod config;
pub mod contract;
pub mod discord;
pub mod error;
pub mod health;
pub mod service;
pub mod types;
pub mod workflow;

// Re-export commonly used types
pub use catalog::RoleCatalog;
pub use contract::{Contract, ContractState, ContractStore};
pub use error::{GafferError, Result};
pub use types::{ChannelId, ContractId, RoleId, UserId};
pub use workflow::OfferWorkflow;
