//! Type definitions for kinnect storage.

mod accounts;
mod contacts;
mod ids;
mod introductions;
mod magic_links;
mod notifications;
mod referrals;

// Re-export all types from submodules
pub use accounts::*;
pub use contacts::*;
pub use ids::*;
pub use introductions::*;
pub use magic_links::*;
pub use notifications::*;
pub use referrals::*;
