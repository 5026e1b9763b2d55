//! Database models split into domain-specific modules.

pub mod category;
pub mod common;
pub mod pagination;
pub mod product;
pub mod session;
pub mod user;

pub use category::*;
pub use common::*;
pub use pagination::*;
pub use product::*;
pub use session::*;
pub use user::*;
