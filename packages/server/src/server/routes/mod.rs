// HTTP routes
pub mod builder;
pub mod health;
pub mod messages;

pub use builder::*;
pub use health::*;
pub use messages::*;
