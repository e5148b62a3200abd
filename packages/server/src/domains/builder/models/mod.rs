pub mod session;

pub use session::BuilderSession;
