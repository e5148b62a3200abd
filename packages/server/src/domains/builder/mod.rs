// Builder session domain: signed tokens for embedding the external page
// builder, and the one-time exchange that turns an initial URL token into a
// renewable session token.
pub mod exchange;
pub mod jwt;
pub mod models;
pub mod store;

pub use exchange::{exchange_token, ExchangeError, ExchangeGrant};
pub use jwt::{BuilderClaims, BuilderTokenService, TokenError, TokenKind};
pub use store::PostgresSessionStore;
