// Scheduled WhatsApp messaging domain
pub mod dispatcher;
pub mod models;
pub mod sanitize;
pub mod store;

pub use dispatcher::{
    DispatchFailure, DispatchOutcome, DispatchReport, Dispatcher, DispatcherPolicy, FailurePolicy,
};
pub use sanitize::{sanitize_variable, sanitize_variables};
pub use store::{PostgresInteractionStore, PostgresScheduledMessageStore, PostgresTemplateRegistry};
