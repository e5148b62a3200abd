pub mod api_settings;
pub mod interaction;
pub mod scheduled_message;
pub mod template;

pub use api_settings::BrandApiSettings;
pub use interaction::InteractionRecord;
pub use scheduled_message::{DueMessage, ScheduledMessage};
pub use template::TemplateDefinition;
