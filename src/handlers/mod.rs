pub mod admin;
pub mod public;
pub mod sms;

pub use admin::admin_config;
pub use public::public_config;
pub use sms::{SmsWebhookGuard, sms_config};
