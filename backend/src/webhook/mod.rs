pub mod event;
pub mod signature;

pub use event::{normalize, UserEvent, ValidationError, WebhookEvent};
pub use signature::{SignatureError, WebhookVerifier};
