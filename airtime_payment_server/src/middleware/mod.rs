mod api_key;

pub use api_key::{ApiKeyMiddlewareFactory, ADMIN_KEY_HEADER};
