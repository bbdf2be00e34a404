pub mod ai_service; // Provider dispatch
pub mod anthropic;
pub mod catalog;
pub mod email;
pub mod error;
pub mod gemini;
pub mod nutrition_parser;
pub mod openai;
pub mod resend; // Resend transactional email

pub use ai_service::{build_http_client, ProviderClient, ProviderEndpoints, VisionService};
pub use catalog::ModelCatalog;
pub use resend::ResendClient;
