pub mod analyzer;
pub mod auth;
pub mod extractor;
pub mod oauth;
pub mod sanitizer;

pub use analyzer::{BatchAnalysis, ReceiptAnalyzer, SingleAnalysis, UploadedImage};
pub use auth::{AuthService, AuthSession};
pub use extractor::{parse_summary, ExtractError, GeminiExtractor, ReceiptExtractor};
pub use oauth::{GoogleOAuth, GoogleProfile, OAuthError};
