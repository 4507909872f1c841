pub mod challenge;
pub mod client_credentials;
pub mod provider;
pub mod shared_key;
pub mod token_cache;
pub mod types;

pub use challenge::{AuthChallenge, ChallengeCache};
pub use client_credentials::ClientSecretCredential;
pub use provider::{AccessToken, StaticTokenCredential, TokenCredential};
pub use shared_key::{SasCredential, SharedKeyCredential, TableCredential};
pub use token_cache::TokenCache;
pub use types::{CachedToken, ClientSecretConfig};
