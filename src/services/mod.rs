pub mod auth;
pub mod cache;
pub mod dedup;
pub mod extension_tokens;
pub mod lastfm;
pub mod releases;
pub mod spotify;

pub use auth::AuthService;
pub use cache::Cache;
pub use dedup::DuplicateScanner;
pub use extension_tokens::ExtensionTokenService;
pub use lastfm::LastfmClient;
pub use releases::ReleaseTracker;
pub use spotify::SpotifyClient;
