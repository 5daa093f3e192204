/// Application name
pub const APP_NAME: &str = "Keel";

/// Application version
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Current plugin API version
pub const API_VERSION: &str = "0.1.0";

/// Extension of exclusivity lock files
pub const LOCK_FILE_EXTENSION: &str = "lock";
