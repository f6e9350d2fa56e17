// =============================================================================
// Application Identity
// =============================================================================

/// Application name in lowercase (for paths and identifiers)
pub const APP_NAME_LOWER: &str = "logfacet";

// =============================================================================
// Configuration Files
// =============================================================================

/// Config file name, looked up in the working directory
pub const CONFIG_FILE_NAME: &str = "logfacet.json";

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "LOGFACET_CONFIG";

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "LOGFACET_LOG";

// =============================================================================
// Environment Variables - Discovery
// =============================================================================

/// Environment variable for follow-updates mode
pub const ENV_FOLLOW: &str = "LOGFACET_FOLLOW";

/// Environment variable for the NDJSON replay directory
pub const ENV_DATA_DIR: &str = "LOGFACET_DATA_DIR";

/// Environment variable for the delay between replayed payloads
pub const ENV_REPLAY_INTERVAL_MS: &str = "LOGFACET_REPLAY_INTERVAL_MS";

/// Environment variable for the first-snapshot wait bound
pub const ENV_WAIT_TIMEOUT_MS: &str = "LOGFACET_WAIT_TIMEOUT_MS";

/// Environment variable for the operator's time zone (IANA name)
pub const ENV_TIMEZONE: &str = "LOGFACET_TIMEZONE";

// =============================================================================
// Discovery Defaults
// =============================================================================

/// Keep discovery streams open by default
pub const DEFAULT_FOLLOW_UPDATES: bool = true;

/// Default NDJSON replay directory
pub const DEFAULT_DATA_DIR: &str = ".";

/// No delay between replayed payloads
pub const DEFAULT_REPLAY_INTERVAL_MS: u64 = 0;

/// How long the `filter` command waits for the first snapshot
pub const DEFAULT_WAIT_TIMEOUT_MS: u64 = 5_000;
