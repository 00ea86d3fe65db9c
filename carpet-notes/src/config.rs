//! Application configuration constants
//!
//! Central location for storage keys, defaults, asset cache layout and
//! identifier format used throughout the application.

// ===== Storage =====

/// Database file created inside the data directory
pub const DATABASE_FILE_NAME: &str = "carpet-notes.db";

/// Directory (inside the data directory) holding the offline asset caches
pub const ASSET_CACHE_DIR_NAME: &str = "asset-cache";

/// Environment variable overriding the data directory
pub const DATA_DIR_ENV: &str = "CARPET_NOTES_DATA_DIR";

/// Key-value entry holding the serialized settings object
pub const SETTINGS_KEY: &str = "carpetNotes_settings";

/// Key-value entry holding the serialized record array
pub const RECORDS_KEY: &str = "carpetNotes_records";

/// Current settings payload format. Payloads without a version are treated as 1.
pub const SETTINGS_FORMAT_VERSION: u32 = 1;

// ===== Settings Defaults =====

/// Price per square meter on first run
pub const DEFAULT_RATE_PER_SQ_M: f64 = 1000.0;

// ===== Record Identifiers =====

/// Number of random base-36 characters appended to the millisecond timestamp
pub const ID_RANDOM_SUFFIX_LEN: usize = 9;

// ===== Asset Cache =====

/// Cache holding the files the app needs to boot offline
pub const CORE_CACHE_NAME: &str = "carpet-notes-v1.3";

/// Cache holding every precached static file
pub const STATIC_CACHE_NAME: &str = "carpet-notes-static-v1.3";

/// Cache filled at runtime by network fallbacks
pub const DYNAMIC_CACHE_NAME: &str = "carpet-notes-dynamic-v1.3";

/// Default origin relative asset paths resolve against
pub const DEFAULT_ASSET_ORIGIN: &str = "http://localhost:8080/";

/// Files precached into the static cache on install
pub const STATIC_FILES: &[&str] = &[
    "/",
    "/index.html",
    "/styles.css",
    "/app.js",
    "/manifest.json",
    "https://fonts.googleapis.com/css2?family=Inter:wght@300;400;500;600;700&display=swap",
    "https://fonts.gstatic.com/s/inter/v13/UcCO3FwrK3iLTeHuS_fvQtMwCp50KnMw2boKoduKmMEVuLyfAZ9hiA.woff2",
];

/// Files required for the app to work offline, cached separately
pub const CORE_FILES: &[&str] = &["/", "/index.html", "/styles.css", "/app.js"];

/// All cache names belonging to the current version
pub const CURRENT_CACHE_NAMES: &[&str] = &[CORE_CACHE_NAME, STATIC_CACHE_NAME, DYNAMIC_CACHE_NAME];
