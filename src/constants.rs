// Fundamental configuration constants
pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8081;
pub const API_PREFIX: [&str; 3] = ["api", "v1", "vet"];

// Token lifetimes, in hours
pub const DEFAULT_ACCESS_TOKEN_HOURS: u64 = 2;
pub const DEFAULT_REFRESH_TOKEN_HOURS: u64 = 7 * 24;

// Storage location; `memory` keeps every record in process memory
pub const DEFAULT_DATABASE_URL: &str = "sqlite://vet_clinic_api.db";
pub const MEMORY_DATABASE_URL: &str = "memory";
pub const SQLITE_MAX_CONNECTIONS: u32 = 5;

// Upper bound for a single repository call
pub const DEFAULT_STORE_TIMEOUT_MS: u64 = 5_000;

// Minimum accepted length for signing secrets
pub const MIN_SECRET_LENGTH: usize = 32;

// Date layout accepted for visit dates
pub const VISIT_DATE_FORMAT: &str = "%Y-%m-%d";

// Minimum response time of a failed login
pub const LOGIN_FAILURE_FLOOR_MS: u64 = 150;

// Largest accepted JSON request body
pub const MAX_BODY_BYTES: u64 = 16 * 1024;
