//! Crate-wide constants.

/// Application name, used for data directory paths.
pub const APP_NAME: &str = "enclave";

/// Environment variable overriding the data directory.
pub const DATA_DIR_ENV: &str = "ENCLAVE_DATA_DIR";

/// Length of the truncated hex digest used for idempotency keys and plan hashes.
pub const OBJ_HASH_PREFIX_LEN: usize = 20;

/// Bytes in one megabyte, as used by directory sizes.
pub const MEGABYTE: i64 = 1024 * 1024;

/// Size of a persistent directory when the script does not set one (1 GiB).
pub const DEFAULT_PERSISTENT_DIRECTORY_SIZE_BYTES: i64 = 1024 * MEGABYTE;
