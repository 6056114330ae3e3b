//! Constants used throughout the Clipstash library.
//!
//! This module provides central definitions for defaults, reserved characters
//! and on-disk names shared by the library and the binary.

/// Number of history entries returned when a query names no limit.
pub const DEFAULT_LIMIT: usize = 10;

/// Separator between the segments of a tag path ("Science/Archaeology").
pub const PATH_SEPARATOR: char = '/';

/// Text format of timestamps in the SQLite store.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

/// Default SQLite database file name inside the data directory.
pub const SQLITE_FILE: &str = "streaming_history.db";

/// Default JSON snapshot file name inside the data directory.
pub const JSON_FILE: &str = "history.json";

/// Default configuration file name inside the config directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Log file prefix for the daily rolling appender.
pub const LOG_FILE: &str = "clipstash.log";

/// Environment variable overriding the configured database path.
pub const DB_ENV: &str = "CLIPSTASH_DB";
