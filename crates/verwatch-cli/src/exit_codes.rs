//! Standard exit codes for CLI operations
//!
//! These exit codes follow Unix conventions and sysexits.h where applicable.

/// General error - unspecified failure
pub const ERROR: i32 = 1;

/// Config error - the service file or a lookup is invalid
pub const CONFIG_ERROR: i32 = 2;

/// Lookup error - the version could not be found
pub const LOOKUP_ERROR: i32 = 3;

/// IO error - file not found, permission denied, etc.
pub const IO_ERROR: i32 = 5;
