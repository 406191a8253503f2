//! Standard exit codes for CLI operations

/// Success - operation completed without errors
pub const SUCCESS: i32 = 0;

/// General error - unspecified failure or unanswered prompt
pub const ERROR: i32 = 1;

/// Configuration error - conflicting or invalid flags
pub const CONFIG_ERROR: i32 = 2;

/// Load error - input could not be parsed or has the wrong shape
pub const LOAD_ERROR: i32 = 3;

/// Transform error - objects could not be built for the target platform
pub const TRANSFORM_ERROR: i32 = 4;

/// IO error - file not found, permission denied, etc.
pub const IO_ERROR: i32 = 5;

/// Cluster error - connection refused or objects rejected
pub const CLUSTER_ERROR: i32 = 6;
