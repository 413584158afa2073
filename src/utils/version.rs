//! Build version reported by `--version`, the start-up log and `GET /ping`

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get the current application version
pub fn get_version() -> &'static str {
    VERSION
}

/// Version plus the git commit and build date the build was stamped with
pub fn get_detailed_version() -> String {
    match (option_env!("GIT_HASH"), option_env!("BUILD_DATE")) {
        (Some(hash), Some(date)) => format!("v{} ({}, built {})", VERSION, hash, date),
        (Some(hash), None) => format!("v{} ({})", VERSION, hash),
        _ => format!("v{}", VERSION),
    }
}
