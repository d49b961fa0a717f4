//! Process exit codes for the `cellcheck` binary

/// No issues found
pub const SUCCESS: i32 = 0;

/// The check ran and found accessibility issues
pub const VIOLATIONS_FOUND: i32 = 1;

/// The tool itself failed (bad config, unreadable notebook, model server down)
pub const TOOL_ERROR: i32 = 2;

pub mod exit {
    use super::*;

    pub fn success() -> ! {
        std::process::exit(SUCCESS);
    }

    pub fn violations_found() -> ! {
        std::process::exit(VIOLATIONS_FOUND);
    }

    pub fn tool_error() -> ! {
        std::process::exit(TOOL_ERROR);
    }
}
