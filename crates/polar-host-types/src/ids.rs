//! Stable identifiers shared by the host and the engine.

/// File extensions accepted for policy source files (without the leading dot).
pub const POLICY_EXTENSIONS: [&str; 2] = ["pol", "polar"];

// Built-in class tags for values that never need registration.
pub const CLASS_BOOLEAN: &str = "Boolean";
pub const CLASS_INTEGER: &str = "Integer";
pub const CLASS_FLOAT: &str = "Float";
pub const CLASS_STRING: &str = "String";
pub const CLASS_LIST: &str = "List";
pub const CLASS_DICTIONARY: &str = "Dictionary";

/// Returns true when `extension` (without the dot) names a policy source file.
pub fn is_policy_extension(extension: &str) -> bool {
    POLICY_EXTENSIONS.contains(&extension)
}
