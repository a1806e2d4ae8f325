//! Preload script listing generated images so the runtime can warm its cache.

/// Global the script appends to.
pub const GLOBAL: &str = "SLICEPACK_SPRITES";

/// Build the script for a list of names.
pub fn script(names: &[String]) -> String {
    // serde_json escapes quotes and backslashes in names
    let list = serde_json::to_string(names).unwrap_or_else(|_| "[]".to_string());
    format!(
        "if (typeof {g} === 'undefined') var {g} = [];{g} = {g}.concat({list});",
        g = GLOBAL,
        list = list
    )
}
