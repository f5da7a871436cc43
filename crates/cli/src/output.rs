//! Human/JSON output helpers shared by every command module.
//!
//! Every command prints either a compact human-readable line (the
//! default) or a pretty-printed JSON payload when `--json` is given —
//! the same split `opensession`'s command modules use, just centralized
//! here instead of repeated inline in each one.

use serde::Serialize;

/// Print `value` as pretty JSON if `json` is set, otherwise call `human`
/// to render the default text form.
pub fn emit<T, F>(value: &T, json: bool, human: F) -> anyhow::Result<()>
where
    T: Serialize,
    F: FnOnce(&T),
{
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        human(value);
    }
    Ok(())
}

pub fn emit_line(message: impl AsRef<str>, json: bool, key: &str) -> anyhow::Result<()> {
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({ key: message.as_ref() }))?
        );
    } else {
        println!("{}", message.as_ref());
    }
    Ok(())
}
