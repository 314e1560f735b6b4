//! Terminal commands over an opened [`Engine`](crate::memory::Engine).
//!
//! Each command is synchronous; `main` runs them on the blocking pool.

pub mod add;
pub mod delete;
pub mod doctor;
pub mod get;
pub mod list;
pub mod query;
pub mod reinforce;
pub mod sectors;

use anyhow::Result;
use serde::Serialize;

/// Print `value` as pretty JSON on stdout.
pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// First `max` characters of `content` on one line, with an ellipsis if cut.
pub(crate) fn preview(content: &str, max: usize) -> String {
    let flat: String = content
        .chars()
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .collect();
    if flat.chars().count() > max {
        let cut: String = flat.chars().take(max).collect();
        format!("{cut}...")
    } else {
        flat
    }
}
