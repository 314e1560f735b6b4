use anyhow::Result;

use crate::memory::Engine;

/// Permanently delete a memory.
pub fn delete(engine: &Engine, id: &str) -> Result<()> {
    let response = engine.delete(id)?;
    println!("Deleted {}", response.id);
    Ok(())
}
