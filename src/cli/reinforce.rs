use anyhow::Result;

use crate::memory::Engine;

/// Boost a memory's salience.
pub fn reinforce(engine: &Engine, id: &str, boost: f64) -> Result<()> {
    let response = engine.reinforce(id, boost)?;
    println!("Reinforced {} (salience now {:.3})", response.id, response.salience);
    Ok(())
}
