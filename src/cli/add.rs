use anyhow::Result;

use crate::memory::engine::AddRequest;
use crate::memory::Engine;

/// Store a memory and print its id and classification.
pub fn add(engine: &Engine, request: AddRequest, json: bool) -> Result<()> {
    let added = engine.add(request)?;
    if json {
        return super::print_json(&added);
    }

    let secondary: Vec<&str> = added
        .sectors
        .iter()
        .filter(|s| **s != added.primary_sector)
        .map(|s| s.as_str())
        .collect();

    println!("Stored {}", added.id);
    println!("  Sector:     {}", added.primary_sector);
    if !secondary.is_empty() {
        println!("  Also:       {}", secondary.join(", "));
    }
    println!("  Salience:   {:.2}", added.salience);
    println!("  Waypoints:  {}", added.waypoints);
    Ok(())
}
