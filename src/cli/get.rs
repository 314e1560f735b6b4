//! CLI `get` command: full details for one memory.

use anyhow::Result;

use crate::memory::Engine;

/// Print one memory with its current salience and waypoint links.
pub fn get(engine: &Engine, id: &str, json: bool) -> Result<()> {
    let view = engine.get(id)?;
    let waypoints = engine.waypoints(id)?;

    if json {
        let mut value = serde_json::to_value(&view)?;
        value["waypoints"] = serde_json::to_value(&waypoints)?;
        return super::print_json(&value);
    }

    let sectors: Vec<&str> = view.sectors.iter().map(|s| s.as_str()).collect();

    println!("Memory: {}", view.id);
    println!("{}", "=".repeat(50));
    println!("  Sector:         {}", view.primary_sector);
    println!("  Sectors:        {}", sectors.join(", "));
    println!(
        "  Salience:       {:.3} (baseline {:.3}, decay {}/day)",
        view.salience, view.salience0, view.decay_lambda
    );
    println!("  Created:        {}", view.created_at);
    println!("  Last access:    {}", view.last_access_at);
    if !view.tags.is_empty() {
        let tags: Vec<&str> = view.tags.iter().map(String::as_str).collect();
        println!("  Tags:           {}", tags.join(", "));
    }
    if !view.metadata.is_empty() {
        println!(
            "  Metadata:       {}",
            serde_json::to_string_pretty(&view.metadata)?
        );
    }
    println!();
    println!("Content:");
    println!("  {}", view.content);

    if !waypoints.is_empty() {
        println!();
        println!("Waypoints:");
        for edge in &waypoints {
            println!("  --({:.3})--> {}", edge.weight, edge.neighbor);
        }
    }
    Ok(())
}
