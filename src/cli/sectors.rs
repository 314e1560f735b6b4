use anyhow::Result;

use crate::memory::Engine;

/// Per-sector counts, average salience, and decay rates.
pub fn sectors(engine: &Engine, json: bool) -> Result<()> {
    let response = engine.sectors();
    if json {
        return super::print_json(&response);
    }

    println!("{:<12} {:>8} {:>13} {:>10}", "Sector", "Count", "Avg salience", "Decay/day");
    for stat in &response.stats {
        println!(
            "{:<12} {:>8} {:>13.3} {:>10}",
            stat.sector.as_str(),
            stat.count,
            stat.avg_salience,
            stat.decay_lambda
        );
    }
    Ok(())
}
