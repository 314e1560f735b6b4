//! CLI `query` command: ranked recall from the terminal.

use anyhow::Result;

use crate::memory::engine::QueryRequest;
use crate::memory::Engine;

/// Run a query and print the ranked matches.
pub fn query(engine: &Engine, request: &QueryRequest, json: bool) -> Result<()> {
    let response = engine.query(request)?;
    if json {
        return super::print_json(&response);
    }

    if response.matches.is_empty() {
        println!("No results found.");
        return Ok(());
    }

    println!("Found {} result(s)\n", response.matches.len());
    for (i, m) in response.matches.iter().enumerate() {
        println!(
            "  {}. [{}] {} (score: {:.4}, salience: {:.2})",
            i + 1,
            m.primary_sector,
            m.id,
            m.score,
            m.salience,
        );
        println!("     {}", super::preview(&m.content, 120));
        if let Some(path) = m.path.as_ref().filter(|p| p.len() > 1) {
            println!("     via {}", path.join(" -> "));
        }
        println!();
    }
    Ok(())
}
