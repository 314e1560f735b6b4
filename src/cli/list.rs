use anyhow::Result;

use crate::memory::types::Sector;
use crate::memory::Engine;

/// Print one page of memories, newest first.
pub fn list(
    engine: &Engine,
    limit: usize,
    offset: usize,
    sector: Option<Sector>,
    json: bool,
) -> Result<()> {
    let page = engine.list(limit, offset, sector);
    if json {
        return super::print_json(&page);
    }

    if page.items.is_empty() {
        println!("No memories.");
        return Ok(());
    }

    for view in &page.items {
        println!(
            "{}  [{:<10}] {:.2}  {}",
            view.id,
            view.primary_sector.as_str(),
            view.salience,
            super::preview(&view.content, 80)
        );
    }
    println!(
        "\nShowing {}-{} of {}",
        offset + 1,
        offset + page.items.len(),
        page.total
    );
    Ok(())
}
