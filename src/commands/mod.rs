//! Command handlers module.
//!
//! - `kind.rs`: entity kind registry commands
//! - `entity.rs`: entity, query and edge commands
//! - `config.rs`: configuration display

mod config;
mod entity;
mod kind;

use std::error::Error;

use entitygraph::config::EntityGraphConfig;
use entitygraph::services::EntityService;
use entitygraph::storage::SqliteEntityStore;
use entitygraph::{Entity, EntityKindId};

pub use config::cmd_config;
pub use entity::{EntityAction, cmd_entity, cmd_link, cmd_stats, cmd_unlink};
pub use kind::{KindAction, cmd_kind};

/// Service type every command operates on.
pub type Service = EntityService<SqliteEntityStore>;

/// Opens the entity service over the configured `SQLite` database.
///
/// # Errors
///
/// Returns an error if the database cannot be opened.
pub fn open_service(config: &EntityGraphConfig) -> Result<Service, Box<dyn Error>> {
    let store = SqliteEntityStore::from_config(config).map_err(|e| {
        format!(
            "Failed to open entity store at {}: {e}",
            config.database_path().display()
        )
    })?;
    Ok(EntityService::new(store))
}

/// Output format for listing commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Aligned columns.
    #[default]
    Table,
    /// Pretty-printed JSON.
    Json,
}

/// Resolves kind names to ids, including inactive kinds.
fn resolve_kinds(service: &Service, names: &[String]) -> Result<Vec<EntityKindId>, Box<dyn Error>> {
    names
        .iter()
        .map(|name| -> Result<EntityKindId, Box<dyn Error>> {
            Ok(service.any_kind_by_name(name)?.id)
        })
        .collect()
}

/// Print entities as a table.
fn print_entities_table(service: &Service, entities: &[Entity]) -> Result<(), Box<dyn Error>> {
    let kinds = service.all_kinds()?;
    let kind_name = |id: EntityKindId| {
        kinds
            .iter()
            .find(|k| k.id == id)
            .map_or_else(|| id.to_string(), |k| k.name.clone())
    };

    println!(
        "{:>8}  {:<24}  {:<24}  {:<12}  {:<6}",
        "ID", "REFERENCE", "NAME", "KIND", "ACTIVE"
    );
    println!("{}", "-".repeat(82));
    for entity in entities {
        println!(
            "{:>8}  {:<24}  {:<24}  {:<12}  {:<6}",
            entity.id,
            truncate(&entity.entity_ref.to_string(), 24),
            truncate(&entity.display_name, 24),
            truncate(&kind_name(entity.entity_kind), 12),
            if entity.is_active { "yes" } else { "no" }
        );
    }
    println!();
    println!("{} entities", entities.len());
    Ok(())
}

/// Print entities as JSON.
fn print_entities_json(entities: &[Entity]) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(entities)?);
    Ok(())
}

fn print_entities(
    service: &Service,
    entities: &[Entity],
    format: OutputFormat,
) -> Result<(), Box<dyn Error>> {
    match format {
        OutputFormat::Json => print_entities_json(entities),
        OutputFormat::Table if entities.is_empty() => {
            println!("No entities found.");
            Ok(())
        },
        OutputFormat::Table => print_entities_table(service, entities),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() > max {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{kept}...")
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("a much longer name", 10), "a much ...");
    }
}
