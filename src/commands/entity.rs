//! Entity, relationship query and edge commands.

use std::error::Error;

use entitygraph::models::{EntityRef, NewEntity};
use entitygraph::observability::ObservabilityHandle;
use entitygraph::{Entity, EntityId};

use super::{OutputFormat, Service, print_entities, resolve_kinds};

/// Which neighbors to show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Direction {
    /// Entities this one is sub to.
    Super,
    /// Entities sub to this one.
    Sub,
    /// Both directions.
    #[default]
    Both,
}

/// Entity subcommands.
#[derive(clap::Subcommand)]
pub enum EntityAction {
    /// Wrap a domain reference in a new entity.
    Create {
        /// Reference as `type:id`, e.g. `user:42`.
        reference: String,

        /// Kind name.
        #[arg(short, long)]
        kind: String,

        /// Display name.
        #[arg(short, long)]
        display_name: Option<String>,

        /// Metadata as a JSON document.
        #[arg(short, long)]
        meta: Option<String>,

        /// Create the entity inactive.
        #[arg(long)]
        inactive: bool,
    },

    /// List entities matching relationship filters.
    List {
        /// Include inactive entities.
        #[arg(short, long)]
        all: bool,

        /// Only inactive entities (implies --all).
        #[arg(long)]
        inactive: bool,

        /// Entity is any of these kinds.
        #[arg(short, long, value_delimiter = ',')]
        kind: Vec<String>,

        /// Entity is none of these kinds.
        #[arg(long, value_delimiter = ',')]
        not_kind: Vec<String>,

        /// Entity is sub to at least one of these entity ids.
        #[arg(long, value_delimiter = ',')]
        sub_to_any: Vec<i64>,

        /// Entity is sub to every one of these entity ids.
        #[arg(long, value_delimiter = ',')]
        sub_to_all: Vec<i64>,

        /// Entity is sub to an entity of any of these kinds.
        #[arg(long, value_delimiter = ',')]
        sub_to_any_kind: Vec<String>,

        /// Entity is sub to entities spanning all of these kinds.
        #[arg(long, value_delimiter = ',')]
        sub_to_all_kinds: Vec<String>,

        /// Entity is super to at least one of these entity ids.
        #[arg(long, value_delimiter = ',')]
        super_to_any: Vec<i64>,

        /// Maximum number of results.
        #[arg(short, long)]
        limit: Option<usize>,

        /// Output format.
        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Show one entity by id or `type:id` reference.
    Get {
        /// Entity id or reference.
        entity: String,

        /// Disambiguate a reference wrapped under several kinds.
        #[arg(short, long)]
        kind: Option<String>,

        /// Output format.
        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Delete an entity (deactivates unless --force).
    Delete {
        /// Entity id.
        id: i64,

        /// Physically delete the entity and its relationships.
        #[arg(short, long)]
        force: bool,
    },

    /// Mark an entity active.
    Activate {
        /// Entity id.
        id: i64,
    },

    /// Mark an entity inactive.
    Deactivate {
        /// Entity id.
        id: i64,
    },

    /// Show the entities directly connected to one entity.
    Neighbors {
        /// Entity id.
        id: i64,

        /// Which neighbors to show.
        #[arg(short, long, value_enum, default_value_t)]
        direction: Direction,

        /// Output format.
        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
    },
}

/// Execute an entity command.
///
/// # Errors
///
/// Returns an error if input is malformed or the store fails.
pub fn cmd_entity(service: &Service, action: EntityAction) -> Result<(), Box<dyn Error>> {
    match action {
        EntityAction::Create {
            reference,
            kind,
            display_name,
            meta,
            inactive,
        } => cmd_create(service, &reference, &kind, display_name, meta.as_deref(), inactive),
        EntityAction::List {
            all,
            inactive,
            kind,
            not_kind,
            sub_to_any,
            sub_to_all,
            sub_to_any_kind,
            sub_to_all_kinds,
            super_to_any,
            limit,
            format,
        } => {
            let base = if all || inactive {
                service.all_objects()
            } else {
                service.objects()
            };
            let mut set = base
                .is_any_kind(&resolve_kinds(service, &kind)?)
                .is_not_any_kind(&resolve_kinds(service, &not_kind)?)
                .is_sub_to_any(&to_ids(&sub_to_any))
                .is_sub_to_all(&to_ids(&sub_to_all))
                .is_sub_to_any_kind(&resolve_kinds(service, &sub_to_any_kind)?)
                .is_sub_to_all_kinds(&resolve_kinds(service, &sub_to_all_kinds)?)
                .is_super_to_any(&to_ids(&super_to_any));
            if inactive {
                set = set.inactive();
            }
            if let Some(limit) = limit {
                set = set.limit(limit);
            }
            tracing::debug!(query = ?set.query(), "Listing entities");
            print_entities(service, &set.entities()?, format)
        },
        EntityAction::Get {
            entity,
            kind,
            format,
        } => {
            let found = find_entity(service, &entity, kind.as_deref())?;
            print_entity_detail(service, &found, format)
        },
        EntityAction::Delete { id, force } => {
            let affected = service
                .all_objects()
                .with_ids(&[EntityId::new(id)])
                .delete(force)?;
            ensure_matched(affected, id)?;
            if force {
                println!("Deleted entity {id} and its relationships");
            } else {
                println!("Deactivated entity {id}");
            }
            Ok(())
        },
        EntityAction::Activate { id } => {
            let affected = service
                .all_objects()
                .with_ids(&[EntityId::new(id)])
                .activate()?;
            ensure_matched(affected, id)?;
            println!("Activated entity {id}");
            Ok(())
        },
        EntityAction::Deactivate { id } => {
            let affected = service
                .all_objects()
                .with_ids(&[EntityId::new(id)])
                .deactivate()?;
            ensure_matched(affected, id)?;
            println!("Deactivated entity {id}");
            Ok(())
        },
        EntityAction::Neighbors {
            id,
            direction,
            format,
        } => {
            let entity = service.get_entity(EntityId::new(id))?;
            let mut neighbors = Vec::new();
            if matches!(direction, Direction::Super | Direction::Both) {
                neighbors.extend(service.get_super_entities(&entity)?);
            }
            if matches!(direction, Direction::Sub | Direction::Both) {
                neighbors.extend(service.get_sub_entities(&entity)?);
            }
            print_entities(service, &neighbors, format)
        },
    }
}

fn cmd_create(
    service: &Service,
    reference: &str,
    kind: &str,
    display_name: Option<String>,
    meta: Option<&str>,
    inactive: bool,
) -> Result<(), Box<dyn Error>> {
    let entity_ref = EntityRef::parse(reference)?;
    let kind = service.kind_by_name(kind)?;

    let mut new_entity = NewEntity::new(entity_ref, kind.id).with_active(!inactive);
    if let Some(name) = display_name {
        new_entity = new_entity.with_display_name(name);
    }
    if let Some(meta) = meta {
        let value: serde_json::Value =
            serde_json::from_str(meta).map_err(|e| format!("Invalid --meta JSON: {e}"))?;
        new_entity = new_entity.with_meta(value);
    }

    let entity = service.create_entity(new_entity)?;
    println!("Created entity {} for {}", entity.id, entity.entity_ref);
    Ok(())
}

/// Find an entity by numeric id or `type:id` reference.
fn find_entity(
    service: &Service,
    entity: &str,
    kind: Option<&str>,
) -> Result<Entity, Box<dyn Error>> {
    if let Ok(id) = entity.parse::<i64>() {
        return Ok(service.get_entity(EntityId::new(id))?);
    }

    let reference = EntityRef::parse(entity)?;
    let kinds = match kind {
        Some(name) => vec![service.any_kind_by_name(name)?.id],
        None => Vec::new(),
    };
    Ok(service
        .all_objects()
        .is_any_kind(&kinds)
        .get_for_reference(&reference)?)
}

fn print_entity_detail(
    service: &Service,
    entity: &Entity,
    format: OutputFormat,
) -> Result<(), Box<dyn Error>> {
    let supers = service.get_super_entities(entity)?;
    let subs = service.get_sub_entities(entity)?;

    if format == OutputFormat::Json {
        let output = serde_json::json!({
            "entity": entity,
            "super_entities": supers.iter().map(|e| e.id).collect::<Vec<_>>(),
            "sub_entities": subs.iter().map(|e| e.id).collect::<Vec<_>>(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let kind = service
        .all_kinds()?
        .into_iter()
        .find(|k| k.id == entity.entity_kind)
        .map_or_else(|| entity.entity_kind.to_string(), |k| k.name);

    println!("Entity: {entity}");
    println!();
    println!("ID:            {}", entity.id);
    println!("Reference:     {}", entity.entity_ref);
    println!("Kind:          {kind}");
    println!("Active:        {}", entity.is_active);
    if let Some(meta) = &entity.entity_meta {
        println!("Metadata:      {meta}");
    }
    println!();
    println!("Super entities: {:>4}", supers.len());
    println!("Sub entities:   {:>4}", subs.len());
    Ok(())
}

/// Create a relationship: `sub` becomes subordinate to `sup`.
///
/// # Errors
///
/// Returns an error if either entity does not exist.
pub fn cmd_link(service: &Service, sub: i64, sup: i64) -> Result<(), Box<dyn Error>> {
    let edge = service.add_relationship(&EntityId::new(sub), &EntityId::new(sup))?;
    println!("Linked {edge} (relationship {})", edge.id);
    Ok(())
}

/// Remove every relationship from `sub` to `sup`.
///
/// # Errors
///
/// Returns an error if the store fails.
pub fn cmd_unlink(service: &Service, sub: i64, sup: i64) -> Result<(), Box<dyn Error>> {
    let removed =
        service.remove_relationships_between(&EntityId::new(sub), &EntityId::new(sup))?;
    println!("Removed {removed} relationship(s)");
    Ok(())
}

/// Show graph statistics, optionally followed by collected metrics.
///
/// # Errors
///
/// Returns an error if the store fails.
pub fn cmd_stats(
    service: &Service,
    observability: &ObservabilityHandle,
    show_metrics: bool,
    format: OutputFormat,
) -> Result<(), Box<dyn Error>> {
    let stats = service.stats()?;

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!("Entity Graph Statistics");
        println!("=======================");
        println!();
        println!(
            "Kinds:          {:>8} ({} active)",
            stats.kind_count, stats.active_kind_count
        );
        println!(
            "Entities:       {:>8} ({} active)",
            stats.entity_count, stats.active_entity_count
        );
        println!("Relationships:  {:>8}", stats.relationship_count);
        println!();

        if !stats.entities_by_kind.is_empty() {
            println!("Entities by Kind:");
            for (kind, count) in &stats.entities_by_kind {
                println!("  {kind:<15} {count:>6}");
            }
        }
    }

    if show_metrics {
        match observability.render_metrics() {
            Some(rendered) => {
                println!();
                print!("{rendered}");
            },
            None => eprintln!("Metrics are disabled."),
        }
    }

    Ok(())
}

fn to_ids(raw: &[i64]) -> Vec<EntityId> {
    raw.iter().copied().map(EntityId::new).collect()
}

fn ensure_matched(affected: usize, id: i64) -> Result<(), Box<dyn Error>> {
    if affected == 0 {
        return Err(format!("Entity {id} not found").into());
    }
    Ok(())
}
