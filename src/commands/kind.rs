//! Entity kind commands.

use std::error::Error;

use entitygraph::NewEntityKind;

use super::{OutputFormat, Service};

/// Kind subcommands.
#[derive(clap::Subcommand)]
pub enum KindAction {
    /// Register a new kind.
    Create {
        /// Unique kind name.
        name: String,

        /// Human-readable label (defaults to the name).
        #[arg(short, long)]
        display_name: Option<String>,
    },

    /// List kinds.
    List {
        /// Include inactive kinds.
        #[arg(short, long)]
        all: bool,

        /// Output format.
        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
    },

    /// Mark a kind active.
    Activate {
        /// Kind name.
        name: String,
    },

    /// Mark a kind inactive.
    Deactivate {
        /// Kind name.
        name: String,
    },

    /// Delete a kind that no entity references.
    Delete {
        /// Kind name.
        name: String,
    },
}

/// Execute a kind command.
///
/// # Errors
///
/// Returns an error if the store fails or the kind does not exist.
pub fn cmd_kind(service: &Service, action: KindAction) -> Result<(), Box<dyn Error>> {
    match action {
        KindAction::Create { name, display_name } => {
            let display_name = display_name.unwrap_or_else(|| name.clone());
            let kind = service.create_kind(NewEntityKind::new(name, display_name))?;
            println!("Created kind '{}' (id {})", kind.name, kind.id);
        },
        KindAction::List { all, format } => {
            let kinds = if all {
                service.all_kinds()?
            } else {
                service.kinds()?
            };
            match format {
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&kinds)?),
                OutputFormat::Table => {
                    println!("{:>6}  {:<20}  {:<24}  {:<6}", "ID", "NAME", "DISPLAY", "ACTIVE");
                    println!("{}", "-".repeat(62));
                    for kind in &kinds {
                        println!(
                            "{:>6}  {:<20}  {:<24}  {:<6}",
                            kind.id,
                            kind.name,
                            kind.display_name,
                            if kind.is_active { "yes" } else { "no" }
                        );
                    }
                },
            }
        },
        KindAction::Activate { name } => {
            let kind = service.any_kind_by_name(&name)?;
            service.activate_kind(kind.id)?;
            println!("Activated kind '{name}'");
        },
        KindAction::Deactivate { name } => {
            let kind = service.any_kind_by_name(&name)?;
            service.deactivate_kind(kind.id)?;
            println!("Deactivated kind '{name}'");
        },
        KindAction::Delete { name } => {
            let kind = service.any_kind_by_name(&name)?;
            service.delete_kind(kind.id)?;
            println!("Deleted kind '{name}'");
        },
    }
    Ok(())
}
