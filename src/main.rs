//! group-menu - administer group navigation menus from the command line
//!
//! Opens the menu database, runs one command through `MenuService` and
//! prints the result as JSON (or an outline for `show`).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};
use clap::{Args as ClapArgs, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use group_menu::db::legacy_content::{self, LegacyImport};
use group_menu::menu::{registry, validate_reference};
use group_menu::services::spawn_logging_listener;
use group_menu::{
    Config, ContentCategory, CreateMenuNodeInput, MenuDb, NodeKind, Placement, ReferenceFields,
    ReorderRequest, Services, UpdateMenuNodeInput, Visibility,
};

#[derive(Parser, Debug)]
#[command(name = "group-menu")]
#[command(about = "Navigation menu ordering for community groups")]
struct Args {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Storage directory
    #[arg(long)]
    storage_dir: Option<PathBuf>,

    /// Acting user for menu changes
    #[arg(long, env = "GROUP_MENU_ACTOR", default_value = "cli")]
    actor: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the database and write a default config
    Init,

    /// Allow an actor to administer a group's menu
    GrantAdmin {
        #[arg(long)]
        group: String,
        #[arg(long)]
        actor_id: String,
    },

    /// Load groups, topics, posts and saved views from a JSON export
    ImportContent {
        file: PathBuf,
    },

    /// Build a group's menu from its content
    Bootstrap {
        #[arg(long)]
        group: String,
    },

    /// Print a group's menu
    Show {
        #[arg(long)]
        group: String,
        /// Print JSON instead of an outline
        #[arg(long)]
        json: bool,
    },

    /// Create a menu node
    Create {
        #[arg(long)]
        group: String,
        #[arg(long, value_parser = parse_kind, default_value = "container")]
        kind: NodeKind,
        #[arg(long)]
        parent: Option<String>,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        icon: Option<String>,
        /// Only administrators see the node
        #[arg(long)]
        admin_only: bool,
        /// Append to the end of the parent's menu
        #[arg(long, conflicts_with = "before")]
        append: bool,
        /// Place before this sibling
        #[arg(long)]
        before: Option<String>,
        #[command(flatten)]
        reference: ReferenceArgs,
    },

    /// Edit a node's title, icon, visibility or reference
    Update {
        node: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        icon: Option<String>,
        #[arg(long)]
        admin_only: Option<bool>,
        #[command(flatten)]
        reference: ReferenceArgs,
    },

    /// Move a node
    Reorder {
        node: String,
        /// Target parent; omit for the root
        #[arg(long)]
        parent: Option<String>,
        /// Place before this sibling
        #[arg(long)]
        before: Option<String>,
    },

    /// Take a node out of the visible menu
    Remove {
        node: String,
    },

    /// Delete a node
    Delete {
        node: String,
    },

    /// Point the home node at new content
    SetHome {
        #[arg(long)]
        group: String,
        #[command(flatten)]
        reference: ReferenceArgs,
    },

    /// Show a content category in the menu if it is not already
    Surface {
        #[arg(long)]
        group: String,
        #[arg(long, value_parser = parse_category)]
        category: ContentCategory,
    },

    /// Link a saved view under custom-views if it is not already
    SurfaceView {
        #[arg(long)]
        group: String,
        #[arg(long)]
        view: String,
    },
}

/// View reference flags, at most one of which may be given
#[derive(ClapArgs, Debug, Default)]
struct ReferenceArgs {
    #[arg(long = "ref-group")]
    group_id: Option<String>,
    #[arg(long = "ref-post")]
    post_id: Option<String>,
    #[arg(long = "ref-saved-view")]
    saved_view_id: Option<String>,
    #[arg(long = "ref-member")]
    member_id: Option<String>,
    #[arg(long = "ref-chat-topic")]
    chat_topic_id: Option<String>,
    #[arg(long = "ref-track")]
    track_id: Option<String>,
    #[arg(long = "ref-funding-round")]
    funding_round_id: Option<String>,
}

impl From<ReferenceArgs> for ReferenceFields {
    fn from(args: ReferenceArgs) -> Self {
        ReferenceFields {
            group_id: args.group_id,
            post_id: args.post_id,
            saved_view_id: args.saved_view_id,
            member_id: args.member_id,
            chat_topic_id: args.chat_topic_id,
            track_id: args.track_id,
            funding_round_id: args.funding_round_id,
        }
    }
}

fn parse_kind(tag: &str) -> Result<NodeKind, String> {
    registry()
        .resolve(tag)
        .map(|info| info.kind)
        .map_err(|e| e.to_string())
}

fn parse_category(tag: &str) -> Result<ContentCategory, String> {
    ContentCategory::ALL
        .into_iter()
        .find(|c| c.kind().tag() == tag)
        .ok_or_else(|| format!("unknown content category '{}'", tag))
}

fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load config
    let mut config = if let Some(config_path) = &args.config {
        Config::load(config_path)
            .with_context(|| format!("loading config from {}", config_path.display()))?
    } else {
        Config::default()
    };

    // Apply CLI overrides
    if let Some(dir) = args.storage_dir {
        config.storage_dir = dir;
    }

    // Initialize tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    info!(
        storage_dir = %config.storage_dir.display(),
        database = %config.database_path().display(),
        "Starting group-menu"
    );

    let db = Arc::new(MenuDb::open(&config.database_path(), config.busy_timeout())?);
    let services = Services::new(db.clone(), &config);
    let _listener = spawn_logging_listener(services.events.clone());
    let menu = &services.menu;
    let actor = args.actor.as_str();

    match args.command {
        Command::Init => {
            let config_path = config.config_path();
            if !config_path.exists() {
                config.save(&config_path)?;
                info!(path = %config_path.display(), "Created default config");
            }
            println!("{}", config.database_path().display());
        }

        Command::GrantAdmin { group, actor_id } => {
            db.with_conn(|conn| legacy_content::grant_admin(conn, &group, &actor_id))?;
            info!(group = %group, actor = %actor_id, "Granted menu administration");
        }

        Command::ImportContent { file } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let import: LegacyImport = serde_json::from_str(&raw)?;
            let summary = db.with_tx(|tx| legacy_content::import_legacy(tx, &import))?;
            print_json(&summary)?;
        }

        Command::Bootstrap { group } => {
            let report = menu.bootstrap_menu(actor, &group)?;
            print_json(&report)?;
        }

        Command::Show { group, json } => {
            let tree = menu.menu_tree(&group)?;
            if json {
                print_json(&tree)?;
            } else if tree.roots.is_empty() {
                println!("group {} has no menu", group);
            } else {
                print!("{}", tree.outline());
            }
        }

        Command::Create {
            group,
            kind,
            parent,
            title,
            icon,
            admin_only,
            append,
            before,
            reference,
        } => {
            let placement = match (before, append) {
                (Some(sibling_id), _) => Placement::Before { sibling_id },
                (None, true) => Placement::Append,
                (None, false) => Placement::Unordered,
            };
            let input = CreateMenuNodeInput {
                kind,
                parent_id: parent,
                reference: reference.into(),
                placement,
                title,
                icon,
                visibility: if admin_only { Visibility::Admin } else { Visibility::All },
                is_system_node: false,
            };
            let node = menu.create_menu_node(actor, &group, input)?;
            print_json(&node)?;
        }

        Command::Update {
            node,
            title,
            icon,
            admin_only,
            reference,
        } => {
            let patch = UpdateMenuNodeInput {
                title,
                icon,
                visibility: admin_only.map(|admin| if admin { Visibility::Admin } else { Visibility::All }),
                reference: reference.into(),
                reorder: None,
            };
            let node = menu.update_menu_node(actor, &node, patch)?;
            print_json(&node)?;
        }

        Command::Reorder { node, parent, before } => {
            let request = ReorderRequest {
                parent_id: parent,
                append_to_end: before.is_none(),
                insert_before_id: before,
            };
            menu.reorder_menu_node(actor, &node, request)?;
            print_json(&menu.get_node(&node)?)?;
        }

        Command::Remove { node } => {
            menu.remove_menu_node_from_menu(actor, &node)?;
            print_json(&menu.get_node(&node)?)?;
        }

        Command::Delete { node } => {
            let result = menu.delete_menu_node(actor, &node)?;
            print_json(&result)?;
        }

        Command::SetHome { group, reference } => {
            let fields: ReferenceFields = reference.into();
            let target = validate_reference(&fields)?;
            if target.is_none() {
                bail!("set-home needs one --ref-* flag");
            }
            let home = menu.set_home_reference(actor, &group, target)?;
            print_json(&home)?;
        }

        Command::Surface { group, category } => match menu.surface_category(&group, category)? {
            Some(node) => print_json(&node)?,
            None => println!("{} is already in the menu", category.kind()),
        },

        Command::SurfaceView { group, view } => match menu.surface_saved_view(&group, &view)? {
            Some(node) => print_json(&node)?,
            None => println!("saved view {} is already in the menu", view),
        },
    }

    Ok(())
}
