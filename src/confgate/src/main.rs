//! confgate: administer tenant-aware modules, settings and feature flags
//! kept in a local data directory.

mod context;

use anyhow::{Context as _, Result};
use clap::{ArgAction, Parser, Subcommand};
use confgate_core::config::AppConfig;
use confgate_core::types::{SettingType, TenantId};
use confgate_platform::SecretKey;
use confgate_registry::{FlagOptions, SetOptions};
use context::Context;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "confgate")]
#[command(about = "Tenant-aware configuration administration tool")]
#[command(version)]
struct Cli {
    /// Configuration file (TOML)
    #[arg(short, long, env = "CONFGATE_CONFIG")]
    config: Option<PathBuf>,

    /// Data directory for the stores (overrides config)
    #[arg(long)]
    data_dir: Option<String>,

    /// Tenant to act on; omit for the global scope
    #[arg(short, long, global = true)]
    tenant: Option<String>,

    /// Actor recorded on writes
    #[arg(long, global = true, default_value = "cli")]
    actor: String,

    /// Existing user rows, consulted by the dashboard disable rule
    #[arg(long, env = "CONFGATE_USER_COUNT", default_value_t = 0)]
    user_count: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create global records for the built-in modules that are missing
    Seed,

    /// Inspect and toggle modules
    Modules {
        #[command(subcommand)]
        action: ModuleAction,
    },

    /// Read and write settings
    Settings {
        #[command(subcommand)]
        action: SettingAction,
    },

    /// Read and write feature flags
    Flags {
        #[command(subcommand)]
        action: FlagAction,
    },

    /// Decide whether a route is reachable for the tenant
    Check {
        route: String,

        /// Treat the caller as an administrator
        #[arg(long)]
        admin: bool,
    },

    /// Generate a new AES-256 secrets key
    GenerateKey {
        /// Output file path for the key (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum ModuleAction {
    /// List every module visible to the tenant
    List,
    /// Show one resolved module
    Show { key: String },
    Enable { key: String },
    Disable { key: String },
}

#[derive(Subcommand, Debug)]
enum SettingAction {
    /// Show a resolved setting (secrets masked unless --reveal)
    Get {
        key: String,
        #[arg(long)]
        reveal: bool,
    },
    Set {
        key: String,
        value: String,
        /// string, number, boolean or json
        #[arg(long = "type", default_value = "string")]
        value_type: SettingType,
        #[arg(long)]
        secret: bool,
        #[arg(long)]
        description: Option<String>,
    },
    /// Remove the record at the selected scope
    Delete { key: String },
    List,
}

#[derive(Subcommand, Debug)]
enum FlagAction {
    Get { key: String },
    Set {
        key: String,
        #[arg(action = ArgAction::Set)]
        enabled: bool,
        #[arg(long)]
        description: Option<String>,
    },
    Delete { key: String },
    List,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "confgate=info".into()),
        )
        .with_writer(std::io::stderr)
        .json()
        .init();

    let cli = Cli::parse();

    if let Commands::GenerateKey { output } = &cli.command {
        return cmd_generate_key(output.as_ref());
    }

    let mut config = AppConfig::load(cli.config.as_deref()).unwrap_or_else(|e| {
        warn!(error = %e, "Failed to load config, using defaults");
        AppConfig::default()
    });
    if let Some(dir) = cli.data_dir.clone() {
        config.store.data_dir = dir;
    }
    info!(data_dir = %config.store.data_dir, "Configuration loaded");

    let ctx = Context::open(&config, cli.user_count)?;
    let tenant = cli.tenant.as_deref().map(TenantId::new);
    let tenant = tenant.as_ref();
    let actor = cli.actor.as_str();

    match cli.command {
        Commands::Seed => {
            let created = ctx.services.modules.seed_defaults(Some(actor))?;
            println!("Seeded {} module(s)", created.len());
            for key in created {
                println!("  {key}");
            }
        }
        Commands::Modules { action } => cmd_modules(&ctx, action, tenant, actor)?,
        Commands::Settings { action } => cmd_settings(&ctx, action, tenant, actor)?,
        Commands::Flags { action } => cmd_flags(&ctx, action, tenant, actor)?,
        Commands::Check { route, admin } => {
            let required = ctx.enforcer.resolve_required_module(&route).map(str::to_string);
            let decision = ctx.enforcer.check_access(&route, tenant, admin)?;
            print_json(&serde_json::json!({
                "route": route,
                "required_module": required,
                "result": decision,
            }))?;
        }
        Commands::GenerateKey { .. } => {}
    }
    Ok(())
}

fn cmd_generate_key(output: Option<&PathBuf>) -> Result<()> {
    let encoded = SecretKey::generate().to_base64();
    match output {
        Some(path) => {
            std::fs::write(path, &encoded)
                .with_context(|| format!("writing key to {}", path.display()))?;
            println!("Secrets key written to: {}", path.display());
        }
        None => println!("{encoded}"),
    }
    Ok(())
}

fn cmd_modules(
    ctx: &Context,
    action: ModuleAction,
    tenant: Option<&TenantId>,
    actor: &str,
) -> Result<()> {
    let modules = &ctx.services.modules;
    match action {
        ModuleAction::List => {
            for m in modules.get_all_modules(tenant)? {
                println!(
                    "{:<16} {:<8} {:<7} {}",
                    m.key,
                    if m.enabled { "enabled" } else { "disabled" },
                    m.scope_class.as_str(),
                    m.scope
                );
            }
        }
        ModuleAction::Show { key } => match modules.get_module(&key, tenant)? {
            Some(record) => print_json(&record)?,
            None => println!("Module `{key}` not found"),
        },
        ModuleAction::Enable { key } => {
            print_json(&modules.update_module(&key, true, tenant, Some(actor))?)?
        }
        ModuleAction::Disable { key } => {
            print_json(&modules.update_module(&key, false, tenant, Some(actor))?)?
        }
    }
    Ok(())
}

fn cmd_settings(
    ctx: &Context,
    action: SettingAction,
    tenant: Option<&TenantId>,
    actor: &str,
) -> Result<()> {
    let settings = &ctx.services.settings;
    match action {
        SettingAction::Get { key, reveal } => {
            let view = settings.describe(&key, tenant)?;
            match (view, reveal) {
                (None, _) => println!("Setting `{key}` not set"),
                (Some(view), true) if view.is_secret => {
                    let value = settings.get(&key, tenant)?;
                    print_json(&serde_json::json!({
                        "key": view.key,
                        "scope": view.scope,
                        "value": value.map(|v| v.to_raw()),
                    }))?;
                }
                (Some(view), _) => print_json(&view)?,
            }
        }
        SettingAction::Set {
            key,
            value,
            value_type,
            secret,
            description,
        } => {
            let options = SetOptions {
                tenant_id: tenant.cloned(),
                is_secret: secret,
                description,
                updated_by: Some(actor.to_string()),
            };
            let view = settings.set(&key, serde_json::Value::String(value), value_type, options)?;
            print_json(&view)?;
        }
        SettingAction::Delete { key } => {
            if settings.delete(&key, tenant, Some(actor))? {
                println!("Deleted `{key}`");
            } else {
                println!("Setting `{key}` not set at this scope");
            }
        }
        SettingAction::List => print_json(&settings.list(tenant)?)?,
    }
    Ok(())
}

fn cmd_flags(
    ctx: &Context,
    action: FlagAction,
    tenant: Option<&TenantId>,
    actor: &str,
) -> Result<()> {
    let flags = &ctx.services.flags;
    match action {
        FlagAction::Get { key } => println!("{}", flags.is_enabled(&key, tenant)?),
        FlagAction::Set {
            key,
            enabled,
            description,
        } => {
            let options = FlagOptions {
                tenant_id: tenant.cloned(),
                description,
                updated_by: Some(actor.to_string()),
            };
            print_json(&flags.set_flag(&key, enabled, options)?)?;
        }
        FlagAction::Delete { key } => {
            if flags.delete_flag(&key, tenant, Some(actor))? {
                println!("Deleted `{key}`");
            } else {
                println!("Flag `{key}` not set at this scope");
            }
        }
        FlagAction::List => print_json(&flags.list(tenant)?)?,
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
