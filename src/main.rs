use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use gh_scope_mcp::{
    middleware::enforce::check_scope,
    roots::{parse_root_uri, resolve_roots, DeclaredRoot},
    GatewayConfig, ScopedServerBuilder,
};
use serde::Serialize;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "gh-scope-gateway")]
#[command(about = "Inspect the tool inventory and root scoping of the MCP gateway")]
#[command(version)]
struct Cli {
    /// Gateway configuration file (YAML)
    #[arg(short, long, env = "GH_SCOPE_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, env = "GH_SCOPE_LOG_JSON", global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve the configured inventory and print it
    Inventory {
        #[command(flatten)]
        overrides: Overrides,

        /// Print full tool definitions instead of a summary
        #[arg(long)]
        definitions: bool,
    },
    /// Parse a root URI into owner/repo
    ParseRoot {
        uri: String,

        /// Expected host (defaults to the configured host)
        #[arg(long)]
        host: Option<String>,
    },
    /// Check whether a call target is inside a set of roots
    CheckScope {
        /// Root URI; repeat for several roots
        #[arg(long = "root", required = true)]
        roots: Vec<String>,

        #[arg(long)]
        owner: String,

        #[arg(long)]
        repo: Option<String>,
    },
}

/// Command-line overrides of the configuration file.
#[derive(Args)]
struct Overrides {
    /// Comma-separated toolsets ("all", "default", or names)
    #[arg(long, env = "GH_SCOPE_TOOLSETS", value_delimiter = ',')]
    toolsets: Option<Vec<String>>,

    /// Comma-separated tools enabled in addition to the toolsets
    #[arg(long, env = "GH_SCOPE_TOOLS", value_delimiter = ',')]
    tools: Vec<String>,

    /// Comma-separated tools that are never exposed
    #[arg(long, env = "GH_SCOPE_EXCLUDE_TOOLS", value_delimiter = ',')]
    exclude_tools: Vec<String>,

    /// Comma-separated feature flags to turn on
    #[arg(long, env = "GH_SCOPE_FEATURES", value_delimiter = ',')]
    features: Vec<String>,

    #[arg(long, env = "GH_SCOPE_READ_ONLY")]
    read_only: bool,

    #[arg(long, env = "GH_SCOPE_DYNAMIC_TOOLSETS")]
    dynamic_toolsets: bool,

    #[arg(long, env = "GH_SCOPE_INSIDERS")]
    insiders: bool,

    #[arg(long, env = "GH_SCOPE_ROOTS_MODE")]
    roots_mode: bool,
}

impl Overrides {
    fn apply(self, config: &mut GatewayConfig) {
        if self.toolsets.is_some() {
            config.toolsets = self.toolsets;
        }
        config.tools.extend(self.tools);
        config.exclude_tools.extend(self.exclude_tools);
        config.features.extend(self.features);
        config.read_only |= self.read_only;
        config.dynamic_toolsets |= self.dynamic_toolsets;
        config.insiders |= self.insiders;
        config.roots_mode |= self.roots_mode;
    }
}

#[derive(Serialize)]
struct ParsedRoot {
    owner: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    repo: Option<String>,
}

fn init_logging(level: &str, json: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let registry = tracing_subscriber::registry().with(env_filter);
    let result = if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };
    if let Err(e) = result {
        eprintln!("failed to initialize logging: {e}");
    }
}

async fn load_config(path: Option<&PathBuf>) -> anyhow::Result<GatewayConfig> {
    match path {
        Some(path) => GatewayConfig::from_file(path)
            .await
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(GatewayConfig::default()),
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let mut config = load_config(cli.config.as_ref()).await?;
    init_logging(&config.log.level, cli.log_json || config.log.json);
    debug!(host = %config.host, "Configuration loaded");

    match cli.command {
        Command::Inventory {
            overrides,
            definitions,
        } => {
            overrides.apply(&mut config);
            config.validate()?;
            let server = ScopedServerBuilder::from_config(&config).build()?;
            let inventory = server.inventory();
            info!(
                tools = inventory.len(),
                toolsets = ?inventory.enabled_toolsets(),
                "Inventory resolved"
            );
            if definitions {
                print_json(&server.list_tool_definitions())?;
            } else {
                print_json(&inventory.summary())?;
            }
        }
        Command::ParseRoot { uri, host } => {
            let host = host.unwrap_or(config.host);
            let (owner, repo) = parse_root_uri(&uri, &host)?;
            print_json(&ParsedRoot {
                owner,
                repo: (!repo.is_empty()).then_some(repo),
            })?;
        }
        Command::CheckScope { roots, owner, repo } => {
            let declared: Vec<DeclaredRoot> = roots.into_iter().map(DeclaredRoot::new).collect();
            let resolved = resolve_roots(&declared, &config.host);
            match check_scope(&resolved, &owner, repo.as_deref()) {
                Ok(()) => println!("allowed"),
                Err(violation) => {
                    println!("denied: {}", violation.message());
                    std::process::exit(2);
                }
            }
        }
    }
    Ok(())
}
