use crate::commands::{self, CommandContext};
use anyhow::{Context, Result};
use berth_core::config::{ConfigHolder, ConfigLoader, ExtensionConfig};
use berth_core::gateway::{CliGateway, Executor};
use berth_core::model::ResourceKind;
use berth_core::service::ResourceService;
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;

/// Output format options
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    /// Aligned text table
    Text,
    /// JSON document
    Json,
}

/// Log format options
#[derive(Debug, Clone, ValueEnum)]
pub enum LogFormat {
    /// Human-readable text format
    Text,
    /// JSON structured format
    Json,
}

/// Log level options
#[derive(Debug, Clone, ValueEnum)]
pub enum LogLevel {
    /// Error messages only
    Error,
    /// Warning and error messages
    Warn,
    /// Informational messages and above
    Info,
    /// Debug messages and above
    Debug,
    /// All messages including trace
    Trace,
}

impl LogLevel {
    fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

/// Where settings come from, kept around so `watch` can reload on SIGHUP
#[derive(Debug, Clone, Default)]
pub struct ConfigSource {
    pub path: Option<PathBuf>,
    pub binary: Option<String>,
    pub poll_interval_ms: Option<u64>,
    pub timeout_ms: Option<u64>,
}

impl ConfigSource {
    /// Defaults, settings file and environment, then flags on top
    pub fn load(&self) -> Result<ExtensionConfig> {
        let mut config = ConfigLoader::load(self.path.as_deref()).with_context(|| match &self.path {
            Some(path) => format!("Failed to load settings from {}", path.display()),
            None => "Failed to load settings".to_string(),
        })?;
        if let Some(binary) = &self.binary {
            config.binary_path = binary.clone();
        }
        if let Some(poll_interval_ms) = self.poll_interval_ms {
            config.poll_interval_ms = poll_interval_ms;
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.command_timeout_ms = timeout_ms;
        }
        config.validate()?;
        Ok(config)
    }
}

/// Manage containers, images, volumes and networks through a container CLI
#[derive(Debug, Parser)]
#[command(name = "berth", version)]
pub struct Cli {
    /// Log format (text or json, defaults to text, can be set via BERTH_LOG_FORMAT env var)
    #[arg(long, global = true, value_enum)]
    pub log_format: Option<LogFormat>,

    /// Log level
    #[arg(long, global = true, value_enum, default_value = "warn")]
    pub log_level: LogLevel,

    /// Settings file path (defaults to the platform config directory)
    #[arg(long, global = true, value_name = "PATH", env = "BERTH_CONFIG")]
    pub config: Option<PathBuf>,

    /// Container CLI binary to drive (name on PATH or absolute path)
    #[arg(long, global = true, value_name = "PATH")]
    pub binary: Option<String>,

    /// Auto-refresh period in milliseconds for `watch` (0 disables polling)
    #[arg(long, global = true, value_name = "MS")]
    pub poll_interval: Option<u64>,

    /// Bound for a single CLI invocation in milliseconds
    #[arg(long, global = true, value_name = "MS")]
    pub timeout: Option<u64>,

    /// Output format for command results
    #[arg(long, short = 'o', global = true, value_enum, default_value = "text")]
    pub output: OutputFormat,

    /// Do not ask for confirmation before removing or pruning
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Manage containers
    #[command(subcommand)]
    Container(ContainerCommand),

    /// Manage images
    #[command(subcommand)]
    Image(ImageCommand),

    /// Manage volumes
    #[command(subcommand)]
    Volume(VolumeCommand),

    /// Manage networks
    #[command(subcommand)]
    Network(NetworkCommand),

    /// Engine-wide information
    #[command(subcommand)]
    System(SystemCommand),

    /// Check that the container CLI is available
    Doctor,

    /// Keep a resource list on screen, refreshed at the poll interval.
    ///
    /// On unix, SIGHUP reloads the settings file; a changed poll interval
    /// restarts the refresh timer. Ctrl-C exits.
    Watch {
        /// Resource kind: container, image, volume or network
        kind: ResourceKind,
    },
}

#[derive(Debug, Subcommand)]
pub enum ContainerCommand {
    /// List containers
    #[command(alias = "list")]
    Ls {
        /// Include stopped containers regardless of settings
        #[arg(long, short = 'a', conflicts_with = "running")]
        all: bool,
        /// Only running containers regardless of settings
        #[arg(long)]
        running: bool,
    },
    /// Print the engine's inspect document
    Inspect { id: String },
    /// Start a stopped container
    Start { id: String },
    /// Stop a running container
    Stop {
        id: String,
        /// Seconds to wait before killing
        #[arg(long, short = 't')]
        time: Option<u32>,
    },
    /// Send a signal to a container
    Kill {
        id: String,
        #[arg(long, short = 's')]
        signal: Option<String>,
    },
    /// Stop then start a container
    Restart {
        id: String,
        #[arg(long, short = 't')]
        time: Option<u32>,
    },
    /// Remove a container
    #[command(alias = "remove")]
    Rm {
        id: String,
        #[arg(long, short = 'f')]
        force: bool,
        /// Also remove anonymous volumes
        #[arg(long, short = 'v')]
        volumes: bool,
    },
    /// Create and start a container in the background
    Run(RunArgs),
    /// Print container logs
    Logs {
        id: String,
        /// Stream until interrupted
        #[arg(long, short = 'f')]
        follow: bool,
        /// Number of lines from the end
        #[arg(long)]
        tail: Option<u32>,
        #[arg(long)]
        timestamps: bool,
    },
    /// Run a non-interactive command in a running container
    Exec {
        id: String,
        #[arg(long, short = 'u')]
        user: Option<String>,
        #[arg(long, short = 'w')]
        workdir: Option<String>,
        /// Environment variable (KEY=VALUE, repeatable)
        #[arg(long, short = 'e')]
        env: Vec<String>,
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
}

#[derive(Debug, Args)]
pub struct RunArgs {
    pub image: String,
    #[arg(long)]
    pub name: Option<String>,
    /// Remove the container when it exits
    #[arg(long)]
    pub rm: bool,
    /// Environment variable (KEY=VALUE, repeatable)
    #[arg(long, short = 'e')]
    pub env: Vec<String>,
    /// Label (KEY=VALUE, repeatable)
    #[arg(long, short = 'l')]
    pub label: Vec<String>,
    /// Published port ([IP:]HOST:CONTAINER[/udp], repeatable)
    #[arg(long, short = 'p')]
    pub publish: Vec<String>,
    /// Bind or volume (SOURCE:TARGET[:ro], repeatable)
    #[arg(long, short = 'v')]
    pub volume: Vec<String>,
    #[arg(long)]
    pub network: Option<String>,
    #[arg(long, short = 'w')]
    pub workdir: Option<String>,
    #[arg(long)]
    pub entrypoint: Option<String>,
    /// Command and arguments passed to the container
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

#[derive(Debug, Subcommand)]
pub enum ImageCommand {
    /// List images
    #[command(alias = "list")]
    Ls,
    /// Print the engine's inspect document
    Inspect { reference: String },
    /// Pull an image from a registry
    Pull {
        reference: String,
        #[arg(long)]
        platform: Option<String>,
    },
    /// Build an image from a context directory
    Build {
        context: String,
        #[arg(long, short = 't')]
        tag: Option<String>,
        /// Dockerfile path
        #[arg(long, short = 'f')]
        file: Option<String>,
        /// Build argument (KEY=VALUE, repeatable)
        #[arg(long)]
        build_arg: Vec<String>,
        /// Label (KEY=VALUE, repeatable)
        #[arg(long)]
        label: Vec<String>,
        #[arg(long)]
        target: Option<String>,
        #[arg(long)]
        no_cache: bool,
    },
    /// Remove an image
    #[command(alias = "remove")]
    Rm {
        reference: String,
        #[arg(long, short = 'f')]
        force: bool,
    },
    /// Remove unused images
    Prune {
        /// Remove all unused images, not only dangling ones
        #[arg(long, short = 'a')]
        all: bool,
    },
}

#[derive(Debug, Subcommand)]
pub enum VolumeCommand {
    /// List volumes
    #[command(alias = "list")]
    Ls,
    /// Create a volume
    Create {
        name: String,
        #[arg(long, short = 'd')]
        driver: Option<String>,
        /// Driver option (KEY=VALUE, repeatable)
        #[arg(long)]
        opt: Vec<String>,
        /// Label (KEY=VALUE, repeatable)
        #[arg(long)]
        label: Vec<String>,
    },
    /// Print the engine's inspect document
    Inspect { name: String },
    /// Remove a volume
    #[command(alias = "remove")]
    Rm {
        name: String,
        #[arg(long, short = 'f')]
        force: bool,
    },
    /// Remove unused volumes
    Prune,
}

#[derive(Debug, Subcommand)]
pub enum NetworkCommand {
    /// List networks
    #[command(alias = "list")]
    Ls,
    /// Create a network
    Create {
        name: String,
        #[arg(long, short = 'd')]
        driver: Option<String>,
        #[arg(long)]
        subnet: Option<String>,
        #[arg(long)]
        gateway: Option<String>,
        /// Restrict external access to the network
        #[arg(long)]
        internal: bool,
        /// Label (KEY=VALUE, repeatable)
        #[arg(long)]
        label: Vec<String>,
    },
    /// Print the engine's inspect document
    Inspect { name: String },
    /// Remove a network
    #[command(alias = "remove")]
    Rm { name: String },
}

#[derive(Debug, Subcommand)]
pub enum SystemCommand {
    /// Engine information as reported by the CLI
    Info,
}

impl Cli {
    fn config_source(&self) -> ConfigSource {
        ConfigSource {
            path: self.config.clone(),
            binary: self.binary.clone(),
            poll_interval_ms: self.poll_interval,
            timeout_ms: self.timeout,
        }
    }

    pub async fn dispatch(self) -> Result<()> {
        let log_format = match self.log_format {
            Some(LogFormat::Text) => Some("text"),
            Some(LogFormat::Json) => Some("json"),
            None => None,
        };
        let log_level = self.log_level.as_str();

        if std::env::var_os("BERTH_LOG").is_none() && std::env::var_os("RUST_LOG").is_none() {
            std::env::set_var(
                "RUST_LOG",
                format!("berth={},berth_core={}", log_level, log_level),
            );
        }
        berth_core::logging::init(log_format)?;
        tracing::debug!("CLI initialized with log level: {}", log_level);

        let source = self.config_source();
        let holder = ConfigHolder::new(source.load()?);
        let executor: Arc<dyn Executor> = Arc::new(CliGateway::new(holder.clone()));
        let ctx = CommandContext {
            output: self.output,
            assume_yes: self.yes,
            service: ResourceService::new(executor, holder),
        };

        match self.command {
            Commands::Container(command) => commands::container::run(&ctx, command).await,
            Commands::Image(command) => commands::image::run(&ctx, command).await,
            Commands::Volume(command) => commands::volume::run(&ctx, command).await,
            Commands::Network(command) => commands::network::run(&ctx, command).await,
            Commands::System(SystemCommand::Info) => commands::system::info(&ctx).await,
            Commands::Doctor => commands::doctor::run(&ctx, &source).await,
            Commands::Watch { kind } => commands::watch::run(&ctx, kind, &source).await,
        }
    }
}
