//! Clap derive structures for the `devconsole` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use devconsole_core::{LogLevel, Persistence, PubSubSource, StrategyOnFull};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// devconsole -- talk to the debug console backend of an edge device
#[derive(Debug, Parser)]
#[command(
    name = "devconsole",
    version,
    about = "Inspect and drive an edge device's debug console backend",
    long_about = "Connects to the debug console WebSocket on an edge device and exposes\n\
        its components, configuration, logs, pub/sub topics and message\n\
        streams from the command line.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Device profile to use
    #[arg(long, short = 'p', env = "DEVCONSOLE_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Backend host (overrides profile)
    #[arg(long, short = 'H', env = "DEVCONSOLE_HOST", global = true)]
    pub host: Option<String>,

    /// Backend WebSocket port (overrides profile)
    #[arg(long, env = "DEVCONSOLE_PORT", global = true)]
    pub port: Option<u16>,

    /// Connect over wss
    #[arg(long, env = "DEVCONSOLE_SECURE", global = true)]
    pub secure: bool,

    /// Console username (overrides profile)
    #[arg(long, short = 'u', env = "DEVCONSOLE_USERNAME", global = true, hide_env = true)]
    pub username: Option<String>,

    /// Prompt for the console password
    #[arg(long, global = true)]
    pub ask_password: bool,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "DEVCONSOLE_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "DEVCONSOLE_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON, one document per line when streaming
    JsonCompact,
    /// YAML
    Yaml,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

/// Which broker a topic lives on.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Broker {
    /// The on-device IPC broker
    Local,
    /// The cloud MQTT connection
    Iotcore,
}

impl From<Broker> for PubSubSource {
    fn from(broker: Broker) -> Self {
        match broker {
            Broker::Local => Self::Local,
            Broker::Iotcore => Self::IotCore,
        }
    }
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Check that the backend answers
    Ping(PingArgs),

    /// Show device details
    #[command(alias = "dev")]
    Device,

    /// Inspect and control components
    #[command(alias = "c")]
    Components(ComponentsArgs),

    /// Read and replace component configuration
    Config(ConfigArgs),

    /// Stream pushes until interrupted
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Subscribe and publish to pub/sub topics
    Pubsub(PubsubArgs),

    /// Manage stream manager message streams
    #[command(alias = "s")]
    Streams(StreamsArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Ping ─────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct PingArgs {
    /// Text sent along with the ping
    #[arg(default_value = "ping")]
    pub message: String,
}

// ── Components ───────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ComponentsArgs {
    #[command(subcommand)]
    pub command: ComponentsCommand,
}

#[derive(Debug, Subcommand)]
pub enum ComponentsCommand {
    /// List all components
    #[command(alias = "ls")]
    List,

    /// Show one component
    Get {
        /// Component name
        name: String,
    },

    /// Ask the lifecycle to start a component
    Start {
        /// Component name
        name: String,
    },

    /// Ask the lifecycle to stop a component
    Stop {
        /// Component name
        name: String,
    },

    /// Reinstall a component
    Reinstall {
        /// Component name
        name: String,
    },
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print a component's configuration as YAML
    Get {
        /// Component name
        name: String,
    },

    /// Replace a component's configuration
    Update {
        /// Component name
        name: String,

        /// YAML file with the new configuration ("-" reads stdin)
        #[arg(long, short = 'f')]
        file: PathBuf,
    },
}

// ── Watch ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct WatchArgs {
    #[command(subcommand)]
    pub command: WatchCommand,
}

#[derive(Debug, Subcommand)]
pub enum WatchCommand {
    /// The component table, reprinted on every change
    Components,

    /// The dependency graph, reprinted on every change
    Graph,

    /// Status changes of one component
    Component {
        /// Component name
        name: String,
    },

    /// Log lines of one component
    Logs {
        /// Component name
        name: String,

        /// Hide lines below this level
        #[arg(long, short = 'l', default_value = "all")]
        level: LevelFilter,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LevelFilter {
    All,
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LevelFilter> for LogLevel {
    fn from(level: LevelFilter) -> Self {
        match level {
            LevelFilter::All => Self::All,
            LevelFilter::Trace => Self::Trace,
            LevelFilter::Debug => Self::Debug,
            LevelFilter::Info => Self::Info,
            LevelFilter::Warn => Self::Warn,
            LevelFilter::Error => Self::Error,
        }
    }
}

// ── Pub/sub ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct PubsubArgs {
    #[command(subcommand)]
    pub command: PubsubCommand,
}

#[derive(Debug, Subcommand)]
pub enum PubsubCommand {
    /// Print messages matching a topic filter until interrupted
    #[command(alias = "sub")]
    Subscribe {
        /// Topic filter, wildcards allowed
        topic: String,

        /// Broker to subscribe on
        #[arg(long, short = 's', default_value = "local")]
        source: Broker,
    },

    /// Publish one message
    #[command(alias = "pub")]
    Publish {
        /// Destination topic
        topic: String,

        /// Message payload
        payload: String,

        /// Broker to publish to
        #[arg(long, short = 'd', default_value = "local")]
        destination: Broker,
    },
}

// ── Streams ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct StreamsArgs {
    #[command(subcommand)]
    pub command: StreamsCommand,
}

#[derive(Debug, Subcommand)]
pub enum StreamsCommand {
    /// List stream names
    #[command(alias = "ls")]
    List,

    /// Show a stream's definition and storage status
    Describe {
        /// Stream name
        name: String,
    },

    /// Delete a stream
    Delete {
        /// Stream name
        name: String,
    },

    /// Read messages from a stream
    Read {
        /// Stream name
        name: String,

        /// First sequence number to read
        #[arg(long, default_value = "0")]
        start: i64,

        /// Minimum number of messages to wait for
        #[arg(long, default_value = "1")]
        min: i64,

        /// Maximum number of messages to return
        #[arg(long, default_value = "100")]
        max: i64,

        /// How long the backend may wait for `--min` messages, in milliseconds
        #[arg(long, default_value = "0")]
        read_timeout: i64,
    },

    /// Append one message to a stream
    Append {
        /// Stream name
        name: String,

        /// Message payload
        payload: String,
    },

    /// Create a stream
    Create(StreamDefinitionArgs),

    /// Update an existing stream's definition
    Update(StreamDefinitionArgs),
}

#[derive(Debug, Args)]
pub struct StreamDefinitionArgs {
    /// Stream name
    pub name: String,

    /// Maximum stream size in bytes
    #[arg(long)]
    pub max_size: Option<i64>,

    /// Segment size in bytes
    #[arg(long)]
    pub segment_size: Option<i64>,

    /// Time to live of each message, in milliseconds
    #[arg(long)]
    pub ttl: Option<i64>,

    /// What to do once the stream is full
    #[arg(long, default_value = "overwrite-oldest")]
    pub strategy: StrategyArg,

    /// Where messages are kept
    #[arg(long, default_value = "file")]
    pub persistence: PersistenceArg,

    /// Flush to disk on every append
    #[arg(long)]
    pub flush_on_write: Option<bool>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StrategyArg {
    RejectNew,
    OverwriteOldest,
}

impl From<StrategyArg> for StrategyOnFull {
    fn from(strategy: StrategyArg) -> Self {
        match strategy {
            StrategyArg::RejectNew => Self::RejectNewData,
            StrategyArg::OverwriteOldest => Self::OverwriteOldestData,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PersistenceArg {
    File,
    Memory,
}

impl From<PersistenceArg> for Persistence {
    fn from(persistence: PersistenceArg) -> Self {
        match persistence {
            PersistenceArg::File => Self::File,
            PersistenceArg::Memory => Self::Memory,
        }
    }
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
