mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use uidwatch_types::WatchCommand;

/// uidwatch -- observe and assert on per-uid process state transitions.
#[derive(Parser, Debug)]
#[command(name = "uidwatch", version, about)]
struct Cli {
    /// Watch the output of this program instead of `am watch-uids`
    /// (program followed by its arguments; must come last)
    #[arg(
        long,
        global = true,
        num_args = 1..,
        allow_hyphen_values = true,
        value_name = "PROGRAM"
    )]
    raw: Option<Vec<String>>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Stream state changes reported for a uid
    Watch {
        /// Uid to watch
        #[arg(long)]
        uid: u32,

        /// Capability mask passed to `am watch-uids --mask`
        #[arg(long, default_value_t = 0)]
        mask: u32,

        /// Device serial (overrides config)
        #[arg(long)]
        serial: Option<String>,

        /// Exit after this many lines
        #[arg(long)]
        count: Option<usize>,

        /// Exit after this many milliseconds
        #[arg(long)]
        duration_ms: Option<u64>,
    },

    /// Block until a uid reports a matching state change
    Wait {
        /// Uid to watch
        #[arg(long)]
        uid: u32,

        /// Command word to wait for (procstate, active, idle, uncached,
        /// cached, gone, capability)
        #[arg(long)]
        cmd: WatchCommand,

        /// Procstate label the line must carry
        #[arg(long)]
        state: Option<String>,

        /// Capability value the line must carry
        #[arg(long)]
        capability: Option<u32>,

        /// Fail immediately if a line with this command arrives first
        #[arg(long)]
        fail_cmd: Option<WatchCommand>,

        /// Procstate label for the failure predicate
        #[arg(long, requires = "fail_cmd")]
        fail_state: Option<String>,

        /// Capability mask passed to `am watch-uids --mask`
        #[arg(long, default_value_t = 0)]
        mask: u32,

        /// Device serial (overrides config)
        #[arg(long)]
        serial: Option<String>,

        /// Wait timeout in milliseconds (defaults to the configured timeout)
        #[arg(long)]
        timeout_ms: Option<u64>,
    },

    /// Show the effective configuration and where each value came from
    Config,
}

fn main() -> anyhow::Result<()> {
    // Logs go to stderr so watched lines on stdout stay machine-readable.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let raw = cli.raw.as_deref();

    match cli.command {
        Commands::Watch {
            uid,
            mask,
            serial,
            count,
            duration_ms,
        } => commands::watch::run(&commands::watch::WatchArgs {
            target: commands::Target {
                uid,
                mask,
                serial,
                raw,
            },
            count,
            duration_ms,
        }),
        Commands::Wait {
            uid,
            cmd,
            state,
            capability,
            fail_cmd,
            fail_state,
            mask,
            serial,
            timeout_ms,
        } => commands::wait::run(&commands::wait::WaitArgs {
            target: commands::Target {
                uid,
                mask,
                serial,
                raw,
            },
            cmd,
            state,
            capability,
            fail_cmd,
            fail_state,
            timeout_ms,
        }),
        Commands::Config => commands::config::show(),
    }
}
