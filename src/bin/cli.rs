//! ioservice CLI Client
//!
//! Command-line interface for calling an ioservice server.

use clap::{Parser, Subcommand};
use ioservice::{Client, Config, Result};
use tracing_subscriber::{fmt, EnvFilter};

/// ioservice CLI
#[derive(Parser, Debug)]
#[command(name = "ioservice-cli")]
#[command(about = "CLI for an ioservice server")]
struct Args {
    /// Server address
    #[arg(short, long, default_value = "127.0.0.1:7878")]
    server: String,

    /// Lag sent with START
    #[arg(short, long, default_value = "0")]
    lag: u32,

    /// Read timeout in milliseconds (0 = none)
    #[arg(long, default_value = "5000")]
    timeout_ms: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Repeat content a number of times
    Echo {
        /// How many times to repeat
        times: u32,

        /// The content to repeat
        content: String,
    },

    /// Reverse content
    Reverse {
        content: String,
    },

    /// Count the characters in content
    Count {
        content: String,
    },

    /// Upper-case content
    Upper {
        content: String,
    },

    /// Lower-case content
    Lower {
        content: String,
    },
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let args = Args::parse();

    match run(args) {
        Ok(output) => println!("{}", output),
        Err(e) => {
            eprintln!("error: {}", e);
            std::process::exit(1);
        }
    }
}

/// Open a session, issue one command, close the session
fn run(args: Args) -> Result<String> {
    let config = Config::builder().read_timeout_ms(args.timeout_ms).build();
    let mut client = Client::with_config(&args.server, config);

    client.connect()?;
    client.start(args.lag)?;

    let output = match &args.command {
        Commands::Echo { times, content } => client.echo(*times, content)?,
        Commands::Reverse { content } => client.reverse(content)?,
        Commands::Count { content } => client.count(content)?.to_string(),
        Commands::Upper { content } => client.upper_cast(content)?,
        Commands::Lower { content } => client.lower_cast(content)?,
    };

    client.stop()?;
    Ok(output)
}
