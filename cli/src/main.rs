//! Beacon CLI - keys, directory administration and publishing
//!
//! Usage:
//!   beacon keygen --mail alice@example.com --out alice.key
//!   beacon directory --store beacon-keys add --mail alice@example.com --out alice.key
//!   beacon push --key alice.key new --name inbox
//!   beacon push --key alice.key notify --name inbox --message "hello"
//!   beacon push ping --center alice@example.com____inbox

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

mod account;
mod commands;
mod ui;

use account::KeyFile;
use commands::{DirectoryAdmin, NewIdentity, PushClient, PushResponse};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log requests and responses
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a keypair and save it as a key file
    Keygen {
        /// Mail address the key belongs to
        #[arg(short, long)]
        mail: String,

        /// Key file to create
        #[arg(short, long)]
        out: PathBuf,
    },

    /// Print the Authorization header for a request body
    Sign {
        /// Key file
        #[arg(short, long)]
        key: PathBuf,

        /// Exact request body
        #[arg(short, long)]
        body: String,
    },

    /// Manage the key directory (the server must not be running)
    Directory {
        /// Key directory path
        #[arg(short, long, default_value = "beacon-keys")]
        store: PathBuf,

        #[command(subcommand)]
        action: DirectoryAction,
    },

    /// Talk to a running relay
    Push {
        /// Relay address
        #[arg(short, long, default_value = "http://localhost:8080")]
        server: String,

        /// Key file, required for signed actions
        #[arg(short, long)]
        key: Option<PathBuf>,

        #[command(subcommand)]
        action: PushAction,
    },
}

#[derive(Subcommand, Debug)]
enum DirectoryAction {
    /// Register an identity
    Add {
        #[arg(short, long)]
        mail: String,

        /// Hex public key; a new keypair is minted when omitted
        #[arg(short, long)]
        public_key: Option<String>,

        /// Where to save a minted private key (default: <mail>.key)
        #[arg(short, long)]
        out: Option<PathBuf>,

        #[arg(long)]
        admin: bool,
    },
    /// Remove an identity
    Remove {
        #[arg(short, long)]
        mail: String,
    },
    /// List registered identities
    List,
}

#[derive(Subcommand, Debug)]
enum PushAction {
    /// Create a notification center
    New {
        #[arg(short, long)]
        name: String,
    },
    /// Publish a message
    Notify {
        #[arg(short, long)]
        name: String,

        #[arg(short, long)]
        message: String,
    },
    /// Remove a notification center
    Remove {
        #[arg(short, long)]
        name: String,
    },
    /// Check a signature against the relay
    Test {
        #[arg(short, long)]
        message: String,
    },
    /// Fetch the last message of a center
    Ping {
        /// Full center id (mail____name)
        #[arg(short, long)]
        center: String,
    },
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let level = if args.verbose { tracing::Level::DEBUG } else { tracing::Level::WARN };
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    if let Err(e) = run(args.command).await {
        ui::print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}

async fn run(command: Command) -> Result<()> {
    match command {
        Command::Keygen { mail, out } => commands::keygen(&mail, &out),
        Command::Sign { key, body } => commands::sign(&key, &body),
        Command::Directory { store, action } => {
            let admin = DirectoryAdmin::open(&store)?;
            match action {
                DirectoryAction::Add {
                    mail,
                    public_key,
                    out,
                    admin: is_admin,
                } => {
                    let source = match public_key {
                        Some(hex) => NewIdentity::PublicKey(hex),
                        None => NewIdentity::Mint {
                            out: out.unwrap_or_else(|| PathBuf::from(format!("{}.key", mail))),
                        },
                    };
                    admin.add(&mail, is_admin, source)
                }
                DirectoryAction::Remove { mail } => admin.remove(&mail),
                DirectoryAction::List => admin.list(),
            }
        }
        Command::Push { server, key, action } => {
            println!("{}", beacon_core::version_string().bright_cyan().bold());
            let client = PushClient::new(&server);
            let load_key = || -> Result<KeyFile> {
                let path = key.as_ref().context("--key is required for this action")?;
                KeyFile::load(path)
            };

            let response = match action {
                PushAction::New { name } => client.new_center(&load_key()?, &name).await?,
                PushAction::Notify { name, message } => client.notify(&load_key()?, &name, &message).await?,
                PushAction::Remove { name } => client.remove_center(&load_key()?, &name).await?,
                PushAction::Test { message } => client.test(&load_key()?, &message).await?,
                PushAction::Ping { center } => client.ping(&center).await?,
            };
            report(&response);
            Ok(())
        }
    }
}

fn report(response: &PushResponse) {
    ui::print_response(response.status, &response.body);
}
