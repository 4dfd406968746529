//! Vaults CLI
//!
//! Command-line interface for inspecting and editing vault files.

use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};
use vaults::{Config, OpenOptions, Result, Value, Vault};

/// Vaults CLI
#[derive(Parser, Debug)]
#[command(name = "vaults-cli")]
#[command(about = "Inspect and edit persistent vaults")]
#[command(version)]
struct Args {
    /// Root directory holding the `vaults/` folder
    #[arg(short, long, default_value = ".")]
    root: String,

    /// Fail instead of creating a missing vault
    #[arg(long)]
    no_create: bool,

    /// Vault name
    vault: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Get a value by key
    Get {
        /// The key to get
        key: String,
    },

    /// Set a key-value pair
    Set {
        /// The key to set
        key: String,

        /// The value to set
        value: String,
    },

    /// Delete a key
    Del {
        /// The key to delete
        key: String,
    },

    /// Remove a key and print its value
    Pop {
        /// The key to pop
        key: String,
    },

    /// List every key
    Keys,

    /// List every key-value pair
    Items,

    /// Print the number of entries
    Len,

    /// Remove every entry
    Clear,

    /// Delete the vault and its file
    Drop,
}

fn main() {
    // Initialize tracing/logging
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,vaults=debug"));

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = Config::builder().root_dir(&args.root).build();
    let options = OpenOptions::new().create_if_missing(!args.no_create);

    let vault = match Vault::open_in(&config, &args.vault, options) {
        Ok(v) => v,
        Err(e) => {
            tracing::error!("Failed to open vault '{}': {}", args.vault, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = run(&vault, args.command) {
        tracing::error!("Command failed: {}", e);
        std::process::exit(1);
    }
}

fn run(vault: &Vault, command: Commands) -> Result<()> {
    match command {
        Commands::Get { key } => match vault.get::<_, Value>(key.as_str())? {
            Some(value) => println!("{}", render(&value)),
            None => println!("(nil)"),
        },
        Commands::Set { key, value } => {
            vault.put(key.as_str(), value.as_str())?;
            println!("OK");
        }
        Commands::Del { key } => {
            vault.delete(key.as_str())?;
            println!("OK");
        }
        Commands::Pop { key } => {
            let value: Value = vault.pop(key.as_str())?;
            println!("{}", render(&value));
        }
        Commands::Keys => {
            for key in vault.keys::<Value>()? {
                println!("{}", render(&key));
            }
        }
        Commands::Items => {
            for (key, value) in vault.items::<Value, Value>()? {
                println!("{}\t{}", render(&key), render(&value));
            }
        }
        Commands::Len => println!("{}", vault.len()?),
        Commands::Clear => {
            vault.clear()?;
            println!("OK");
        }
        Commands::Drop => {
            vault.delete_vault()?;
            println!("OK");
        }
    }
    Ok(())
}

/// Text prints bare; everything else uses its display form
fn render(value: &Value) -> String {
    match value {
        Value::Text(s) => s.clone(),
        other => other.to_string(),
    }
}
