use anyhow::anyhow;
use clap::{Parser, Subcommand};
use rasterkit_config::settings::Setting;
use rasterkit_config::storage::JsonStorageAdapter;
use rasterkit_config::{config_store, config_store_write};
use std::path::PathBuf;
use std::str::FromStr;

#[derive(Debug, Parser)]
#[clap(name = "Config-Store", version = "0.1.0", author = "Rasterkit")]
struct Cli {
    #[clap(flatten)]
    global_opts: GlobalOpts,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[clap(arg_required_else_help = true, about = "View a setting")]
    View {
        #[clap(required = true, short = 'k', long = "key")]
        key: String,
    },
    #[clap(about = "List all settings")]
    List,
    #[clap(arg_required_else_help = true, about = "Set a setting")]
    Set {
        #[clap(required = true, short = 'k', long = "key")]
        key: String,
        #[clap(required = true, short = 'v', long = "value")]
        value: String,
    },
    #[clap(arg_required_else_help = true, about = "Search for a setting")]
    Search {
        #[clap(required = true, short = 'k', long = "key")]
        key: String,
    },
}

#[derive(Debug, Parser)]
struct GlobalOpts {
    #[clap(
        short = 'p',
        long = "path",
        global = true,
        default_value = "settings.json"
    )]
    path: PathBuf,
}

fn print_setting(key: &str) {
    if let Some(value) = config_store().get(key) {
        println!("{key:40}: {value}");
    }
}

fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    let storage = JsonStorageAdapter::try_from(args.global_opts.path.as_path())?;
    config_store_write().set_storage(Box::new(storage));

    match args.command {
        Commands::View { key } => {
            let (Some(info), Some(value)) = (config_store().get_info(&key), config_store().get(&key))
            else {
                println!("Key not found");
                return Ok(());
            };

            println!("Key            : {key}");
            println!("Current Value  : {value}");
            println!("Default Value  : {}", info.default);
            println!("Description    : {}", info.description);
        }
        Commands::List => {
            for key in config_store().find("*") {
                print_setting(&key);
            }
        }
        Commands::Set { key, value } => {
            let setting = Setting::from_str(&value).map_err(|err| anyhow!("incorrect value: {err}"))?;
            config_store().set(&key, setting);
        }
        Commands::Search { key } => {
            for key in config_store().find(&key) {
                print_setting(&key);
            }
        }
    }

    Ok(())
}
