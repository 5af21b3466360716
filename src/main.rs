use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use docscout::{
    chat::{self, SearchScope},
    cli::{Cli, Command, ConfigAction, KeyAction, McpArgs, OpenArgs, SearchArgs},
    config::{self, Config, ConfigDir},
    error::{self, Error},
    mcp,
    search::{self, SearchOptions},
};

fn init_tracing(verbose: u8) {
    let filter = if let Ok(env) = std::env::var("DOCSCOUT_LOG") {
        EnvFilter::new(env)
    } else {
        match verbose {
            0 => EnvFilter::new("info"),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> error::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config_dir = ConfigDir::resolve(cli.config_dir.as_deref())?;
    let config = Config::load(&config_dir)?;

    match cli.command {
        Command::Search(args) => cmd_search(&config, &args)?,
        Command::Chat(args) => {
            let root = config.resolve_root(args.root.clone())?;
            let api_key = config::load_api_key(&config_dir)?.ok_or_else(|| {
                Error::Config(format!(
                    "no API key; run `docscout key set` or export {}",
                    config::API_KEY_ENV
                ))
            })?;
            let model = args
                .model
                .or_else(|| config.model.clone())
                .unwrap_or_else(|| chat::DEFAULT_MODEL.to_string());
            let scope = SearchScope {
                root_dir: root,
                exclusions: config.exclusions.clone(),
            };
            chat::run_chat(api_key, model, scope)?;
        }
        Command::Mcp(args) => cmd_mcp(&config, args)?,
        Command::Open(args) => cmd_open(&config, &args)?,
        Command::Key { action } => cmd_key(&config_dir, action)?,
        Command::Config { action } => cmd_config(&config_dir, config, action)?,
        Command::Completions(args) => args.generate(),
    }

    Ok(())
}

fn cmd_search(config: &Config, args: &SearchArgs) -> error::Result<()> {
    let root = config.resolve_root(args.root.clone())?;

    let mut options = SearchOptions::new(args.query.clone(), root);
    options.exclusions = config.exclusions.clone();
    options.exclusions.extend(args.exclusions.iter().cloned());
    if !args.extensions.is_empty() {
        options.target_extensions = args.extensions.clone();
    }
    options.sub_directory = args.sub_dir.clone();

    let results = search::search(&options)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else if args.files {
        for r in &results {
            println!("{}", r.absolute_path.display());
        }
    } else if results.is_empty() {
        println!("No results found.");
    } else {
        for r in &results {
            println!("{}", r.relative_path.display());
            println!("    {}", r.snippet);
        }
        println!("\n{} result(s)", results.len());
    }

    Ok(())
}

fn cmd_mcp(config: &Config, args: McpArgs) -> error::Result<()> {
    let root = config.resolve_root(args.root)?;
    let mut exclusions = config.exclusions.clone();
    exclusions.extend(args.exclusions);

    mcp::run_mcp(SearchScope {
        root_dir: root,
        exclusions,
    })
}

fn cmd_open(config: &Config, args: &OpenArgs) -> error::Result<()> {
    let root = config.resolve_root(args.root.clone())?;
    let absolute = if args.path.is_absolute() {
        args.path.clone()
    } else {
        root.join(&args.path)
    };

    if !absolute.exists() {
        return Err(Error::NotFound {
            kind: "file",
            name: absolute.display().to_string(),
        });
    }

    open::that(&absolute)?;
    println!("Opened {}", absolute.display());
    Ok(())
}

fn cmd_key(config_dir: &ConfigDir, action: KeyAction) -> error::Result<()> {
    match action {
        KeyAction::Set { key } => {
            config::store_api_key(config_dir, &key)?;
            println!("API key stored in {}", config_dir.root().display());
        }
        KeyAction::Show => match config::load_api_key(config_dir)? {
            Some(_) => println!("An API key is configured."),
            None => println!("No API key is configured."),
        },
        KeyAction::Clear => {
            if config::clear_api_key(config_dir)? {
                println!("API key removed.");
            } else {
                println!("No API key was stored.");
            }
        }
    }
    Ok(())
}

fn cmd_config(
    config_dir: &ConfigDir,
    mut config: Config,
    action: ConfigAction,
) -> error::Result<()> {
    match action {
        ConfigAction::Show => {
            println!("Config directory: {}", config_dir.root().display());
            match &config.root_dir {
                Some(root) => println!("Root directory: {}", root.display()),
                None => println!("Root directory: (unset)"),
            }
            if config.exclusions.is_empty() {
                println!("Exclusions: (none)");
            } else {
                println!("Exclusions:");
                for ex in &config.exclusions {
                    println!("  {}", ex.display());
                }
            }
            println!(
                "Model: {}",
                config.model.as_deref().unwrap_or(chat::DEFAULT_MODEL)
            );
        }
        ConfigAction::SetRoot { path } => {
            let path = validated_dir(path)?;
            config.root_dir = Some(path.clone());
            config.save(config_dir)?;
            println!("Root directory set to {}", path.display());
        }
        ConfigAction::AddExclusion { path } => {
            if !config.exclusions.contains(&path) {
                config.exclusions.push(path.clone());
            }
            config.save(config_dir)?;
            println!("Excluding {}", path.display());
        }
    }
    Ok(())
}

fn validated_dir(path: PathBuf) -> error::Result<PathBuf> {
    if !path.is_dir() {
        return Err(Error::Config(format!(
            "not a directory: {}",
            path.display()
        )));
    }
    path.canonicalize().map_err(|e| {
        Error::Config(format!("cannot resolve path {}: {e}", path.display()))
    })
}
