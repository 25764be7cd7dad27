//! `hawanav` - CLI for hawa-nav
//!
//! Resolves fragments, applies the access policy against the stored session
//! and replays multi-tab navigation scripts.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::io::Read;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;

use hawa_nav::cli::{
    Cli, Command, ConfigCommand, LoginArgs, MenuCommand, NavigateCommand, ReplayCommand,
    RoutesCommand, SessionCommand,
};
use hawa_nav::location::{strip_hash, HashLocation, Location};
use hawa_nav::session::{SessionOracle, StoredSession, UserProfile};
use hawa_nav::{init_logging, menu_for, Config, NavigationController, Replay, Storage, TabId};

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    let config = Config::load_from(cli.config.clone()).context("loading configuration")?;

    match cli.command {
        Command::Routes(cmd) => handle_routes(&config, &cmd),
        Command::Resolve(cmd) => {
            println!("{}", config.policy().resolve(strip_hash(&cmd.fragment)));
            Ok(())
        }
        Command::Navigate(cmd) => handle_navigate(&config, &cmd),
        Command::Session(cmd) => handle_session(&config, &cmd),
        Command::Menu(cmd) => handle_menu(&config, &cmd),
        Command::Replay(cmd) => handle_replay(&config, &cmd),
        Command::Config(cmd) => handle_config(&config, &cmd),
    }
}

fn open_session(config: &Config) -> Result<StoredSession> {
    let path = config.storage_path();
    let storage = Storage::open(&path)
        .with_context(|| format!("opening session storage at {}", path.display()))?;
    Ok(StoredSession::new(
        Arc::new(storage),
        TabId::new(),
        config.session_keys(),
    ))
}

fn handle_routes(config: &Config, cmd: &RoutesCommand) -> Result<()> {
    let policy = config.policy();

    if cmd.json {
        let routes: Vec<_> = policy
            .table()
            .map(|(route, level)| {
                serde_json::json!({
                    "route": route,
                    "fragment": route.fragment(),
                    "level": level,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&routes)?);
    } else {
        println!("Route set: {}", policy.route_set());
        println!();
        for (route, level) in policy.table() {
            println!("  {:<18} {level}", route.fragment());
        }
    }
    Ok(())
}

fn handle_navigate(config: &Config, cmd: &NavigateCommand) -> Result<()> {
    let session = Arc::new(open_session(config)?);
    let location = Arc::new(HashLocation::new(&cmd.fragment));
    let mut controller = NavigationController::new(
        config.policy(),
        Arc::clone(&location) as Arc<dyn Location>,
        Arc::clone(&session) as Arc<dyn SessionOracle>,
    )
    .with_auth_token_key(config.session.auth_token_key.clone());

    let state = controller.start();

    if cmd.json {
        let output = serde_json::json!({
            "requested": strip_hash(&cmd.fragment),
            "page": state.current_page,
            "epoch": state.epoch,
            "fragment": location.href(),
            "view_key": state.view_key(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
    } else {
        println!("Page:      {}", state.current_page);
        println!("Fragment:  {}", location.href());
        println!("Epoch:     {}", state.epoch);
        println!("View key:  {}", state.view_key());
    }
    Ok(())
}

fn handle_session(config: &Config, cmd: &SessionCommand) -> Result<()> {
    let session = open_session(config)?;

    match cmd {
        SessionCommand::Show { json } => {
            let snapshot = session.snapshot();
            let user = session.current_user();
            if *json {
                let output = serde_json::json!({
                    "authenticated": snapshot.authenticated,
                    "is_admin": snapshot.is_admin,
                    "home": snapshot.home_route(),
                    "user": user,
                    "storage_path": session.storage().path(),
                });
                println!("{}", serde_json::to_string_pretty(&output)?);
            } else {
                println!("Storage:        {}", session.storage().path().display());
                println!("Authenticated:  {}", snapshot.authenticated);
                println!("Administrator:  {}", snapshot.is_admin);
                if let Some(user) = user {
                    println!("User:           {}", user.email);
                    if let Some(role) = &user.role {
                        println!("Role:           {role}");
                    }
                }
                println!("Home:           {}", snapshot.home_route().fragment());
            }
        }
        SessionCommand::Login(args) => {
            let user = user_from_args(args);
            session
                .login(&args.token, &user)
                .context("storing session")?;
            println!(
                "Logged in as {}; home is {}",
                user.email,
                session.snapshot().home_route().fragment()
            );
        }
        SessionCommand::Logout => {
            session.logout().context("clearing session")?;
            println!("Logged out.");
        }
        SessionCommand::Clear => {
            let removed = session
                .storage()
                .clear(session.tab())
                .context("clearing session storage")?;
            println!("Removed {removed} stored key(s).");
        }
    }
    Ok(())
}

fn user_from_args(args: &LoginArgs) -> UserProfile {
    let mut user = UserProfile::new(args.email.clone());
    if let Some(role) = &args.role {
        user = user.with_role(role.clone());
    }
    if let Some(name) = &args.name {
        user = user.with_name(name.clone());
    }
    if args.admin {
        user = user.with_admin_flag(true);
    }
    user
}

fn handle_menu(config: &Config, cmd: &MenuCommand) -> Result<()> {
    let session = open_session(config)?;
    let policy = config.policy();
    let snapshot = session.snapshot();
    let user = session.current_user();

    let current = cmd
        .current
        .as_deref()
        .map_or_else(|| snapshot.home_route(), |f| policy.resolve(strip_hash(f)));
    let items = menu_for(&policy, snapshot, user.as_ref(), current);

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else {
        for item in &items {
            let marker = if item.active { "*" } else { " " };
            println!("{marker} {:<16} {}", item.label, item.href);
        }
    }
    Ok(())
}

fn handle_replay(config: &Config, cmd: &ReplayCommand) -> Result<()> {
    let script = if cmd.file.as_os_str() == "-" {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("reading script from stdin")?;
        buf
    } else {
        std::fs::read_to_string(&cmd.file)
            .with_context(|| format!("reading script {}", cmd.file.display()))?
    };

    let mut replay = Replay::from_config(config)?;
    let records = replay.run_script(&script)?;

    for record in &records {
        if cmd.json {
            println!("{}", serde_json::to_string(record)?);
        } else {
            println!("{:>4}  {}", record.line, record.action);
            for view in &record.tabs {
                println!(
                    "        {:<8} {:<16} #{:<16} {}",
                    view.tab, view.page, view.fragment, view.view_key
                );
            }
        }
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: &ConfigCommand) -> Result<()> {
    match cmd {
        ConfigCommand::Show => {
            println!("{}", serde_json::to_string_pretty(config)?);
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate => {
            config.validate()?;
            println!("Configuration is valid.");
        }
    }
    Ok(())
}
