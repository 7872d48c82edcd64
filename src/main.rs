use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use actuator::core::config::{self, ActuatorConfig, CliOverrides};
use actuator::todo::command::{self, Command, HELP};
use actuator::todo::store::{FileStore, TodoStore};
use actuator::todo::{TodoApp, TodoContext, TodoList, TodoMsg};
use actuator::{Actuator, ActuatorError};
use clap::Parser;
use simplelog::{ConfigBuilder, LevelFilter, WriteLogger};
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "actuator", about = "A to-do list driven by a message loop")]
struct Args {
    /// Config file to use instead of ~/.actuator/config.toml
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Where todos are stored
    #[arg(short, long)]
    store: Option<PathBuf>,

    /// Give up on effects that take longer than this
    #[arg(long)]
    effect_timeout_ms: Option<u64>,

    /// off, error, warn, info, debug or trace
    #[arg(long)]
    log_level: Option<String>,

    /// Log file (default: actuator.log in the current directory)
    #[arg(long)]
    log_file: Option<PathBuf>,
}

enum Event {
    Line(Option<String>),
    Model(Result<TodoList, ActuatorError>),
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    let args = Args::parse();
    dotenv::dotenv().ok();

    let cli = CliOverrides {
        effect_timeout_ms: args.effect_timeout_ms,
        log_level: args.log_level,
        log_file: args.log_file,
        store_path: args.store,
    };

    // File logger first, so config loading is logged too. stdout belongs
    // to the list. The level is adjusted once the config file is read.
    let log_config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .build();

    if let Ok(log_file) = File::create(config::resolve_log_file(&cli, |key| std::env::var(key).ok())) {
        let _ = WriteLogger::init(LevelFilter::Trace, log_config, log_file);
    }
    log::set_max_level(config::resolve(&ActuatorConfig::default(), &cli).log_level);

    let file_config = match &args.config {
        Some(path) => config::load_config_from(path),
        None => config::load_config(),
    }
    .unwrap_or_else(|e| {
        log::warn!("{}, using defaults", e);
        eprintln!("{e}, using defaults");
        Default::default()
    });
    let resolved = config::resolve(&file_config, &cli);
    log::set_max_level(resolved.log_level);

    log::info!(
        "Actuator starting up with store at {}",
        resolved.store_path.display()
    );

    let store = Arc::new(FileStore::new(resolved.store_path.clone()));
    let context = TodoContext::new(store.clone(), resolved.autosave_delay);
    let mut actuator = Actuator::with_config(TodoApp, context, resolved.runtime);

    println!("{}", actuator.initial_model());
    println!("Type 'help' for commands.");
    actuator.dispatch(TodoMsg::Load);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let event = tokio::select! {
            line = lines.next_line() => Event::Line(line?),
            model = actuator.next_model() => Event::Model(model),
        };

        match event {
            Event::Line(None) => break,
            Event::Line(Some(line)) => match command::parse(&line, actuator.model()) {
                Ok(Command::Dispatch(message)) => actuator.dispatch(message),
                Ok(Command::Help) => println!("{HELP}"),
                Ok(Command::Quit) => break,
                Err(command::CommandError::Empty) => {}
                Err(e) => println!("{e}"),
            },
            Event::Model(Ok(model)) => println!("{model}"),
            Event::Model(Err(ActuatorError::Stopped)) => break,
            Event::Model(Err(e)) => println!("error: {e}"),
        }
    }

    if actuator.model().is_dirty() {
        log::info!("Unsaved changes on exit, saving");
        if let Err(e) = store.save(&actuator.model().todos).await {
            eprintln!("Failed to save on exit: {e}");
        }
    }

    actuator.stop();
    log::info!("Actuator shut down");
    Ok(())
}
