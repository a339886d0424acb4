//! sage - streaming chat client for hosted completion endpoints

mod commands;
mod config;
mod ui;

use clap::Parser;
use sage_ai::Role;
use sage_chat::{ChatController, ChatHandle, SendOutcome};
use std::io::{self, IsTerminal, Write};
use tracing_subscriber::EnvFilter;

/// sage - chat with a hosted model from the terminal
#[derive(Parser, Debug)]
#[command(name = "sage")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Completion endpoint URL (overrides SAGE_ENDPOINT)
    #[arg(long)]
    endpoint: Option<String>,

    /// Model to use (overrides SAGE_MODEL)
    #[arg(short, long)]
    model: Option<String>,

    /// System prompt for new conversations
    #[arg(short, long)]
    system: Option<String>,

    /// Run in non-interactive mode with a single prompt
    #[arg(short = 'c', long)]
    command: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Logs go to stderr so they never interleave with streamed text
    let filter = if args.verbose {
        EnvFilter::new("sage=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    if args.init_config {
        match config::Config::init() {
            Ok(path) => {
                println!("Config file at: {}", path.display());
                println!("\nExample config:\n{}", config::example_config());
            }
            Err(e) => {
                eprintln!("Error creating config: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    let cfg = config::Config::load();

    // File, then environment, then flags
    let mut builder = cfg
        .client_builder()
        .merge_lookup(|key| std::env::var(key).ok())?;
    if let Some(endpoint) = args.endpoint {
        builder = builder.endpoint(endpoint);
    }
    if let Some(model) = args.model {
        builder = builder.model(model);
    }

    let client = match builder.build() {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!();
            eprintln!("Set SAGE_ENDPOINT, SAGE_API_VERSION, SAGE_API_KEY and SAGE_MODEL,");
            eprintln!("or add them to the config file: sage --init-config");
            std::process::exit(1);
        }
    };

    let mut chat_config = cfg.chat_config(client);
    if let Some(system) = args.system {
        chat_config.system_prompt = Some(system);
    }

    let mut controller = ChatController::connect(chat_config);
    spawn_interrupt_handler(controller.handle());

    if let Some(command) = args.command {
        return run_command(&mut controller, &command).await;
    }

    run_interactive(&mut controller).await
}

/// Ctrl-C aborts a request in flight, or exits when idle
fn spawn_interrupt_handler(handle: ChatHandle) {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if handle.is_running() {
                handle.abort();
            } else {
                std::process::exit(130);
            }
        }
    });
}

fn report(result: sage_chat::Result<SendOutcome>) {
    match result {
        Ok(_) => {}
        Err(e) if e.is_aborted() => println!("\n[aborted]"),
        // Failures were already printed from their events
        Err(e) => tracing::debug!("Send failed: {}", e),
    }
}

async fn run_command(controller: &mut ChatController, command: &str) -> anyhow::Result<()> {
    let mut printer = ui::Printer::stdout(io::stdout().is_terminal());
    let mut receiver = controller.subscribe();

    ui::drive(controller.send(command), &mut receiver, &mut printer).await?;
    Ok(())
}

async fn run_interactive(controller: &mut ChatController) -> anyhow::Result<()> {
    let mut printer = ui::Printer::stdout(io::stdout().is_terminal());
    let mut receiver = controller.subscribe();

    if io::stderr().is_terminal() {
        eprintln!(
            "sage ({}) - /help for commands",
            controller.config().client.model()
        );
        eprintln!();
    }

    loop {
        // An undismissed error marks the prompt
        if controller.last_error().is_some() {
            print!("(!) > ");
        } else {
            print!("> ");
        }
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            // EOF
            break;
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        if input.starts_with('/') {
            if let Some(result) = commands::execute_command(input, controller.turns().len()) {
                match result {
                    commands::CommandResult::Clear => {
                        controller.clear();
                        while let Ok(event) = receiver.try_recv() {
                            printer.event(&event);
                        }
                    }
                    commands::CommandResult::Retry => {
                        let result =
                            ui::drive(controller.retry_last(), &mut receiver, &mut printer)
                                .await;
                        if let Ok(SendOutcome::Ignored) = result {
                            println!("Nothing to retry.");
                        }
                        report(result);
                    }
                    commands::CommandResult::Copy(index) => {
                        copy_turn(controller, index)?;
                    }
                    commands::CommandResult::Dismiss => {
                        controller.dismiss_error();
                    }
                    commands::CommandResult::Message(msg) => {
                        println!("{}", msg);
                    }
                    commands::CommandResult::Exit => {
                        break;
                    }
                    commands::CommandResult::Unknown(cmd) => {
                        println!("Unknown command: /{}", cmd);
                        println!("Type /help for available commands.");
                    }
                }
                println!();
                continue;
            }
        }

        println!();
        let result = ui::drive(controller.send(input), &mut receiver, &mut printer).await;
        report(result);
        println!();
    }

    Ok(())
}

fn copy_turn(controller: &ChatController, index: usize) -> io::Result<()> {
    let Some(content) = controller.turn_content(index) else {
        println!("No turn at index {}.", index);
        return Ok(());
    };
    let role = controller.turns()[index].role;

    // Assistant content is markup; user and system text is literal
    let text = match role {
        Role::Assistant => ui::render(content, false),
        Role::User | Role::System => content.to_string(),
    };

    let mut stdout = io::stdout();
    write!(stdout, "{}", commands::osc52(&text))?;
    stdout.flush()?;
    println!(
        "Copied turn {} ({}, {} chars).",
        index,
        role.name(),
        text.chars().count()
    );
    Ok(())
}
