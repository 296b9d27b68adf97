//! Takes the AGI assessment in the terminal.

#[macro_use]
extern crate tracing;

use std::env;
use std::io::Write as _;
use std::path::PathBuf;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use tokio::io::{self, AsyncBufReadExt};
use tokio::select;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tutor::core::{ChatTurn, FileStorage, Role, UiMode};
use tutor::{HttpEndpoint, ReplyOutput, ReplyPrinter, SessionBuilder};

enum SessionEvent {
    Idle,
    Transcript(Vec<ChatTurn>),
    Mode(UiMode),
    Error(String),
}

const BAR_CHAR: &str = "▎";
const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8787";

#[tokio::main(flavor = "current_thread")]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let endpoint = env::var("TUTOR_ENDPOINT")
        .unwrap_or_else(|_| DEFAULT_ENDPOINT.to_owned());
    let state_dir = state_dir();
    debug!("state lives in {}", state_dir.display());

    let (event_tx, mut event_rx) = mpsc::unbounded_channel();

    let session = SessionBuilder::with_endpoint(HttpEndpoint::new(&endpoint))
        .with_storage(FileStorage::new(state_dir))
        .on_idle({
            let event_tx = event_tx.clone();
            move || {
                event_tx.send(SessionEvent::Idle).ok();
            }
        })
        .on_transcript({
            let event_tx = event_tx.clone();
            move |turns| {
                event_tx.send(SessionEvent::Transcript(turns.to_vec())).ok();
            }
        })
        .on_mode({
            let event_tx = event_tx.clone();
            move |mode| {
                event_tx.send(SessionEvent::Mode(mode)).ok();
            }
        })
        .on_error(move |message| {
            event_tx.send(SessionEvent::Error(message.to_owned())).ok();
        })
        .build();

    let Some(snapshot) = session.snapshot().await else {
        eprintln!("the session terminated unexpectedly");
        return;
    };

    println!("{}", "AI Tutor".bright_white().bold());
    println!(
        "{}",
        "Answer the tutor's questions. /reset starts over, /quit leaves."
            .dimmed()
    );
    for turn in &snapshot.transcript {
        print_turn(turn);
    }
    if snapshot.transcript.is_empty() {
        println!(
            "{}",
            "Say hello, or tell the tutor what you know about AGI.".dimmed()
        );
    }

    let progress_style = ProgressStyle::with_template("{spinner} {wide_msg}")
        .unwrap()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏");

    let mut mode = snapshot.mode;
    'outer: loop {
        if mode == UiMode::Finished {
            println!("{}", "✅ Exercise complete!".bright_green().bold());
        }
        print!("> ");
        std::io::stdout().flush().ok();

        let Some(line) = read_line().await else {
            break;
        };
        let line = line.trim();
        match line {
            "/quit" => break,
            "/reset" => {
                session.reset();
                println!("{}", "Conversation reset.".dimmed());
            }
            "" => continue,
            _ if mode == UiMode::Finished => {
                println!("{}", "Type /reset to start over or /quit.".dimmed());
                continue;
            }
            _ => session.submit(line),
        }

        let thinking = line != "/reset";
        let mut progress_bar = None;
        let mut printer = ReplyPrinter::new();
        let mut replying = false;

        loop {
            // Spin until the first piece of the reply shows up.
            if thinking && !replying {
                progress_bar
                    .get_or_insert_with(|| {
                        let progress_bar = ProgressBar::new_spinner();
                        progress_bar.set_style(progress_style.clone());
                        progress_bar.set_message("🤔 Thinking...");
                        progress_bar
                    })
                    .inc(1);
            }

            let sleep = sleep(Duration::from_millis(100));
            let event = select! {
                event = event_rx.recv() => {
                    let Some(event) = event else {
                        break 'outer;
                    };
                    event
                },
                _ = sleep => {
                    continue;
                }
            };

            match event {
                SessionEvent::Transcript(turns) => {
                    let Some(turn) = turns.last() else {
                        continue;
                    };
                    if turn.role != Role::Tutor || turn.content.is_empty() {
                        continue;
                    }
                    if let Some(progress_bar) = progress_bar.take() {
                        progress_bar.finish_and_clear();
                    }
                    if !replying {
                        print!("{}🤖 ", BAR_CHAR.bright_cyan());
                        replying = true;
                    }
                    print_reply(printer.update(&turn.content));
                }
                SessionEvent::Mode(new_mode) => {
                    mode = new_mode;
                }
                SessionEvent::Error(message) => {
                    if let Some(progress_bar) = progress_bar.take() {
                        progress_bar.finish_and_clear();
                    }
                    if replying {
                        print_reply(printer.finish());
                        println!();
                    }
                    println!("{}⚠️  {}", BAR_CHAR.bright_red(), message.red());
                    replying = false;
                    printer = ReplyPrinter::new();
                }
                SessionEvent::Idle => {
                    if let Some(progress_bar) = progress_bar.take() {
                        progress_bar.finish_and_clear();
                    }
                    if replying {
                        print_reply(printer.finish());
                        println!();
                    }
                    break;
                }
            }
        }
    }
}

fn print_reply(output: Option<ReplyOutput>) {
    match output {
        Some(ReplyOutput::Append(text)) => print!("{}", text.bright_white()),
        Some(ReplyOutput::Redraw(text)) => {
            print!("\n{}🤖 {}", BAR_CHAR.bright_cyan(), text.bright_white())
        }
        None => return,
    }
    std::io::stdout().flush().ok();
}

fn print_turn(turn: &ChatTurn) {
    match turn.role {
        Role::Learner => {
            println!("{}🧑 {}", BAR_CHAR.bright_blue(), turn.content)
        }
        Role::Tutor => println!(
            "{}🤖 {}",
            BAR_CHAR.bright_cyan(),
            turn.content.bright_white()
        ),
    }
}

async fn read_line() -> Option<String> {
    let mut stdin = io::BufReader::new(io::stdin());
    let mut line = String::new();

    match stdin.read_line(&mut line).await {
        Ok(0) => None,
        Ok(_) => Some(line),
        Err(err) => {
            error!("error reading input: {}", err);
            None
        }
    }
}

fn state_dir() -> PathBuf {
    if let Ok(dir) = env::var("TUTOR_STATE_DIR") {
        return PathBuf::from(dir);
    }
    match env::var("HOME") {
        Ok(home) => PathBuf::from(home).join(".tutor"),
        Err(_) => PathBuf::from(".tutor"),
    }
}
