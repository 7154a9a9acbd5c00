//! Line-oriented chat loop on stdin/stdout.

use std::io::Write;

use anyhow::Result;
use chat::commands::{parse_command, Command};
use chat::strings::{info_line, HELP, PREFIX_ASSISTANT, PREFIX_USER, WELCOME};
use chat::{Orchestrator, TurnOutcome};
use loco_core::conversation::ConversationStore;
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn run<S: ConversationStore>(orch: &mut Orchestrator<S>) -> Result<()> {
    println!("{}", WELCOME);
    println!(
        "{}",
        info_line(&format!(
            "model '{}', streaming {}",
            orch.conversation().model,
            if orch.settings().streaming { "on" } else { "off" }
        ))
    );
    for m in &orch.conversation().messages {
        print_turn(m.role == loco_core::llm::Role::User, &m.content);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("{}", PREFIX_USER);
        std::io::stdout().flush()?;
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if let Some(cmd) = parse_command(text) {
            if !handle_command(orch, cmd) {
                break;
            }
            continue;
        }
        if orch.settings().streaming {
            stream_turn(orch, text).await?;
        } else {
            match orch.send_buffered(text).await {
                TurnOutcome::Committed(reply) => print_turn(false, &reply),
                TurnOutcome::Failed(msg) => print_turn(false, &msg),
                TurnOutcome::Cancelled => {}
            }
        }
        if let Some(e) = orch.take_save_error() {
            println!("{}", info_line(&format!("conversation not saved: {}", e)));
        }
    }
    println!();
    Ok(())
}

/// Returns false when the loop should end.
fn handle_command<S: ConversationStore>(orch: &mut Orchestrator<S>, cmd: Command) -> bool {
    match cmd {
        Command::Model(None) => {
            println!("{}", info_line(&format!("model is '{}'", orch.conversation().model)))
        }
        Command::Model(Some(m)) => {
            orch.set_model(m);
            println!("{}", info_line(&format!("model set to '{}'", orch.conversation().model)));
        }
        Command::Stream(on) => {
            let on = on.unwrap_or(!orch.settings().streaming);
            orch.set_streaming(on);
            println!("{}", info_line(&format!("streaming {}", if on { "on" } else { "off" })));
        }
        Command::New => match orch.new_conversation() {
            Ok(()) => println!("{}", info_line("started a new conversation")),
            Err(e) => println!("{}", info_line(&format!("could not save the new conversation: {}", e))),
        },
        Command::History => match orch.conversations() {
            Ok(all) if all.is_empty() => println!("{}", info_line("no saved conversations")),
            Ok(all) => {
                let current = orch.conversation().id.clone();
                for c in all.iter().rev() {
                    let mark = if c.id == current { '*' } else { ' ' };
                    println!("{} {} ({} msgs) {}", mark, c.id, c.messages.len(), c.title());
                }
            }
            Err(e) => println!("{}", info_line(&format!("could not read history: {}", e))),
        },
        Command::Open(id) => match orch.select_conversation(&id) {
            Ok(true) => {
                println!("{}", info_line(&format!("opened {}", id)));
                for m in &orch.conversation().messages {
                    print_turn(m.role == loco_core::llm::Role::User, &m.content);
                }
            }
            Ok(false) => println!("{}", info_line(&format!("no conversation {}", id))),
            Err(e) => println!("{}", info_line(&format!("could not read history: {}", e))),
        },
        Command::Delete(id) => match orch.delete_conversation(&id) {
            Ok(true) => println!("{}", info_line(&format!("deleted {}", id))),
            Ok(false) => println!("{}", info_line(&format!("no conversation {}", id))),
            Err(e) => println!("{}", info_line(&format!("could not delete {}: {}", id, e))),
        },
        Command::Clear => match orch.clear_conversations() {
            Ok(()) => println!("{}", info_line("deleted all conversations")),
            Err(e) => println!("{}", info_line(&format!("could not clear history: {}", e))),
        },
        Command::Help => println!("{}", HELP),
        Command::Quit => return false,
        Command::Unknown(s) => println!("{}", info_line(&format!("unknown command {}", s))),
    }
    true
}

async fn stream_turn<S: ConversationStore>(orch: &mut Orchestrator<S>, text: &str) -> Result<()> {
    let pending = orch.begin_stream(text);
    let mut partial = pending.partial();
    let cancel = pending.canceller();
    let mut shown = 0usize;
    let mut live = true;
    print!("{}", PREFIX_ASSISTANT);
    std::io::stdout().flush()?;

    let finish = orch.finish_stream(pending);
    tokio::pin!(finish);
    let outcome = loop {
        tokio::select! {
            outcome = &mut finish => break outcome,
            changed = partial.changed(), if live => {
                if changed.is_err() {
                    live = false;
                    continue;
                }
                let snapshot = partial.borrow_and_update().clone();
                if let Some(fresh) = snapshot.get(shown..) {
                    print!("{}", fresh);
                    std::io::stdout().flush()?;
                }
                shown = snapshot.len();
            }
            _ = tokio::signal::ctrl_c() => cancel.cancel(),
        }
    };

    match outcome {
        TurnOutcome::Committed(reply) => {
            if let Some(rest) = reply.get(shown..) {
                print!("{}", rest);
            }
            println!();
        }
        TurnOutcome::Failed(msg) => {
            println!();
            println!("{}", info_line(&msg));
        }
        TurnOutcome::Cancelled => {
            println!();
            println!("{}", info_line("cancelled"));
        }
    }
    Ok(())
}

fn print_turn(user: bool, content: &str) {
    let prefix = if user { PREFIX_USER } else { PREFIX_ASSISTANT };
    for (i, line) in content.lines().enumerate() {
        if i == 0 {
            println!("{}{}", prefix, line);
        } else {
            println!("{}{}", " ".repeat(prefix.len()), line);
        }
    }
}
