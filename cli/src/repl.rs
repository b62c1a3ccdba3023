//! Interactive chat loop and slash commands

use anyhow::Result;
use colored::Colorize;
use natter_core::{ChatSession, Message, Role};
use std::io::Write;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};

/// Run the chat loop until `/quit` or end of input
pub async fn run(session: &mut ChatSession) -> Result<()> {
    if !session.messages().is_empty() {
        system_line(&format!(
            "restored {} messages from the previous session",
            session.messages().len()
        ));
        for message in session.messages() {
            print_message(message);
        }
    }
    if session.config().debug {
        system_line("debug mode is on, requests stay offline");
    }
    system_line("type a message to chat, /help for commands, /quit to exit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if let Some(command) = line.strip_prefix('/') {
            if !dispatch(session, command).await? {
                break;
            }
        } else {
            send(session, line).await;
        }
    }

    Ok(())
}

/// Handle one slash command; returns `false` when the session should end
async fn dispatch(session: &mut ChatSession, command: &str) -> Result<bool> {
    let (name, rest) = command.split_once(' ').unwrap_or((command, ""));
    let rest = rest.trim();

    match name {
        "quit" | "exit" => return Ok(false),
        "help" => help(),
        "params" => println!("{}", serde_json::to_string_pretty(session.parameters())?),
        "set" => match rest.split_once(' ') {
            Some((field, value)) => match session.set_parameter(field.trim(), value.trim()) {
                Ok(()) => system_line(&format!("{} updated", field.trim())),
                Err(e) => system_line(&e.to_string()),
            },
            None => system_line("usage: /set <field> <value>"),
        },
        "system" => match session.set_parameter("system_prompt", rest) {
            Ok(()) => system_line("system prompt updated, applies to fresh conversations"),
            Err(e) => system_line(&e.to_string()),
        },
        "reset" => {
            session.reset_parameters();
            system_line("parameters reset to defaults, model preserved");
        }
        "clear" => {
            let preserve = rest != "all";
            session.clear(preserve).await;
            system_line(if preserve {
                "history cleared, system prompt kept"
            } else {
                "history cleared"
            });
        }
        "restart" => {
            session.reload().await;
            system_line(&format!(
                "session restarted, {} messages kept",
                session.messages().len()
            ));
        }
        "save" => match session.save().await {
            Ok(()) => system_line("session saved"),
            Err(e) => system_line(&e.to_string()),
        },
        "export" => match session.export_transcript(Path::new(".")).await {
            Ok(path) => system_line(&format!("transcript written to {}", path.display())),
            Err(e) => system_line(&e.to_string()),
        },
        "test" => {
            let report = session.test_connection().await;
            system_line(&report.message);
        }
        "key" => {
            if rest.is_empty() {
                system_line("usage: /key <api key>");
            } else {
                let mut config = session.config().clone();
                config.api_key = rest.to_string();
                match session.reconfigure(config) {
                    Ok(()) => system_line("API key updated"),
                    Err(e) => system_line(&e.to_string()),
                }
            }
        }
        "endpoint" => {
            if rest.is_empty() {
                system_line("usage: /endpoint <base url>");
            } else {
                let config = session.config().clone().with_base_url(rest);
                match session.reconfigure(config) {
                    Ok(()) => system_line("endpoint updated"),
                    Err(e) => system_line(&e.to_string()),
                }
            }
        }
        "debug" => {
            let on = matches!(rest, "on" | "true" | "1");
            let config = session.config().clone().with_debug(on);
            match session.reconfigure(config) {
                Ok(()) => system_line(if on {
                    "debug mode enabled, requests stay offline"
                } else {
                    "debug mode disabled"
                }),
                Err(e) => system_line(&e.to_string()),
            }
        }
        _ => system_line(&format!("unknown command: /{}", name)),
    }

    Ok(true)
}

async fn send(session: &mut ChatSession, text: &str) {
    match session.send_message(text).await {
        Ok(reply) => println!("{}\n{}", "AI:".green().bold(), reply),
        // Every failure lands in the transcript instead of aborting the loop
        Err(e) => system_line(&e.to_string()),
    }
}

fn prompt() -> Result<()> {
    print!("{} ", "you>".blue().bold());
    std::io::stdout().flush()?;
    Ok(())
}

fn print_message(message: &Message) {
    let label = match message.role {
        Role::User => "You:".blue().bold(),
        Role::Assistant => "AI:".green().bold(),
        Role::System => "System:".dimmed(),
    };
    println!("{}\n{}", label, message.content);
}

fn system_line(text: &str) {
    println!("{} {}", "system:".dimmed(), text.dimmed());
}

fn help() {
    system_line("/params                 show the current parameters");
    system_line("/set <field> <value>    update one parameter");
    system_line("/system <text>          set the system prompt");
    system_line("/reset                  restore default parameters (model kept)");
    system_line("/clear [all]            clear history, keeping the system prompt unless 'all'");
    system_line("/restart                persist and reload the session from disk");
    system_line("/save                   persist the session now");
    system_line("/export                 write a transcript file to the current directory");
    system_line("/test                   probe the endpoint");
    system_line("/key <api key>          set the API key");
    system_line("/endpoint <base url>    set the completion endpoint");
    system_line("/debug on|off           toggle offline debug mode");
    system_line("/quit                   save and exit");
}
