//! Interactive playground - drive one instance against an in-memory history

use anyhow::{bail, Context, Result};
use colored::*;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use serde_json::Value;
use std::sync::Arc;

use crate::codec::default_parse;
use crate::location::MemoryHistory;
use crate::sync::{ChangeSource, State, UrlStateSync};

const HELP: &str = "\
Commands:
  state                   Show the current state
  get <field>             Show one field
  set <field> <value>     Set a field (value parsed as JSON, else string)
  patch <f>=<v> [...]     Merge several fields; `f=` leaves the field undefined
  rm <field> [...]        Remove fields
  replace <json-object>   Replace the whole state
  clear                   Remove every field
  flush                   Write a pending debounced change now
  back | forward          Navigate the history
  url                     Show the current URL
  history                 Show all history entries
  help                    Show this help
  exit | quit             Leave";

/// One parsed REPL line
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    State,
    Get(String),
    Set(String, Value),
    Patch(Vec<(String, Option<Value>)>),
    Remove(Vec<String>),
    Replace(State),
    Clear,
    Flush,
    Back,
    Forward,
    Url,
    History,
    Help,
    Exit,
}

impl Command {
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let line = line.trim();
        let (name, rest) = match line.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (line, ""),
        };

        let command = match name {
            "" => return Ok(None),
            "state" => Command::State,
            "get" => Command::Get(single_arg(name, rest)?),
            "set" => {
                let Some((field, value)) = rest.split_once(char::is_whitespace) else {
                    bail!("usage: set <field> <value>");
                };
                Command::Set(field.to_string(), default_parse(value.trim()))
            }
            "patch" => {
                if rest.is_empty() {
                    bail!("usage: patch <field>=<value> [...]");
                }
                let entries = rest
                    .split_whitespace()
                    .map(|entry| match entry.split_once('=') {
                        Some((field, "")) => Ok((field.to_string(), None)),
                        Some((field, value)) => Ok((field.to_string(), Some(default_parse(value)))),
                        None => bail!("expected <field>=<value>, got '{}'", entry),
                    })
                    .collect::<Result<Vec<_>>>()?;
                Command::Patch(entries)
            }
            "rm" => {
                if rest.is_empty() {
                    bail!("usage: rm <field> [...]");
                }
                Command::Remove(rest.split_whitespace().map(str::to_string).collect())
            }
            "replace" => {
                let value: Value =
                    serde_json::from_str(rest).context("replace expects a JSON object")?;
                match value {
                    Value::Object(state) => Command::Replace(state),
                    _ => bail!("replace expects a JSON object"),
                }
            }
            "clear" => Command::Clear,
            "flush" => Command::Flush,
            "back" => Command::Back,
            "forward" => Command::Forward,
            "url" => Command::Url,
            "history" => Command::History,
            "help" | "?" => Command::Help,
            "exit" | "quit" => Command::Exit,
            other => bail!("unknown command '{}', try 'help'", other),
        };
        Ok(Some(command))
    }
}

fn single_arg(name: &str, rest: &str) -> Result<String> {
    match rest.split_whitespace().collect::<Vec<_>>().as_slice() {
        [arg] => Ok(arg.to_string()),
        _ => bail!("usage: {} <field>", name),
    }
}

/// What the REPL should do after a command
#[derive(Debug, PartialEq)]
pub enum Reply {
    Print(String),
    Quit,
}

/// An instance wired to the history it writes to
pub struct Playground {
    history: Arc<MemoryHistory>,
    sync: UrlStateSync,
}

impl Playground {
    pub fn new(history: Arc<MemoryHistory>, sync: UrlStateSync) -> Self {
        Self { history, sync }
    }

    pub fn execute(&self, command: Command) -> Result<Reply> {
        let text = match command {
            Command::State => pretty(&Value::Object(self.sync.state())),
            Command::Get(field) => match self.sync.get(&field) {
                Some(value) => pretty(&value),
                None => "(undefined)".dimmed().to_string(),
            },
            Command::Set(field, value) => {
                self.sync.set(&field, value)?;
                self.url_line()
            }
            Command::Patch(entries) => {
                self.sync.patch(entries)?;
                self.url_line()
            }
            Command::Remove(fields) => {
                self.sync.remove(fields)?;
                self.url_line()
            }
            Command::Replace(state) => {
                self.sync.replace(state)?;
                self.url_line()
            }
            Command::Clear => {
                self.sync.clear()?;
                self.url_line()
            }
            Command::Flush => {
                self.sync.flush()?;
                self.url_line()
            }
            Command::Back => self.navigated(self.history.back()),
            Command::Forward => self.navigated(self.history.forward()),
            Command::Url => self.history.current(),
            Command::History => {
                let cursor = self.history.cursor();
                self.history
                    .entries()
                    .iter()
                    .enumerate()
                    .map(|(i, url)| {
                        if i == cursor {
                            format!("{} {}", "->".green().bold(), url)
                        } else {
                            format!("   {}", url)
                        }
                    })
                    .collect::<Vec<_>>()
                    .join("\n")
            }
            Command::Help => HELP.to_string(),
            Command::Exit => return Ok(Reply::Quit),
        };
        Ok(Reply::Print(text))
    }

    fn url_line(&self) -> String {
        format!("{} {}", "url:".cyan(), self.history.current())
    }

    fn navigated(&self, moved: bool) -> String {
        if moved {
            self.url_line()
        } else {
            "no history entry in that direction".yellow().to_string()
        }
    }
}

fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}

/// Read commands until `exit` or end of input
pub async fn run_repl(playground: Playground) -> Result<()> {
    let mut rl = DefaultEditor::new()?;

    let subscription = playground.sync.subscribe(|event| {
        if event.source == ChangeSource::External {
            println!(
                "{} {}",
                "navigation:".magenta(),
                Value::Object(event.state.clone())
            );
        }
    });

    println!("{}", "urlstate playground - type 'help' for commands".bold().cyan());
    println!("{} {}", "url:".cyan(), playground.history.current());

    loop {
        let readline = rl.readline("urlstate> ");
        match readline {
            Ok(line) => {
                let _ = rl.add_history_entry(line.as_str());
                let command = match Command::parse(&line) {
                    Ok(Some(command)) => command,
                    Ok(None) => continue,
                    Err(e) => {
                        println!("{} {}", "error:".red().bold(), e);
                        continue;
                    }
                };

                match playground.execute(command) {
                    Ok(Reply::Print(text)) => println!("{}", text),
                    Ok(Reply::Quit) => break,
                    Err(e) => println!("{} {}", "error:".red().bold(), e),
                }
            }
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }

    playground.sync.flush()?;
    playground.sync.unsubscribe(subscription);
    Ok(())
}
