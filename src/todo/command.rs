//! Line commands for the `actuator` binary.
//!
//! Indices are 1-based positions in the list as last printed. They are
//! resolved to todo ids against the current model before dispatch, so a
//! command never refers to a position that has since moved.

use std::fmt;

use super::{TodoList, TodoMsg};

pub const HELP: &str = "\
Commands:
  add <label>           add a todo
  toggle <n>            mark todo n done / not done
  rename <n> <label>    change the label of todo n
  edit <n>              start editing todo n
  done                  stop editing
  delete <n>            remove todo n
  clear                 remove all todos
  clear-done            remove finished todos
  load                  reload from the store
  save                  save now
  help                  show this help
  quit                  exit";

#[derive(Debug, PartialEq)]
pub enum Command {
    Dispatch(TodoMsg),
    Help,
    Quit,
}

#[derive(Debug, PartialEq)]
pub enum CommandError {
    Empty,
    Unknown(String),
    MissingArgument(&'static str),
    BadIndex(String),
}

impl fmt::Display for CommandError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Empty => write!(f, "empty command"),
            CommandError::Unknown(word) => write!(f, "unknown command '{word}', try 'help'"),
            CommandError::MissingArgument(what) => write!(f, "missing {what}"),
            CommandError::BadIndex(raw) => write!(f, "no todo at position '{raw}'"),
        }
    }
}

impl std::error::Error for CommandError {}

/// Parses one input line against the list it will apply to.
pub fn parse(line: &str, list: &TodoList) -> Result<Command, CommandError> {
    let line = line.trim();
    let (word, rest) = match line.split_once(char::is_whitespace) {
        Some((word, rest)) => (word, rest.trim()),
        None => (line, ""),
    };

    let message = match word.to_ascii_lowercase().as_str() {
        "" => return Err(CommandError::Empty),
        "help" | "?" => return Ok(Command::Help),
        "quit" | "exit" | "q" => return Ok(Command::Quit),
        "add" | "a" => TodoMsg::Add(required(rest, "label")?.to_string()),
        "toggle" | "t" => TodoMsg::Toggle(list.todos[index(rest, list)?].id),
        "rename" | "r" => {
            let (n, label) = rest
                .split_once(char::is_whitespace)
                .ok_or(CommandError::MissingArgument("label"))?;
            let id = list.todos[index(n, list)?].id;
            TodoMsg::SetLabel(id, required(label.trim(), "label")?.to_string())
        }
        "edit" | "e" => TodoMsg::SetEditing(Some(list.todos[index(rest, list)?].id)),
        "done" => TodoMsg::SetEditing(None),
        "delete" | "rm" | "d" => TodoMsg::Delete(list.todos[index(rest, list)?].id),
        "clear" => TodoMsg::Clear,
        "clear-done" => TodoMsg::ClearDone,
        "load" => TodoMsg::Load,
        "save" => TodoMsg::Save,
        _ => return Err(CommandError::Unknown(word.to_string())),
    };
    Ok(Command::Dispatch(message))
}

fn required<'a>(arg: &'a str, what: &'static str) -> Result<&'a str, CommandError> {
    if arg.is_empty() {
        Err(CommandError::MissingArgument(what))
    } else {
        Ok(arg)
    }
}

/// Resolves a 1-based position to a 0-based index.
fn index(arg: &str, list: &TodoList) -> Result<usize, CommandError> {
    let arg = required(arg, "todo number")?;
    match arg.parse::<usize>() {
        Ok(n) if (1..=list.todos.len()).contains(&n) => Ok(n - 1),
        _ => Err(CommandError::BadIndex(arg.to_string())),
    }
}
