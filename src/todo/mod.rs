//! # Todo List
//!
//! A to-do list written as a [`Program`], driven by the `actuator` binary.
//!
//! ```text
//! TodoList
//! ├── todos: Vec<Todo>          // id, label, done, created_at
//! ├── editing: Option<Uuid>     // todo whose label is being edited
//! ├── revision: u64             // bumped on every persisted change
//! ├── saved_revision: u64       // last revision known to be in the store
//! └── status: String            // status line
//! ```
//!
//! Loading and saving are effects against the [`TodoStore`] in the context.
//! While `revision != saved_revision`, `subscribe` keeps an autosave timer
//! keyed by the revision: every edit restarts it, and once it fires it
//! dispatches `Save`.

pub mod command;
pub mod store;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::{BoxError, Dispatcher, Effect, Program, Subscription, Teardown, Update};
use store::TodoStore;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Todo {
    pub id: Uuid,
    pub label: String,
    pub done: bool,
    pub created_at: DateTime<Utc>,
}

impl Todo {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            label: label.into(),
            done: false,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TodoList {
    pub todos: Vec<Todo>,
    pub editing: Option<Uuid>,
    pub revision: u64,
    pub saved_revision: u64,
    pub status: String,
}

impl TodoList {
    /// True when there are changes the store has not seen.
    pub fn is_dirty(&self) -> bool {
        self.revision != self.saved_revision
    }

    pub fn remaining(&self) -> usize {
        self.todos.iter().filter(|t| !t.done).count()
    }

    pub fn position(&self, id: Uuid) -> Option<usize> {
        self.todos.iter().position(|t| t.id == id)
    }

    /// Same list with new todos and the next revision.
    fn revised(&self, todos: Vec<Todo>) -> Self {
        Self {
            todos,
            revision: self.revision + 1,
            ..self.clone()
        }
    }

    fn with_status(&self, status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            ..self.clone()
        }
    }
}

impl fmt::Display for TodoList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let saved = if self.is_dirty() { "unsaved" } else { "saved" };
        writeln!(f, "-- revision {} ({saved}) -- {}", self.revision, self.status)?;
        for (i, todo) in self.todos.iter().enumerate() {
            let mark = if todo.done { 'x' } else { ' ' };
            let editing = if self.editing == Some(todo.id) { "  (editing)" } else { "" };
            writeln!(f, "  {}. [{mark}] {}{editing}", i + 1, todo.label)?;
        }
        write!(f, "  {} of {} remaining", self.remaining(), self.todos.len())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TodoMsg {
    Add(String),
    Delete(Uuid),
    Toggle(Uuid),
    SetLabel(Uuid, String),
    SetEditing(Option<Uuid>),
    Clear,
    ClearDone,
    Load,
    Loaded(Vec<Todo>),
    Save,
    /// The store now holds this revision.
    Saved(u64),
    StoreFailed(String),
}

#[derive(Debug, PartialEq)]
pub enum TodoError {
    EmptyLabel,
}

impl fmt::Display for TodoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TodoError::EmptyLabel => write!(f, "a todo needs a non-empty label"),
        }
    }
}

impl std::error::Error for TodoError {}

/// Shared by `init`, every `update`, and the autosave subscription.
#[derive(Clone)]
pub struct TodoContext {
    pub store: Arc<dyn TodoStore>,
    pub autosave_delay: Duration,
}

impl TodoContext {
    pub fn new(store: Arc<dyn TodoStore>, autosave_delay: Duration) -> Self {
        Self {
            store,
            autosave_delay,
        }
    }
}

fn non_empty(label: String) -> Result<String, TodoError> {
    let trimmed = label.trim();
    if trimmed.is_empty() {
        return Err(TodoError::EmptyLabel);
    }
    Ok(trimmed.to_string())
}

pub struct TodoApp;

impl Program for TodoApp {
    type Model = TodoList;
    type Message = TodoMsg;
    type Context = TodoContext;

    fn init(&self, context: &TodoContext) -> TodoList {
        TodoList {
            status: format!("Using {} store", context.store.name()),
            ..Default::default()
        }
    }

    fn update(
        &self,
        model: &TodoList,
        message: TodoMsg,
        context: &TodoContext,
    ) -> Result<Update<TodoList, TodoMsg>, BoxError> {
        let update = match message {
            TodoMsg::Add(label) => {
                let mut todos = model.todos.clone();
                todos.push(Todo::new(non_empty(label)?));
                Update::Next(model.revised(todos))
            }
            TodoMsg::Delete(id) => match model.position(id) {
                Some(index) => {
                    let mut todos = model.todos.clone();
                    todos.remove(index);
                    let mut next = model.revised(todos);
                    if next.editing == Some(id) {
                        next.editing = None;
                    }
                    Update::Next(next)
                }
                None => Update::Unchanged,
            },
            TodoMsg::Toggle(id) => match model.position(id) {
                Some(index) => {
                    let mut todos = model.todos.clone();
                    todos[index].done = !todos[index].done;
                    Update::Next(model.revised(todos))
                }
                None => Update::Unchanged,
            },
            TodoMsg::SetLabel(id, label) => {
                let label = non_empty(label)?;
                match model.position(id) {
                    Some(index) if model.todos[index].label != label => {
                        let mut todos = model.todos.clone();
                        todos[index].label = label;
                        Update::Next(model.revised(todos))
                    }
                    _ => Update::Unchanged,
                }
            }
            TodoMsg::SetEditing(editing) => {
                let known = editing.is_none_or(|id| model.position(id).is_some());
                if editing == model.editing || !known {
                    Update::Unchanged
                } else {
                    Update::Next(TodoList {
                        editing,
                        ..model.clone()
                    })
                }
            }
            TodoMsg::Clear if !model.todos.is_empty() => {
                let mut next = model.revised(Vec::new());
                next.editing = None;
                Update::Next(next)
            }
            TodoMsg::ClearDone if model.todos.iter().any(|t| t.done) => {
                let todos = model.todos.iter().filter(|t| !t.done).cloned().collect();
                let mut next = model.revised(todos);
                if next.editing.is_some_and(|id| next.position(id).is_none()) {
                    next.editing = None;
                }
                Update::Next(next)
            }
            TodoMsg::Load => {
                let store = Arc::clone(&context.store);
                let effect = Effect::try_new(async move { store.load().await })
                    .map(TodoMsg::Loaded)
                    .or_else(|e| TodoMsg::StoreFailed(e.to_string()));
                Update::NextWithEffect(model.with_status("Loading..."), effect)
            }
            TodoMsg::Loaded(mut todos) => {
                let stored = todos.len();
                let revision = model.revision + 1;

                // Todos the store has never seen survive the load; stored
                // versions win for the rest.
                let unsaved: Vec<Todo> = if model.is_dirty() {
                    model
                        .todos
                        .iter()
                        .filter(|local| todos.iter().all(|t| t.id != local.id))
                        .cloned()
                        .collect()
                } else {
                    Vec::new()
                };
                let (saved_revision, status) = if unsaved.is_empty() {
                    (revision, format!("Loaded {stored} todos"))
                } else {
                    let kept = unsaved.len();
                    todos.extend(unsaved);
                    (
                        model.saved_revision,
                        format!("Loaded {stored} todos, kept {kept} unsaved"),
                    )
                };
                let editing = model
                    .editing
                    .filter(|id| todos.iter().any(|t| t.id == *id));

                Update::Next(TodoList {
                    todos,
                    editing,
                    revision,
                    saved_revision,
                    status,
                })
            }
            TodoMsg::Save if model.is_dirty() => {
                let store = Arc::clone(&context.store);
                let todos = model.todos.clone();
                let revision = model.revision;
                let effect = Effect::try_new(async move {
                    store.save(&todos).await.map(|()| revision)
                })
                .map(TodoMsg::Saved)
                .or_else(|e| TodoMsg::StoreFailed(e.to_string()));
                Update::EffectOnly(effect)
            }
            TodoMsg::Saved(revision) => Update::Next(TodoList {
                saved_revision: model.saved_revision.max(revision),
                status: format!("Saved revision {revision}"),
                ..model.clone()
            }),
            TodoMsg::StoreFailed(reason) => {
                Update::Next(model.with_status(format!("Store error: {reason}")))
            }
            _ => Update::Unchanged,
        };
        Ok(update)
    }

    fn subscribe(&self, model: &TodoList) -> Option<Subscription<TodoMsg, TodoContext>> {
        if !model.is_dirty() {
            return None;
        }

        let revision = model.revision;
        let autosave = Subscription::new(move |dispatch: &Dispatcher<TodoMsg>, context: &TodoContext| {
            let dispatch = dispatch.clone();
            let delay = context.autosave_delay;
            debug!("Autosave armed for revision {} ({:?})", revision, delay);

            let timer = tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                dispatch.dispatch(TodoMsg::Save);
            });
            let handle = timer.abort_handle();
            Some(Teardown::new(move |_: &TodoContext| handle.abort()))
        });
        Some(autosave.with_key([revision]))
    }
}
