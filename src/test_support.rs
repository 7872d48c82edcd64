//! Test utilities shared across the crate.
//!
//! This module is only compiled during tests (`#[cfg(test)]`).

use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::core::{BoxError, Effect, Program, Subscription, Teardown, Update};
use crate::todo::store::{StoreError, TodoStore};
use crate::todo::{Todo, TodoContext};

/// Counts how often something was called.
#[derive(Debug, Clone, Default)]
pub struct Probe(Arc<AtomicUsize>);

impl Probe {
    pub fn hit(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

// ============================================================================
// DataList: a small list program
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct DataModel {
    pub data: Vec<String>,
    pub change_count: u32,
}

pub fn data(items: &[&str], change_count: u32) -> DataModel {
    DataModel {
        data: items.iter().map(|s| s.to_string()).collect(),
        change_count,
    }
}

#[derive(Debug)]
pub enum DataMsg {
    AddData(String),
    ClearData,
    LoadData,
    LoadDataSuccess(Vec<String>),
    /// Adds the value once the delay has passed.
    AddLater(String, Duration),
    /// Starts an effect whose operation fails.
    LoadBroken,
    /// Rejected by `update`.
    Explode,
    Ignored,
}

/// How `DataList` keys its subscription.
#[derive(Debug, Clone, Copy)]
pub enum Keyed {
    Unkeyed,
    ChangeCount,
    Constant,
}

#[derive(Debug, Clone)]
struct Probes {
    keyed: Keyed,
    subscribed: Probe,
    setups: Probe,
    teardowns: Probe,
    echo: bool,
    farewell: bool,
    fail_at: Option<u32>,
}

#[derive(Debug, Default)]
pub struct DataList {
    probes: Option<Probes>,
}

impl DataList {
    fn with_probes(probes: Probes) -> Self {
        Self {
            probes: Some(probes),
        }
    }

    pub fn unkeyed(subscribed: Probe, setups: Probe, teardowns: Probe) -> Self {
        Self::with_probes(Probes {
            keyed: Keyed::Unkeyed,
            subscribed,
            setups,
            teardowns,
            echo: false,
            farewell: false,
            fail_at: None,
        })
    }

    pub fn keyed(keyed: Keyed, setups: Probe, teardowns: Probe) -> Self {
        Self::with_probes(Probes {
            keyed,
            subscribed: Probe::default(),
            setups,
            teardowns,
            echo: false,
            farewell: false,
            fail_at: None,
        })
    }

    /// Subscription whose setup dispatches `AddData("echo")` once.
    pub fn echoing() -> Self {
        Self::with_probes(Probes {
            keyed: Keyed::Constant,
            subscribed: Probe::default(),
            setups: Probe::default(),
            teardowns: Probe::default(),
            echo: true,
            farewell: false,
            fail_at: None,
        })
    }

    /// Keyed by change count; tearing down the first subscription
    /// dispatches `AddData("farewell")`.
    pub fn farewell() -> Self {
        Self::with_probes(Probes {
            keyed: Keyed::ChangeCount,
            subscribed: Probe::default(),
            setups: Probe::default(),
            teardowns: Probe::default(),
            echo: false,
            farewell: true,
            fail_at: None,
        })
    }

    /// Keyed by change count; setup fails for the given count.
    pub fn failing_at(change_count: u32, setups: Probe) -> Self {
        Self::with_probes(Probes {
            keyed: Keyed::ChangeCount,
            subscribed: Probe::default(),
            setups,
            teardowns: Probe::default(),
            echo: false,
            farewell: false,
            fail_at: Some(change_count),
        })
    }
}

impl Program for DataList {
    type Model = DataModel;
    type Message = DataMsg;
    type Context = ();

    fn init(&self, _context: &()) -> DataModel {
        data(&["init"], 0)
    }

    fn update(
        &self,
        model: &DataModel,
        message: DataMsg,
        _context: &(),
    ) -> Result<Update<DataModel, DataMsg>, BoxError> {
        let next = |data: Vec<String>| DataModel {
            data,
            change_count: model.change_count + 1,
        };

        Ok(match message {
            DataMsg::AddData(value) => {
                let mut data = model.data.clone();
                data.push(value);
                Update::Next(next(data))
            }
            DataMsg::ClearData => Update::Next(next(Vec::new())),
            DataMsg::LoadData => {
                let loaded = vec!["a".to_string(), "b".to_string(), "c".to_string()];
                Update::EffectOnly(Effect::after(
                    Duration::from_millis(10),
                    DataMsg::LoadDataSuccess(loaded),
                ))
            }
            DataMsg::LoadDataSuccess(data) => Update::Next(next(data)),
            DataMsg::AddLater(value, delay) => {
                Update::EffectOnly(Effect::after(delay, DataMsg::AddData(value)))
            }
            DataMsg::LoadBroken => Update::EffectOnly(Effect::try_new(async {
                Err::<DataMsg, _>(io::Error::other("backend unreachable"))
            })),
            DataMsg::Explode => return Err("explode is not a valid message here".into()),
            DataMsg::Ignored => Update::Unchanged,
        })
    }

    fn subscribe(&self, model: &DataModel) -> Option<Subscription<DataMsg, ()>> {
        let probes = self.probes.clone()?;
        probes.subscribed.hit();

        let keyed = probes.keyed;
        let fail = probes.fail_at == Some(model.change_count);
        let farewell = probes.farewell && model.change_count == 0;
        let subscription = Subscription::try_new(move |dispatch, _| {
            probes.setups.hit();
            if fail {
                return Err(BoxError::from("setup refused"));
            }
            if probes.echo {
                dispatch.dispatch(DataMsg::AddData("echo".to_string()));
            }
            let teardowns = probes.teardowns.clone();
            let dispatch = dispatch.clone();
            Ok(Some(Teardown::new(move |_| {
                teardowns.hit();
                if farewell {
                    dispatch.dispatch(DataMsg::AddData("farewell".to_string()));
                }
            })))
        });

        Some(match keyed {
            Keyed::Unkeyed => subscription,
            Keyed::ChangeCount => subscription.with_key([model.change_count]),
            Keyed::Constant => subscription.with_key(["constant"]),
        })
    }
}

/// Model starts at the context; every message adds the context again.
pub struct Accumulate;

impl Program for Accumulate {
    type Model = i64;
    type Message = ();
    type Context = i64;

    fn init(&self, context: &i64) -> i64 {
        *context
    }

    fn update(&self, model: &i64, _message: (), context: &i64) -> Result<Update<i64, ()>, BoxError> {
        Ok(Update::Next(model + context))
    }
}

// ============================================================================
// Todo store double
// ============================================================================

/// In-memory `TodoStore` that can be told to fail.
#[derive(Default)]
pub struct MemoryStore {
    todos: Mutex<Vec<Todo>>,
    pub saves: Probe,
    pub fail: bool,
}

impl MemoryStore {
    pub fn with_todos(todos: Vec<Todo>) -> Self {
        Self {
            todos: Mutex::new(todos),
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn snapshot(&self) -> Vec<Todo> {
        self.todos.lock().unwrap().clone()
    }
}

#[async_trait]
impl TodoStore for MemoryStore {
    fn name(&self) -> &str {
        "memory"
    }

    async fn load(&self) -> Result<Vec<Todo>, StoreError> {
        if self.fail {
            return Err(StoreError::Io(io::Error::other("memory store offline")));
        }
        Ok(self.snapshot())
    }

    async fn save(&self, todos: &[Todo]) -> Result<(), StoreError> {
        if self.fail {
            return Err(StoreError::Io(io::Error::other("memory store offline")));
        }
        *self.todos.lock().unwrap() = todos.to_vec();
        self.saves.hit();
        Ok(())
    }
}

/// A todo context backed by `store`, with a short autosave delay.
pub fn test_context(store: Arc<MemoryStore>) -> TodoContext {
    TodoContext::new(store, Duration::from_millis(20))
}
