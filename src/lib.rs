//! Actuator library exports

pub mod core;
pub mod todo;

#[cfg(test)]
pub mod test_support;

pub use crate::core::{
    Actuator, ActuatorError, BoxError, DependencyKey, Dispatcher, Effect, Program,
    RuntimeConfig, Subscription, Teardown, Update,
};
