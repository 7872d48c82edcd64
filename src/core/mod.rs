//! # Core State Container
//!
//! A message-driven, single-owner state loop. It knows nothing about any
//! rendering layer: callers supply a pure [`Program`] and consume model
//! snapshots.
//!
//! ```text
//!                    ┌─────────────────────────┐
//!                    │         CORE            │
//!                    │  (this module)          │
//!                    │                         │
//!                    │  • Program (init/update)│
//!                    │  • Effect (async → msg) │
//!                    │  • Subscription (keyed) │
//!                    │  • Actuator (the loop)  │
//!                    └───────────┬─────────────┘
//!                                │
//!            ┌───────────────────┼───────────────────┐
//!            ▼                   ▼                   ▼
//!     ┌────────────┐      ┌────────────┐      ┌────────────┐
//!     │    CLI     │      │   Tests    │      │  Any view  │
//!     │  (stdin)   │      │            │      │  adapter   │
//!     └────────────┘      └────────────┘      └────────────┘
//!       dispatch(msg) in, next_model() snapshots out
//! ```
//!
//! ## Modules
//!
//! - [`program`]: the `Program` trait and the `Update` outcome
//! - [`actuator`]: the loop that owns the model
//! - [`dispatch`]: the queue and its `Dispatcher` handle
//! - [`effect`]: async work that feeds one message back
//! - [`subscription`]: keyed setup/teardown reconciliation
//! - [`config`]: runtime settings and config file resolution

pub mod actuator;
pub mod config;
pub mod dispatch;
pub mod effect;
pub mod error;
pub mod program;
pub mod subscription;

pub use actuator::Actuator;
pub use config::RuntimeConfig;
pub use dispatch::Dispatcher;
pub use effect::{Effect, EffectTimeout};
pub use error::{ActuatorError, BoxError};
pub use program::{Program, Update};
pub use subscription::{
    DependencyKey, KeyPart, Subscription, SubscriptionRegistry, Teardown, Transition,
};
