//! # Programs
//!
//! A `Program` is the pure half of the loop: how to build the first model,
//! how each message turns the current model into the next one, and which
//! subscription (if any) a model wants running.
//!
//! ```text
//! init(context)                   → Model
//! update(model, message, context) → Update
//! subscribe(model)                → Option<Subscription>
//! ```
//!
//! `update` never mutates: it borrows the current model and returns a new
//! one. Unknown messages should fall through to `Update::Unchanged`.

use crate::core::effect::Effect;
use crate::core::error::BoxError;
use crate::core::subscription::Subscription;

/// Outcome of `Program::update` for one message.
#[derive(Debug)]
pub enum Update<Model, Msg> {
    /// Message not handled. No publication, no effect.
    Unchanged,
    /// Replace the model and publish it.
    Next(Model),
    /// Replace and publish the model; run the effect in the background.
    NextWithEffect(Model, Effect<Msg>),
    /// Keep the current model, run the effect. Nothing is published.
    EffectOnly(Effect<Msg>),
}

impl<Model, Msg> Update<Model, Msg> {
    /// The next model, if this update replaces it.
    pub fn model(&self) -> Option<&Model> {
        match self {
            Update::Next(model) | Update::NextWithEffect(model, _) => Some(model),
            Update::Unchanged | Update::EffectOnly(_) => None,
        }
    }
}

pub trait Program {
    type Model: Clone;
    type Message: Send + 'static;
    /// Fixed for the actuator's lifetime. Use `()` when not needed.
    type Context: 'static;

    fn init(&self, context: &Self::Context) -> Self::Model;

    /// Compute the next state. An `Err` is reported to whoever is pulling
    /// snapshots; the model stays as it was.
    fn update(
        &self,
        model: &Self::Model,
        message: Self::Message,
        context: &Self::Context,
    ) -> Result<Update<Self::Model, Self::Message>, BoxError>;

    /// Called after every publication. The default wants no subscription.
    fn subscribe(
        &self,
        _model: &Self::Model,
    ) -> Option<Subscription<Self::Message, Self::Context>> {
        None
    }
}
