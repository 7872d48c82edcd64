//! # Actuator
//!
//! Owns the current model and runs the loop for one [`Program`]:
//!
//! ```text
//! dispatch(msg) ──► queue ──► update(model, msg, ctx)
//!                                 │
//!                   ┌─────────────┼──────────────────┐
//!                   ▼             ▼                  ▼
//!               Unchanged   Next(model)     ...WithEffect / EffectOnly
//!               (skip)          │                  │
//!                               ▼                  ▼
//!                     reconcile subscription   tokio::spawn(effect)
//!                               │                  │
//!                               ▼                  ▼
//!                      next_model() returns   message ──► queue
//! ```
//!
//! Everything the program supplies (`update`, `subscribe`, setup, teardown)
//! runs inside `next_model()` or `stop()`, which take `&mut self`, so they
//! never overlap. A dispatch made from inside any of them is only queued.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::Stream;
use log::{debug, info, warn};

use crate::core::config::RuntimeConfig;
use crate::core::dispatch::{self, Dispatcher, MessageQueue};
use crate::core::effect::Effect;
use crate::core::error::ActuatorError;
use crate::core::program::{Program, Update};
use crate::core::subscription::{SubscriptionRegistry, Transition};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Created; the initial subscription has not been reconciled yet.
    Idle,
    Running,
    Stopped,
}

pub struct Actuator<P: Program> {
    program: P,
    context: P::Context,
    initial_model: P::Model,
    model: P::Model,
    dispatcher: Dispatcher<P::Message>,
    queue: MessageQueue<P::Message>,
    registry: SubscriptionRegistry<P::Context>,
    in_flight: Arc<AtomicUsize>,
    config: RuntimeConfig,
    phase: Phase,
    version: u64,
}

impl<P: Program> Actuator<P> {
    pub fn new(program: P, context: P::Context) -> Self {
        Self::with_config(program, context, RuntimeConfig::default())
    }

    /// Runs `init` right away. Subscriptions start on the first pull.
    pub fn with_config(program: P, context: P::Context, config: RuntimeConfig) -> Self {
        let initial_model = program.init(&context);
        let (dispatcher, queue) = dispatch::channel();
        info!(
            "[{}] Actuator created (effect timeout: {:?})",
            config.label, config.effect_timeout
        );

        Self {
            program,
            context,
            model: initial_model.clone(),
            initial_model,
            dispatcher,
            queue,
            registry: SubscriptionRegistry::new(),
            in_flight: Arc::new(AtomicUsize::new(0)),
            config,
            phase: Phase::Idle,
            version: 0,
        }
    }

    /// The model produced by `init`.
    pub fn initial_model(&self) -> &P::Model {
        &self.initial_model
    }

    /// The most recently adopted model.
    pub fn model(&self) -> &P::Model {
        &self.model
    }

    pub fn context(&self) -> &P::Context {
        &self.context
    }

    /// A handle for enqueueing messages from anywhere.
    pub fn dispatcher(&self) -> Dispatcher<P::Message> {
        self.dispatcher.clone()
    }

    pub fn dispatch(&self, message: P::Message) {
        self.dispatcher.dispatch(message);
    }

    /// Number of models published so far (0 = still on the initial model).
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Messages queued but not yet processed.
    pub fn pending_messages(&self) -> usize {
        self.queue.pending()
    }

    /// Effects spawned that have not settled yet.
    pub fn in_flight_effects(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn is_stopped(&self) -> bool {
        self.phase == Phase::Stopped
    }

    /// Wait for the next published model.
    ///
    /// Messages that leave the model unchanged are consumed without
    /// returning. An `update` failure fails this call only; the following
    /// call continues with the next queued message.
    ///
    /// Cancel safe: dropping the future while it waits loses no message.
    pub async fn next_model(&mut self) -> Result<P::Model, ActuatorError> {
        if self.phase == Phase::Idle {
            self.phase = Phase::Running;
            self.reconcile()?;
        }

        loop {
            if self.phase == Phase::Stopped {
                return Err(ActuatorError::Stopped);
            }
            let Some(message) = self.queue.next().await else {
                return Err(ActuatorError::Stopped);
            };
            if let Some(model) = self.process(message)? {
                return Ok(model);
            }
        }
    }

    /// The snapshot sequence as a stream. The stream owns the actuator, so
    /// nothing can stop it afterwards: it ends right away if `stop()` was
    /// called before the conversion, and never ends otherwise.
    pub fn into_stream(self) -> impl Stream<Item = Result<P::Model, ActuatorError>> {
        futures::stream::unfold(self, |mut actuator| async move {
            match actuator.next_model().await {
                Err(ActuatorError::Stopped) => None,
                item => Some((item, actuator)),
            }
        })
    }

    /// Tear down the active subscription and close the queue. Effects still
    /// in flight keep running, but whatever they produce is discarded.
    pub fn stop(&mut self) {
        if self.phase == Phase::Stopped {
            return;
        }
        self.phase = Phase::Stopped;

        if self.registry.dispose(&self.context) {
            debug!("[{}] Final subscription teardown", self.config.label);
        }
        self.queue.close();
        info!(
            "[{}] Actuator stopped after {} publications ({} effects in flight)",
            self.config.label,
            self.version,
            self.in_flight_effects()
        );
    }

    fn process(&mut self, message: P::Message) -> Result<Option<P::Model>, ActuatorError> {
        let update = self
            .program
            .update(&self.model, message, &self.context)
            .map_err(|e| {
                warn!("[{}] Update failed: {}", self.config.label, e);
                ActuatorError::Update(e)
            })?;

        match update {
            Update::Unchanged => {
                debug!("[{}] Message left the model unchanged", self.config.label);
                Ok(None)
            }
            Update::EffectOnly(effect) => {
                self.spawn_effect(effect);
                Ok(None)
            }
            Update::Next(model) => self.publish(model).map(Some),
            Update::NextWithEffect(model, effect) => {
                self.spawn_effect(effect);
                self.publish(model).map(Some)
            }
        }
    }

    fn publish(&mut self, model: P::Model) -> Result<P::Model, ActuatorError> {
        self.model = model;
        self.version += 1;
        debug!("[{}] Publishing version {}", self.config.label, self.version);
        self.reconcile()?;
        Ok(self.model.clone())
    }

    fn reconcile(&mut self) -> Result<Transition, ActuatorError> {
        let candidate = self.program.subscribe(&self.model);
        let transition = self
            .registry
            .reconcile(candidate, &self.dispatcher, &self.context)
            .map_err(|e| {
                warn!("[{}] Subscription setup failed: {}", self.config.label, e);
                ActuatorError::Subscription(e)
            })?;

        if transition != Transition::Idle {
            debug!(
                "[{}] Subscription {:?} (key: {:?})",
                self.config.label,
                transition,
                self.registry.active_key()
            );
        }
        Ok(transition)
    }

    fn spawn_effect(&self, effect: Effect<P::Message>) {
        let dispatcher = self.dispatcher.clone();
        let timeout = self.config.effect_timeout;
        let guard = InFlight::enter(&self.in_flight);
        debug!(
            "[{}] Spawning effect ({} in flight)",
            self.config.label,
            self.in_flight_effects()
        );

        tokio::spawn(async move {
            if let Some(message) = effect.settle(timeout).await {
                dispatcher.dispatch(message);
            }
            drop(guard);
        });
    }
}

impl<P: Program> Drop for Actuator<P> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Counts an effect as in flight until dropped, even if its task panics.
struct InFlight(Arc<AtomicUsize>);

impl InFlight {
    fn enter(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
