use std::fmt;

/// Type-erased error returned by `update()` and subscription setup.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced to whoever pulls snapshots from an `Actuator`.
/// Each one fails the current pull only; the next pull carries on.
#[derive(Debug)]
pub enum ActuatorError {
    /// `update()` rejected a message. The model was not advanced.
    Update(BoxError),
    /// A subscription's setup failed while publishing a model.
    /// The model was adopted, but no subscription is active.
    Subscription(BoxError),
    /// The actuator was stopped; no further snapshots will be produced.
    Stopped,
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActuatorError::Update(e) => write!(f, "update failed: {e}"),
            ActuatorError::Subscription(e) => write!(f, "subscription setup failed: {e}"),
            ActuatorError::Stopped => write!(f, "actuator stopped"),
        }
    }
}

impl std::error::Error for ActuatorError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ActuatorError::Update(e) | ActuatorError::Subscription(e) => Some(e.as_ref()),
            ActuatorError::Stopped => None,
        }
    }
}
