//! # Subscriptions
//!
//! A program may ask for one long-lived side effect per model, e.g. a timer
//! or an autosave task. After each published model the actuator calls
//! `subscribe(&model)` and hands the candidate to the [`SubscriptionRegistry`],
//! which decides whether to keep, replace or drop the running one.
//!
//! ```text
//!              candidate (key K')
//!                    │
//!   absent ──────────┼──► setup ──────────────────► active(K')
//!   active(K) ── K == K' ──► keep, nothing runs ──► active(K)
//!   active(K) ── K != K' ──► teardown(K), setup ──► active(K')
//!   active(K) ── no candidate ──► teardown(K) ────► absent
//! ```
//!
//! Keys compare element by element. A subscription without a key never
//! matches anything, so it is torn down and set up again on every publication.

use std::fmt;

use crate::core::dispatch::Dispatcher;
use crate::core::error::BoxError;

type SetupFn<M, C> =
    Box<dyn FnOnce(&Dispatcher<M>, &C) -> Result<Option<Teardown<C>>, BoxError> + Send>;

/// Cleanup returned by a subscription's setup. Runs at most once.
pub struct Teardown<C> {
    run: Box<dyn FnOnce(&C) + Send>,
}

impl<C: 'static> Teardown<C> {
    pub fn new<F>(f: F) -> Self
    where
        F: FnOnce(&C) + Send + 'static,
    {
        Self { run: Box::new(f) }
    }
}

impl<C> Teardown<C> {
    fn run(self, context: &C) {
        (self.run)(context)
    }
}

/// One element of a dependency key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyPart {
    Bool(bool),
    Int(i64),
    UInt(u64),
    Char(char),
    Str(String),
}

macro_rules! key_part_from {
    ($variant:ident as $target:ty: $($source:ty),+) => {
        $(
            impl From<$source> for KeyPart {
                fn from(value: $source) -> Self {
                    KeyPart::$variant(value as $target)
                }
            }
        )+
    };
}

key_part_from!(Int as i64: i8, i16, i32, i64, isize);
key_part_from!(UInt as u64: u8, u16, u32, u64, usize);

impl From<bool> for KeyPart {
    fn from(value: bool) -> Self {
        KeyPart::Bool(value)
    }
}

impl From<char> for KeyPart {
    fn from(value: char) -> Self {
        KeyPart::Char(value)
    }
}

impl From<&str> for KeyPart {
    fn from(value: &str) -> Self {
        KeyPart::Str(value.to_string())
    }
}

impl From<String> for KeyPart {
    fn from(value: String) -> Self {
        KeyPart::Str(value)
    }
}

/// Ordered list of values a subscription depends on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct DependencyKey(Vec<KeyPart>);

impl DependencyKey {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a part, builder style.
    pub fn with(mut self, part: impl Into<KeyPart>) -> Self {
        self.0.push(part.into());
        self
    }
}

impl<T: Into<KeyPart>, const N: usize> From<[T; N]> for DependencyKey {
    fn from(parts: [T; N]) -> Self {
        parts.into_iter().collect()
    }
}

impl<T: Into<KeyPart>> From<Vec<T>> for DependencyKey {
    fn from(parts: Vec<T>) -> Self {
        parts.into_iter().collect()
    }
}

impl<T: Into<KeyPart>> FromIterator<T> for DependencyKey {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        DependencyKey(iter.into_iter().map(Into::into).collect())
    }
}

/// Descriptor returned from `Program::subscribe`.
///
/// `setup` receives the dispatcher and the program context explicitly and may
/// return a [`Teardown`]. It only runs when the registry decides this
/// subscription is new.
pub struct Subscription<M, C> {
    setup: SetupFn<M, C>,
    key: Option<DependencyKey>,
}

impl<M: 'static, C: 'static> Subscription<M, C> {
    pub fn new<F>(setup: F) -> Self
    where
        F: FnOnce(&Dispatcher<M>, &C) -> Option<Teardown<C>> + Send + 'static,
    {
        Self {
            setup: Box::new(move |dispatcher, context| Ok(setup(dispatcher, context))),
            key: None,
        }
    }

    /// Like [`Subscription::new`], for setups that can fail.
    pub fn try_new<F, E>(setup: F) -> Self
    where
        F: FnOnce(&Dispatcher<M>, &C) -> Result<Option<Teardown<C>>, E> + Send + 'static,
        E: Into<BoxError>,
    {
        Self {
            setup: Box::new(move |dispatcher, context| setup(dispatcher, context).map_err(Into::into)),
            key: None,
        }
    }

    pub fn with_key(mut self, key: impl Into<DependencyKey>) -> Self {
        self.key = Some(key.into());
        self
    }
}

impl<M, C> Subscription<M, C> {
    pub fn key(&self) -> Option<&DependencyKey> {
        self.key.as_ref()
    }
}

impl<M, C> fmt::Debug for Subscription<M, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// What a reconciliation did to the active subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Nothing active, nothing requested.
    Idle,
    /// absent → active
    Added,
    /// Same key; the running subscription was kept.
    Retained,
    /// Key changed; old one torn down before the new one was set up.
    Replaced,
    /// Candidate withdrawn; torn down.
    Removed,
}

struct ActiveEntry<C> {
    key: Option<DependencyKey>,
    teardown: Option<Teardown<C>>,
}

impl<C> ActiveEntry<C> {
    fn tear_down(self, context: &C) {
        if let Some(teardown) = self.teardown {
            teardown.run(context);
        }
    }
}

/// Holds the single active subscription of an actuator.
pub struct SubscriptionRegistry<C> {
    active: Option<ActiveEntry<C>>,
}

impl<C> Default for SubscriptionRegistry<C> {
    fn default() -> Self {
        Self { active: None }
    }
}

impl<C> SubscriptionRegistry<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn active_key(&self) -> Option<&DependencyKey> {
        self.active.as_ref().and_then(|entry| entry.key.as_ref())
    }

    /// Reconcile the active subscription against a new candidate.
    ///
    /// The previous teardown always runs before the candidate's setup. If
    /// setup fails, the registry ends up empty: the old entry is already
    /// gone and the failed one is never recorded, so nothing is torn down
    /// twice.
    pub fn reconcile<M>(
        &mut self,
        candidate: Option<Subscription<M, C>>,
        dispatcher: &Dispatcher<M>,
        context: &C,
    ) -> Result<Transition, BoxError> {
        match (self.active.take(), candidate) {
            (None, None) => Ok(Transition::Idle),
            (Some(entry), None) => {
                entry.tear_down(context);
                Ok(Transition::Removed)
            }
            (Some(entry), Some(candidate)) if same_key(entry.key.as_ref(), candidate.key()) => {
                self.active = Some(entry);
                Ok(Transition::Retained)
            }
            (previous, Some(candidate)) => {
                let replaced = previous.is_some();
                if let Some(entry) = previous {
                    entry.tear_down(context);
                }

                let Subscription { setup, key } = candidate;
                let teardown = setup(dispatcher, context)?;
                self.active = Some(ActiveEntry { key, teardown });

                Ok(if replaced {
                    Transition::Replaced
                } else {
                    Transition::Added
                })
            }
        }
    }

    /// Final teardown. Returns true if a subscription was active.
    pub fn dispose(&mut self, context: &C) -> bool {
        match self.active.take() {
            Some(entry) => {
                entry.tear_down(context);
                true
            }
            None => false,
        }
    }
}

/// Missing keys never match, not even each other.
fn same_key(active: Option<&DependencyKey>, candidate: Option<&DependencyKey>) -> bool {
    matches!((active, candidate), (Some(a), Some(b)) if a == b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::dispatch;
    use std::sync::{Arc, Mutex};

    type Log = Arc<Mutex<Vec<String>>>;

    /// Subscription that records its setup and teardown into `log`.
    fn tracked(log: &Log, name: &str) -> Subscription<(), ()> {
        let log = Arc::clone(log);
        let name = name.to_string();
        Subscription::new(move |_, _| {
            log.lock().unwrap().push(format!("setup {name}"));
            Some(Teardown::new(move |_| {
                log.lock().unwrap().push(format!("teardown {name}"));
            }))
        })
    }

    fn entries(log: &Log) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    #[test]
    fn test_key_from_array_compares_element_wise() {
        let a = DependencyKey::from([1u32, 2]);
        let b = DependencyKey::new().with(1u8).with(2usize);
        assert_eq!(a, b);
        assert_ne!(a, DependencyKey::from([2u32, 1]));
        assert_ne!(a, DependencyKey::from([1u32]));
    }

    #[test]
    fn test_key_parts_of_different_kinds_differ() {
        assert_ne!(KeyPart::from(1i32), KeyPart::from(1u32));
        assert_eq!(KeyPart::from("a"), KeyPart::from('a'.to_string()));
    }

    #[test]
    fn test_absent_key_is_never_same() {
        assert!(!same_key(None, None));
        let key = DependencyKey::from([0u8]);
        assert!(!same_key(Some(&key), None));
        assert!(same_key(Some(&key), Some(&key.clone())));
    }

    #[test]
    fn test_lifecycle_add_retain_replace_remove() {
        let log = Log::default();
        let (dispatcher, _queue) = dispatch::channel();
        let mut registry = SubscriptionRegistry::new();

        let step = registry.reconcile(Some(tracked(&log, "a").with_key([1])), &dispatcher, &());
        assert_eq!(step.unwrap(), Transition::Added);

        let step = registry.reconcile(Some(tracked(&log, "b").with_key([1])), &dispatcher, &());
        assert_eq!(step.unwrap(), Transition::Retained);

        let step = registry.reconcile(Some(tracked(&log, "c").with_key([2])), &dispatcher, &());
        assert_eq!(step.unwrap(), Transition::Replaced);
        assert_eq!(registry.active_key(), Some(&DependencyKey::from([2])));

        let step = registry.reconcile::<()>(None, &dispatcher, &());
        assert_eq!(step.unwrap(), Transition::Removed);
        assert!(!registry.is_active());

        assert_eq!(
            entries(&log),
            vec!["setup a", "teardown a", "setup c", "teardown c"]
        );
    }

    #[test]
    fn test_unkeyed_subscription_churns_every_time() {
        let log = Log::default();
        let (dispatcher, _queue) = dispatch::channel();
        let mut registry = SubscriptionRegistry::new();

        for _ in 0..3 {
            registry
                .reconcile(Some(tracked(&log, "x")), &dispatcher, &())
                .unwrap();
        }

        assert_eq!(
            entries(&log),
            vec!["setup x", "teardown x", "setup x", "teardown x", "setup x"]
        );
    }

    #[test]
    fn test_idle_without_candidates() {
        let (dispatcher, _queue) = dispatch::channel::<()>();
        let mut registry = SubscriptionRegistry::<()>::new();
        assert_eq!(
            registry.reconcile::<()>(None, &dispatcher, &()).unwrap(),
            Transition::Idle
        );
        assert!(!registry.dispose(&()));
    }

    #[test]
    fn test_failed_setup_leaves_registry_empty() {
        let log = Log::default();
        let (dispatcher, _queue) = dispatch::channel();
        let mut registry = SubscriptionRegistry::new();

        registry
            .reconcile(Some(tracked(&log, "a").with_key([1])), &dispatcher, &())
            .unwrap();

        let broken: Subscription<(), ()> =
            Subscription::try_new(|_, _| Err("no timer available")).with_key([2]);
        let result = registry.reconcile(Some(broken), &dispatcher, &());

        assert_eq!(result.unwrap_err().to_string(), "no timer available");
        assert!(!registry.is_active());
        // The old entry was torn down exactly once, before the failed setup.
        assert!(!registry.dispose(&()));
        assert_eq!(entries(&log), vec!["setup a", "teardown a"]);
    }

    #[test]
    fn test_setup_receives_dispatcher_and_context() {
        let (dispatcher, mut queue) = dispatch::channel::<u32>();
        let mut registry = SubscriptionRegistry::<u32>::new();

        let sub = Subscription::new(|dispatch: &Dispatcher<u32>, ctx: &u32| {
            dispatch.dispatch(*ctx * 2);
            None
        });
        registry.reconcile(Some(sub), &dispatcher, &21).unwrap();

        assert_eq!(queue.pending(), 1);
        let mut next = tokio_test::task::spawn(queue.next());
        assert_eq!(next.poll(), std::task::Poll::Ready(Some(42)));
    }

    #[test]
    fn test_dispose_runs_final_teardown() {
        let log = Log::default();
        let (dispatcher, _queue) = dispatch::channel();
        let mut registry = SubscriptionRegistry::new();
        registry
            .reconcile(Some(tracked(&log, "a").with_key(["only"])), &dispatcher, &())
            .unwrap();

        assert!(registry.dispose(&()));
        assert!(!registry.dispose(&()));
        assert_eq!(entries(&log), vec!["setup a", "teardown a"]);
    }
}
