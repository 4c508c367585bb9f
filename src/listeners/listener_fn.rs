//! # Function-backed listener (`ListenerFn`)
//!
//! [`ListenerFn`] wraps plain closures: a required trigger, an optional `then` and an
//! optional `catch`. Its [`Capability`] follows from which closures are present, so a
//! `ListenerFn` with only a trigger is `Basic` and one with all three is `WithCallback`.
//!
//! ## Example
//! ```rust
//! use typedispatch::{Capability, Listener, ListenerFn, ListenerError};
//!
//! let l = ListenerFn::new(|n: &u32| {
//!     if *n > 10 { Err(ListenerError::fail("too big")) } else { Ok(()) }
//! })
//! .with_catch(|err| eprintln!("{err}"));
//!
//! assert_eq!(l.capability(), Capability::WithCatch);
//! ```

use std::borrow::Cow;
use std::sync::Arc;

use async_trait::async_trait;

use super::listener::{Capability, Listener};
use crate::error::{EngineError, ListenerError};

type TriggerFn<E> = Box<dyn Fn(&E) -> Result<(), ListenerError> + Send + Sync>;
type ThenFn<E> = Box<dyn Fn(&E) + Send + Sync>;
type CatchFn = Box<dyn Fn(ListenerError) + Send + Sync>;

const DEFAULT_NAME: &str = "listener_fn";

/// Function-backed listener implementation.
pub struct ListenerFn<E> {
    name: Cow<'static, str>,
    trigger: TriggerFn<E>,
    then: Option<ThenFn<E>>,
    catch: Option<CatchFn>,
}

impl<E> ListenerFn<E> {
    /// Creates a `Basic` listener from a trigger function.
    pub fn new<F>(trigger: F) -> Self
    where
        F: Fn(&E) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        Self {
            name: Cow::Borrowed(DEFAULT_NAME),
            trigger: Box::new(trigger),
            then: None,
            catch: None,
        }
    }

    /// Creates the listener and returns it as a shared handle.
    pub fn arc<F>(trigger: F) -> Arc<Self>
    where
        F: Fn(&E) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        Arc::new(Self::new(trigger))
    }

    /// Starts a builder; see [`ListenerFnBuilder`].
    pub fn builder() -> ListenerFnBuilder<E> {
        ListenerFnBuilder::new()
    }

    /// Sets the name used in logs and engine events.
    pub fn with_name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Adds a success callback.
    pub fn with_then<F>(mut self, then: F) -> Self
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.then = Some(Box::new(then));
        self
    }

    /// Adds a failure callback.
    pub fn with_catch<F>(mut self, catch: F) -> Self
    where
        F: Fn(ListenerError) + Send + Sync + 'static,
    {
        self.catch = Some(Box::new(catch));
        self
    }
}

#[async_trait]
impl<E> Listener<E> for ListenerFn<E>
where
    E: Send + Sync + 'static,
{
    async fn trigger(&self, entity: &E) -> Result<(), ListenerError> {
        (self.trigger)(entity)
    }

    async fn then(&self, entity: &E) {
        if let Some(then) = &self.then {
            then(entity);
        }
    }

    async fn catch(&self, error: ListenerError) {
        if let Some(catch) = &self.catch {
            catch(error);
        }
    }

    fn capability(&self) -> Capability {
        Capability::from_flags(self.then.is_some(), self.catch.is_some())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Builder for [`ListenerFn`] with every part optional until [`build`](Self::build).
///
/// `build` fails with [`EngineError::NoTriggerFunc`] when no trigger was supplied.
///
/// # Example
/// ```rust
/// use typedispatch::{EngineError, ListenerError, ListenerFn};
///
/// let listener = ListenerFn::<u32>::builder()
///     .name("even-only")
///     .trigger(|n: &u32| {
///         if n % 2 == 0 { Ok(()) } else { Err(ListenerError::fail("odd")) }
///     })
///     .catch(|err| eprintln!("rejected: {err}"))
///     .build()?;
/// # let _ = listener;
///
/// let missing = ListenerFn::<u32>::builder().name("no-trigger").build();
/// assert!(matches!(missing, Err(EngineError::NoTriggerFunc)));
/// # Ok::<(), EngineError>(())
/// ```
pub struct ListenerFnBuilder<E> {
    name: Cow<'static, str>,
    trigger: Option<TriggerFn<E>>,
    then: Option<ThenFn<E>>,
    catch: Option<CatchFn>,
}

impl<E> ListenerFnBuilder<E> {
    /// Empty builder with the default listener name and no functions.
    pub fn new() -> Self {
        Self {
            name: Cow::Borrowed(DEFAULT_NAME),
            trigger: None,
            then: None,
            catch: None,
        }
    }

    /// Sets the name used in logs and engine events.
    pub fn name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the function run once per dispatch. Required by [`build`](Self::build).
    pub fn trigger<F>(mut self, trigger: F) -> Self
    where
        F: Fn(&E) -> Result<(), ListenerError> + Send + Sync + 'static,
    {
        self.trigger = Some(Box::new(trigger));
        self
    }

    /// Sets the callback run after the trigger succeeds.
    pub fn then<F>(mut self, then: F) -> Self
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        self.then = Some(Box::new(then));
        self
    }

    /// Sets the callback that receives the trigger's error, including a caught panic.
    pub fn catch<F>(mut self, catch: F) -> Self
    where
        F: Fn(ListenerError) + Send + Sync + 'static,
    {
        self.catch = Some(Box::new(catch));
        self
    }

    /// Builds the listener.
    ///
    /// ### Errors
    /// [`EngineError::NoTriggerFunc`] if [`trigger`](Self::trigger) was never called.
    pub fn build(self) -> Result<ListenerFn<E>, EngineError> {
        let trigger = self.trigger.ok_or(EngineError::NoTriggerFunc)?;
        Ok(ListenerFn {
            name: self.name,
            trigger,
            then: self.then,
            catch: self.catch,
        })
    }
}

impl<E> Default for ListenerFnBuilder<E> {
    fn default() -> Self {
        Self::new()
    }
}
