//! Generic finite state machine.
//!
//! Handlers are the nodes and transitions the edges, keyed by
//! `(from, event)`. Moving along an edge runs the current handler's `exit`
//! callback and then the next handler's `enter` callback. A failing callback
//! is logged and never aborts the transition.

use std::{
    error::Error,
    fmt,
    panic::{AssertUnwindSafe, catch_unwind},
};

use tracing::{debug, warn};

/// What a handler callback returns.
pub type CallbackResult = Result<(), Box<dyn Error + Send + Sync>>;

/// Callbacks receive the name of the other handler and the triggering event.
type Callback<E> = Box<dyn FnMut(&str, &E) -> CallbackResult + Send>;

/// Index of a handler inside its machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(usize);

/// A named state with its entry and exit actions.
pub struct Handler<E> {
    name: String,
    enter: Callback<E>,
    exit: Callback<E>,
}

impl<E> Handler<E> {
    /// `enter` gets the handler being left, `exit` the handler being entered.
    pub fn new<Enter, Exit>(name: impl Into<String>, enter: Enter, exit: Exit) -> Self
    where
        Enter: FnMut(&str, &E) -> CallbackResult + Send + 'static,
        Exit: FnMut(&str, &E) -> CallbackResult + Send + 'static,
    {
        Self {
            name: name.into(),
            enter: Box::new(enter),
            exit: Box::new(exit),
        }
    }

    /// A handler with no side effects.
    pub fn passive(name: impl Into<String>) -> Self {
        Self::new(name, |_, _| Ok(()), |_, _| Ok(()))
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<E> fmt::Debug for Handler<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler").field("name", &self.name).finish_non_exhaustive()
    }
}

#[derive(Clone, Copy, Debug)]
enum Phase {
    Enter,
    Exit,
}

/// Run one callback, swallowing both errors and panics.
fn run_callback<E: fmt::Debug>(
    callback: &mut Callback<E>,
    phase: Phase,
    handler: &str,
    other: &str,
    event: &E,
) {
    match catch_unwind(AssertUnwindSafe(|| callback(other, event))) {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            warn!(handler, ?phase, ?event, error = %err, "State handler callback failed");
        }
        Err(_) => {
            warn!(handler, ?phase, ?event, "State handler callback panicked");
        }
    }
}

/// A finite state machine over events of type `E`.
pub struct StateMachine<E> {
    handlers: Vec<Handler<E>>,
    /// Outgoing edges, indexed like `handlers`
    edges: Vec<Vec<(E, HandlerId)>>,
    current: HandlerId,
    last_event: E,
    dead_end_logged: bool,
}

impl<E: PartialEq + fmt::Debug> StateMachine<E> {
    /// Create a machine sitting in `initial`. The initial handler's `enter`
    /// runs once, right here, with itself as the origin.
    pub fn new(initial_event: E, initial: Handler<E>) -> Self {
        let mut machine = Self {
            handlers: vec![initial],
            edges: vec![Vec::new()],
            current: HandlerId(0),
            last_event: initial_event,
            dead_end_logged: false,
        };

        let Self {
            handlers,
            last_event,
            ..
        } = &mut machine;
        let handler = &mut handlers[0];
        let name = handler.name.clone();
        run_callback(&mut handler.enter, Phase::Enter, &name, &name, last_event);

        machine
    }

    /// The handler the machine was created with.
    #[must_use]
    pub const fn initial(&self) -> HandlerId {
        HandlerId(0)
    }

    /// Add a handler without any edges.
    pub fn add_handler(&mut self, handler: Handler<E>) -> HandlerId {
        self.handlers.push(handler);
        self.edges.push(Vec::new());
        HandlerId(self.handlers.len() - 1)
    }

    /// Install the edge `from --event--> to`.
    ///
    /// Returns `false` without touching the graph when `from` already has an
    /// edge for `event` or when either handler belongs to another machine.
    pub fn register(&mut self, from: HandlerId, to: HandlerId, event: E) -> bool {
        if to.0 >= self.handlers.len() || from.0 >= self.handlers.len() {
            warn!(?from, ?to, ?event, "Rejecting transition between unknown handlers");
            return false;
        }

        if let Some((_, existing)) = self.edges[from.0].iter().find(|(e, _)| *e == event) {
            warn!(
                from = %self.handlers[from.0].name,
                to = %self.handlers[to.0].name,
                existing = %self.handlers[existing.0].name,
                ?event,
                "Rejecting duplicate transition registration"
            );
            return false;
        }

        self.edges[from.0].push((event, to));
        true
    }

    /// Follow the edge for `event` out of the current handler.
    ///
    /// Returns `false`, leaving the current handler unchanged, when there is
    /// no such edge.
    pub fn transition(&mut self, event: E) -> bool {
        let from = self.current;
        let edges = &self.edges[from.0];

        if edges.is_empty() {
            if !self.dead_end_logged {
                debug!(
                    handler = %self.handlers[from.0].name,
                    "State machine has no exit condition from this handler"
                );
                self.dead_end_logged = true;
            }
            return false;
        }

        let Some(&(_, to)) = edges.iter().find(|(e, _)| *e == event) else {
            return false;
        };

        let from_name = self.handlers[from.0].name.clone();
        let to_name = self.handlers[to.0].name.clone();

        run_callback(
            &mut self.handlers[from.0].exit,
            Phase::Exit,
            &from_name,
            &to_name,
            &event,
        );
        run_callback(
            &mut self.handlers[to.0].enter,
            Phase::Enter,
            &to_name,
            &from_name,
            &event,
        );

        debug!(from = %from_name, to = %to_name, ?event, "State machine transition");
        self.current = to;
        self.last_event = event;
        true
    }

    #[must_use]
    pub const fn current(&self) -> HandlerId {
        self.current
    }

    #[must_use]
    pub fn current_name(&self) -> &str {
        &self.handlers[self.current.0].name
    }

    /// The event of the last successful transition, or the initial event.
    #[must_use]
    pub const fn last_event(&self) -> &E {
        &self.last_event
    }

    #[must_use]
    pub fn handler_name(&self, id: HandlerId) -> Option<&str> {
        self.handlers.get(id.0).map(Handler::name)
    }
}

impl<E: fmt::Debug> fmt::Debug for StateMachine<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StateMachine")
            .field("current", &self.handlers[self.current.0].name)
            .field("last_event", &self.last_event)
            .field("handlers", &self.handlers.len())
            .finish_non_exhaustive()
    }
}
