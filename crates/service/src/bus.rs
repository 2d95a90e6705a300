//! Message bus: routes commands and events to their handlers.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use common::BatchRef;
use domain::{Command, CommandKind, Event, EventKind, Message};
use futures_util::future::BoxFuture;
use store::ProductStore;

use crate::error::{Result, ServiceError};
use crate::unit_of_work::UnitOfWork;

/// Future returned by a registered handler.
pub type HandlerFuture<T> = BoxFuture<'static, Result<T>>;

/// A command handler with its collaborators already bound.
pub type CommandHandler<S> =
    Box<dyn Fn(Command, Arc<UnitOfWork<S>>) -> HandlerFuture<Option<BatchRef>> + Send + Sync>;

/// An event handler with its collaborators already bound.
///
/// Resolves to the follow-up commands the bus should process next.
pub type EventHandler<S> =
    Box<dyn Fn(Event, Arc<UnitOfWork<S>>) -> HandlerFuture<Vec<Command>> + Send + Sync>;

/// Handler lookup tables, built once at startup.
///
/// Exactly one handler per command kind; any number per event kind, run in
/// registration order.
pub struct HandlerRegistry<S: ProductStore> {
    commands: HashMap<CommandKind, CommandHandler<S>>,
    events: HashMap<EventKind, Vec<EventHandler<S>>>,
}

impl<S: ProductStore> Default for HandlerRegistry<S> {
    fn default() -> Self {
        Self {
            commands: HashMap::new(),
            events: HashMap::new(),
        }
    }
}

impl<S: ProductStore> HandlerRegistry<S> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the handler for a command kind, replacing any previous one.
    pub fn on_command(&mut self, kind: CommandKind, handler: CommandHandler<S>) -> &mut Self {
        self.commands.insert(kind, handler);
        self
    }

    /// Appends a handler for an event kind.
    pub fn on_event(&mut self, kind: EventKind, handler: EventHandler<S>) -> &mut Self {
        self.events.entry(kind).or_default().push(handler);
        self
    }

    /// Returns the number of handlers registered for an event kind.
    pub fn event_handler_count(&self, kind: EventKind) -> usize {
        self.events.get(&kind).map_or(0, Vec::len)
    }
}

/// Processes one command and everything that follows from it.
///
/// Each [`handle`](Self::handle) call gets its own queue and its own
/// [`UnitOfWork`], so concurrent calls never see each other's messages.
pub struct MessageBus<S: ProductStore> {
    store: Arc<S>,
    handlers: HandlerRegistry<S>,
}

impl<S: ProductStore + 'static> MessageBus<S> {
    pub fn new(store: Arc<S>, handlers: HandlerRegistry<S>) -> Self {
        Self { store, handlers }
    }

    /// Returns the store this bus commits to.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Handles a command, then every event and follow-up command it causes,
    /// until nothing is left.
    ///
    /// Returns the original command's result. Only the original command can
    /// fail the run; a failing event handler or follow-up command is logged
    /// and skipped.
    #[tracing::instrument(skip(self, command), fields(command = %command.kind()))]
    pub async fn handle(&self, command: Command) -> Result<Option<BatchRef>> {
        let started = Instant::now();
        let uow = Arc::new(UnitOfWork::new(Arc::clone(&self.store)));
        let mut queue: VecDeque<Message> = VecDeque::new();

        let result = self.handle_command(command, &uow).await;
        let result = match result {
            Ok(batch_ref) => batch_ref,
            Err(err) => {
                record_duration(started, "error");
                return Err(err);
            }
        };
        queue.extend(uow.collect_new_events().into_iter().map(Message::Event));

        while let Some(message) = queue.pop_front() {
            match message {
                Message::Command(command) => {
                    self.handle_follow_up(command, &uow).await;
                    queue.extend(uow.collect_new_events().into_iter().map(Message::Event));
                }
                Message::Event(event) => self.handle_event(event, &uow, &mut queue).await,
            }
        }

        record_duration(started, "ok");
        Ok(result)
    }

    async fn handle_command(
        &self,
        command: Command,
        uow: &Arc<UnitOfWork<S>>,
    ) -> Result<Option<BatchRef>> {
        let kind = command.kind();
        metrics::counter!("bus_messages_total", "kind" => kind.to_string()).increment(1);
        tracing::debug!(%kind, "handling command");

        let handler = self
            .handlers
            .commands
            .get(&kind)
            .ok_or(ServiceError::NoHandler(kind))?;

        handler(command, Arc::clone(uow)).await.inspect_err(|err| {
            tracing::warn!(%kind, error = %err, "command failed");
        })
    }

    /// Runs a command queued by an event handler.
    ///
    /// Its failure belongs to the event that asked for it, so it is logged
    /// and counted like an event handler failure instead of ending the run.
    async fn handle_follow_up(&self, command: Command, uow: &Arc<UnitOfWork<S>>) {
        let kind = command.kind();
        if let Err(err) = self.handle_command(command, uow).await {
            metrics::counter!("bus_event_handler_failures_total", "kind" => kind.to_string())
                .increment(1);
            tracing::error!(%kind, error = %err, "follow-up command failed");
        }
    }

    /// Runs every handler for an event, queueing each one's follow-up
    /// commands and then the events its commits raised.
    async fn handle_event(
        &self,
        event: Event,
        uow: &Arc<UnitOfWork<S>>,
        queue: &mut VecDeque<Message>,
    ) {
        let kind = event.kind();
        metrics::counter!("bus_messages_total", "kind" => kind.to_string()).increment(1);
        tracing::debug!(%kind, "handling event");

        let Some(handlers) = self.handlers.events.get(&kind) else {
            return;
        };

        for handler in handlers {
            match handler(event.clone(), Arc::clone(uow)).await {
                Ok(follow_ups) => queue.extend(follow_ups.into_iter().map(Message::Command)),
                Err(err) => {
                    metrics::counter!("bus_event_handler_failures_total", "kind" => kind.to_string())
                        .increment(1);
                    tracing::error!(%kind, error = %err, "event handler failed");
                }
            }
            queue.extend(uow.collect_new_events().into_iter().map(Message::Event));
        }
    }
}

fn record_duration(started: Instant, outcome: &'static str) {
    metrics::histogram!("bus_handle_duration_seconds", "outcome" => outcome)
        .record(started.elapsed().as_secs_f64());
}
