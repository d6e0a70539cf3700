use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::config::{ApplianceConfig, PollSettings};
use crate::diff::state_events;
use crate::protocol::ApplianceSnapshot;
use crate::reconcile::reconcile;
use crate::session::SessionRegistry;
use crate::translate::{CommandIntent, translate};
use crate::types::*;
use crate::{Error, Result};

type EventCallback = Box<dyn Fn(&Event) + Send + Sync>;
type StateCallback = Box<dyn Fn(&LocalState) + Send + Sync>;

const INBOX_CAPACITY: usize = 32;

/// What a single tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Detached,
    Unconfigured,
    BackedOff,
    FetchFailed,
    /// The account has never been listed successfully.
    NoList,
    Reconciled(Availability),
}

pub struct ApplianceControllerBuilder {
    config: ApplianceConfig,
    registry: Arc<SessionRegistry>,
    settings: PollSettings,
    event_callbacks: Vec<EventCallback>,
    state_callbacks: Vec<StateCallback>,
}

impl ApplianceControllerBuilder {
    pub fn new(config: ApplianceConfig, registry: Arc<SessionRegistry>) -> Self {
        Self {
            config,
            registry,
            settings: PollSettings::default(),
            event_callbacks: Vec::new(),
            state_callbacks: Vec::new(),
        }
    }

    pub fn settings(mut self, settings: PollSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn on_event(mut self, f: impl Fn(&Event) + Send + Sync + 'static) -> Self {
        self.event_callbacks.push(Box::new(f));
        self
    }

    pub fn on_state(mut self, f: impl Fn(&LocalState) + Send + Sync + 'static) -> Self {
        self.state_callbacks.push(Box::new(f));
        self
    }

    pub fn build(self) -> ApplianceController {
        let (status_tx, _) = watch::channel(ControllerStatus::default());
        ApplianceController {
            config: self.config,
            registry: self.registry,
            settings: self.settings,
            detached: false,
            status: ControllerStatus::default(),
            status_tx,
            event_callbacks: self.event_callbacks,
            state_callbacks: self.state_callbacks,
        }
    }
}

/// Keeps one appliance in sync with the cloud.
///
/// Used directly, every call runs to completion before the next one can start
/// (`&mut self`). [`ApplianceController::spawn`] moves it onto a task that owns
/// the poll timer and serializes ticks and commands through one inbox.
pub struct ApplianceController {
    config: ApplianceConfig,
    registry: Arc<SessionRegistry>,
    settings: PollSettings,
    detached: bool,
    status: ControllerStatus,
    status_tx: watch::Sender<ControllerStatus>,
    event_callbacks: Vec<EventCallback>,
    state_callbacks: Vec<StateCallback>,
}

impl ApplianceController {
    pub fn builder(config: ApplianceConfig, registry: Arc<SessionRegistry>) -> ApplianceControllerBuilder {
        ApplianceControllerBuilder::new(config, registry)
    }

    pub fn status(&self) -> &ControllerStatus {
        &self.status
    }

    pub fn subscribe(&self) -> watch::Receiver<ControllerStatus> {
        self.status_tx.subscribe()
    }

    /// Replace the host-provided settings. Takes effect on the next tick.
    pub fn update_config(&mut self, config: ApplianceConfig) {
        self.config = config;
    }

    /// The appliance was removed from the host; every later tick is a no-op.
    pub fn detach(&mut self) {
        self.detached = true;
    }

    pub async fn poll(&mut self) -> PollOutcome {
        self.poll_at(Utc::now()).await
    }

    /// One scheduler tick evaluated at `now`.
    pub async fn poll_at(&mut self, now: DateTime<Utc>) -> PollOutcome {
        if self.detached {
            return PollOutcome::Detached;
        }
        let Some(appliance_id) = self.config.appliance_id().map(str::to_string) else {
            debug!("no appliance id, skipping poll");
            return PollOutcome::Unconfigured;
        };
        let Some(credentials) = self.config.credentials() else {
            debug!(appliance = %appliance_id, "appliance is not configured");
            return PollOutcome::Unconfigured;
        };
        let session = match self.registry.get_or_create(credentials) {
            Ok(session) => session,
            Err(e) => {
                warn!(appliance = %appliance_id, error = %e, "could not create API session");
                return PollOutcome::FetchFailed;
            }
        };

        debug!(appliance = %appliance_id, "polling");
        self.set_scheduler(SchedulerState::Polling);

        let mut book = session.lock().await;
        if book.in_backoff(now, self.settings.backoff_window()) {
            drop(book);
            debug!(appliance = %appliance_id, "in failure back-off");
            self.set_scheduler(SchedulerState::BackedOff);
            return PollOutcome::BackedOff;
        }
        if session
            .refresh(&mut book, now, self.settings.refresh_window())
            .await
            .is_err()
        {
            drop(book);
            self.set_scheduler(SchedulerState::BackedOff);
            return PollOutcome::FetchFailed;
        }
        if book.appliances.is_none() {
            drop(book);
            self.set_scheduler(SchedulerState::Idle);
            return PollOutcome::NoList;
        }
        let snapshot = book.appliance(&appliance_id).cloned();
        drop(book);

        let availability = self.apply_snapshot(&appliance_id, snapshot.as_ref());
        self.set_scheduler(SchedulerState::Idle);
        PollOutcome::Reconciled(availability)
    }

    fn apply_snapshot(&mut self, appliance_id: &str, snapshot: Option<&ApplianceSnapshot>) -> Availability {
        let (availability, mut events) = match reconcile(snapshot) {
            Ok(state) => {
                let events = state_events(self.status.state.as_ref(), &state);
                for cb in &self.state_callbacks {
                    cb(&state);
                }
                self.status.state = Some(state);
                (Availability::Available, events)
            }
            Err(reason) => {
                debug!(appliance = %appliance_id, ?reason, "appliance unavailable");
                (Availability::Unavailable(reason), Vec::new())
            }
        };

        if availability != self.status.availability {
            match availability {
                Availability::Unavailable(reason) => {
                    warn!(appliance = %appliance_id, %reason, "marking appliance unavailable");
                }
                _ => info!(appliance = %appliance_id, "appliance available"),
            }
            events.push(Event::AvailabilityChanged { availability });
            self.status.availability = availability;
        }

        for event in &events {
            for cb in &self.event_callbacks {
                cb(event);
            }
        }
        if !events.is_empty() {
            debug!(appliance = %appliance_id, count = events.len(), "state changed");
        }

        availability
    }

    /// Whether `intent` would change anything on the appliance.
    pub fn needs_send(&self, intent: &CommandIntent) -> bool {
        if intent.is_empty() {
            return false;
        }
        match (&self.status.state, self.status.availability) {
            (Some(state), Availability::Available) => !intent.is_satisfied_by(state),
            _ => true,
        }
    }

    /// Translate `intent` and send the resulting patches in order.
    ///
    /// Sending stops at the first failure. Patches already accepted by the
    /// cloud stay applied; the error reports how many went through.
    ///
    /// Only a spawned controller polls again after a command. Callers driving
    /// the controller directly should call [`ApplianceController::poll`] once
    /// the appliance has had time to report the change.
    pub async fn apply(&mut self, intent: &CommandIntent) -> Result<()> {
        if self.detached {
            return Err(Error::ControllerStopped);
        }
        let appliance_id = self
            .config
            .appliance_id()
            .ok_or(Error::NotConfigured("appliance id"))?;
        if !self.needs_send(intent) {
            debug!(appliance = %appliance_id, ?intent, "intent already satisfied");
            return Ok(());
        }
        let credentials = self
            .config
            .credentials()
            .ok_or(Error::NotConfigured("account credentials"))?;
        let session = self.registry.get_or_create(credentials)?;

        let patches = translate(intent);
        debug!(appliance = %appliance_id, ?intent, count = patches.len(), "applying intent");

        let _book = session.lock().await;
        for (applied, patch) in patches.iter().enumerate() {
            if let Err(e) = session.client().send_command(appliance_id, patch).await {
                warn!(appliance = %appliance_id, error = %e, applied, "command failed");
                return Err(Error::Command {
                    applied,
                    total: patches.len(),
                    source: Box::new(e),
                });
            }
        }
        Ok(())
    }

    fn set_scheduler(&mut self, state: SchedulerState) {
        self.status.scheduler = state;
        self.status_tx.send_replace(self.status.clone());
    }

    /// Run the controller on its own task: one poll shortly after start, then
    /// one per interval, plus one shortly after every command.
    pub fn spawn(self) -> ControllerHandle {
        let (tx, rx) = mpsc::channel(INBOX_CAPACITY);
        let handle = ControllerHandle {
            tx: tx.clone(),
            status: self.status_tx.subscribe(),
        };
        tokio::spawn(self.run(rx, tx.downgrade()));
        handle
    }

    async fn run(mut self, mut inbox: mpsc::Receiver<Message>, trigger: mpsc::WeakSender<Message>) {
        let interval = self.settings.interval;
        let delay = self.settings.trigger_delay;
        let mut ticker = time::interval_at(Instant::now() + interval, interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        schedule_poll(&trigger, delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.poll().await;
                }
                msg = inbox.recv() => match msg {
                    Some(Message::Poll) => {
                        self.poll().await;
                    }
                    Some(Message::Apply(intent, reply)) => {
                        let sent = self.needs_send(&intent);
                        let result = self.apply(&intent).await;
                        if sent {
                            schedule_poll(&trigger, delay);
                        }
                        let _ = reply.send(result);
                    }
                    Some(Message::Detach) | None => {
                        self.detach();
                        break;
                    }
                },
            }
        }
        debug!(appliance = ?self.config.appliance_id(), "controller stopped");
    }
}

/// One out-of-cycle poll after `delay`. Dropped silently if the controller is gone.
fn schedule_poll(trigger: &mpsc::WeakSender<Message>, delay: std::time::Duration) {
    let Some(tx) = trigger.upgrade() else {
        return;
    };
    tokio::spawn(async move {
        time::sleep(delay).await;
        let _ = tx.send(Message::Poll).await;
    });
}

enum Message {
    Poll,
    Apply(CommandIntent, oneshot::Sender<Result<()>>),
    Detach,
}

/// Cloneable handle to a spawned controller.
#[derive(Clone)]
pub struct ControllerHandle {
    tx: mpsc::Sender<Message>,
    status: watch::Receiver<ControllerStatus>,
}

impl ControllerHandle {
    /// Send an intent and wait for it to be applied.
    pub async fn apply(&self, intent: CommandIntent) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(Message::Apply(intent, reply))
            .await
            .map_err(|_| Error::ControllerStopped)?;
        rx.await.map_err(|_| Error::ControllerStopped)?
    }

    pub async fn set_fan_speed(&self, speed: i32) -> Result<()> {
        self.apply(CommandIntent::new().fan_speed(speed)).await
    }

    pub async fn enable_smart_mode(&self) -> Result<()> {
        self.apply(CommandIntent::new().mode(Mode::Smart)).await
    }

    pub async fn set_ionizer(&self, on: bool) -> Result<()> {
        self.apply(CommandIntent::new().ionizer(on)).await
    }

    /// Queue a poll right away.
    pub async fn poll_now(&self) -> Result<()> {
        self.tx
            .send(Message::Poll)
            .await
            .map_err(|_| Error::ControllerStopped)
    }

    pub fn status(&self) -> ControllerStatus {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ControllerStatus> {
        self.status.clone()
    }

    /// Stop the controller. Later calls on any handle return `ControllerStopped`.
    pub async fn detach(&self) {
        let _ = self.tx.send(Message::Detach).await;
    }
}
