//! Screen navigation state machine.
//!
//! Owns the current screen, the back stack, and the one transition that
//! may be animating at a time. Commands arriving while a transition is
//! Starting are queued and applied in request order once it reaches
//! Committed or Cancelled. Animation itself is external; the controller
//! only tracks transition phases.

use std::collections::VecDeque;

use skycast_core::{Emitter, NavigationError, TelemetryEvent};

/// Named screens of the application.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Home,
    Details,
    Search,
    Settings,
}

impl Screen {
    pub fn name(&self) -> &'static str {
        match self {
            Screen::Home => "home",
            Screen::Details => "details",
            Screen::Search => "search",
            Screen::Settings => "settings",
        }
    }
}

/// What requested a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavTrigger {
    /// Explicit `go_to` command
    Command,
    /// Gesture intent translated by the host
    Gesture,
    /// `go_back` command
    Back,
}

impl NavTrigger {
    fn name(&self) -> &'static str {
        match self {
            NavTrigger::Command => "command",
            NavTrigger::Gesture => "gesture",
            NavTrigger::Back => "back",
        }
    }
}

/// Phase of an animated transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionPhase {
    Starting,
    Committed,
    Cancelled,
}

/// Record of one screen transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: Screen,
    pub to: Screen,
    pub trigger: NavTrigger,
    pub phase: TransitionPhase,
}

#[derive(Debug, Clone, Copy)]
enum Pending {
    GoTo { to: Screen, trigger: NavTrigger },
    Back,
}

/// Sole owner and mutator of screen state.
pub struct NavigationController {
    current: Screen,
    back_stack: Vec<Screen>,
    in_flight: Option<Transition>,
    queue: VecDeque<Pending>,
    place_selected: bool,
    telemetry: Emitter,
}

impl NavigationController {
    pub fn new(telemetry: Emitter) -> Self {
        Self {
            current: Screen::Home,
            back_stack: Vec::new(),
            in_flight: None,
            queue: VecDeque::new(),
            place_selected: false,
            telemetry,
        }
    }

    pub fn current(&self) -> Screen {
        self.current
    }

    pub fn transition(&self) -> Option<&Transition> {
        self.in_flight.as_ref()
    }

    /// Details is only reachable with a selected place; the host flips
    /// this when the orchestrator's selection changes.
    pub fn set_place_selected(&mut self, selected: bool) {
        self.place_selected = selected;
    }

    /// Request a transition to `screen`.
    ///
    /// Refused synchronously with `InvalidTransition` when the target is
    /// not currently reachable; screen state is left untouched. While a
    /// transition is animating the request is queued in order.
    pub fn go_to(&mut self, screen: Screen) -> Result<(), NavigationError> {
        self.go_to_with(screen, NavTrigger::Command)
    }

    /// `go_to` with an explicit trigger; used by the host when translating
    /// gesture intents.
    pub fn go_to_with(&mut self, screen: Screen, trigger: NavTrigger) -> Result<(), NavigationError> {
        if screen == Screen::Details && !self.place_selected {
            return Err(NavigationError::InvalidTransition);
        }

        if self.in_flight.is_some() {
            self.queue.push_back(Pending::GoTo { to: screen, trigger });
            return Ok(());
        }
        self.begin(screen, trigger);
        Ok(())
    }

    /// Request going back one screen. A no-op from Home (empty stack).
    pub fn go_back(&mut self) -> Result<(), NavigationError> {
        if self.in_flight.is_some() {
            self.queue.push_back(Pending::Back);
            return Ok(());
        }
        if let Some(target) = self.back_stack.last().copied() {
            self.begin(target, NavTrigger::Back);
        }
        Ok(())
    }

    /// The animating transition finished; apply it and start the next
    /// queued request, if any.
    pub fn commit_transition(&mut self) -> Option<Transition> {
        let mut transition = self.in_flight.take()?;
        transition.phase = TransitionPhase::Committed;

        match transition.trigger {
            NavTrigger::Back => {
                self.back_stack.pop();
            }
            _ => self.back_stack.push(transition.from),
        }
        self.current = transition.to;

        self.emit_phase(&transition);
        tracing::debug!(
            "Navigation committed: {} -> {}",
            transition.from.name(),
            transition.to.name()
        );

        self.drain_queue();
        Some(transition)
    }

    /// The animating transition was aborted (e.g. the user released a
    /// swipe mid-gesture). Restores the prior screen with no side effects.
    pub fn cancel_transition(&mut self) -> Option<Transition> {
        let mut transition = self.in_flight.take()?;
        transition.phase = TransitionPhase::Cancelled;

        self.emit_phase(&transition);
        tracing::debug!(
            "Navigation cancelled: staying on {}",
            transition.from.name()
        );

        self.drain_queue();
        Some(transition)
    }

    fn begin(&mut self, to: Screen, trigger: NavTrigger) {
        if to == self.current {
            return;
        }
        let transition = Transition {
            from: self.current,
            to,
            trigger,
            phase: TransitionPhase::Starting,
        };
        self.in_flight = Some(transition);
        self.emit_phase(&transition);
    }

    fn drain_queue(&mut self) {
        while self.in_flight.is_none() {
            let Some(pending) = self.queue.pop_front() else {
                return;
            };
            match pending {
                Pending::GoTo { to, trigger } => {
                    // Reachability was checked at request time; a Details
                    // request only gets here with a place selected.
                    self.begin(to, trigger);
                }
                Pending::Back => {
                    if let Some(target) = self.back_stack.last().copied() {
                        self.begin(target, NavTrigger::Back);
                    }
                }
            }
        }
    }

    fn emit_phase(&self, transition: &Transition) {
        let phase = match transition.phase {
            TransitionPhase::Starting => "starting",
            TransitionPhase::Committed => "committed",
            TransitionPhase::Cancelled => "cancelled",
        };
        self.telemetry.emit(
            TelemetryEvent::new("navigation_transition")
                .with("from", transition.from.name())
                .with("to", transition.to.name())
                .with("trigger", transition.trigger.name())
                .with("phase", phase),
        );
    }
}
