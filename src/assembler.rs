use tracing::{debug, warn};

use crate::error::TurnError;
use crate::events::TurnEvent;
use crate::identity::ConversationIdResolver;
use crate::interrupt::{InterruptPayload, InterruptRequest};
use crate::registry::{ToolCallRecord, ToolCallRegistry, ToolOutcome};

/// Lifecycle state of the turn owned by the assembler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TurnState {
    #[default]
    Idle,
    Started,
    Streaming,
    Interrupted,
    Completed,
    Failed,
}

/// Side-effect notification for the rendering collaborator.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnUpdate {
    /// Progressive text re-render; carries the full visible text.
    TextChanged { text: String },
    ToolCallsChanged,
    Interrupted { request: InterruptRequest },
    Completed { empty_turn: bool },
    Failed { message: String },
}

/// Canonical reconstruction of one agent turn.
#[derive(Debug, Default)]
pub struct Turn {
    segments: Vec<String>,
    live_text: String,
    registry: ToolCallRegistry,
    pending_interrupt: Option<InterruptRequest>,
    completed: bool,
}

impl Turn {
    /// Full visible text: sealed segments followed by the in-flight tail.
    pub fn text(&self) -> String {
        let mut out = self.segments.concat();
        out.push_str(&self.live_text);
        out
    }

    pub fn tool_calls(&self) -> impl Iterator<Item = &ToolCallRecord> + '_ {
        self.registry.list()
    }

    pub fn registry(&self) -> &ToolCallRegistry {
        &self.registry
    }

    pub fn pending_interrupt(&self) -> Option<&InterruptRequest> {
        self.pending_interrupt.as_ref()
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    fn is_empty(&self) -> bool {
        self.registry.is_empty() && self.segments.is_empty() && self.live_text.is_empty()
    }
}

/// State machine consuming normalized events and reconstructing one turn.
///
/// Owned exclusively by a session for the lifetime of the turn; at most one
/// turn may be started, streaming, or interrupted at a time.
#[derive(Debug, Default)]
pub struct TurnAssembler {
    state: TurnState,
    turn: Turn,
}

impl TurnAssembler {
    pub fn state(&self) -> TurnState {
        self.state
    }

    pub fn turn(&self) -> &Turn {
        &self.turn
    }

    pub fn pending_interrupt(&self) -> Option<&InterruptRequest> {
        self.turn.pending_interrupt()
    }

    /// True while a turn is open: started, streaming, or awaiting a decision.
    pub fn is_busy(&self) -> bool {
        matches!(
            self.state,
            TurnState::Started | TurnState::Streaming | TurnState::Interrupted
        )
    }

    pub(crate) fn registry_mut(&mut self) -> &mut ToolCallRegistry {
        &mut self.turn.registry
    }

    /// Apply one normalized event.
    ///
    /// Returns an error only for the terminal `Error` event, after the turn
    /// has been failed and its state discarded.
    pub fn apply(
        &mut self,
        event: TurnEvent,
        resolver: &mut ConversationIdResolver,
        emit: &mut dyn FnMut(TurnUpdate),
    ) -> Result<(), TurnError> {
        match event {
            TurnEvent::TurnStarted { conversation_id } => {
                self.on_turn_started(conversation_id, resolver);
            }
            TurnEvent::TextDelta { text } => {
                if self.enter_streaming() {
                    self.turn.live_text.push_str(&text);
                    emit(TurnUpdate::TextChanged {
                        text: self.turn.text(),
                    });
                }
            }
            TurnEvent::TextComplete { text } => {
                if self.enter_streaming() {
                    // Completion seals the segment and clears the accumulator
                    // so the next content stream in this turn starts clean.
                    self.turn.live_text.clear();
                    self.turn.segments.push(text);
                    emit(TurnUpdate::TextChanged {
                        text: self.turn.text(),
                    });
                }
            }
            TurnEvent::ToolCallsDeclared { calls } => {
                if self.enter_streaming() {
                    for call in calls {
                        self.turn.registry.declare(call.id, &call.name, call.args);
                    }
                    emit(TurnUpdate::ToolCallsChanged);
                }
            }
            TurnEvent::ToolResult {
                tool_call_id,
                tool_name,
                args,
                content,
                status,
            } => {
                if self.enter_streaming() {
                    self.turn.registry.record_result(
                        &tool_call_id,
                        ToolOutcome {
                            content,
                            status,
                            tool_name,
                            args,
                        },
                    );
                    emit(TurnUpdate::ToolCallsChanged);
                }
            }
            TurnEvent::Interrupt { payload } => self.on_interrupt(payload, resolver, emit),
            TurnEvent::TurnCompleted => {
                if self.enter_streaming() {
                    let empty_turn = self.turn.is_empty();
                    if empty_turn {
                        warn!("turn completed with no text and no tool calls");
                    }
                    self.turn.completed = true;
                    self.state = TurnState::Completed;
                    emit(TurnUpdate::Completed { empty_turn });
                }
            }
            TurnEvent::Error { message } => {
                self.fail(&message, emit);
                return Err(TurnError::StreamFailed(message));
            }
        }

        Ok(())
    }

    /// Re-enter `Streaming` for a resumed continuation, clearing the decided
    /// interrupt. The same turn object keeps accumulating.
    pub fn resume(&mut self) -> Result<(), TurnError> {
        if self.state != TurnState::Interrupted {
            return Err(TurnError::Precondition(
                "no interrupted turn to resume".to_owned(),
            ));
        }
        self.turn.pending_interrupt = None;
        self.state = TurnState::Streaming;
        Ok(())
    }

    /// Fail the open turn, discarding its text and registry state.
    pub fn fail(&mut self, message: &str, emit: &mut dyn FnMut(TurnUpdate)) {
        self.turn = Turn::default();
        self.state = TurnState::Failed;
        emit(TurnUpdate::Failed {
            message: message.to_owned(),
        });
    }

    fn on_turn_started(
        &mut self,
        conversation_id: Option<String>,
        resolver: &mut ConversationIdResolver,
    ) {
        match self.state {
            TurnState::Idle | TurnState::Completed | TurnState::Failed => {
                // Fresh turn: registry scope and text are reset.
                self.turn = Turn::default();
                self.state = TurnState::Started;
            }
            TurnState::Started | TurnState::Streaming | TurnState::Interrupted => {
                debug!("turn already open; treating start event as a continuation marker");
            }
        }
        if let Some(candidate) = conversation_id {
            resolver.resolve(&candidate);
        }
    }

    fn on_interrupt(
        &mut self,
        payload: InterruptPayload,
        resolver: &ConversationIdResolver,
        emit: &mut dyn FnMut(TurnUpdate),
    ) {
        if !matches!(self.state, TurnState::Started | TurnState::Streaming) {
            warn!(state = ?self.state, "dropping interrupt outside an open turn");
            return;
        }

        // Resolve the paused tool call: explicit id, then a structural match
        // on (action, args), falling back to the interrupt id itself. The
        // matched or synthesized record adopts the id so the later decision
        // finds it.
        let tool_call_id = payload
            .tool_call_id
            .clone()
            .map(|id| id.trim().to_owned())
            .filter(|id| !id.is_empty())
            .or_else(|| {
                self.turn
                    .registry
                    .find_structural(&payload.action, &payload.args)
                    .and_then(|record| record.id.clone())
            })
            .unwrap_or_else(|| payload.interrupt_id.clone());
        self.turn
            .registry
            .declare(Some(tool_call_id.clone()), &payload.action, payload.args.clone());

        let request = InterruptRequest {
            interrupt_id: payload.interrupt_id,
            tool_call_id,
            action: payload.action,
            args: payload.args,
            config: payload.config,
            description: payload.description,
            conversation_id: resolver.current().map(ToString::to_string),
        };

        if self.turn.pending_interrupt.is_some() {
            warn!("replacing an interrupt that never received a decision");
        }
        self.turn.pending_interrupt = Some(request.clone());
        self.state = TurnState::Interrupted;
        emit(TurnUpdate::Interrupted { request });
    }

    /// Content events are valid while the turn is open and not suspended;
    /// anything else is dropped with a log record.
    fn enter_streaming(&mut self) -> bool {
        match self.state {
            TurnState::Started | TurnState::Streaming => {
                self.state = TurnState::Streaming;
                true
            }
            TurnState::Interrupted => {
                debug!("dropping stream event while awaiting a decision");
                false
            }
            state => {
                warn!(state = ?state, "dropping stream event outside an open turn");
                false
            }
        }
    }
}
