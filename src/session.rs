use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::assembler::{TurnAssembler, TurnState, TurnUpdate};
use crate::client::{AgentApiClient, CancellationSignal, TurnTransport};
use crate::config::AgentApiConfig;
use crate::error::TurnError;
use crate::identity::ConversationIdResolver;
use crate::interrupt::{Decision, InterruptRequest, ToolDecisionInput};
use crate::payload::TurnRequest;
use crate::registry::DecisionEffect;

/// Terminal outcome of driving a turn to quiescence.
#[derive(Debug, Clone, PartialEq)]
pub enum TurnOutcome {
    Completed,
    /// The turn is suspended and will not progress until a decision is
    /// submitted for this interrupt.
    AwaitingDecision(InterruptRequest),
}

/// Outcome of submitting a decision.
#[derive(Debug, Clone, PartialEq)]
pub enum DecisionOutcome {
    /// An edit was requested without edited text; the caller should present
    /// these args for editing and resubmit. Nothing was sent.
    EditPending { args: Value },
    Resumed(TurnOutcome),
}

/// Owns one conversation: dispatches turns, feeds the assembler, and
/// mediates the interrupt/decision cycle.
pub struct TurnSession {
    transport: Arc<dyn TurnTransport>,
    assembler: TurnAssembler,
    resolver: ConversationIdResolver,
    stream: bool,
}

impl TurnSession {
    pub fn new(config: AgentApiConfig) -> Result<Self, TurnError> {
        Ok(Self::with_transport(Arc::new(AgentApiClient::new(config)?)))
    }

    pub fn with_transport(transport: Arc<dyn TurnTransport>) -> Self {
        Self {
            transport,
            assembler: TurnAssembler::default(),
            resolver: ConversationIdResolver::default(),
            stream: true,
        }
    }

    /// Select streaming or batch dispatch for subsequent turns.
    pub fn with_streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.resolver.current()
    }

    pub fn state(&self) -> TurnState {
        self.assembler.state()
    }

    pub fn turn(&self) -> &crate::assembler::Turn {
        self.assembler.turn()
    }

    pub fn pending_interrupt(&self) -> Option<&InterruptRequest> {
        self.assembler.pending_interrupt()
    }

    /// Dispatch a fresh turn and drive it until it completes, suspends on an
    /// interrupt, or fails. `on_update` observes progressive state changes.
    pub async fn run_turn(
        &mut self,
        input: Value,
        cancellation: Option<CancellationSignal>,
        on_update: &mut (dyn FnMut(TurnUpdate) + Send),
    ) -> Result<TurnOutcome, TurnError> {
        if self.assembler.is_busy() {
            return Err(TurnError::Busy);
        }

        self.resolver.begin_turn();
        let request = TurnRequest::open(
            self.resolver.current().map(ToOwned::to_owned),
            input,
            self.stream,
        );
        self.drive(&request, cancellation, on_update, false).await
    }

    /// Submit the decision for the pending interrupt.
    ///
    /// `Decision::Edit(None)` is a local two-phase step: it returns the
    /// current args for editing without dispatching. Every other decision
    /// resumes the turn over a new request. A dispatch failure leaves the
    /// turn interrupted so the decision can be retried.
    pub async fn submit_decision(
        &mut self,
        decision: Decision,
        cancellation: Option<CancellationSignal>,
        on_update: &mut (dyn FnMut(TurnUpdate) + Send),
    ) -> Result<DecisionOutcome, TurnError> {
        let Some(interrupt) = self.assembler.pending_interrupt().cloned() else {
            return Err(TurnError::Precondition(
                "no pending interrupt awaiting a decision".to_owned(),
            ));
        };
        let Some(conversation_id) = self.resolver.current().map(ToOwned::to_owned) else {
            return Err(TurnError::Precondition(
                "interrupted turn has no conversation id to resume against".to_owned(),
            ));
        };

        let edited_args = match &decision {
            Decision::Edit(None) => {
                debug!(tool_call_id = %interrupt.tool_call_id, "returning args for editing");
                return Ok(DecisionOutcome::EditPending {
                    args: interrupt.args.clone(),
                });
            }
            Decision::Edit(Some(text)) => Some(parse_edited_args(text)?),
            _ => None,
        };

        let effect = match &decision {
            Decision::Accept => Some(DecisionEffect::Accept),
            Decision::Edit(_) => edited_args.clone().map(DecisionEffect::Edit),
            Decision::Reject(_) => Some(DecisionEffect::Reject),
            Decision::Feedback(_) => None,
        };
        if let Some(effect) = &effect {
            self.assembler
                .registry_mut()
                .apply_decision(&interrupt.tool_call_id, effect);
        }

        let message = match &decision {
            Decision::Reject(Some(text)) => Some(text.clone()),
            Decision::Feedback(text) => Some(text.clone()),
            _ => None,
        };
        let input = ToolDecisionInput {
            tool_call_id: interrupt.tool_call_id.clone(),
            decision: decision.wire_name().to_owned(),
            args: edited_args,
            message,
        };
        let request = TurnRequest::resume(conversation_id, input, self.stream)?;

        let outcome = self.drive(&request, cancellation, on_update, true).await?;
        Ok(DecisionOutcome::Resumed(outcome))
    }

    async fn drive(
        &mut self,
        request: &TurnRequest,
        cancellation: Option<CancellationSignal>,
        on_update: &mut (dyn FnMut(TurnUpdate) + Send),
        resume: bool,
    ) -> Result<TurnOutcome, TurnError> {
        // Dispatch failures propagate without touching turn state; an
        // interrupted turn stays interrupted and can be retried.
        let mut feed = self.transport.open(request, cancellation).await?;
        if resume {
            self.assembler.resume()?;
        }

        // The response header is the authoritative identity source and is
        // resolved before any event-borne candidate.
        if let Some(header_id) = feed.conversation_header() {
            self.resolver.resolve(&header_id);
        }

        loop {
            let event = match feed.next_event().await {
                Ok(Some(event)) => event,
                Ok(None) => break,
                Err(error) => {
                    self.fail_active(&error.to_string(), on_update);
                    return Err(error);
                }
            };
            self.assembler.apply(event, &mut self.resolver, on_update)?;
            match self.assembler.state() {
                TurnState::Interrupted => {
                    let request = self
                        .assembler
                        .pending_interrupt()
                        .cloned()
                        .ok_or_else(|| {
                            TurnError::Precondition(
                                "interrupted turn lost its pending interrupt".to_owned(),
                            )
                        })?;
                    return Ok(TurnOutcome::AwaitingDecision(request));
                }
                TurnState::Completed => return Ok(TurnOutcome::Completed),
                _ => {}
            }
        }

        match self.assembler.state() {
            TurnState::Completed => Ok(TurnOutcome::Completed),
            TurnState::Interrupted => {
                let request = self
                    .assembler
                    .pending_interrupt()
                    .cloned()
                    .ok_or_else(|| {
                        TurnError::Precondition(
                            "interrupted turn lost its pending interrupt".to_owned(),
                        )
                    })?;
                Ok(TurnOutcome::AwaitingDecision(request))
            }
            _ => {
                let message = "stream ended before turn completion".to_owned();
                self.fail_active(&message, on_update);
                Err(TurnError::StreamFailed(message))
            }
        }
    }

    fn fail_active(&mut self, message: &str, on_update: &mut (dyn FnMut(TurnUpdate) + Send)) {
        if self.assembler.is_busy() {
            self.assembler.fail(message, on_update);
        } else {
            warn!(message, "feed failed outside an open turn");
        }
    }
}

fn parse_edited_args(text: &str) -> Result<Value, TurnError> {
    let value: Value = serde_json::from_str(text)
        .map_err(|error| TurnError::InvalidDecisionArgs(error.to_string()))?;
    if !value.is_object() {
        return Err(TurnError::InvalidDecisionArgs(
            "edited args must be a JSON object".to_owned(),
        ));
    }
    Ok(value)
}
