//! Command Facade
//!
//! Typed chat and LLM commands. Each method builds an [`OutboundIntent`] and
//! hands it to the controller; nothing is retried or queued here, and typing
//! debounce is left to the caller.

use serde::Serialize;
use serde_json::Value;

use crate::connection::{ConnectionController, Delivery};
use crate::error::Result;
use crate::events::{
    names, ChatRef, CompletionRequest, MessageType, OutgoingMessage, ReadReceipt,
    TypingIndicator,
};

/// An outbound event ready for the controller
#[derive(Clone, Debug, PartialEq)]
pub struct OutboundIntent {
    /// Event name
    pub event: &'static str,
    /// JSON payload
    pub payload: Value,
}

impl OutboundIntent {
    /// Serialize `payload` for `event`
    ///
    /// # Errors
    ///
    /// Returns the serializer error if `payload` cannot be represented as JSON.
    pub fn new<T: Serialize>(event: &'static str, payload: &T) -> serde_json::Result<Self> {
        Ok(Self {
            event,
            payload: serde_json::to_value(payload)?,
        })
    }

    /// `join:chat`
    pub fn join_chat(chat_id: &str) -> serde_json::Result<Self> {
        Self::new(names::JOIN_CHAT, &ChatRef { chat_id })
    }

    /// `leave:chat`
    pub fn leave_chat(chat_id: &str) -> serde_json::Result<Self> {
        Self::new(names::LEAVE_CHAT, &ChatRef { chat_id })
    }

    /// `message:send`
    pub fn send_message(
        chat_id: &str,
        content: &str,
        message_type: MessageType,
    ) -> serde_json::Result<Self> {
        Self::new(
            names::MESSAGE_SEND,
            &OutgoingMessage {
                chat_id,
                content,
                message_type,
            },
        )
    }

    /// `message:typing`
    pub fn typing(chat_id: &str, is_typing: bool) -> serde_json::Result<Self> {
        Self::new(names::MESSAGE_TYPING, &TypingIndicator { chat_id, is_typing })
    }

    /// `message:read`
    pub fn mark_read(message_id: &str, chat_id: &str) -> serde_json::Result<Self> {
        Self::new(names::MESSAGE_READ, &ReadReceipt { message_id, chat_id })
    }

    /// `llm:stream-completion`
    pub fn stream_completion(request: &CompletionRequest) -> serde_json::Result<Self> {
        Self::new(names::STREAM_COMPLETION, request)
    }
}

/// Typed command surface over a [`ConnectionController`]
#[derive(Clone, Debug)]
pub struct CommandFacade {
    controller: ConnectionController,
}

impl CommandFacade {
    /// Facade sending through `controller`
    #[must_use]
    pub fn new(controller: ConnectionController) -> Self {
        Self { controller }
    }

    /// Join a chat room
    ///
    /// # Errors
    ///
    /// Fails only if the binding rejects the event while connected.
    pub async fn join_chat(&self, chat_id: &str) -> Result<Delivery> {
        self.dispatch(OutboundIntent::join_chat(chat_id)?).await
    }

    /// Leave a chat room
    ///
    /// # Errors
    ///
    /// Fails only if the binding rejects the event while connected.
    pub async fn leave_chat(&self, chat_id: &str) -> Result<Delivery> {
        self.dispatch(OutboundIntent::leave_chat(chat_id)?).await
    }

    /// Send a chat message
    ///
    /// # Errors
    ///
    /// Fails only if the binding rejects the event while connected.
    pub async fn send_message(
        &self,
        chat_id: &str,
        content: &str,
        message_type: MessageType,
    ) -> Result<Delivery> {
        self.dispatch(OutboundIntent::send_message(chat_id, content, message_type)?)
            .await
    }

    /// Signal typing started or stopped
    ///
    /// # Errors
    ///
    /// Fails only if the binding rejects the event while connected.
    pub async fn send_typing(&self, chat_id: &str, is_typing: bool) -> Result<Delivery> {
        self.dispatch(OutboundIntent::typing(chat_id, is_typing)?)
            .await
    }

    /// Acknowledge a message as read
    ///
    /// # Errors
    ///
    /// Fails only if the binding rejects the event while connected.
    pub async fn mark_read(&self, message_id: &str, chat_id: &str) -> Result<Delivery> {
        self.dispatch(OutboundIntent::mark_read(message_id, chat_id)?)
            .await
    }

    /// Ask the backend to stream a completion
    ///
    /// Progress arrives as `llm:stream-*` events; subscribe to the session
    /// topic once the `llm:stream-start` for the new session is seen.
    ///
    /// # Errors
    ///
    /// Fails only if the binding rejects the event while connected.
    pub async fn stream_completion(&self, request: &CompletionRequest) -> Result<Delivery> {
        self.dispatch(OutboundIntent::stream_completion(request)?)
            .await
    }

    /// Send a prepared intent
    ///
    /// # Errors
    ///
    /// Fails only if the binding rejects the event while connected.
    pub async fn dispatch(&self, intent: OutboundIntent) -> Result<Delivery> {
        Ok(self.controller.send(intent.event, intent.payload).await?)
    }
}
