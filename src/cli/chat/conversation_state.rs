use chrono::{DateTime, Utc};
use eyre::Result;
use serde::{Deserialize, Serialize};

use crate::cli::chat::presenter::Presenter;

/// A reference URL attached to a message.
///
/// An empty `url` is the "no links" sentinel: a message always carries at
/// least one `Link`, so renderers can check `links[0].url` instead of
/// special-casing an empty list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub url: String,
}

impl Link {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// The sentinel link standing in for "no links".
    pub fn none() -> Self {
        Self { url: String::new() }
    }
}

/// One transcript entry, from either side of the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub text: String,
    pub links: Vec<Link>,
    pub is_user: bool,
    pub sent_at: DateTime<Utc>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            links: vec![Link::none()],
            is_user: true,
            sent_at: Utc::now(),
        }
    }

    pub fn assistant(text: impl Into<String>, links: Vec<Link>) -> Self {
        Self {
            text: text.into(),
            links,
            is_user: false,
            sent_at: Utc::now(),
        }
    }

    /// True when the message carries real links rather than the sentinel.
    pub fn has_links(&self) -> bool {
        self.links.first().map_or(false, |link| !link.url.is_empty())
    }
}

/// Session-owned conversation state: the append-only transcript plus the
/// pending flag for the turn in flight.
///
/// Every mutation notifies the presenter, so the rendering side never polls.
/// Messages are only appended; corrections happen by appending another
/// message.
pub struct ConversationState {
    messages: Vec<Message>,
    pending: bool,
}

impl ConversationState {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            pending: false,
        }
    }

    pub fn append(&mut self, message: Message, presenter: &mut dyn Presenter) -> Result<()> {
        self.messages.push(message);
        if let Some(latest) = self.messages.last() {
            presenter.message_appended(latest)?;
        }
        Ok(())
    }

    /// The full transcript in chronological order.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    pub fn set_pending(&mut self, pending: bool, presenter: &mut dyn Presenter) -> Result<()> {
        if self.pending != pending {
            self.pending = pending;
            presenter.pending_changed(pending)?;
        }
        Ok(())
    }

    /// Discard the conversation and start over, pending flag included.
    pub fn clear(&mut self, presenter: &mut dyn Presenter) -> Result<()> {
        self.messages.clear();
        self.pending = false;
        presenter.conversation_cleared()
    }
}
