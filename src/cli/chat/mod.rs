pub mod conversation_state;
pub mod extract;
pub mod presenter;
pub mod prompt;

use std::process::ExitCode;

use conversation_state::{ConversationState, Message};
use eyre::{bail, Result};
use presenter::Presenter;
use rustyline::error::ReadlineError;
use tracing::{debug, error};

use crate::responder_client::{Responder, ResponderClient, ResponderReply};

const WELCOME_TEXT: &str = "
Hi, I'm Sources Chat. Ask me anything.

Things to try
• Ask a question and follow the cited sources.
• Press Alt+Enter to write a multi-line question.

/help         Show the help dialogue
/quit         Quit the application
";

const HELP_TEXT: &str = "
Sources Chat CLI

/clear        Clear the conversation history
/help         Show this help dialogue
/quit         Quit the application

Enter         Send the current message
Alt+Enter     Insert a line break without sending
";

/// Shown when the responder cannot be reached or understood; the underlying
/// cause goes to the log, not the screen.
const SEND_FAILURE_NOTICE: &str = "Failed to send message.";

pub struct ChatContext {
    presenter: Box<dyn Presenter>,
    input: Option<String>,
    interactive: bool,
    endpoint: Option<String>,
    conversation_state: ConversationState,
    responder: Option<Box<dyn Responder>>,
}

impl ChatContext {
    pub fn new(
        presenter: Box<dyn Presenter>,
        input: Option<String>,
        interactive: bool,
        endpoint: Option<String>,
    ) -> Self {
        Self {
            presenter,
            input,
            interactive,
            endpoint,
            conversation_state: ConversationState::new(),
            responder: None,
        }
    }

    /// Replace the HTTP responder with a caller-supplied one.
    pub fn with_responder(mut self, responder: Box<dyn Responder>) -> Self {
        self.responder = Some(responder);
        self
    }

    pub async fn run(&mut self) -> Result<ExitCode> {
        if self.responder.is_none() {
            match ResponderClient::from_env(self.endpoint.as_deref()) {
                Ok(client) => self.responder = Some(Box::new(client)),
                Err(e) => {
                    self.presenter
                        .plain(&format!("Failed to initialize responder client: {}", e))?;
                    return Ok(ExitCode::FAILURE);
                }
            }
        }

        if self.interactive {
            self.presenter.plain(WELCOME_TEXT)?;
        }

        // Handle non-interactive mode (single query)
        if let Some(input) = self.input.take() {
            self.handle_input(&input).await?;
            return Ok(ExitCode::SUCCESS);
        }

        if self.interactive {
            self.run_interactive().await?;
        }

        Ok(ExitCode::SUCCESS)
    }

    async fn run_interactive(&mut self) -> Result<()> {
        let mut rl = prompt::rl()?;
        let history = prompt::history_path();
        if let Some(path) = &history {
            if rl.load_history(path).is_err() {
                debug!("No prompt history at {}", path.display());
            }
        }

        loop {
            let prompt_text = prompt::generate_prompt(None);
            match rl.readline(&prompt_text) {
                Ok(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }

                    rl.add_history_entry(line.as_str());

                    if line.trim() == "/quit" {
                        break;
                    }

                    if let Err(e) = self.handle_input(&line).await {
                        self.presenter.plain(&format!("Error: {}", e))?;
                    }
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(e) => {
                    self.presenter.plain(&format!("Error: {}", e))?;
                    break;
                }
            }
        }

        if let Some(path) = &history {
            if let Err(e) = rl.save_history(path) {
                debug!("Could not save prompt history: {}", e);
            }
        }

        Ok(())
    }

    async fn handle_input(&mut self, input: &str) -> Result<()> {
        match input.trim() {
            "/help" => {
                self.presenter.plain(HELP_TEXT)?;
            }
            "/clear" => {
                self.conversation_state.clear(&mut *self.presenter)?;
            }
            _ => {
                self.submit(input).await?;
            }
        }

        Ok(())
    }

    /// Run one conversation turn.
    ///
    /// The user message is appended (and rendered) before the responder is
    /// called; the assistant message is appended only after the call
    /// resolves and extraction completes. The pending flag is released on
    /// every path out of the turn, and a turn already in flight makes new
    /// submissions a no-op.
    pub async fn submit(&mut self, text: &str) -> Result<()> {
        if text.trim().is_empty() {
            return Ok(());
        }
        if self.conversation_state.is_pending() {
            debug!("Ignoring submission while a turn is in flight");
            return Ok(());
        }
        let Some(responder) = self.responder.as_ref() else {
            bail!("responder client not initialized");
        };

        self.conversation_state
            .append(Message::user(text), &mut *self.presenter)?;
        self.conversation_state.set_pending(true, &mut *self.presenter)?;

        let outcome = responder.ask(text).await;

        let rendered = match outcome {
            Ok(ResponderReply::Answer(raw)) => {
                let reply = extract::extract(&raw);
                self.conversation_state.append(
                    Message::assistant(reply.answer, reply.links),
                    &mut *self.presenter,
                )
            }
            Ok(ResponderReply::ServerError(message)) => self.presenter.notice(&message),
            Err(cause) => {
                error!("Responder call failed: {}", cause);
                self.presenter.notice(SEND_FAILURE_NOTICE)
            }
        };

        self.conversation_state.set_pending(false, &mut *self.presenter)?;
        rendered
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;

    use super::*;
    use crate::cli::chat::conversation_state::Link;
    use crate::cli::chat::presenter::test_support::{PresenterEvent, RecordingPresenter};
    use crate::responder_client::ResponderError;

    type ScriptedReply = std::result::Result<ResponderReply, ResponderError>;

    struct ScriptedResponder {
        replies: Mutex<VecDeque<ScriptedReply>>,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Responder for ScriptedResponder {
        async fn ask(&self, _user_message: &str) -> ScriptedReply {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(ResponderReply::Answer(String::new())))
        }
    }

    fn scripted(replies: Vec<ScriptedReply>) -> (ScriptedResponder, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let responder = ScriptedResponder {
            replies: Mutex::new(replies.into_iter().collect()),
            calls: Arc::clone(&calls),
        };
        (responder, calls)
    }

    fn context_with(
        presenter: &RecordingPresenter,
        replies: Vec<ScriptedReply>,
    ) -> (ChatContext, Arc<AtomicUsize>) {
        let (responder, calls) = scripted(replies);
        let context = ChatContext::new(Box::new(presenter.clone()), None, false, None)
            .with_responder(Box::new(responder));
        (context, calls)
    }

    #[tokio::test]
    async fn test_submit_appends_user_message_then_assistant_reply() {
        let presenter = RecordingPresenter::new();
        let (mut context, _calls) = context_with(
            &presenter,
            vec![Ok(ResponderReply::Answer("Hi there".to_string()))],
        );

        context.submit("hello").await.unwrap();

        let messages = context.conversation_state.messages();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].is_user);
        assert_eq!(messages[0].text, "hello");
        assert_eq!(messages[0].links, vec![Link::none()]);
        assert!(!messages[1].is_user);
        assert_eq!(messages[1].text, "Hi there");
        assert_eq!(messages[1].links, vec![Link::none()]);
        assert!(!context.conversation_state.is_pending());
    }

    #[tokio::test]
    async fn test_user_message_is_rendered_before_the_call_resolves() {
        let presenter = RecordingPresenter::new();
        let (mut context, _calls) = context_with(
            &presenter,
            vec![Ok(ResponderReply::Answer("Hi there".to_string()))],
        );

        context.submit("hello").await.unwrap();

        let events = presenter.events();
        assert_eq!(
            events,
            vec![
                PresenterEvent::Appended {
                    text: "hello".to_string(),
                    is_user: true,
                    links: vec![String::new()],
                },
                PresenterEvent::Pending(true),
                PresenterEvent::Appended {
                    text: "Hi there".to_string(),
                    is_user: false,
                    links: vec![String::new()],
                },
                PresenterEvent::Pending(false),
            ]
        );
    }

    #[tokio::test]
    async fn test_reply_links_are_extracted_into_the_assistant_message() {
        let presenter = RecordingPresenter::new();
        let (mut context, _calls) = context_with(
            &presenter,
            vec![Ok(ResponderReply::Answer(
                "A See more:\nhttp://a.com\nhttp://b.com".to_string(),
            ))],
        );

        context.submit("x").await.unwrap();

        let messages = context.conversation_state.messages();
        assert_eq!(messages[1].text, "A ");
        assert_eq!(
            messages[1].links,
            vec![Link::new("http://a.com"), Link::new("http://b.com")]
        );
    }

    #[tokio::test]
    async fn test_server_error_leaves_only_the_user_message() {
        let presenter = RecordingPresenter::new();
        let (mut context, _calls) = context_with(
            &presenter,
            vec![Ok(ResponderReply::ServerError("bad".to_string()))],
        );

        context.submit("x").await.unwrap();

        let messages = context.conversation_state.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].is_user);
        assert!(presenter
            .events()
            .contains(&PresenterEvent::Notice("bad".to_string())));
        assert!(!context.conversation_state.is_pending());
    }

    #[tokio::test]
    async fn test_transport_failure_shows_the_fixed_notice() {
        let presenter = RecordingPresenter::new();
        let (mut context, _calls) = context_with(
            &presenter,
            vec![Err(ResponderError::Status(
                reqwest::StatusCode::INTERNAL_SERVER_ERROR,
            ))],
        );

        context.submit("x").await.unwrap();

        let messages = context.conversation_state.messages();
        assert_eq!(messages.len(), 1);
        assert!(presenter
            .events()
            .contains(&PresenterEvent::Notice(SEND_FAILURE_NOTICE.to_string())));
        assert!(!context.conversation_state.is_pending());
    }

    #[tokio::test]
    async fn test_malformed_payload_takes_the_transport_path() {
        let presenter = RecordingPresenter::new();
        let (mut context, _calls) =
            context_with(&presenter, vec![Err(ResponderError::MalformedPayload)]);

        context.submit("x").await.unwrap();

        assert_eq!(context.conversation_state.messages().len(), 1);
        assert!(presenter
            .events()
            .contains(&PresenterEvent::Notice(SEND_FAILURE_NOTICE.to_string())));
    }

    #[tokio::test]
    async fn test_empty_submission_is_rejected_silently() {
        let presenter = RecordingPresenter::new();
        let (mut context, calls) = context_with(&presenter, vec![]);

        context.submit("").await.unwrap();
        context.submit("   \n  ").await.unwrap();

        assert!(context.conversation_state.messages().is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(presenter.events().is_empty());
    }

    #[tokio::test]
    async fn test_submission_while_pending_is_a_no_op() {
        let presenter = RecordingPresenter::new();
        let (mut context, calls) = context_with(&presenter, vec![]);
        context
            .conversation_state
            .set_pending(true, &mut *context.presenter)
            .unwrap();

        context.submit("hello").await.unwrap();

        assert!(context.conversation_state.messages().is_empty());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_turns_alternate_user_and_assistant_messages() {
        let presenter = RecordingPresenter::new();
        let (mut context, _calls) = context_with(
            &presenter,
            vec![
                Ok(ResponderReply::Answer("first".to_string())),
                Ok(ResponderReply::ServerError("down".to_string())),
                Ok(ResponderReply::Answer("second".to_string())),
            ],
        );

        context.submit("a").await.unwrap();
        context.submit("b").await.unwrap();
        context.submit("c").await.unwrap();

        let sides: Vec<bool> = context
            .conversation_state
            .messages()
            .iter()
            .map(|m| m.is_user)
            .collect();
        // The failed turn contributes only its user message.
        assert_eq!(sides, vec![true, false, true, true, false]);
    }

    #[tokio::test]
    async fn test_empty_answer_falls_back_to_the_apology() {
        let presenter = RecordingPresenter::new();
        let (mut context, _calls) = context_with(
            &presenter,
            vec![Ok(ResponderReply::Answer(String::new()))],
        );

        context.submit("x").await.unwrap();

        let messages = context.conversation_state.messages();
        assert_eq!(messages[1].text, extract::EMPTY_ANSWER_FALLBACK);
        assert_eq!(messages[1].links, vec![Link::none()]);
    }

    #[tokio::test]
    async fn test_help_and_clear_do_not_touch_the_responder() {
        let presenter = RecordingPresenter::new();
        let (mut context, calls) = context_with(&presenter, vec![]);

        context.handle_input("/help").await.unwrap();
        context.handle_input("/clear").await.unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        let events = presenter.events();
        assert!(matches!(events[0], PresenterEvent::Plain(_)));
        assert_eq!(events[1], PresenterEvent::Cleared);
    }
}
