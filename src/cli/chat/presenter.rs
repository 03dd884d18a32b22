use std::io::Write;

use chrono::Local;
use color_print::cformat;
use crossterm::cursor::MoveToColumn;
use crossterm::execute;
use crossterm::terminal::{Clear, ClearType};
use eyre::Result;

use crate::cli::chat::conversation_state::Message;

/// What the conversation core needs from a rendering side.
///
/// The core only ever calls these hooks; it never knows how (or whether) the
/// transcript ends up on screen. `notice` is a transient, non-blocking
/// notification and must not touch the transcript.
pub trait Presenter {
    fn message_appended(&mut self, message: &Message) -> Result<()>;
    fn pending_changed(&mut self, pending: bool) -> Result<()>;
    fn notice(&mut self, text: &str) -> Result<()>;
    fn conversation_cleared(&mut self) -> Result<()>;
    fn plain(&mut self, text: &str) -> Result<()>;
}

const PENDING_TEXT: &str = "thinking...";

/// Terminal renderer for the chat transcript.
pub struct TerminalPresenter {
    output: Box<dyn Write>,
}

impl TerminalPresenter {
    pub fn new(output: Box<dyn Write>) -> Self {
        Self { output }
    }
}

impl Presenter for TerminalPresenter {
    fn message_appended(&mut self, message: &Message) -> Result<()> {
        let clock = message.sent_at.with_timezone(&Local).format("%H:%M:%S");
        if message.is_user {
            writeln!(
                self.output,
                "{}",
                cformat!("<dim>[{}]</dim> <bold><cyan>you</cyan></bold> {}", clock, message.text)
            )?;
        } else {
            writeln!(
                self.output,
                "{}",
                cformat!("<dim>[{}]</dim> <bold><green>bot</green></bold> {}", clock, message.text)
            )?;
            if message.has_links() {
                writeln!(self.output, "{}", cformat!("<bold>Sources:</bold>"))?;
                for link in &message.links {
                    if !link.url.is_empty() {
                        writeln!(
                            self.output,
                            "{}",
                            cformat!("  <underline><blue>{}</blue></underline>", link.url)
                        )?;
                    }
                }
            }
        }
        self.output.flush()?;
        Ok(())
    }

    fn pending_changed(&mut self, pending: bool) -> Result<()> {
        if pending {
            write!(self.output, "{}", cformat!("<dim>{}</dim>", PENDING_TEXT))?;
            self.output.flush()?;
        } else {
            // The indicator line is overwritten by whatever comes next.
            execute!(self.output, MoveToColumn(0), Clear(ClearType::CurrentLine))?;
        }
        Ok(())
    }

    fn notice(&mut self, text: &str) -> Result<()> {
        writeln!(self.output, "{}", cformat!("<bold><yellow>!</yellow></bold> {}", text))?;
        self.output.flush()?;
        Ok(())
    }

    fn conversation_cleared(&mut self) -> Result<()> {
        writeln!(self.output, "Conversation cleared.")?;
        Ok(())
    }

    fn plain(&mut self, text: &str) -> Result<()> {
        writeln!(self.output, "{}", text)?;
        Ok(())
    }
}
