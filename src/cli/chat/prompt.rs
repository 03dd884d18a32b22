use std::path::PathBuf;

use rustyline::{Cmd, Config, Editor, EventHandler, KeyCode, KeyEvent, Modifiers, Result};

pub fn generate_prompt(custom_prompt: Option<&str>) -> String {
    custom_prompt.unwrap_or("> ").to_string()
}

/// Line editor for the chat loop.
///
/// Plain Enter submits the buffer; Alt+Enter inserts a literal line break
/// instead of submitting.
pub fn rl() -> Result<Editor<()>> {
    let config = Config::builder()
        .history_ignore_space(true)
        .completion_type(rustyline::CompletionType::List)
        .build();
    let mut editor = Editor::with_config(config)?;
    editor.bind_sequence(
        KeyEvent(KeyCode::Enter, Modifiers::ALT),
        EventHandler::Simple(Cmd::Newline),
    );
    Ok(editor)
}

/// Prompt history lives next to the user's other dotfiles.
pub fn history_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".sources_chat_history"))
}
