// User-facing strings.

pub const PREFIX_USER: &str = "| ";
pub const PREFIX_ASSISTANT: &str = "> ";

pub const WELCOME: &str = "LocoLama: chat with a local model. /help for commands, /quit to leave.";

pub const HELP: &str = "\
/model [name]   show or switch the model
/stream on|off  toggle streamed replies
/new            start a new conversation
/history        list saved conversations
/open <id>      switch to a saved conversation
/delete <id>    delete a saved conversation
/clear          delete all saved conversations
/quit           exit
Ctrl-C cancels a reply that is still streaming.";

/// Assistant turn recorded when a buffered request fails.
pub const CONNECT_ERROR_TURN: &str =
    "Error: Could not connect to local Ollama instance. Make sure Ollama is running.";

pub const STREAM_CONNECT_FAILED: &str = "Failed to connect to Ollama. Make sure it is running.";
pub const STREAM_READ_FAILED: &str = "Error reading stream. Please try again.";

/// Offered when the relay cannot list models.
pub const FALLBACK_MODELS: [&str; 3] = ["llama2", "mistral", "codellama"];

pub fn info_line(msg: &str) -> String {
    format!("[info] {}", msg)
}
