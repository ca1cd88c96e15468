//! Binary entrypoint that serves the chat API.

use std::process::ExitCode;

use gemini_chat::start_gemini_chat;

/// Load configuration, hydrate the conversation and serve until Ctrl+C.
fn main() -> ExitCode {
    start_gemini_chat::run()
}
