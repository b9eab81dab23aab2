//! The read-prompt-dispatch loop.

use std::io::Write;

use cf_backend::ModelClient;
use tokio::runtime::Handle;

use crate::error::CoreError;
use crate::session::{Flow, Session};
use crate::style::Console;
use crate::terminal::UserInput;

fn print_banner<W: Write>(console: &mut Console<W>) {
    console.blank();
    console.heading("☕ Coffee Terminal - Interactive Shell");
    console.blank();
    console.dim("Type a request or prefix with '/' to run a direct command.");
    console.dim("Type 'exit' or 'quit' to leave.");
    console.blank();
}

/// Run the shell until the user leaves, input ends, or an interrupt.
///
/// Each turn races Ctrl-C, so an interrupt while a command or model call is
/// in flight cancels the turn and ends the session.
pub fn run_shell<M, I, W>(session: &mut Session<M, I, W>, rt_handle: &Handle)
where
    M: ModelClient,
    I: UserInput,
    W: Write,
{
    print_banner(session.console_mut());

    loop {
        let line = match session.read_prompt() {
            Ok(Some(line)) => line,
            Ok(None) | Err(CoreError::Interrupted) => break,
            Err(e) => {
                session.console_mut().error(&e.to_string());
                break;
            }
        };

        let flow = rt_handle.block_on(async {
            tokio::select! {
                flow = session.handle_line(&line) => flow,
                _ = tokio::signal::ctrl_c() => Err(CoreError::Interrupted),
            }
        });

        match flow {
            Ok(Flow::Continue) => {}
            Ok(Flow::Exit) | Err(CoreError::Interrupted) => break,
            Err(e) => {
                tracing::warn!("turn failed: {e}");
                session.console_mut().error(&e.to_string());
            }
        }
    }

    let console = session.console_mut();
    console.blank();
    console.info("Goodbye!");
}
