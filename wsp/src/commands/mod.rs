// Command handlers for wsp operations

use tracing::debug;

use crate::cli::{Args, Command};
use crate::error::WspResult;

pub mod ingress;

/// Main command dispatcher
#[must_use = "command execution results should be handled"]
pub fn execute_command(args: Args) -> WspResult<()> {
    match &args.command {
        Command::Ingress { command } => {
            debug!("Handling ingress command");
            ingress::handle_ingress_command(command, args.admin_url.as_deref())
        }
    }
}
