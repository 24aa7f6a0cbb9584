//! Stop / status / open / terminal handlers: one request over the control channel

use console::style;

use super::{runtime, CommandContext};
use crate::cli::ControlArgs;
use crate::control::{control_addr, send_request, ControlRequest, ControlResponse};
use crate::error::{HostError, Result};

/// Send `request` to the running service and render the reply
pub fn run_control(
    request: ControlRequest,
    args: &ControlArgs,
    ctx: &CommandContext,
) -> Result<String> {
    let config = ctx.load_config()?;
    let port = args.control_port.unwrap_or(config.supervisor.control_port);
    let addr = control_addr(port);

    let reply = match runtime()?.block_on(send_request(addr, &request)) {
        Ok(reply) => reply,
        Err(HostError::Control { message }) if request == ControlRequest::Status => {
            tracing::debug!("{}", message);
            let installed = if config.layout().is_installed() { "yes" } else { "no" };
            return Ok(format!(
                "codehost is not running (runtime installed: {})\n",
                installed
            ));
        }
        Err(e) => return Err(e),
    };

    if args.json {
        let json = serde_json::to_string_pretty(&reply).map_err(|e| HostError::Control {
            message: e.to_string(),
        })?;
        return Ok(format!("{}\n", json));
    }

    match reply {
        ControlResponse::Ack { result } => {
            let outcome = result["outcome"].as_str().unwrap_or("unknown");
            match (result["kind"].as_str(), result["id"].as_str()) {
                (Some(kind), Some(id)) => Ok(format!(
                    "{} {} {} session {}\n",
                    style("✓").green(),
                    outcome,
                    kind,
                    style(id).dim()
                )),
                _ => Ok(format!("{} {}\n", style("✓").green(), outcome)),
            }
        }
        ControlResponse::Status { state, surface } => {
            let title = surface["title"].as_str().unwrap_or_default();
            Ok(format!("{}: {}\n", style(state).bold(), title))
        }
        ControlResponse::Pong => Ok("pong\n".to_string()),
        ControlResponse::Error { message } => Err(HostError::Control { message }),
    }
}
