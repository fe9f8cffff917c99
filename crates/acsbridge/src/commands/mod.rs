//! Command dispatch: bridges CLI args -> core service -> output formatting.

pub mod catalog;
pub mod config_cmd;
pub mod params;
pub mod resolve;
pub mod set;
pub mod util;
pub mod values;

use acsbridge_core::{ConfigService, GenieAcs};

use crate::cli::{Command, GlobalOpts};
use crate::config::Config;
use crate::error::CliError;

/// The service every device-bound command runs against.
pub type Service = ConfigService<GenieAcs, GenieAcs>;

/// Dispatch a device-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    service: &Service,
    global: &GlobalOpts,
    config: &Config,
) -> Result<(), CliError> {
    match cmd {
        Command::Values(args) => values::handle(service, args, global).await,
        Command::Params(args) => params::handle(service, args, global).await,
        Command::Resolve(args) => resolve::handle(service, args, global).await,
        Command::Set(args) => set::handle(service, args, global, config).await,
        // Handled before a service is built
        Command::Catalog(_) | Command::Config(_) | Command::Completions(_) => Err(CliError::Internal(
            "command does not need an ACS connection".into(),
        )),
    }
}
