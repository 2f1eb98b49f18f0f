mod cli;
mod context;
mod definition;
mod executor;
mod init;
mod monitor;
mod progress;
mod run;
mod shutdown;
mod tasks;
mod types;

pub mod prelude {
    pub use crate::cli::TapeTunnelScenarioCli;
    pub use crate::context::{AgentContext, RunnerContext, UserValuesConstraint};
    pub use crate::definition::{HookResult, ScenarioDefinitionBuilder};
    pub use crate::executor::Executor;
    pub use crate::init::init;
    pub use crate::run::run;
    pub use crate::tasks::{TaskSet, WaitTime};
    pub use crate::types::TapeTunnelResult;

    /// Re-export of the core types that hooks need to interact with the runner.
    pub use tape_tunnel_core::prelude::{
        AgentBailError, DelegatedShutdownListener, ShutdownSignalError,
    };

    /// Re-export of the instruments so that bindings can report operations.
    pub use tape_tunnel_instruments::prelude::*;
}
