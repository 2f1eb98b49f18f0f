mod common;
mod context;
mod paths;
mod settings;
mod virtual_user;

pub mod prelude {
    /// Common operations for StoRM Tape scenarios.
    ///
    /// This is a good place to start if you are getting started writing scenarios.
    pub use crate::common::*;

    pub use crate::context::{DefaultScenarioValues, TapeAgentContext, TapeRunnerContext};
    pub use crate::paths::{synthesize_paths, PathStyle};
    pub use crate::settings::{
        TapeSettings, DEFAULT_FILES_PER_REQUEST, FILES_PER_REQUEST_ENV, INSECURE_ENV, TIMEOUT_ENV,
        TOKEN_ENV,
    };
    pub use crate::virtual_user::{ArchiveInfoSource, PollOutcome, VirtualUser};

    /// Re-export of the `tape_tunnel_runner` prelude.
    ///
    /// This is for convenience so that you can depend on a single crate for the runner in your scenarios.
    pub use tape_tunnel_runner::prelude::*;

    /// Re-export of the instrumented client for convenience.
    pub use storm_tape_client_instrumented::prelude::*;
}
