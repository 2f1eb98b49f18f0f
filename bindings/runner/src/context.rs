use anyhow::Context;
use tape_tunnel_runner::prelude::UserValuesConstraint;
use url::Url;

use crate::settings::TapeSettings;
use crate::virtual_user::VirtualUser;

/// Runner context for StoRM Tape scenarios, filled in by [crate::common::configure_tape_settings].
#[derive(Default, Debug)]
pub struct TapeRunnerContext {
    pub(crate) base_url: Option<Url>,
    pub(crate) settings: Option<TapeSettings>,
}

impl UserValuesConstraint for TapeRunnerContext {}

impl TapeRunnerContext {
    pub fn settings(&self) -> anyhow::Result<&TapeSettings> {
        self.settings.as_ref().context(
            "Tape settings are not configured, call 'configure_tape_settings' in the scenario 'setup'",
        )
    }

    pub fn base_url(&self) -> anyhow::Result<&Url> {
        self.base_url.as_ref().context(
            "Tape service URL is not configured, call 'configure_tape_settings' in the scenario 'setup'",
        )
    }
}

/// Scenario values for scenarios that do not need their own.
#[derive(Default, Debug)]
pub struct DefaultScenarioValues {}

impl UserValuesConstraint for DefaultScenarioValues {}

/// Agent context for StoRM Tape scenarios.
///
/// `SV` holds any extra per agent state that a scenario needs.
#[derive(Default, Debug)]
pub struct TapeAgentContext<SV: UserValuesConstraint = DefaultScenarioValues> {
    pub(crate) virtual_user: Option<VirtualUser>,
    pub scenario_values: SV,
}

impl<SV: UserValuesConstraint> UserValuesConstraint for TapeAgentContext<SV> {}

impl<SV: UserValuesConstraint> TapeAgentContext<SV> {
    pub fn virtual_user(&self) -> anyhow::Result<&VirtualUser> {
        self.virtual_user
            .as_ref()
            .context("No virtual user, call 'install_virtual_user' in the agent setup")
    }

    pub fn virtual_user_mut(&mut self) -> anyhow::Result<&mut VirtualUser> {
        self.virtual_user
            .as_mut()
            .context("No virtual user, call 'install_virtual_user' in the agent setup")
    }
}
