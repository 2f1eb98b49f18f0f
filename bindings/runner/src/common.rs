use std::time::Duration;

use anyhow::Context;
use storm_tape_client_instrumented::prelude::TapeClient;
use tape_tunnel_runner::prelude::{
    AgentContext, HookResult, RunnerContext, TapeTunnelResult, UserValuesConstraint,
};
use url::Url;

use crate::context::{TapeAgentContext, TapeRunnerContext};
use crate::settings::TapeSettings;
use crate::virtual_user::{PollOutcome, VirtualUser};

/// Read the [TapeSettings] from the environment and check the connection string, storing both in
/// the [TapeRunnerContext].
///
/// Call this from the scenario `setup` hook:
/// ```rust
/// use storm_tape_tunnel_runner::prelude::*;
///
/// fn setup(ctx: &mut RunnerContext<TapeRunnerContext>) -> HookResult {
///     configure_tape_settings(ctx)?;
///     Ok(())
/// }
/// ```
pub fn configure_tape_settings(ctx: &mut RunnerContext<TapeRunnerContext>) -> HookResult {
    let connection_string = ctx.get_connection_string().to_string();
    let base_url = Url::parse(&connection_string)
        .with_context(|| format!("Invalid tape service URL: {connection_string}"))?;

    let settings = TapeSettings::from_env();
    log::info!("Testing tape service at {base_url} with {settings:?}");
    if settings.accept_invalid_certs {
        log::warn!("TLS certificate verification is disabled, only use this against test services");
    }

    let values = ctx.get_mut();
    values.base_url = Some(base_url);
    values.settings = Some(settings);

    Ok(())
}

/// Create the agent's [VirtualUser] with a client that reports to the runner.
///
/// `customise` can change how the user makes up paths and archive info requests. Pass
/// [std::convert::identity] to keep the defaults.
pub fn install_virtual_user<SV: UserValuesConstraint>(
    ctx: &mut AgentContext<TapeRunnerContext, TapeAgentContext<SV>>,
    customise: impl FnOnce(VirtualUser) -> VirtualUser,
) -> HookResult {
    let runner_values = ctx.runner_context().get();
    let settings = runner_values.settings()?;
    let config = settings.client_config(runner_values.base_url()?.clone());
    let files_per_request = settings.files_per_request;

    let client = TapeClient::new(config, ctx.runner_context().reporter())
        .context("Failed to create tape client")?;

    log::debug!("Installed virtual user for agent {}", ctx.agent_name());
    ctx.get_mut().virtual_user = Some(customise(VirtualUser::new(client, files_per_request)));

    Ok(())
}

/// Stage new files and check the status twice. See [VirtualUser::stage_and_check].
pub fn stage_and_check<SV: UserValuesConstraint>(
    ctx: &mut AgentContext<TapeRunnerContext, TapeAgentContext<SV>>,
) -> HookResult {
    let runner_context = ctx.runner_context().clone();
    let user = ctx.get_mut().virtual_user_mut()?;

    runner_context.executor().execute_in_place(async move {
        user.stage_and_check().await;
        Ok(())
    })
}

/// Stage new files and poll them until done or until `max_rounds` checks were made.
///
/// Returns whether the files all reached a terminal state.
pub fn stage_and_poll<SV: UserValuesConstraint>(
    ctx: &mut AgentContext<TapeRunnerContext, TapeAgentContext<SV>>,
    max_rounds: usize,
    interval: Duration,
) -> TapeTunnelResult<bool> {
    let runner_context = ctx.runner_context().clone();
    let user = ctx.get_mut().virtual_user_mut()?;

    runner_context.executor().execute_in_place(async move {
        if !user.stage_files().await {
            return Ok(false);
        }

        let outcome = user.poll_until_terminal(max_rounds, interval).await;
        log::trace!("Polling ended with {outcome:?}");

        Ok(matches!(outcome, Some(PollOutcome::AllTerminal { .. })))
    })
}

/// Ask for archive info. See [VirtualUser::request_archive_info].
pub fn request_archive_info<SV: UserValuesConstraint>(
    ctx: &mut AgentContext<TapeRunnerContext, TapeAgentContext<SV>>,
) -> HookResult {
    let runner_context = ctx.runner_context().clone();
    let user = ctx.get_mut().virtual_user_mut()?;

    runner_context.executor().execute_in_place(async move {
        user.request_archive_info().await;
        Ok(())
    })
}

/// Cancel the held stage request, if any. See [VirtualUser::cancel].
pub fn cancel_stage<SV: UserValuesConstraint>(
    ctx: &mut AgentContext<TapeRunnerContext, TapeAgentContext<SV>>,
) -> HookResult {
    let runner_context = ctx.runner_context().clone();
    let user = ctx.get_mut().virtual_user_mut()?;

    runner_context.executor().execute_in_place(async move {
        user.cancel().await;
        Ok(())
    })
}
