use std::time::Duration;

use storm_tape_tunnel_runner::prelude::*;

const MAX_POLL_ROUNDS: usize = 5;
const POLL_INTERVAL: Duration = Duration::from_secs(1);
const ARCHIVE_INFO_FILES: usize = 5;

fn setup(ctx: &mut RunnerContext<TapeRunnerContext>) -> HookResult {
    configure_tape_settings(ctx)?;
    Ok(())
}

fn agent_setup(ctx: &mut AgentContext<TapeRunnerContext, TapeAgentContext>) -> HookResult {
    install_virtual_user(ctx, |user| {
        user.with_path_style(PathStyle::Uuid)
            .with_archive_info(ArchiveInfoSource::History, ARCHIVE_INFO_FILES)
    })?;
    Ok(())
}

fn stage_then_poll(ctx: &mut AgentContext<TapeRunnerContext, TapeAgentContext>) -> HookResult {
    let done = stage_and_poll(ctx, MAX_POLL_ROUNDS, POLL_INTERVAL)?;
    if !done {
        log::debug!("Agent {} left a stage request unfinished", ctx.agent_name());
    }
    Ok(())
}

fn archive_info(ctx: &mut AgentContext<TapeRunnerContext, TapeAgentContext>) -> HookResult {
    request_archive_info(ctx)
}

fn cancel(ctx: &mut AgentContext<TapeRunnerContext, TapeAgentContext>) -> HookResult {
    cancel_stage(ctx)
}

fn main() -> TapeTunnelResult<()> {
    let builder =
        ScenarioDefinitionBuilder::<TapeRunnerContext, TapeAgentContext>::new_with_init(
            env!("CARGO_PKG_NAME"),
        )
        .with_default_duration_s(60)
        .with_wait_time(WaitTime::between(
            Duration::from_secs(1),
            Duration::from_secs(3),
        ))
        .add_capture_env(FILES_PER_REQUEST_ENV)
        .use_setup(setup)
        .use_agent_setup(agent_setup)
        .use_agent_tasks(
            TaskSet::new()
                .task("stage_and_poll", 3, stage_then_poll)
                .task("archive_info", 1, archive_info)
                .task("cancel", 1, cancel),
        );

    run(builder)?;

    Ok(())
}
