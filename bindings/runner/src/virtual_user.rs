use std::collections::VecDeque;
use std::time::Duration;

use rand::seq::IteratorRandom;
use storm_tape_client_instrumented::prelude::{StagedFile, TapeClient};

use crate::paths::{synthesize_paths, PathStyle};

const HISTORY_CAPACITY: usize = 1000;

/// Where the paths of an archive info request come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ArchiveInfoSource {
    /// New paths, made up in the user's [PathStyle].
    #[default]
    Fresh,
    /// Paths this user staged recently. Falls back to fresh paths before anything was staged.
    History,
}

/// How polling a stage request ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Every file reached a terminal state after the given number of status checks.
    AllTerminal { rounds: usize },
    /// The round limit was reached without every file reaching a terminal state.
    MaxRoundsExhausted,
}

/// The state and tasks of one simulated tape client.
///
/// A user holds at most one stage request id at a time. The id is dropped at the start of every
/// stage attempt, so a failed stage never leaves a stale id behind for the status checks or a
/// cancel, and it is dropped after a cancel.
///
/// Failures are not returned. The client records every call, with its failure message, and the
/// user carries on with its next task.
#[derive(Debug)]
pub struct VirtualUser {
    client: TapeClient,
    files_per_request: usize,
    path_style: PathStyle,
    archive_info_source: ArchiveInfoSource,
    archive_info_files: usize,
    request_id: Option<String>,
    history: VecDeque<String>,
}

impl VirtualUser {
    pub fn new(client: TapeClient, files_per_request: usize) -> Self {
        Self {
            client,
            files_per_request,
            path_style: PathStyle::default(),
            archive_info_source: ArchiveInfoSource::default(),
            archive_info_files: 5,
            request_id: None,
            history: VecDeque::new(),
        }
    }

    pub fn with_path_style(mut self, path_style: PathStyle) -> Self {
        self.path_style = path_style;
        self
    }

    /// Configure archive info requests to ask about `files` paths taken from `source`.
    pub fn with_archive_info(mut self, source: ArchiveInfoSource, files: usize) -> Self {
        self.archive_info_source = source;
        self.archive_info_files = files;
        self
    }

    pub fn request_id(&self) -> Option<&str> {
        self.request_id.as_deref()
    }

    pub fn files_per_request(&self) -> usize {
        self.files_per_request
    }

    /// Stage `files_per_request` new paths. Returns true if the service gave a request id, which
    /// the user then holds.
    pub async fn stage_files(&mut self) -> bool {
        self.request_id = None;

        let files = synthesize_paths(self.path_style, self.files_per_request);
        let paths: Vec<String> = files.iter().map(|f| f.path.clone()).collect();

        match self.client.stage(files).await {
            Ok(id) => {
                log::debug!("Staged {} files as request {}", paths.len(), id);
                self.remember(paths);
                self.request_id = Some(id);
                true
            }
            Err(e) => {
                log::debug!("Stage failed: {e}");
                false
            }
        }
    }

    /// Stage new paths and, if that gave a request id, read its status twice straight away as
    /// `get_stage1` and `get_stage2`. The reported file states are not looked at.
    ///
    /// Returns the number of status checks made.
    pub async fn stage_and_check(&mut self) -> usize {
        if !self.stage_files().await {
            return 0;
        }

        let Some(id) = self.request_id.clone() else {
            return 0;
        };

        for label in ["get_stage1", "get_stage2"] {
            if let Err(e) = self.client.stage_status(&id, label).await {
                log::debug!("Status check {label} for request {id} failed: {e}");
            }
        }

        2
    }

    /// One status check of the held request, recorded as `label`. Gives `Some(true)` when every
    /// file is terminal and `Some(false)` when some file is pending or the check failed. `None`
    /// when no request is held.
    pub async fn check_status(&self, label: &str) -> Option<bool> {
        let id = self.request_id.as_deref()?;

        match self.client.stage_status(id, label).await {
            Ok(status) => Some(status.all_terminal()),
            Err(e) => {
                log::debug!("Status check for request {id} failed: {e}");
                Some(false)
            }
        }
    }

    /// Poll the held request as `get_stage` until every file is terminal, waiting `interval`
    /// before each check and making at most `max_rounds` checks. `None` when no request is held.
    pub async fn poll_until_terminal(
        &self,
        max_rounds: usize,
        interval: Duration,
    ) -> Option<PollOutcome> {
        self.request_id.as_ref()?;

        for round in 1..=max_rounds {
            tokio::time::sleep(interval).await;

            if self.check_status("get_stage").await == Some(true) {
                return Some(PollOutcome::AllTerminal { rounds: round });
            }
        }

        Some(PollOutcome::MaxRoundsExhausted)
    }

    /// Ask for the archive info of `archive_info_files` paths.
    pub async fn request_archive_info(&mut self) {
        let files = match self.archive_info_source {
            ArchiveInfoSource::History if !self.history.is_empty() => {
                let mut rng = rand::thread_rng();
                self.history
                    .iter()
                    .choose_multiple(&mut rng, self.archive_info_files)
                    .into_iter()
                    .map(|p| StagedFile::new(p.as_str()))
                    .collect()
            }
            _ => synthesize_paths(self.path_style, self.archive_info_files),
        };

        if let Err(e) = self.client.archive_info(files).await {
            log::debug!("Archive info failed: {e}");
        }
    }

    /// Cancel the held request, if there is one, and forget it. Returns true if a cancel was sent.
    pub async fn cancel(&mut self) -> bool {
        let Some(id) = self.request_id.take() else {
            return false;
        };

        if let Err(e) = self.client.cancel(&id).await {
            log::debug!("Cancel of request {id} failed: {e}");
        }

        true
    }

    fn remember(&mut self, paths: Vec<String>) {
        for path in paths {
            if self.history.len() == HISTORY_CAPACITY {
                self.history.pop_front();
            }
            self.history.push_back(path);
        }
    }
}
