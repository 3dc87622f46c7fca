// Copyright (c) 2018 10x Genomics, Inc. All rights reserved.

//! Bridge start/status/stop requests to the external job queue. The
//! orchestrator resolves each request from fresh configuration and keeps no
//! job state of its own; the queue owns the jobs and their identifiers.

use crate::command::RunnerFactory;
use crate::config::{GeneralConfig, ResolvedRunConfig, RunOverrides};
use crate::error::Result;
use crate::logs::LogFileProvider;
use log::info;
use serde_derive::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Lifecycle of one conversion job, as reported by the job queue. `Started`
/// is assigned by the queue when the job is accepted.
#[derive(Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Debug)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Started,
    Running,
    Completed,
    Failed,
    Stopped,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Stopped
        )
    }
}

/// Contract of the external execution engine. It runs one OS process per
/// job and owns all job storage; errors it reports are passed through to the
/// caller unmodified.
pub trait JobQueue {
    fn start(
        &self,
        cmd: &[String],
        nbr_of_cores: usize,
        run_dir: &Path,
        stdout: &Path,
        stderr: &Path,
    ) -> anyhow::Result<u64>;
    fn status(&self, job_id: u64) -> anyhow::Result<JobState>;
    fn status_all(&self) -> anyhow::Result<BTreeMap<u64, JobState>>;
    fn stop(&self, job_id: u64) -> anyhow::Result<()>;
    fn stop_all(&self) -> anyhow::Result<()>;
}

/// What a successful start reports back to the operator.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct StartedJob {
    pub job_id: u64,
    /// The tool version the job runs with.
    pub version: String,
    /// Where the job's stdout/stderr is collected.
    pub log_file: PathBuf,
    /// Status-polling reference for this job.
    pub link: String,
}

pub struct Orchestrator<Q: JobQueue> {
    general: GeneralConfig,
    factory: RunnerFactory,
    queue: Q,
    logs: LogFileProvider,
}

impl<Q: JobQueue> Orchestrator<Q> {
    pub fn new(general: GeneralConfig, queue: Q) -> Orchestrator<Q> {
        let factory = RunnerFactory::new(&general);
        let logs = LogFileProvider::new(&general.bclconvert_logs_path);
        Orchestrator {
            general,
            factory,
            queue,
            logs,
        }
    }

    pub fn available_versions(&self) -> Vec<String> {
        self.factory
            .available_versions()
            .map(str::to_string)
            .collect()
    }

    /// Resolve, build and submit a conversion run for `runfolder_name`. Any
    /// resolution or construction failure aborts before the queue is asked
    /// to run anything, so a failed start leaves no job behind.
    pub fn start(&self, runfolder_name: &str, overrides: RunOverrides) -> Result<StartedJob> {
        let config = ResolvedRunConfig::resolve(&self.general, overrides, runfolder_name)?;
        let runner = self.factory.create_runner(config)?;
        let version = runner.version().to_string();
        let cmd = runner.build_command();

        // If the output directory exists, we always want to clear it.
        runner.delete_output()?;

        let log_file = self.logs.log_path_for(runfolder_name);
        let config = runner.config();
        let job_id = self.queue.start(
            &cmd,
            config.nbr_of_cores,
            &config.runfolder,
            &log_file,
            &log_file,
        )?;
        info!(
            "cmd: {:?} started in {:?} with {} cores. Writing logs to {:?}",
            cmd, config.runfolder, config.nbr_of_cores, log_file
        );

        Ok(StartedJob {
            link: format!("/api/1.0/status/{job_id}"),
            job_id,
            version,
            log_file,
        })
    }

    pub fn status(&self, job_id: u64) -> Result<JobState> {
        Ok(self.queue.status(job_id)?)
    }

    /// State of every job the queue currently tracks.
    pub fn status_all(&self) -> Result<BTreeMap<u64, JobState>> {
        Ok(self.queue.status_all()?)
    }

    pub fn stop(&self, job_id: u64) -> Result<()> {
        info!("attempting to stop job: {job_id}");
        Ok(self.queue.stop(job_id)?)
    }

    /// Stop every tracked job. With nothing tracked this is a no-op.
    pub fn stop_all(&self) -> Result<()> {
        info!("attempting to stop all jobs");
        Ok(self.queue.stop_all()?)
    }

    /// The collected log text for a runfolder's conversions.
    pub fn log_for(&self, runfolder_name: &str) -> Result<String> {
        self.logs.read_log(runfolder_name)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::config::test_fixtures::{site, RUNFOLDER_NAME};
    use crate::error::Error;
    use anyhow::anyhow;
    use pretty_assertions::assert_eq;
    use std::cell::RefCell;

    /// In-memory queue standing in for the external execution engine.
    #[derive(Default)]
    struct FakeQueue {
        jobs: RefCell<BTreeMap<u64, (Vec<String>, JobState)>>,
    }

    impl JobQueue for FakeQueue {
        fn start(
            &self,
            cmd: &[String],
            _nbr_of_cores: usize,
            _run_dir: &Path,
            _stdout: &Path,
            _stderr: &Path,
        ) -> anyhow::Result<u64> {
            let mut jobs = self.jobs.borrow_mut();
            let job_id = jobs.keys().max().copied().unwrap_or(0) + 1;
            jobs.insert(job_id, (cmd.to_vec(), JobState::Started));
            Ok(job_id)
        }

        fn status(&self, job_id: u64) -> anyhow::Result<JobState> {
            self.jobs
                .borrow()
                .get(&job_id)
                .map(|(_, state)| *state)
                .ok_or_else(|| anyhow!("no such job: {job_id}"))
        }

        fn status_all(&self) -> anyhow::Result<BTreeMap<u64, JobState>> {
            Ok(self
                .jobs
                .borrow()
                .iter()
                .map(|(&id, &(_, state))| (id, state))
                .collect())
        }

        fn stop(&self, job_id: u64) -> anyhow::Result<()> {
            match self.jobs.borrow_mut().get_mut(&job_id) {
                Some((_, state)) => {
                    *state = JobState::Stopped;
                    Ok(())
                }
                None => Err(anyhow!("no such job: {job_id}")),
            }
        }

        fn stop_all(&self) -> anyhow::Result<()> {
            for (_, state) in self.jobs.borrow_mut().values_mut() {
                *state = JobState::Stopped;
            }
            Ok(())
        }
    }

    fn orchestrator() -> (tempfile::TempDir, Orchestrator<FakeQueue>) {
        let (dir, general) = site();
        (dir, Orchestrator::new(general, FakeQueue::default()))
    }

    #[test]
    fn test_start() {
        let (_dir, orch) = orchestrator();
        let started = orch.start(RUNFOLDER_NAME, RunOverrides::default()).unwrap();

        assert_eq!(started.job_id, 1);
        assert_eq!(started.version, "4.0.3");
        assert_eq!(started.link, "/api/1.0/status/1");
        assert_eq!(
            started.log_file.file_name().unwrap().to_str().unwrap(),
            format!("{RUNFOLDER_NAME}.log")
        );
        assert_eq!(orch.status(started.job_id).unwrap(), JobState::Started);

        let (cmd, _) = orch.queue.jobs.borrow()[&started.job_id].clone();
        assert!(cmd.contains(&"--force".to_string()));

        // The pre-existing output directory was cleared before submission.
        assert!(!orch.general.default_output_path.join(RUNFOLDER_NAME).exists());
    }

    #[test]
    fn test_failed_start_leaves_no_job() {
        let (dir, orch) = orchestrator();

        let err = orch
            .start("no_such_runfolder", RunOverrides::default())
            .unwrap_err();
        assert!(err.is_usage());

        let overrides = RunOverrides {
            output: Some(dir.path().join("elsewhere").join("out")),
            ..Default::default()
        };
        assert!(orch.start(RUNFOLDER_NAME, overrides).unwrap_err().is_usage());

        let overrides = RunOverrides {
            bclconvert_version: Some("1.7".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            orch.start(RUNFOLDER_NAME, overrides).unwrap_err(),
            Error::UnknownVersion { .. }
        ));

        assert!(orch.status_all().unwrap().is_empty());
    }

    #[test]
    fn test_status_unknown_job() {
        let (_dir, orch) = orchestrator();
        assert!(matches!(orch.status(42), Err(Error::External(_))));
    }

    #[test]
    fn test_status_all_tracks_every_job() {
        let (_dir, orch) = orchestrator();
        let first = orch.start(RUNFOLDER_NAME, RunOverrides::default()).unwrap();
        let second = orch.start(RUNFOLDER_NAME, RunOverrides::default()).unwrap();

        let all = orch.status_all().unwrap();
        let ids: Vec<u64> = all.keys().copied().collect();
        assert_eq!(ids, vec![first.job_id, second.job_id]);
    }

    #[test]
    fn test_stop() {
        let (_dir, orch) = orchestrator();
        let started = orch.start(RUNFOLDER_NAME, RunOverrides::default()).unwrap();

        orch.stop(started.job_id).unwrap();
        assert_eq!(orch.status(started.job_id).unwrap(), JobState::Stopped);

        // Stopping an id the queue does not know is the queue's error,
        // passed through.
        assert!(matches!(orch.stop(999), Err(Error::External(_))));
    }

    #[test]
    fn test_stop_all_with_no_jobs() {
        let (_dir, orch) = orchestrator();
        orch.stop_all().unwrap();
    }

    #[test]
    fn test_log_for_runfolder() {
        let (_dir, orch) = orchestrator();
        let path = orch.logs.log_path_for(RUNFOLDER_NAME);
        std::fs::write(&path, "demultiplexing started\n").unwrap();
        assert_eq!(orch.log_for(RUNFOLDER_NAME).unwrap(), "demultiplexing started\n");

        assert!(matches!(
            orch.log_for("missing_runfolder"),
            Err(Error::Io(_))
        ));
    }

    #[test]
    fn test_available_versions() {
        let (_dir, orch) = orchestrator();
        assert_eq!(orch.available_versions(), vec!["4.0.3".to_string()]);
    }
}
