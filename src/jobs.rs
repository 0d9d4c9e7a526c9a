//! Submit asynchronous jobs and wait for them to finish.

use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::api::{ApiClient, CallOptions, Endpoint, Transport};
use crate::error::{AiHeroError, Result};
use crate::poll::{PollOutcome, Poller, StateVocabulary};
use crate::schema::Job;

/// Job operations under one resource path, e.g. `/automations/{id}`.
pub struct JobClient<'a, T> {
    client: &'a ApiClient<T>,
}

impl<'a, T: Transport> JobClient<'a, T> {
    pub fn new(client: &'a ApiClient<T>) -> Self {
        Self { client }
    }

    /// POST `body` to `{resource_path}/jobs` and return the created job.
    pub async fn submit<B: Serialize>(
        &self,
        resource_path: &str,
        body: &B,
        options: &CallOptions,
    ) -> Result<Job> {
        let path = format!("{resource_path}/jobs");
        let job = decode_job(self.client.post(&path, body, options).await?)?;
        info!(%resource_path, job_id = %job.id, state = job.state.as_deref().unwrap_or("-"), "job submitted");
        Ok(job)
    }

    pub async fn fetch(
        &self,
        resource_path: &str,
        job_id: &str,
        options: &CallOptions,
    ) -> Result<Job> {
        let path = format!("{resource_path}/jobs{}", Endpoint::path(&[job_id])?);
        decode_job(self.client.get(&path, options).await?)
    }

    /// Poll an already submitted job with the job vocabulary.
    pub async fn poll(
        &self,
        resource_path: &str,
        job_id: &str,
        options: &CallOptions,
        poller: &Poller,
    ) -> Result<PollOutcome<Job>> {
        poller
            .run(job_id, &StateVocabulary::JOB, || {
                self.fetch(resource_path, job_id, options)
            })
            .await
    }

    /// Submit, then block until the job is `done`.
    ///
    /// A job in the `error` state yields [`AiHeroError::RemoteJob`] and is
    /// not fetched again.
    pub async fn run<B: Serialize>(
        &self,
        resource_path: &str,
        body: &B,
        submit_options: &CallOptions,
        fetch_options: &CallOptions,
        poller: &Poller,
    ) -> Result<Job> {
        let job = self.submit(resource_path, body, submit_options).await?;
        let outcome = self
            .poll(resource_path, &job.id, fetch_options, poller)
            .await?;
        Ok(outcome.snapshot)
    }
}

fn decode_job(value: Value) -> Result<Job> {
    serde_json::from_value(value.clone())
        .map_err(|e| AiHeroError::Schema(format!("expected a job with an id, got {value}: {e}")))
}
