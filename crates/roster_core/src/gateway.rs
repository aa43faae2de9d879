//! Persistence gateway seen by the coordinator: whole-roster load and save, blocking.

use anyhow::{Context, Result};
use shared::domain::Member;
use storage::{MemberRepository, Storage};
use tokio::runtime::{Builder, Runtime};

pub trait MemberGateway {
    fn load_all(&self) -> Result<Vec<Member>>;
    fn save_all(&self, members: &[Member]) -> Result<()>;
}

/// Bridges an async [`MemberRepository`] onto the coordinator's thread.
///
/// Owns a current-thread runtime, so it must not be driven from inside another
/// tokio runtime.
pub struct StorageGateway<R> {
    // dropped before the runtime so pooled connections close while it is alive
    repository: R,
    runtime: Runtime,
}

impl StorageGateway<Storage> {
    pub fn open(database_url: &str) -> Result<Self> {
        let runtime = build_runtime()?;
        let storage = runtime
            .block_on(Storage::new(database_url))
            .with_context(|| format!("failed to open roster database '{database_url}'"))?;
        tracing::info!(database_url, "roster database opened");
        Ok(Self {
            runtime,
            repository: storage,
        })
    }
}

impl<R: MemberRepository> StorageGateway<R> {
    pub fn with_repository(repository: R) -> Result<Self> {
        Ok(Self {
            runtime: build_runtime()?,
            repository,
        })
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }
}

impl<R: MemberRepository> MemberGateway for StorageGateway<R> {
    fn load_all(&self) -> Result<Vec<Member>> {
        self.runtime
            .block_on(self.repository.load_members())
            .context("failed to load roster")
    }

    fn save_all(&self, members: &[Member]) -> Result<()> {
        self.runtime
            .block_on(self.repository.replace_members(members))
            .with_context(|| format!("failed to save roster of {} members", members.len()))
    }
}

fn build_runtime() -> Result<Runtime> {
    Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to build storage runtime")
}

#[cfg(test)]
#[path = "tests/gateway_tests.rs"]
mod tests;
