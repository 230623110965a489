//! Provider call history
//!
//! Every driver call made by a manager goes through [`CallLog::call`], which
//! emits one event on the `cloudweave::calllog` target with the elapsed time
//! and the error, if any.

use cloudweave_cloud::{DriverError, RegionInfo, ResourceKind};
use std::future::Future;
use std::time::Instant;

pub const TARGET: &str = "cloudweave::calllog";

/// Where a provider call goes
#[derive(Debug, Clone)]
pub struct CallLog {
    pub connection: String,
    pub provider: String,
    pub region: RegionInfo,
}

impl CallLog {
    pub fn new(connection: impl Into<String>, provider: impl Into<String>, region: RegionInfo) -> Self {
        Self {
            connection: connection.into(),
            provider: provider.into(),
            region,
        }
    }

    /// Awaits `fut` and records it
    pub async fn call<T, F>(
        &self,
        kind: ResourceKind,
        name: &str,
        api: &'static str,
        fut: F,
    ) -> Result<T, DriverError>
    where
        F: Future<Output = Result<T, DriverError>>,
    {
        let started = Instant::now();
        let result = fut.await;
        let elapsed_ms = started.elapsed().as_millis() as u64;
        let region = format!("{}/{}", self.region.region, self.region.zone);
        match &result {
            Ok(_) => tracing::info!(
                target: TARGET,
                connection = %self.connection,
                provider = %self.provider,
                region = %region,
                kind = %kind,
                name = %name,
                api = api,
                elapsed_ms = elapsed_ms,
                "provider call"
            ),
            Err(err) => tracing::info!(
                target: TARGET,
                connection = %self.connection,
                provider = %self.provider,
                region = %region,
                kind = %kind,
                name = %name,
                api = api,
                elapsed_ms = elapsed_ms,
                error = %err,
                "provider call failed"
            ),
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_call_passes_result_through() {
        let log = CallLog::new("c1", "MOCK", RegionInfo::default());
        let ok = log
            .call(ResourceKind::Vpc, "v1", "create_vpc", async { Ok(7) })
            .await;
        assert_eq!(ok, Ok(7));

        let err = log
            .call::<(), _>(ResourceKind::Vm, "vm", "get_vm", async {
                Err(DriverError::not_found("i-1"))
            })
            .await;
        assert!(err.unwrap_err().is_not_found());
    }
}
