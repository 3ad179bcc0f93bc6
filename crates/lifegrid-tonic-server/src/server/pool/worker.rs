use super::backend::{ComputeBackend, ComputedRows, PartitionJob};
use crate::server::config::ChannelSettings;
use lifegrid_tonic_core::{
    Error, Result,
    proto::{ComputeRequest, worker_client::WorkerClient},
};
use tonic::{
    codec::CompressionEncoding,
    transport::{Channel, Endpoint},
};

/// A `lifegrid.Worker` reached over gRPC.
///
/// The channel connects lazily, so building a pool never blocks on a worker
/// that is down; the failure surfaces in the first generation that needs it
/// as [`Error::WorkerUnreachable`].
#[derive(Debug, Clone)]
pub struct RemoteWorker {
    endpoint: String,
    client: WorkerClient<Channel>,
}

impl RemoteWorker {
    /// # Errors
    ///
    /// Returns [`Error::InvalidJob`] if `endpoint` is not a valid URI.
    pub fn connect(endpoint: &str, settings: &ChannelSettings) -> Result<Self> {
        let channel = Endpoint::from_shared(endpoint.to_string())
            .map_err(|e| Error::invalid_job(format!("invalid worker endpoint `{endpoint}`: {e}")))?
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .tcp_nodelay(true)
            .connect_lazy();

        let client = WorkerClient::new(channel)
            .max_decoding_message_size(settings.max_message_bytes)
            .max_encoding_message_size(settings.max_message_bytes)
            .send_compressed(CompressionEncoding::Zstd)
            .accept_compressed(CompressionEncoding::Zstd);

        Ok(Self {
            endpoint: endpoint.to_string(),
            client,
        })
    }
}

fn wire_row(row: usize) -> Result<u32> {
    u32::try_from(row).map_err(|_| Error::invalid_job(format!("row {row} does not fit the wire")))
}

#[tonic::async_trait]
impl ComputeBackend for RemoteWorker {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn compute(&self, job: &PartitionJob) -> Result<ComputedRows> {
        let worker = job.partition.index;
        let request = ComputeRequest {
            grid: Some(job.snapshot.wire()),
            row_start: wire_row(job.partition.rows.start)?,
            row_end: wire_row(job.partition.rows.end)?,
            generations: 1,
            worker_index: u32::try_from(worker).unwrap_or(u32::MAX),
            generation: job.generation,
        };

        // Clients are cheap handles onto the shared channel.
        let mut client = self.client.clone();
        let reply = client
            .compute_partition(request)
            .await
            .map_err(|status| {
                Error::from_worker_status(&status, worker, &self.endpoint, job.generation)
            })?
            .into_inner();

        Ok(ComputedRows {
            rows: reply.row_start as usize..reply.row_end as usize,
            cells: reply.rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rejects_malformed_endpoints() {
        let err = RemoteWorker::connect("not a uri", &ChannelSettings::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidJob { .. }), "{err}");
    }

    #[tokio::test]
    async fn connects_lazily() {
        // Nothing listens on port 1; construction must still succeed.
        let worker = RemoteWorker::connect("http://127.0.0.1:1", &ChannelSettings::default())
            .expect("lazy channel");
        assert_eq!(worker.endpoint(), "http://127.0.0.1:1");
    }
}
