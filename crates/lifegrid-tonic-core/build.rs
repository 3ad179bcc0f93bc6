/// Generates the gRPC client and server bindings for the `lifegrid.Worker` and
/// `lifegrid.Coordinator` services using `tonic-build`'s manual builder.
///
/// Message types are hand-written prost structs in `src/proto.rs`, so no
/// `.proto` file (and no `protoc`) is involved. Every method uses
/// `tonic_prost::ProstCodec`, which keeps the bytes on the wire identical to
/// what a `.proto`-generated service would send.
///
/// # Output
///
/// Two files are written to `OUT_DIR` and included from `src/proto.rs`:
///
/// - `lifegrid.Worker.rs` (`worker_client`, `worker_server`)
/// - `lifegrid.Coordinator.rs` (`coordinator_client`, `coordinator_server`)
///
/// # Panics
///
/// `tonic-build` panics if it cannot write the generated files.
use tonic_build::manual::{Builder, Method, Service};

const CODEC: &str = "tonic_prost::ProstCodec";

fn method(name: &str, route: &str, input: &str, output: &str) -> Method {
    Method::builder()
        .name(name)
        .route_name(route)
        .input_type(format!("crate::proto::{input}"))
        .output_type(format!("crate::proto::{output}"))
        .codec_path(CODEC)
        .build()
}

fn main() {
    let worker = Service::builder()
        .name("Worker")
        .package("lifegrid")
        .method(method(
            "compute_partition",
            "ComputePartition",
            "ComputeRequest",
            "UpdatedRows",
        ))
        .build();

    let coordinator = Service::builder()
        .name("Coordinator")
        .package("lifegrid")
        .method(method(
            "submit_job",
            "SubmitJob",
            "SubmitJobRequest",
            "FinalResult",
        ))
        .method(method(
            "query_status",
            "QueryStatus",
            "QueryStatusRequest",
            "StatusSnapshot",
        ))
        .method(method(
            "cancel_job",
            "CancelJob",
            "CancelJobRequest",
            "CancelJobResponse",
        ))
        .build();

    Builder::new().compile(&[worker, coordinator]);

    println!("cargo:rerun-if-changed=build.rs");
}
