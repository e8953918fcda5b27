//! Generated gRPC bindings (see `build.rs` / `proto/rpc.proto`).

tonic::include_proto!("gg.rpc");
