//! Protocol Buffer definitions and generated code for the gNMI service.
//!
//! This module contains auto-generated Rust types from the Protobuf
//! definition in `proto/gnmi.proto`, created using [`tonic-build`].

pub mod gnmi {
    tonic::include_proto!("gnmi");
}
