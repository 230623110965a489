//! Handler implementations of the mock driver

mod compute;
mod network;
mod service;
