pub mod client;
#[cfg(test)]
pub mod stub;

pub use client::{HttpRemoteApi, Operation, RemoteApi, RemoteError};
