//! Concrete probe implementations.

pub mod http;
pub mod remote;

pub use http::HttpReachabilityProbe;
pub use remote::RemoteCommandProbe;
