//! Network collaborator used by the sync engine

pub mod http;

use thiserror_no_std::Error;

use crate::config::SheetEndpoint;
use crate::credentials::WifiCredentials;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetError {
    #[error("no WiFi credentials configured")]
    NoCredentials,
    #[error("timed out joining the network")]
    ConnectTimeout,
    #[error("could not resolve host")]
    Dns,
    #[error("could not connect to host")]
    Connect,
    #[error("socket error")]
    Io,
    #[error("malformed HTTP response")]
    Http,
}

/// Result of one upload attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// The server answered; `status` is the HTTP status code.
    Accepted { status: u16 },
    /// The request was sent but no response arrived in time.
    TimedOut,
    Failed(NetError),
}

/// WiFi association plus one-shot HTTP POST.
///
/// Every wait is bounded by the caller-supplied or configured timeout.
pub trait NetworkClient {
    /// Join the network described by `credentials`.
    fn connect(
        &mut self,
        credentials: &WifiCredentials,
        timeout_ms: u32,
    ) -> impl Future<Output = Result<(), NetError>>;

    /// POST `payload` (JSON) to `endpoint`.
    fn submit(
        &mut self,
        endpoint: &SheetEndpoint,
        payload: &[u8],
    ) -> impl Future<Output = SubmitOutcome>;

    fn disconnect(&mut self) -> impl Future<Output = ()>;
}

impl<N: NetworkClient + ?Sized> NetworkClient for &mut N {
    fn connect(
        &mut self,
        credentials: &WifiCredentials,
        timeout_ms: u32,
    ) -> impl Future<Output = Result<(), NetError>> {
        (**self).connect(credentials, timeout_ms)
    }

    fn submit(
        &mut self,
        endpoint: &SheetEndpoint,
        payload: &[u8],
    ) -> impl Future<Output = SubmitOutcome> {
        (**self).submit(endpoint, payload)
    }

    fn disconnect(&mut self) -> impl Future<Output = ()> {
        (**self).disconnect()
    }
}
