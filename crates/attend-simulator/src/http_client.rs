//! Host networking for sync: the machine is always "on WiFi", uploads go
//! out through a blocking `reqwest` client (HTTPS when the endpoint is on
//! port 443, redirects followed).

use std::time::Duration;

use attend_core::config::{SheetEndpoint, SyncConfig};
use attend_core::credentials::WifiCredentials;
use attend_core::net::{NetError, NetworkClient, SubmitOutcome};
use log::{debug, info, warn};
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;

pub struct HostNetwork {
    client: Client,
    /// Pretend the access point is out of range
    offline: bool,
    joined: bool,
}

impl HostNetwork {
    pub fn new(config: &SyncConfig, offline: bool) -> reqwest::Result<Self> {
        let client = Client::builder()
            .connect_timeout(Duration::from_millis(u64::from(config.connect_timeout_ms)))
            .timeout(Duration::from_millis(u64::from(config.response_timeout_ms)))
            .build()?;
        Ok(Self {
            client,
            offline,
            joined: false,
        })
    }

    fn post(&self, endpoint: &SheetEndpoint, payload: &[u8]) -> SubmitOutcome {
        let url = endpoint.url();
        debug!("Posting {} byte batch to {}", payload.len(), url);

        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .body(payload.to_vec())
            .send();

        match response {
            Ok(response) => SubmitOutcome::Accepted {
                status: response.status().as_u16(),
            },
            // Connect errors can also be timeouts; the request never left
            Err(e) if e.is_connect() => {
                warn!("Connect to {} failed: {}", url, e);
                SubmitOutcome::Failed(NetError::Connect)
            }
            Err(e) if e.is_timeout() => SubmitOutcome::TimedOut,
            Err(e) => {
                warn!("Upload to {} failed: {}", url, e);
                SubmitOutcome::Failed(NetError::Io)
            }
        }
    }
}

impl NetworkClient for HostNetwork {
    async fn connect(
        &mut self,
        credentials: &WifiCredentials,
        _timeout_ms: u32,
    ) -> Result<(), NetError> {
        if self.offline {
            return Err(NetError::ConnectTimeout);
        }
        info!("Joined simulated network {}", credentials.ssid);
        self.joined = true;
        Ok(())
    }

    async fn submit(&mut self, endpoint: &SheetEndpoint, payload: &[u8]) -> SubmitOutcome {
        if !self.joined {
            return SubmitOutcome::Failed(NetError::NoCredentials);
        }
        self.post(endpoint, payload)
    }

    async fn disconnect(&mut self) {
        self.joined = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;

    fn endpoint_for(listener: &TcpListener) -> SheetEndpoint {
        SheetEndpoint {
            host: "127.0.0.1".into(),
            port: listener.local_addr().unwrap().port(),
            path: "/exec".into(),
        }
    }

    fn network(response_timeout_ms: u32) -> HostNetwork {
        let config = SyncConfig {
            response_timeout_ms,
            connect_timeout_ms: 1_000,
            ..SyncConfig::default()
        };
        let mut network = HostNetwork::new(&config, false).unwrap();
        let credentials = WifiCredentials::new("Campus", "secret").unwrap();
        block_on(network.connect(&credentials, 1_000)).unwrap();
        network
    }

    /// Accept one request, answer with `reply`, hand back what was sent.
    fn serve_once(listener: TcpListener, reply: &'static [u8]) -> thread::JoinHandle<String> {
        thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 256];
            while !request.ends_with(b"{}") {
                let n = stream.read(&mut buf).unwrap();
                assert!(n > 0, "client hung up early");
                request.extend_from_slice(&buf[..n]);
            }
            stream.write_all(reply).unwrap();
            String::from_utf8(request).unwrap()
        })
    }

    #[test]
    fn test_submit_posts_json_and_reports_status() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = endpoint_for(&listener);
        let server = serve_once(listener, b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n");

        let outcome = block_on(network(2_000).submit(&endpoint, b"{}"));
        assert_eq!(outcome, SubmitOutcome::Accepted { status: 200 });

        let request = server.join().unwrap();
        assert!(request.starts_with("POST /exec HTTP/1.1\r\n"));
        assert!(request
            .to_ascii_lowercase()
            .contains("content-type: application/json\r\n"));
        assert!(request.ends_with("\r\n\r\n{}"));
    }

    #[test]
    fn test_error_status_is_passed_through() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = endpoint_for(&listener);
        let server = serve_once(
            listener,
            b"HTTP/1.1 500 Internal Server Error\r\nContent-Length: 0\r\n\r\n",
        );

        let outcome = block_on(network(2_000).submit(&endpoint, b"{}"));
        assert_eq!(outcome, SubmitOutcome::Accepted { status: 500 });
        server.join().unwrap();
    }

    #[test]
    fn test_silent_server_times_out() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = endpoint_for(&listener);
        let server = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            thread::sleep(Duration::from_millis(500));
            drop(stream);
        });

        let outcome = block_on(network(100).submit(&endpoint, b"{}"));
        assert_eq!(outcome, SubmitOutcome::TimedOut);
        server.join().unwrap();
    }

    #[test]
    fn test_refused_connection_is_not_a_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let endpoint = endpoint_for(&listener);
        drop(listener);

        let outcome = block_on(network(2_000).submit(&endpoint, b"{}"));
        assert_eq!(outcome, SubmitOutcome::Failed(NetError::Connect));
    }

    #[test]
    fn test_offline_network_cannot_join() {
        let mut network = HostNetwork::new(&SyncConfig::default(), true).unwrap();
        let credentials = WifiCredentials::new("Campus", "secret").unwrap();
        assert_eq!(
            block_on(network.connect(&credentials, 1_000)),
            Err(NetError::ConnectTimeout)
        );
    }
}
