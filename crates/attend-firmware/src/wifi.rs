//! Station-mode WiFi plus the single HTTP POST the sync engine needs.

use alloc::string::String;
use alloc::vec;
use alloc::vec::Vec;

use embassy_net::dns::DnsQueryType;
use embassy_net::tcp::TcpSocket;
use embassy_net::{IpEndpoint, Stack};
use embassy_time::{Duration, with_timeout};
use embedded_io_async::Write;
use esp_radio::wifi::{ClientConfig, ModeConfig, WifiController};
use log::{debug, info, warn};

use attend_core::config::{SheetEndpoint, SyncConfig};
use attend_core::credentials::WifiCredentials;
use attend_core::net::{NetError, NetworkClient, SubmitOutcome, http};

const SOCKET_BUFFER: usize = 2048;
const MAX_RESPONSE_HEAD: usize = 512;

pub struct WifiNetwork<'d> {
    controller: WifiController<'d>,
    stack: Stack<'d>,
    response_timeout: Duration,
    rx_buffer: Vec<u8>,
    tx_buffer: Vec<u8>,
}

impl<'d> WifiNetwork<'d> {
    pub fn new(controller: WifiController<'d>, stack: Stack<'d>, config: &SyncConfig) -> Self {
        Self {
            controller,
            stack,
            response_timeout: Duration::from_millis(u64::from(config.response_timeout_ms)),
            rx_buffer: vec![0; SOCKET_BUFFER],
            tx_buffer: vec![0; SOCKET_BUFFER],
        }
    }

    async fn join(&mut self, credentials: &WifiCredentials) -> Result<(), NetError> {
        let mode = ModeConfig::Client(
            ClientConfig::default()
                .with_ssid(String::from(credentials.ssid.as_str()))
                .with_password(String::from(credentials.password.as_str())),
        );
        self.controller.set_config(&mode).map_err(|e| {
            warn!("WiFi config rejected: {:?}", e);
            NetError::Connect
        })?;

        if !matches!(self.controller.is_started(), Ok(true)) {
            self.controller.start_async().await.map_err(|e| {
                warn!("WiFi start failed: {:?}", e);
                NetError::Connect
            })?;
        }

        self.controller.connect_async().await.map_err(|e| {
            warn!("WiFi association failed: {:?}", e);
            NetError::Connect
        })?;

        self.stack.wait_config_up().await;
        if let Some(config) = self.stack.config_v4() {
            info!("WiFi connected, address {}", config.address);
        }
        Ok(())
    }

    async fn post(&mut self, endpoint: &SheetEndpoint, payload: &[u8]) -> SubmitOutcome {
        let address = match self
            .stack
            .dns_query(&endpoint.host, DnsQueryType::A)
            .await
        {
            Ok(addresses) if !addresses.is_empty() => addresses[0],
            Ok(_) | Err(_) => return SubmitOutcome::Failed(NetError::Dns),
        };

        let mut socket = TcpSocket::new(self.stack, &mut self.rx_buffer, &mut self.tx_buffer);
        socket.set_timeout(Some(self.response_timeout));

        if let Err(e) = socket
            .connect(IpEndpoint::new(address, endpoint.port))
            .await
        {
            warn!("Connect to {} failed: {:?}", endpoint.host, e);
            return SubmitOutcome::Failed(NetError::Connect);
        }

        let request = http::build_post(&endpoint.host, &endpoint.path, payload);
        if let Err(e) = socket.write_all(&request).await {
            warn!("Sending upload failed: {:?}", e);
            return SubmitOutcome::Failed(NetError::Io);
        }
        if let Err(e) = socket.flush().await {
            warn!("Sending upload failed: {:?}", e);
            return SubmitOutcome::Failed(NetError::Io);
        }
        debug!("Sent {} byte request", request.len());

        let mut response = Vec::new();
        let mut buf = [0u8; 128];
        let outcome = with_timeout(self.response_timeout, async {
            while !response.contains(&b'\n') && response.len() < MAX_RESPONSE_HEAD {
                match socket.read(&mut buf).await {
                    Ok(0) => break,
                    Ok(n) => response.extend_from_slice(&buf[..n]),
                    Err(e) => {
                        warn!("Reading response failed: {:?}", e);
                        return Err(NetError::Io);
                    }
                }
            }
            http::parse_status(&response)
        })
        .await;

        socket.close();
        match outcome {
            Ok(Ok(status)) => SubmitOutcome::Accepted { status },
            Ok(Err(e)) => SubmitOutcome::Failed(e),
            Err(_) => SubmitOutcome::TimedOut,
        }
    }
}

impl NetworkClient for WifiNetwork<'_> {
    async fn connect(
        &mut self,
        credentials: &WifiCredentials,
        timeout_ms: u32,
    ) -> Result<(), NetError> {
        info!("Connecting to WiFi {}", credentials.ssid);
        match with_timeout(
            Duration::from_millis(u64::from(timeout_ms)),
            self.join(credentials),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => {
                warn!("WiFi connect timed out after {} ms", timeout_ms);
                Err(NetError::ConnectTimeout)
            }
        }
    }

    async fn submit(&mut self, endpoint: &SheetEndpoint, payload: &[u8]) -> SubmitOutcome {
        if !self.stack.is_config_up() {
            return SubmitOutcome::Failed(NetError::NoCredentials);
        }
        self.post(endpoint, payload).await
    }

    async fn disconnect(&mut self) {
        if let Err(e) = self.controller.disconnect_async().await {
            debug!("WiFi disconnect: {:?}", e);
        }
    }
}
