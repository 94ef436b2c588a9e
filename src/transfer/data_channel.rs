//! Module `data_channel`
//!
//! Turns a PORT argument into the endpoint for the next transfer and dials
//! it. The server always connects out to the address the client announced
//! (classic active mode); a data connection carries exactly one transfer and
//! is dropped by whoever opened it.

use log::{error, info};
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::time::Duration;
use tokio::net::TcpStream;

use crate::error::TransferError;

/// Parses `h1,h2,h3,h4,p1,p2` into an IPv4 endpoint with `port = p1*256 + p2`.
pub fn parse_port_argument(arg: &str) -> Result<SocketAddrV4, TransferError> {
    let invalid = || TransferError::InvalidPortArgument(arg.to_string());

    let fields: Vec<&str> = arg.split(',').collect();
    if fields.len() != 6 {
        return Err(invalid());
    }

    let mut octets = [0u8; 6];
    for (slot, field) in octets.iter_mut().zip(&fields) {
        let field = field.trim();
        if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        *slot = field.parse::<u8>().map_err(|_| invalid())?;
    }

    let ip = Ipv4Addr::new(octets[0], octets[1], octets[2], octets[3]);
    let port = u16::from(octets[4]) * 256 + u16::from(octets[5]);
    Ok(SocketAddrV4::new(ip, port))
}

/// Formats an endpoint as a PORT argument.
pub fn format_port_argument(endpoint: SocketAddrV4) -> String {
    let [h1, h2, h3, h4] = endpoint.ip().octets();
    let port = endpoint.port();
    format!("{},{},{},{},{},{}", h1, h2, h3, h4, port >> 8, port & 0xff)
}

/// Dials the announced endpoint, giving up after `timeout`.
pub async fn connect_data_channel(
    endpoint: SocketAddrV4,
    timeout: Duration,
) -> Result<TcpStream, TransferError> {
    let addr = SocketAddr::V4(endpoint);
    info!("Active mode: connecting to data endpoint {}", addr);

    match tokio::time::timeout(timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => {
            if let Err(e) = stream.set_nodelay(true) {
                error!("Failed to set TCP_NODELAY on data connection {}: {}", addr, e);
            }
            info!("Data connection established to {}", addr);
            Ok(stream)
        }
        Ok(Err(source)) => {
            error!("Failed to connect to data endpoint {}: {}", addr, source);
            Err(TransferError::DataConnection { addr, source })
        }
        Err(_) => {
            error!("Timed out after {:?} connecting to data endpoint {}", timeout, addr);
            Err(TransferError::ConnectTimeout { addr, timeout })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[test]
    fn parses_valid_arguments() {
        assert_eq!(
            parse_port_argument("127,0,0,1,4,1").unwrap(),
            SocketAddrV4::new(Ipv4Addr::LOCALHOST, 1025)
        );
        assert_eq!(
            parse_port_argument("0,0,0,0,0,0").unwrap(),
            SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 0)
        );
        assert_eq!(
            parse_port_argument("255,255,255,255,255,255").unwrap(),
            SocketAddrV4::new(Ipv4Addr::BROADCAST, 65535)
        );
        assert_eq!(
            parse_port_argument("192, 168, 1, 2, 19, 137").unwrap(),
            SocketAddrV4::new(Ipv4Addr::new(192, 168, 1, 2), 5001)
        );
    }

    #[test]
    fn rejects_malformed_arguments() {
        for bad in [
            "",
            "127,0,0,1,4",
            "127,0,0,1,4,1,9",
            "127,0,0,1,4,256",
            "127,0,0,-1,4,1",
            "127,0,0,x,4,1",
            "127,0,0,,4,1",
            "127,0,0,+1,4,1",
            "127.0.0.1:1025",
        ] {
            assert!(
                matches!(parse_port_argument(bad), Err(TransferError::InvalidPortArgument(_))),
                "{bad:?} should be rejected"
            );
        }
    }

    #[test]
    fn format_is_inverse_of_parse() {
        let endpoint = SocketAddrV4::new(Ipv4Addr::new(10, 1, 2, 3), 50_000);
        let arg = format_port_argument(endpoint);
        assert_eq!(arg, "10,1,2,3,195,80");
        assert_eq!(parse_port_argument(&arg).unwrap(), endpoint);
    }

    #[tokio::test]
    async fn connects_to_listening_endpoint() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let SocketAddr::V4(endpoint) = listener.local_addr().unwrap() else {
            panic!("expected IPv4 listener");
        };

        let (dialed, accepted) = tokio::join!(
            connect_data_channel(endpoint, Duration::from_secs(5)),
            listener.accept()
        );
        assert!(dialed.is_ok());
        assert!(accepted.is_ok());
    }

    #[tokio::test]
    async fn refused_endpoint_is_data_connection_error() {
        // Bind then drop to get a port nobody listens on.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let SocketAddr::V4(endpoint) = listener.local_addr().unwrap() else {
            panic!("expected IPv4 listener");
        };
        drop(listener);

        let err = connect_data_channel(endpoint, Duration::from_secs(5))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            TransferError::DataConnection { .. } | TransferError::ConnectTimeout { .. }
        ));
    }
}
