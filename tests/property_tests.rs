//! Property-based tests for the netcode transport
//!
//! Uses proptest to check byte-exactness over loopback for arbitrary
//! payloads and buffer splits.

use netcode_transport::{TcpListener, TcpStream, UdpSocket};
use proptest::prelude::*;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(5);

/// Split `data` into consecutive pieces at the given cut points
fn split_at_cuts(data: &[u8], cuts: &[usize]) -> Vec<Vec<u8>> {
    let mut points: Vec<usize> = cuts.iter().map(|c| c % (data.len() + 1)).collect();
    points.sort_unstable();

    let mut pieces = Vec::with_capacity(points.len() + 1);
    let mut start = 0;
    for point in points {
        pieces.push(data[start..point].to_vec());
        start = point;
    }
    pieces.push(data[start..].to_vec());
    pieces
}

// ============================================================================
// Datagram Properties
// ============================================================================

mod datagram_properties {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        /// A gather-send arrives as the exact concatenation of its buffers
        #[test]
        fn gather_send_is_concatenation(
            payload in prop::collection::vec(any::<u8>(), 0..4096),
            cuts in prop::collection::vec(any::<usize>(), 0..8),
        ) {
            let server = UdpSocket::open(0, None).unwrap();
            let client = UdpSocket::open(0, Some("127.0.0.1")).unwrap();
            let pieces = split_at_cuts(&payload, &cuts);

            let sent = client.send(None, server.local_port(), &pieces).unwrap();
            prop_assert_eq!(sent, payload.len());

            let datagram = server.receive(TIMEOUT).unwrap().expect("no datagram");
            prop_assert_eq!(datagram.len(), payload.len());
            prop_assert_eq!(datagram.data, payload);
            prop_assert_eq!(datagram.sender.port, client.local_port());
        }
    }
}

// ============================================================================
// Stream Properties
// ============================================================================

mod stream_properties {
    use super::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        /// Bytes written in pieces are read back unchanged into an exact buffer
        #[test]
        fn stream_bytes_are_preserved(
            payload in prop::collection::vec(any::<u8>(), 1..16_384),
            cuts in prop::collection::vec(any::<usize>(), 0..6),
        ) {
            let listener = TcpListener::listen(netcode_integration_tests::free_tcp_port()).unwrap();
            let mut client = TcpStream::connect("127.0.0.1", listener.local_port()).unwrap();
            let mut server = listener.accept(TIMEOUT).unwrap().expect("no connection").stream;

            for piece in split_at_cuts(&payload, &cuts) {
                let mut offset = 0;
                while offset < piece.len() {
                    offset += client.write(&piece[offset..]).unwrap();
                }
            }

            let mut buf = vec![0u8; payload.len()];
            let n = server.read(&mut buf, TIMEOUT).unwrap();
            prop_assert_eq!(n, payload.len());
            prop_assert_eq!(buf, payload);
        }
    }
}

#[test]
fn test_split_at_cuts() {
    let pieces = split_at_cuts(b"abcdef", &[2, 4]);
    assert_eq!(pieces, vec![b"ab".to_vec(), b"cd".to_vec(), b"ef".to_vec()]);
    assert_eq!(split_at_cuts(b"", &[5]), vec![Vec::<u8>::new(), Vec::new()]);
}
