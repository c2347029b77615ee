//! Network parameters for block file ingestion.

/// Magic bytes framing blocks on the main network.
pub const MAGIC_MAIN: [u8; 4] = [0xF9, 0xBE, 0xB4, 0xD9];

/// Magic bytes framing blocks on the test network.
pub const MAGIC_TEST: [u8; 4] = [0x0B, 0x11, 0x09, 0x07];

/// Default streaming-buffer size for block file ingestion (25 MiB).
pub const DEFAULT_STREAM_BUFFER: usize = 25 * 1024 * 1024;

/// Per-network ingestion parameters.
#[derive(Debug, Clone)]
pub struct NetworkParams {
    /// 4-byte magic framing each block in the on-disk file.
    pub magic: [u8; 4],
    /// Streaming-buffer size used while scanning a block file.
    pub stream_buffer: usize,
}

impl Default for NetworkParams {
    fn default() -> Self {
        Self::mainnet()
    }
}

impl NetworkParams {
    /// Parameters for the main network.
    pub fn mainnet() -> Self {
        Self { magic: MAGIC_MAIN, stream_buffer: DEFAULT_STREAM_BUFFER }
    }

    /// Parameters for the test network.
    pub fn testnet() -> Self {
        Self { magic: MAGIC_TEST, stream_buffer: DEFAULT_STREAM_BUFFER }
    }

    /// Parameters with a caller-supplied magic (e.g. a regtest deployment).
    pub fn with_magic(magic: [u8; 4]) -> Self {
        Self { magic, stream_buffer: DEFAULT_STREAM_BUFFER }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_mainnet() {
        assert_eq!(NetworkParams::default().magic, MAGIC_MAIN);
    }

    #[test]
    fn testnet_magic_differs() {
        assert_ne!(NetworkParams::testnet().magic, MAGIC_MAIN);
    }

    #[test]
    fn custom_magic() {
        let params = NetworkParams::with_magic(*b"TARN");
        assert_eq!(&params.magic, b"TARN");
        assert_eq!(params.stream_buffer, DEFAULT_STREAM_BUFFER);
    }
}
