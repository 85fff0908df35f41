use crate::NONCE_LENGTH;

/// Iteration ceiling applied when none is configured.
pub const DEFAULT_MAX_ITERATIONS: u32 = 1_000_000;

/// Tunables of an [`Exchange`](crate::Exchange).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Number of printable characters in the client nonce.
    pub nonce_len: usize,
    /// The largest iteration count accepted from a server-first message. Key derivation time
    /// grows linearly with it, so an unchecked value lets the server stall the client.
    pub max_iterations: u32,
}

impl Config {
    /// Sets the client nonce length.
    pub fn with_nonce_len(mut self, nonce_len: usize) -> Self {
        self.nonce_len = nonce_len;
        self
    }

    /// Sets the iteration ceiling.
    pub fn with_max_iterations(mut self, max_iterations: u32) -> Self {
        self.max_iterations = max_iterations;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            nonce_len: NONCE_LENGTH,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}
