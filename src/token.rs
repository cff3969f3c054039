/// Opaque access token generation
///
/// Tokens are the only credential in the system: holding one grants
/// read access to exactly one image until it expires. They carry no
/// structure, just 256 bits of OS randomness in a URL-safe encoding.
use crate::error::{PixError, PixResult};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::{rngs::OsRng, RngCore};

/// Raw entropy per token, in bytes
pub const TOKEN_ENTROPY_BYTES: usize = 32;

/// Length of the encoded token (32 bytes, base64 without padding)
pub const TOKEN_LEN: usize = 43;

/// Mints opaque, single-use access tokens
pub trait TokenMinter: Send + Sync {
    /// Produce a fresh token. Fails only if the randomness source does.
    fn mint(&self) -> PixResult<String>;
}

/// Token minter backed by the operating system's CSPRNG
#[derive(Debug, Clone, Default)]
pub struct RandomTokenMinter;

impl TokenMinter for RandomTokenMinter {
    fn mint(&self) -> PixResult<String> {
        let mut bytes = [0u8; TOKEN_ENTROPY_BYTES];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| PixError::Entropy(e.to_string()))?;

        Ok(URL_SAFE_NO_PAD.encode(bytes))
    }
}
