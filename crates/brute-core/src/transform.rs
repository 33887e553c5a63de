use std::io::{Read, Write};

use age::secrecy::ExposeSecret;
use flate2::write::GzEncoder;
use flate2::read::GzDecoder;

use crate::error::{BruteError, Result};

/// Generate a fresh X25519 keypair, returned as `(identity, recipient)`
/// strings in the standard Bech32 encodings.
pub fn generate_keypair() -> (String, String) {
    let identity = age::x25519::Identity::generate();
    let recipient = identity.to_public().to_string();
    (identity.to_string().expose_secret().to_owned(), recipient)
}

pub fn parse_identity(raw: &str) -> Result<age::x25519::Identity> {
    raw.trim()
        .parse()
        .map_err(|e| BruteError::Config(format!("invalid age identity: {e}")))
}

pub fn parse_recipient(raw: &str) -> Result<age::x25519::Recipient> {
    raw.trim()
        .parse()
        .map_err(|e| BruteError::Config(format!("invalid age recipient: {e}")))
}

/// Seal one chunk: gzip at best compression, then encrypt to `recipient`.
///
/// Compression happens inside the encryption wrapping so the plaintext is
/// still compressible; the ciphertext is authenticated per chunk. `out` is
/// appended to (callers hand in a cleared pool buffer).
pub fn seal_chunk(
    recipient: &age::x25519::Recipient,
    plain: &[u8],
    out: &mut Vec<u8>,
) -> Result<()> {
    let encryptor =
        age::Encryptor::with_recipients(std::iter::once(recipient as &dyn age::Recipient))
            .map_err(|e| BruteError::Encryption(e.to_string()))?;

    let sealed = encryptor
        .wrap_output(out)
        .map_err(|e| BruteError::Encryption(e.to_string()))?;

    let mut gz = GzEncoder::new(sealed, flate2::Compression::best());
    gz.write_all(plain)
        .map_err(|e| BruteError::Compression(e.to_string()))?;
    let sealed = gz
        .finish()
        .map_err(|e| BruteError::Compression(e.to_string()))?;
    sealed
        .finish()
        .map_err(|e| BruteError::Encryption(e.to_string()))?;
    Ok(())
}

/// Open one sealed chunk: decrypt with `identity`, then gunzip into `out`.
pub fn open_chunk(
    identity: &age::x25519::Identity,
    sealed: &[u8],
    out: &mut Vec<u8>,
) -> Result<()> {
    let decryptor = age::Decryptor::new(sealed).map_err(|_| BruteError::DecryptionFailed)?;
    let plain = decryptor
        .decrypt(std::iter::once(identity as &dyn age::Identity))
        .map_err(|_| BruteError::DecryptionFailed)?;

    let mut gz = GzDecoder::new(plain);
    gz.read_to_end(out)
        .map_err(|e| BruteError::Compression(e.to_string()))?;
    Ok(())
}
