use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

const NONCE_LEN: usize = 24;
const TAG_LEN: usize = 32;

/// Seals and opens session cookie values.
///
/// Envelope: base64url(nonce || XChaCha20-Poly1305(plaintext) || HMAC-SHA256).
/// Keyed by a 64-byte MAC key and a 32-byte cipher key, both drawn fresh at
/// startup and never persisted — restarting the server invalidates every
/// outstanding session.
pub struct SessionSealer {
    mac_key: [u8; 64],
    cipher: XChaCha20Poly1305,
}

impl SessionSealer {
    pub fn new() -> Self {
        let mut mac_key = [0u8; 64];
        OsRng.fill_bytes(&mut mac_key);

        let mut cipher_key = [0u8; 32];
        OsRng.fill_bytes(&mut cipher_key);

        Self {
            mac_key,
            cipher: XChaCha20Poly1305::new_from_slice(&cipher_key)
                .expect("32-byte key is always valid"),
        }
    }

    /// Seal a plaintext into a cookie-safe string.
    pub fn seal(&self, plaintext: &str) -> Option<String> {
        let nonce = XChaCha20Poly1305::generate_nonce(&mut OsRng);
        let ciphertext = self.cipher.encrypt(&nonce, plaintext.as_bytes()).ok()?;

        let mut buf = nonce.to_vec();
        buf.extend_from_slice(&ciphertext);

        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.mac_key).ok()?;
        mac.update(&buf);
        buf.extend_from_slice(&mac.finalize().into_bytes());

        Some(URL_SAFE_NO_PAD.encode(buf))
    }

    /// Open a sealed value. Any tampering — a flipped bit anywhere in the
    /// envelope — reads as None.
    pub fn unseal(&self, sealed: &str) -> Option<String> {
        let raw = URL_SAFE_NO_PAD.decode(sealed).ok()?;
        if raw.len() < NONCE_LEN + TAG_LEN {
            return None;
        }

        let (body, tag) = raw.split_at(raw.len() - TAG_LEN);
        let mut mac = <HmacSha256 as Mac>::new_from_slice(&self.mac_key).ok()?;
        mac.update(body);
        mac.verify_slice(tag).ok()?;

        let (nonce, ciphertext) = body.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(XNonce::from_slice(nonce), ciphertext)
            .ok()?;
        String::from_utf8(plaintext).ok()
    }
}

impl Default for SessionSealer {
    fn default() -> Self {
        Self::new()
    }
}
