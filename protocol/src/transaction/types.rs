//! The [`Transaction`] value and its canonical byte forms.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::crypto::{hash, Hash, HashCache, PublicKey, Signature};

/// A signed unit of opaque data.
///
/// Fields are private so the cached hash can never go stale: the payload is
/// fixed at construction, and signing only touches the key and signature,
/// which the transaction hash does not cover.
///
/// Two pieces of state are local to the node holding the value and never
/// leave it: the hash cache and `first_seen`. Both are skipped by serde and
/// ignored by equality.
#[derive(Clone, Serialize, Deserialize)]
pub struct Transaction {
    payload: Vec<u8>,
    public_key: Option<PublicKey>,
    signature: Option<Signature>,
    #[serde(skip)]
    hash: HashCache,
    /// Unix nanoseconds of first admission to a pool. 0 until then.
    #[serde(skip)]
    first_seen: i64,
}

impl Transaction {
    /// An unsigned transaction carrying `payload`.
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
            public_key: None,
            signature: None,
            hash: HashCache::new(),
            first_seen: 0,
        }
    }

    /// Reassembles a transaction from wire-level parts, e.g. after decoding
    /// a foreign format. No verification happens here.
    pub fn from_parts(
        payload: Vec<u8>,
        public_key: Option<PublicKey>,
        signature: Option<Signature>,
    ) -> Self {
        Self {
            payload,
            public_key,
            signature,
            hash: HashCache::new(),
            first_seen: 0,
        }
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// The signer, set by [`Transaction::sign`].
    pub fn public_key(&self) -> Option<&PublicKey> {
        self.public_key.as_ref()
    }

    pub fn signature(&self) -> Option<&Signature> {
        self.signature.as_ref()
    }

    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }

    /// The bytes that get signed and hashed: the payload itself.
    pub fn canonical_bytes(&self) -> &[u8] {
        &self.payload
    }

    /// The bytes this transaction contributes to a block's data hash.
    ///
    /// Layout: `len(payload) u32 LE || payload || key flag || [key 32] ||
    /// sig flag || [sig 64]`. Flags are `0x01` when the part is present.
    /// `first_seen` is excluded, so every node derives the same data hash.
    pub fn encoded_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(4 + self.payload.len() + 1 + 32 + 1 + 64);
        buf.extend_from_slice(&(self.payload.len() as u32).to_le_bytes());
        buf.extend_from_slice(&self.payload);

        match &self.public_key {
            Some(key) => {
                buf.push(0x01);
                buf.extend_from_slice(&key.to_bytes());
            }
            None => buf.push(0x00),
        }

        match &self.signature {
            Some(sig) => {
                buf.push(0x01);
                buf.extend_from_slice(&sig.to_bytes());
            }
            None => buf.push(0x00),
        }

        buf
    }

    /// Hash of the canonical payload bytes, computed on first call.
    pub fn hash(&self) -> Hash {
        self.hash.get_or_compute(|| hash(self.canonical_bytes()))
    }

    /// First-admission timestamp in Unix nanoseconds, 0 if never admitted.
    pub fn first_seen(&self) -> i64 {
        self.first_seen
    }

    /// Records the first-admission timestamp.
    ///
    /// Meant to be called once, by the pool that first admits the
    /// transaction. A later call overwrites silently; pool ordering assumes
    /// nobody does that.
    pub fn set_first_seen(&mut self, ts: i64) {
        self.first_seen = ts;
    }

    pub(crate) fn set_signature(&mut self, public_key: PublicKey, signature: Signature) {
        self.public_key = Some(public_key);
        self.signature = Some(signature);
    }
}

impl PartialEq for Transaction {
    fn eq(&self, other: &Self) -> bool {
        self.payload == other.payload
            && self.public_key == other.public_key
            && self.signature == other.signature
    }
}

impl Eq for Transaction {}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("hash", &self.hash().short())
            .field("payload_len", &self.payload.len())
            .field("signed", &self.is_signed())
            .field("first_seen", &self.first_seen)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_covers_payload_only() {
        let a = Transaction::new(b"payload".to_vec());
        let mut b = Transaction::new(b"payload".to_vec());
        b.set_first_seen(42);

        assert_eq!(a.hash(), b.hash());
        assert_eq!(a.hash(), hash(b"payload"));
        assert_ne!(a.hash(), Transaction::new(b"other".to_vec()).hash());
    }

    #[test]
    fn hash_is_stable_across_calls() {
        let tx = Transaction::new(b"stable".to_vec());
        let first = tx.hash();
        assert_eq!(first, tx.hash());
        assert_eq!(first, tx.clone().hash());
    }

    #[test]
    fn first_seen_defaults_to_zero() {
        let mut tx = Transaction::new(b"x".to_vec());
        assert_eq!(tx.first_seen(), 0);
        tx.set_first_seen(7);
        assert_eq!(tx.first_seen(), 7);
    }

    #[test]
    fn encoded_bytes_for_unsigned_tx() {
        let tx = Transaction::new(b"abc".to_vec());
        let encoded = tx.encoded_bytes();
        assert_eq!(&encoded[..4], &3u32.to_le_bytes());
        assert_eq!(&encoded[4..7], b"abc");
        assert_eq!(&encoded[7..], &[0x00, 0x00]);
    }

    #[test]
    fn equality_ignores_local_state() {
        let a = Transaction::new(b"same".to_vec());
        let mut b = Transaction::new(b"same".to_vec());
        b.set_first_seen(99);
        let _ = a.hash();
        assert_eq!(a, b);
    }

    #[test]
    fn serde_skips_local_state() {
        let mut tx = Transaction::new(b"wire".to_vec());
        tx.set_first_seen(1234);

        let json = serde_json::to_string(&tx).unwrap();
        assert!(!json.contains("first_seen"));

        let back: Transaction = serde_json::from_str(&json).unwrap();
        assert_eq!(back.first_seen(), 0);
        assert_eq!(back, tx);
    }
}
