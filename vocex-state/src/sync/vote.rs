//! Chain transaction payloads and vote signer recovery.
//!
//! Transactions are JSON objects discriminated by their `type` field. Votes are signed
//! with an Ethereum personal-message signature over the vote re-serialised without its
//! `signature` and `type` fields.

use secp256k1::{
    ecdsa::{RecoverableSignature, RecoveryId},
    Message, SECP256K1,
};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};

/// Errors raised while recovering a vote signer.
#[derive(Debug, thiserror::Error)]
pub enum VoteError {
    /// The signature or process id is not valid hex.
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),

    /// The signature is not 65 bytes long.
    #[error("signature must be 65 bytes, got {0}")]
    SignatureLength(usize),

    /// The vote could not be re-serialised for verification.
    #[error("could not serialise vote: {0}")]
    Serde(#[from] serde_json::Error),

    /// Public key recovery failed.
    #[error("signature recovery failed: {0}")]
    Secp256k1(#[from] secp256k1::Error),
}

/// A chain transaction, decoded on its `type` discriminant.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ChainTx {
    /// A vote envelope.
    Vote(VoteTx),
    /// Any other transaction kind.
    #[serde(other)]
    Other,
}

impl ChainTx {
    /// Decodes a raw transaction; undecodable payloads are not votes.
    pub fn decode(raw: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(raw)
    }
}

/// A vote transaction.
///
/// Field order matches the signed encoding.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteTx {
    /// Encryption key indexes used by an encrypted vote.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub encryption_key_indexes: Vec<u32>,
    /// Replay protection nonce.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub nonce: String,
    /// Nullifier as submitted, usually empty.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub nullifier: String,
    /// Hex process id.
    #[serde(default)]
    pub process_id: String,
    /// Census proof.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub proof: String,
    /// Hex signature, excluded from the signed encoding.
    #[serde(default, skip_serializing)]
    pub signature: String,
    /// Vote package.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub vote_package: String,
}

impl VoteTx {
    /// Bytes covered by the signature.
    pub fn signed_bytes(&self) -> Result<Vec<u8>, VoteError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Recovers the 20-byte address that signed the vote.
    pub fn signer(&self) -> Result<[u8; 20], VoteError> {
        recover_address(&self.signed_bytes()?, &self.signature)
    }
}

/// Keccak-256 of `data`.
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    Keccak256::digest(data).into()
}

/// Keccak-256 of `message` under the Ethereum personal-message prefix.
pub fn personal_message_hash(message: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(format!("\x19Ethereum Signed Message:\n{}", message.len()).as_bytes());
    hasher.update(message);
    hasher.finalize().into()
}

/// Recovers the address whose key produced `signature` (hex, `r ‖ s ‖ v`) over `message`.
pub fn recover_address(message: &[u8], signature: &str) -> Result<[u8; 20], VoteError> {
    let signature = hex::decode(signature.trim_start_matches("0x"))?;
    if signature.len() != 65 {
        return Err(VoteError::SignatureLength(signature.len()));
    }
    let v = signature[64];
    let recovery_id = RecoveryId::from_i32(i32::from(if v >= 27 { v - 27 } else { v }))?;
    let recoverable = RecoverableSignature::from_compact(&signature[..64], recovery_id)?;
    let digest = Message::from_slice(&personal_message_hash(message))?;
    let public_key = SECP256K1.recover_ecdsa(&digest, &recoverable)?;

    let hashed = keccak256(&public_key.serialize_uncompressed()[1..]);
    let mut address = [0u8; 20];
    address.copy_from_slice(&hashed[12..]);
    Ok(address)
}

/// Nullifier of a vote: keccak256(address ‖ process id).
pub fn nullifier(address: &[u8], process_id: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(address);
    hasher.update(process_id);
    hasher.finalize().into()
}

#[cfg(test)]
mod tests {
    use secp256k1::SecretKey;

    use super::*;

    fn sign(message: &[u8], secret: &SecretKey) -> String {
        let digest = Message::from_slice(&personal_message_hash(message)).unwrap();
        let (recovery_id, compact) = SECP256K1
            .sign_ecdsa_recoverable(&digest, secret)
            .serialize_compact();
        let mut bytes = compact.to_vec();
        bytes.push(recovery_id.to_i32() as u8 + 27);
        hex::encode(bytes)
    }

    fn address_of(secret: &SecretKey) -> [u8; 20] {
        let public_key = secp256k1::PublicKey::from_secret_key(SECP256K1, secret);
        let hashed = keccak256(&public_key.serialize_uncompressed()[1..]);
        let mut address = [0u8; 20];
        address.copy_from_slice(&hashed[12..]);
        address
    }

    #[test]
    fn decodes_on_the_type_tag() {
        let vote = ChainTx::decode(br#"{"type":"vote","processId":"0xab","votePackage":"cGtn"}"#)
            .unwrap();
        match vote {
            ChainTx::Vote(vote) => {
                assert_eq!(vote.process_id, "0xab");
                assert_eq!(vote.vote_package, "cGtn");
            }
            ChainTx::Other => panic!("expected a vote"),
        }
        assert_eq!(
            ChainTx::decode(br#"{"type":"newProcess","processId":"0xab"}"#).unwrap(),
            ChainTx::Other
        );
        assert!(ChainTx::decode(b"not json").is_err());
    }

    #[test]
    fn signed_bytes_drop_signature_and_empty_fields() {
        let vote = VoteTx {
            nonce: "01".to_string(),
            process_id: "ab".to_string(),
            signature: "ff".to_string(),
            vote_package: "pkg".to_string(),
            ..Default::default()
        };
        assert_eq!(
            vote.signed_bytes().unwrap(),
            br#"{"nonce":"01","processId":"ab","votePackage":"pkg"}"#.to_vec()
        );
    }

    #[test]
    fn recovers_the_signing_address() {
        let secret = SecretKey::from_slice(&[0x42; 32]).unwrap();
        let mut vote = VoteTx {
            nonce: "5e1f".to_string(),
            process_id: "0xabcd".to_string(),
            vote_package: "eyJ2b3RlcyI6WzFdfQ==".to_string(),
            ..Default::default()
        };
        vote.signature = sign(&vote.signed_bytes().unwrap(), &secret);

        assert_eq!(vote.signer().unwrap(), address_of(&secret));
    }

    #[test]
    fn malformed_signatures_are_rejected() {
        assert!(matches!(
            recover_address(b"msg", "zz"),
            Err(VoteError::Hex(_))
        ));
        assert!(matches!(
            recover_address(b"msg", "abcd"),
            Err(VoteError::SignatureLength(2))
        ));
    }

    #[test]
    fn nullifier_depends_on_voter_and_process() {
        let a = nullifier(&[1; 20], &[9; 32]);
        assert_eq!(a, nullifier(&[1; 20], &[9; 32]));
        assert_ne!(a, nullifier(&[2; 20], &[9; 32]));
        assert_ne!(a, nullifier(&[1; 20], &[8; 32]));
    }
}
