//! `TimeStampReq` construction.

use auditseal_crypto::Sha256Hash;
use der::asn1::{OctetString, Uint};
use der::Encode;
use rand::RngCore;

use crate::asn1::{AlgorithmIdentifier, MessageImprint, TimeStampReq};
use crate::error::TimestampError;

/// A timestamp request for one SHA-256 digest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeStampRequest {
    hash: Sha256Hash,
    nonce: [u8; 8],
    cert_req: bool,
}

impl TimeStampRequest {
    /// Request for `hash` with a random 64-bit nonce and the TSA certificate
    /// requested.
    pub fn new(hash: Sha256Hash) -> Self {
        let mut nonce = [0u8; 8];
        rand::thread_rng().fill_bytes(&mut nonce);
        Self::with_nonce(hash, nonce)
    }

    /// Request with a fixed nonce.
    pub fn with_nonce(hash: Sha256Hash, nonce: [u8; 8]) -> Self {
        Self {
            hash,
            nonce,
            cert_req: true,
        }
    }

    pub fn hash(&self) -> &Sha256Hash {
        &self.hash
    }

    pub fn nonce(&self) -> &[u8; 8] {
        &self.nonce
    }

    /// The ASN.1 form: version 1, a SHA-256 imprint, the nonce and certReq.
    pub fn to_asn1(&self) -> Result<TimeStampReq, TimestampError> {
        Ok(TimeStampReq {
            version: 1,
            message_imprint: MessageImprint {
                hash_algorithm: AlgorithmIdentifier::sha256(),
                hashed_message: OctetString::new(self.hash.as_bytes().to_vec())?,
            },
            req_policy: None,
            nonce: Some(Uint::new(&self.nonce)?),
            cert_req: self.cert_req,
        })
    }

    /// DER encoding.
    pub fn to_der(&self) -> Result<Vec<u8>, TimestampError> {
        Ok(self.to_asn1()?.to_der()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asn1::ID_SHA256;
    use auditseal_crypto::hash_str;
    use der::Decode;
    use proptest::prelude::*;

    #[test]
    fn test_encoding_layout() {
        let hash = hash_str("manifest");
        let der = TimeStampRequest::with_nonce(hash, [0x01, 2, 3, 4, 5, 6, 7, 8])
            .to_der()
            .unwrap();

        let mut expected = vec![0x30, 0x43, 0x02, 0x01, 0x01, 0x30, 0x31, 0x30, 0x0d, 0x06, 0x09];
        expected.extend_from_slice(&[0x60, 0x86, 0x48, 0x01, 0x65, 0x03, 0x04, 0x02, 0x01]);
        expected.extend_from_slice(&[0x05, 0x00, 0x04, 0x20]);
        expected.extend_from_slice(hash.as_bytes());
        expected.extend_from_slice(&[0x02, 0x08, 1, 2, 3, 4, 5, 6, 7, 8]);
        expected.extend_from_slice(&[0x01, 0x01, 0xff]);

        assert_eq!(der, expected);
    }

    #[test]
    fn test_high_bit_nonce_gets_sign_byte() {
        let der = TimeStampRequest::with_nonce(hash_str("x"), [0xff; 8]).to_der().unwrap();
        let nonce_at = 2 + 3 + 0x33;
        assert_eq!(&der[nonce_at..nonce_at + 3], &[0x02, 0x09, 0x00]);
        assert_eq!(der[1] as usize, der.len() - 2);
    }

    #[test]
    fn test_random_nonces_differ() {
        let hash = hash_str("x");
        assert_ne!(
            TimeStampRequest::new(hash).nonce(),
            TimeStampRequest::new(hash).nonce()
        );
    }

    proptest! {
        #[test]
        fn prop_request_decodes_to_its_fields(
            digest in any::<[u8; 32]>(),
            nonce in any::<[u8; 8]>(),
        ) {
            let hash = Sha256Hash::from_bytes(digest);
            let der = TimeStampRequest::with_nonce(hash, nonce).to_der().unwrap();
            let decoded = TimeStampReq::from_der(&der).unwrap();

            prop_assert_eq!(decoded.version, 1);
            prop_assert_eq!(decoded.message_imprint.hash_algorithm.algorithm, ID_SHA256);
            prop_assert_eq!(decoded.message_imprint.hashed_message.as_bytes(), &digest[..]);
            prop_assert!(decoded.cert_req);
            let decoded_nonce = decoded.nonce.unwrap();
            let skip = nonce.iter().take_while(|b| **b == 0).count().min(7);
            prop_assert_eq!(decoded_nonce.as_bytes(), &nonce[skip..]);
        }
    }
}
