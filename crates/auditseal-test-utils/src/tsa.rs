//! Synthetic RFC 3161 replies.
//!
//! The replies are structurally faithful (`TimeStampResp` wrapping a
//! `SignedData` whose encapsulated content is a `TSTInfo`) but carry no
//! signature.

use der::asn1::{Any, ObjectIdentifier, OctetString};
use der::{Decode, Encode, SliceReader, Tag, TagNumber};

const ID_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.1");
const ID_SIGNED_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.2");
const ID_TST_INFO: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.16.1.4");
const TEST_POLICY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.3.4.5");

fn element(tag: Tag, content: &[u8]) -> Vec<u8> {
    Any::new(tag, content)
        .and_then(|any| any.to_der())
        .expect("fixture element encodes")
}

fn seq(parts: &[Vec<u8>]) -> Vec<u8> {
    element(Tag::Sequence, &parts.concat())
}

fn integer(value: u8) -> Vec<u8> {
    value.to_der().expect("fixture integer encodes")
}

fn oid(value: ObjectIdentifier) -> Vec<u8> {
    value.to_der().expect("fixture oid encodes")
}

fn explicit0(content: &[u8]) -> Vec<u8> {
    element(
        Tag::ContextSpecific {
            constructed: true,
            number: TagNumber::N0,
        },
        content,
    )
}

fn sha256_algorithm() -> Vec<u8> {
    seq(&[oid(ID_SHA256), element(Tag::Null, &[])])
}

fn status_info(status: u8, text: Option<&str>) -> Vec<u8> {
    let mut parts = vec![integer(status)];
    if let Some(text) = text {
        parts.push(seq(&[element(Tag::Utf8String, text.as_bytes())]));
    }
    seq(&parts)
}

/// A `TimeStampToken` over `imprint` with `gen_time` as GeneralizedTime text.
///
/// `gen_time` is written verbatim, so malformed times can be produced.
pub fn token(imprint: &[u8], gen_time: &str) -> Vec<u8> {
    let tst_info = seq(&[
        integer(1),
        oid(TEST_POLICY),
        seq(&[sha256_algorithm(), element(Tag::OctetString, imprint)]),
        integer(42),
        element(Tag::GeneralizedTime, gen_time.as_bytes()),
    ]);
    let encapsulated = seq(&[
        oid(ID_TST_INFO),
        explicit0(&element(Tag::OctetString, &tst_info)),
    ]);
    let signed_data = seq(&[
        integer(3),
        element(Tag::Set, &sha256_algorithm()),
        encapsulated,
        element(Tag::Set, &[]),
    ]);
    seq(&[oid(ID_SIGNED_DATA), explicit0(&signed_data)])
}

/// A granted `TimeStampResp`.
pub fn granted_response(imprint: &[u8], gen_time: &str) -> Vec<u8> {
    seq(&[status_info(0, None), token(imprint, gen_time)])
}

/// A non-granted `TimeStampResp` with a status string.
pub fn rejected_response(status: u8, text: &str) -> Vec<u8> {
    seq(&[status_info(status, Some(text))])
}

/// A `TimeStampResp` carrying only a status.
pub fn status_only_response(status: u8) -> Vec<u8> {
    seq(&[status_info(status, None)])
}

/// The digest inside a DER `TimeStampReq`.
pub fn request_imprint(request: &[u8]) -> Option<Vec<u8>> {
    let outer = Any::from_der(request).ok()?;
    let mut fields = SliceReader::new(outer.value()).ok()?;
    let _version = Any::decode(&mut fields).ok()?;
    let imprint = Any::decode(&mut fields).ok()?;

    let mut imprint_fields = SliceReader::new(imprint.value()).ok()?;
    let _algorithm = Any::decode(&mut imprint_fields).ok()?;
    let digest = OctetString::decode(&mut imprint_fields).ok()?;
    Some(digest.as_bytes().to_vec())
}

/// Granted reply to a DER request, as a well-behaved TSA would answer.
pub fn respond_to(request: &[u8], gen_time: &str) -> Option<Vec<u8>> {
    request_imprint(request).map(|imprint| granted_response(&imprint, gen_time))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_is_one_element() {
        let reply = granted_response(&[0xab; 32], "20240101000000Z");
        assert_eq!(reply[0], 0x30);
        let any = Any::from_der(&reply).unwrap();
        assert_eq!(any.to_der().unwrap(), reply);
    }

    #[test]
    fn test_request_imprint_extraction() {
        let mut request = vec![0x30, 0x43, 0x02, 0x01, 0x01, 0x30, 0x31];
        request.extend_from_slice(&sha256_algorithm());
        request.extend_from_slice(&[0x04, 0x20]);
        request.extend_from_slice(&[7u8; 32]);
        request.extend_from_slice(&[0x02, 0x08, 1, 2, 3, 4, 5, 6, 7, 8, 0x01, 0x01, 0xff]);
        assert_eq!(request_imprint(&request).unwrap(), vec![7u8; 32]);
        assert!(request_imprint(&[0x30, 0x00]).is_none());
    }
}
