//! The canonical decoder seam.

use std::fmt;

use prost::Message;
use recfix_error::{RepairError, Result};

use crate::schema::ContractInfo;

/// Authoritative decoder/encoder for stored records.
///
/// Implementations must be deterministic. The repair pipeline treats
/// `decode` as a pass/fail oracle and only inspects the error text.
pub trait RecordCodec {
    type Record: Clone + PartialEq + fmt::Debug;

    /// Decode a full record.
    ///
    /// # Errors
    ///
    /// Returns [`RepairError::Decode`] carrying the decoder's message.
    fn decode(&self, bytes: &[u8]) -> Result<Self::Record>;

    /// Encode a record in canonical form.
    fn encode(&self, record: &Self::Record) -> Vec<u8>;
}

/// Prost-backed codec for [`ContractInfo`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ContractInfoCodec;

impl RecordCodec for ContractInfoCodec {
    type Record = ContractInfo;

    fn decode(&self, bytes: &[u8]) -> Result<ContractInfo> {
        ContractInfo::decode(bytes).map_err(|err| RepairError::decode(err.to_string()))
    }

    fn encode(&self, record: &ContractInfo) -> Vec<u8> {
        record.encode_to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_error_is_typed() {
        let err = ContractInfoCodec.decode(&[0x12, 0x05, b'a']).unwrap_err();
        assert!(matches!(err, RepairError::Decode(_)));
        assert!(err.to_string().contains("buffer underflow"), "{err}");
    }

    #[test]
    fn encode_decode_roundtrip() {
        let info = ContractInfo {
            code_id: 42,
            creator: "xion1creator".to_owned(),
            label: "counter".to_owned(),
            ..ContractInfo::default()
        };
        let bytes = ContractInfoCodec.encode(&info);
        assert_eq!(ContractInfoCodec.decode(&bytes).unwrap(), info);
    }
}
