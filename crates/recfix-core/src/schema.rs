//! Contract metadata record schema.
//!
//! These prost messages are the canonical decoder/encoder. The repair
//! pipeline only consults them as an oracle ("does this decode?") and never
//! uses them to read corrupt input.
//!
//! | # | field          | encoding                        |
//! |---|----------------|---------------------------------|
//! | 1 | `code_id`      | uint64 (lead identity field)    |
//! | 2 | `creator`      | string (identity)               |
//! | 3 | `admin`        | string                          |
//! | 4 | `label`        | string                          |
//! | 5 | `created`      | `AbsoluteTxPosition` message    |
//! | 6 | `ibc_port_id`  | string                          |
//! | 7 | `extension`    | `Any` message                   |
//! | 8 | `ibc2_port_id` | string                          |

use prost::Message;
use serde::{Deserialize, Serialize};

pub const FIELD_CODE_ID: u32 = 1;
pub const FIELD_CREATOR: u32 = 2;
pub const FIELD_ADMIN: u32 = 3;
pub const FIELD_LABEL: u32 = 4;
pub const FIELD_CREATED: u32 = 5;
pub const FIELD_IBC_PORT_ID: u32 = 6;
/// Extension slot; historically written with port id data by mistake.
pub const FIELD_EXTENSION: u32 = 7;
/// Second port id slot; the correct home of the misplaced data.
pub const FIELD_IBC2_PORT_ID: u32 = 8;

/// Highest field number a rebuilt record may contain.
pub const MAX_FIELD_NUMBER: u32 = 10;

/// Identity fields without which a record cannot be reconstructed.
pub const REQUIRED_FIELDS: [u32; 2] = [FIELD_CODE_ID, FIELD_CREATOR];

/// Block position at which a contract was instantiated.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Message)]
pub struct AbsoluteTxPosition {
    #[prost(uint64, tag = "1")]
    pub block_height: u64,
    #[prost(uint64, tag = "2")]
    pub tx_index: u64,
}

/// Type-tagged opaque payload.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Message)]
pub struct Any {
    #[prost(string, tag = "1")]
    pub type_url: ::prost::alloc::string::String,
    #[prost(bytes = "vec", tag = "2")]
    pub value: ::prost::alloc::vec::Vec<u8>,
}

/// Stored metadata for one instantiated contract.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Message)]
pub struct ContractInfo {
    #[prost(uint64, tag = "1")]
    pub code_id: u64,
    #[prost(string, tag = "2")]
    pub creator: ::prost::alloc::string::String,
    #[prost(string, tag = "3")]
    pub admin: ::prost::alloc::string::String,
    #[prost(string, tag = "4")]
    pub label: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "5")]
    pub created: Option<AbsoluteTxPosition>,
    #[prost(string, tag = "6")]
    pub ibc_port_id: ::prost::alloc::string::String,
    #[prost(message, optional, tag = "7")]
    pub extension: Option<Any>,
    #[prost(string, tag = "8")]
    pub ibc2_port_id: ::prost::alloc::string::String,
}

impl ContractInfo {
    /// Encode with an explicit empty extension so field 7 is present on the
    /// wire. Field 8 is only emitted when non-empty.
    #[must_use]
    pub fn encode_with_extension(&self) -> Vec<u8> {
        let mut record = self.clone();
        record.extension.get_or_insert_with(Any::default);
        record.encode_to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_numbers_match_message_tags() {
        let info = ContractInfo {
            code_id: 1,
            creator: "c".to_owned(),
            extension: Some(Any::default()),
            ibc2_port_id: "p".to_owned(),
            ..ContractInfo::default()
        };
        let bytes = info.encode_to_vec();
        // 08 01 | 12 01 'c' | 3A 00 | 42 01 'p'
        assert_eq!(bytes, vec![0x08, 0x01, 0x12, 0x01, b'c', 0x3A, 0x00, 0x42, 0x01, b'p']);
    }

    #[test]
    fn string_in_extension_slot_fails_with_invalid_wire_type() {
        let mut bytes = vec![0x08, 0x01];
        bytes.push(0x3A);
        bytes.push(14);
        bytes.extend_from_slice(b"wasm.xion1test");
        let err = ContractInfo::decode(bytes.as_slice()).unwrap_err();
        assert!(err.to_string().contains("invalid wire type"), "{err}");
    }

    #[test]
    fn empty_buffer_decodes_to_defaults() {
        let info = ContractInfo::decode(&[][..]).unwrap();
        assert_eq!(info, ContractInfo::default());
    }

    #[test]
    fn encode_with_extension_emits_field_seven() {
        let info = ContractInfo {
            code_id: 3,
            ..ContractInfo::default()
        };
        assert_eq!(info.encode_with_extension(), vec![0x08, 0x03, 0x3A, 0x00]);
    }
}
