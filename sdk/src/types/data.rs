//! Data transaction payloads and the key-lookup query.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::envelope::ResponseHeader;

/// Position of a committed value in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Version {
    pub block_num: u64,
    pub tx_num: u64,
}

/// Who may read or overwrite a key. Empty sets leave the server default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessControl {
    #[serde(default)]
    pub read_users: BTreeSet<String>,
    #[serde(default)]
    pub read_write_users: BTreeSet<String>,
}

impl AccessControl {
    pub fn read_only(users: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            read_users: users.into_iter().map(Into::into).collect(),
            read_write_users: BTreeSet::new(),
        }
    }

    pub fn read_write(users: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            read_users: BTreeSet::new(),
            read_write_users: users.into_iter().map(Into::into).collect(),
        }
    }
}

/// Server-side metadata attached to a stored value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metadata {
    pub version: Version,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_control: Option<AccessControl>,
}

/// A key read inside the transaction, with the version observed.
///
/// `version` is `None` when the key did not exist at read time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataRead {
    pub key: String,
    pub version: Option<Version>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataWrite {
    pub key: String,
    #[serde(with = "hex::serde")]
    pub value: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acl: Option<AccessControl>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataDelete {
    pub key: String,
}

/// The signed payload of a data transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataTx {
    pub user_id: String,
    pub db_name: String,
    pub tx_id: String,
    #[serde(default)]
    pub data_reads: Vec<DataRead>,
    #[serde(default)]
    pub data_writes: Vec<DataWrite>,
    #[serde(default)]
    pub data_deletes: Vec<DataDelete>,
}

impl DataTx {
    /// Bytes covered by the envelope signature.
    pub fn signable_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// True if the transaction carries no operation at all.
    pub fn is_empty(&self) -> bool {
        self.data_reads.is_empty() && self.data_writes.is_empty() && self.data_deletes.is_empty()
    }
}

/// Query for one key of one database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetDataQuery {
    pub user_id: String,
    pub db_name: String,
    pub key: String,
}

/// A replica's answer to [`GetDataQuery`].
///
/// A missing key comes back with an empty value and no metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetDataResponse {
    pub header: ResponseHeader,
    #[serde(default, with = "hex::serde")]
    pub value: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Metadata>,
}

impl GetDataResponse {
    /// The stored value, or `None` if the key does not exist.
    pub fn into_value(self) -> Option<Vec<u8>> {
        self.metadata.map(|_| self.value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetDataResponseEnvelope {
    pub payload: GetDataResponse,
    #[serde(with = "hex::serde")]
    pub signature: Vec<u8>,
}
