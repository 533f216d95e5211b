//! Binary RPC messages
//!
//! Hand-derived prost types; the wire layout matches the schema below.
//!
//! ```text
//! message FilterRequest { string filter_name = 1; repeated string keys = 2; }
//! message ListRequest {}
//! message RpcRequest {
//!   oneof call {
//!     FilterRequest create = 1;  ListRequest list = 2;
//!     FilterRequest add = 3;     FilterRequest has = 4;
//!     FilterRequest drop = 5;    FilterRequest clear = 6;
//!     FilterRequest close = 7;   FilterRequest info = 8;
//!   }
//! }
//! message RpcResponse {
//!   int32 code = 1; string message = 2; repeated bool results = 3;
//!   repeated string filters = 4; map<string, string> info = 5;
//! }
//! ```

use std::collections::BTreeMap;

/// Request addressed to one filter
#[derive(Clone, PartialEq, prost::Message)]
pub struct FilterRequest {
    #[prost(string, tag = "1")]
    pub filter_name: String,
    #[prost(string, repeated, tag = "2")]
    pub keys: Vec<String>,
}

#[derive(Clone, PartialEq, prost::Message)]
pub struct ListRequest {}

/// Envelope for every call sent to the server
#[derive(Clone, PartialEq, prost::Message)]
pub struct RpcRequest {
    #[prost(oneof = "rpc_request::Call", tags = "1, 2, 3, 4, 5, 6, 7, 8")]
    pub call: Option<rpc_request::Call>,
}

pub mod rpc_request {
    use super::{FilterRequest, ListRequest};

    #[derive(Clone, PartialEq, prost::Oneof)]
    pub enum Call {
        #[prost(message, tag = "1")]
        Create(FilterRequest),
        #[prost(message, tag = "2")]
        List(ListRequest),
        #[prost(message, tag = "3")]
        Add(FilterRequest),
        #[prost(message, tag = "4")]
        Has(FilterRequest),
        #[prost(message, tag = "5")]
        Drop(FilterRequest),
        #[prost(message, tag = "6")]
        Clear(FilterRequest),
        #[prost(message, tag = "7")]
        Close(FilterRequest),
        #[prost(message, tag = "8")]
        Info(FilterRequest),
    }
}

/// Reply to any [`RpcRequest`]; `code == 0` signals success
#[derive(Clone, PartialEq, prost::Message)]
pub struct RpcResponse {
    #[prost(int32, tag = "1")]
    pub code: i32,
    #[prost(string, tag = "2")]
    pub message: String,
    #[prost(bool, repeated, tag = "3")]
    pub results: Vec<bool>,
    #[prost(string, repeated, tag = "4")]
    pub filters: Vec<String>,
    #[prost(btree_map = "string, string", tag = "5")]
    pub info: BTreeMap<String, String>,
}

impl RpcResponse {
    pub const OK: i32 = 0;

    pub fn ok() -> Self {
        Self::default()
    }

    pub fn is_ok(&self) -> bool {
        self.code == Self::OK
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prost::Message;

    #[test]
    fn test_request_oneof_survives_encoding() {
        let request = RpcRequest {
            call: Some(rpc_request::Call::Has(FilterRequest {
                filter_name: "F".to_string(),
                keys: vec!["a".to_string(), "b".to_string()],
            })),
        };

        let decoded = RpcRequest::decode(request.encode_to_vec().as_slice()).unwrap();
        match decoded.call {
            Some(rpc_request::Call::Has(req)) => {
                assert_eq!(req.filter_name, "F");
                assert_eq!(req.keys, vec!["a", "b"]);
            }
            other => panic!("unexpected call: {:?}", other),
        }
    }

    #[test]
    fn test_default_response_is_success() {
        let response = RpcResponse::decode(&[][..]).unwrap();
        assert!(response.is_ok());
        assert!(response.results.is_empty());
    }
}
