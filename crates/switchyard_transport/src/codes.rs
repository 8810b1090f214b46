//! The shared taxonomy-to-protocol code table.
//!
//! Both adapters map [`ErrorCode`]s through this table and nothing else, so
//! an HTTP status and a JSON-RPC code for the same failure always resolve
//! back to the same taxonomy value.

use switchyard_kernel::ErrorCode;

/// JSON-RPC: the request was not valid JSON.
pub const PARSE_ERROR: i64 = -32700;
/// JSON-RPC: the request was not a valid request object.
pub const INVALID_REQUEST: i64 = -32600;
/// JSON-RPC: no such `Resource.alias`.
pub const METHOD_NOT_FOUND: i64 = -32601;

/// One row of the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CodeMapping {
    /// Taxonomy value.
    pub code: ErrorCode,
    /// HTTP status.
    pub http: u16,
    /// JSON-RPC error code.
    pub rpc: i64,
}

/// The table itself, one row per taxonomy code.
pub const CODE_TABLE: [CodeMapping; 6] = [
    CodeMapping {
        code: ErrorCode::Validation,
        http: 422,
        rpc: -32602,
    },
    CodeMapping {
        code: ErrorCode::NotFound,
        http: 404,
        rpc: -32001,
    },
    CodeMapping {
        code: ErrorCode::Conflict,
        http: 409,
        rpc: -32002,
    },
    CodeMapping {
        code: ErrorCode::Unauthorized,
        http: 401,
        rpc: -32003,
    },
    CodeMapping {
        code: ErrorCode::Forbidden,
        http: 403,
        rpc: -32004,
    },
    CodeMapping {
        code: ErrorCode::Internal,
        http: 500,
        rpc: -32603,
    },
];

fn row(code: ErrorCode) -> CodeMapping {
    match code {
        ErrorCode::Validation => CODE_TABLE[0],
        ErrorCode::NotFound => CODE_TABLE[1],
        ErrorCode::Conflict => CODE_TABLE[2],
        ErrorCode::Unauthorized => CODE_TABLE[3],
        ErrorCode::Forbidden => CODE_TABLE[4],
        ErrorCode::Internal => CODE_TABLE[5],
    }
}

/// HTTP status for a taxonomy code.
#[must_use]
pub fn http_status(code: ErrorCode) -> u16 {
    row(code).http
}

/// JSON-RPC code for a taxonomy code.
#[must_use]
pub fn rpc_code(code: ErrorCode) -> i64 {
    row(code).rpc
}

/// Taxonomy code for an HTTP status, if it is one of ours.
#[must_use]
pub fn from_http(status: u16) -> Option<ErrorCode> {
    CODE_TABLE.iter().find(|m| m.http == status).map(|m| m.code)
}

/// Taxonomy code for a JSON-RPC code, if it is one of ours.
#[must_use]
pub fn from_rpc(code: i64) -> Option<ErrorCode> {
    CODE_TABLE.iter().find(|m| m.rpc == code).map(|m| m.code)
}
