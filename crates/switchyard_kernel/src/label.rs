//! Step label formats.
//!
//! Labels identify plan entries in traces and in introspection output. The
//! anchor suffix (`@PHASE`) is omitted for security dependencies and plain
//! dependencies, whose phase is implied by their prefix.

use crate::phase::Phase;

/// Label of the transaction begin marker.
pub const TXN_BEGIN: &str = "sys:txn:begin@START_TX";

/// Label of the transaction commit marker.
pub const TXN_COMMIT: &str = "sys:txn:commit@END_TX";

/// `secdep:<name>`
#[must_use]
pub fn secdep(name: &str) -> String {
    format!("secdep:{name}")
}

/// `dep:<name>`
#[must_use]
pub fn dep(name: &str) -> String {
    format!("dep:{name}")
}

/// `hook:<name>@<PHASE>`
#[must_use]
pub fn hook(name: &str, phase: Phase) -> String {
    format!("hook:{name}@{phase}")
}

/// `handler:<name>@HANDLER`
#[must_use]
pub fn handler(name: &str) -> String {
    format!("handler:{name}@{}", Phase::Handler)
}

/// `atom:<domain>:<subject>@<PHASE>`
#[must_use]
pub fn atom(domain: &str, subject: &str, phase: Phase) -> String {
    format!("atom:{domain}:{subject}@{phase}")
}

/// `<PHASE>:<label>`, the introspection form.
#[must_use]
pub fn qualified(phase: Phase, label: &str) -> String {
    format!("{phase}:{label}")
}
