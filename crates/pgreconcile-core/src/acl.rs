//! Parsing for PostgreSQL's textual ACL array representation, as found in
//! `pg_database.datacl` and `pg_default_acl.defaclacl`.
//!
//! See <https://docs.aws.amazon.com/redshift/latest/dg/r_PG_DEFAULT_ACL.html>
//! for the format. Grounded on `pg_objects/acl_utils.py`, which parses this
//! with a `shlex` tokenizer configured to treat `,` as whitespace and to
//! keep `=`, `/` and spaces as word characters; here we hand-roll the same
//! tokenizer since nothing in the ecosystem models `shlex`'s word-character
//! customization directly.

use crate::error::{ReconcileError, Result};

/// One parsed entry of a `datacl`/`defaclacl` array: `grantee=privs/grantor`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AclEntry {
    pub grantee: String,
    pub privileges: String,
    pub grantor: String,
}

/// Splits a brace-delimited, comma-separated ACL array into its raw
/// entry strings, honoring `"..."` quoting around identifiers.
///
/// `None` (a NULL `datacl`) yields an empty list, matching the default
/// ACL for an object that has never had its privileges touched.
fn tokenize_acl_array(raw: Option<&str>) -> Result<Vec<String>> {
    let Some(raw) = raw else {
        return Ok(Vec::new());
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(Vec::new());
    }
    if !raw.starts_with('{') || !raw.ends_with('}') {
        return Err(ReconcileError::MalformedAcl(raw.to_string()));
    }
    let inner = &raw[1..raw.len() - 1];

    let mut entries = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = inner.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                in_quotes = !in_quotes;
            }
            ',' if !in_quotes => {
                entries.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    if in_quotes {
        return Err(ReconcileError::MalformedAcl(raw.to_string()));
    }
    entries.push(current);

    Ok(entries.into_iter().map(|e| e.trim().to_string()).collect())
}

/// Parses one `grantee=privs/grantor` entry.
fn parse_entry(raw: &str) -> Result<AclEntry> {
    let (grantee, rest) = raw
        .split_once('=')
        .ok_or_else(|| ReconcileError::MalformedAcl(raw.to_string()))?;
    let (privileges, grantor) = rest
        .split_once('/')
        .ok_or_else(|| ReconcileError::MalformedAcl(raw.to_string()))?;

    let grantee = if grantee.is_empty() {
        "public".to_string()
    } else {
        grantee.to_string()
    };

    Ok(AclEntry {
        grantee,
        privileges: privileges.to_string(),
        grantor: grantor.to_string(),
    })
}

/// Parses a full `datacl`/`defaclacl` array into its entries.
///
/// Returns `(grantee, privs_str, grantor)` triples, matching
/// `acl_utils.py::parse_datacl`'s return shape, where `privs_str` is a
/// run of single-letter privilege codes to be decoded by the caller with
/// e.g. [`crate::privilege::database_privilege_from_acl_code`].
pub fn parse_acl(raw: Option<&str>) -> Result<Vec<AclEntry>> {
    tokenize_acl_array(raw)?
        .iter()
        .map(|entry| parse_entry(entry))
        .collect()
}
