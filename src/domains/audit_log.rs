//! Read surface over the audit trail. There is deliberately no create
//! operation in this module or in the catalogue: the dispatcher writes
//! trail entries itself, and nothing the presentation layer sends can
//! forge one.

use crate::core::audit;
use crate::core::error::GantryError;
use crate::core::registry::{Handled, HandlerCtx, ParamRule, ParamSpec, ValidatedParams};
use rusqlite::Connection;

pub const DEFAULT_LIMIT: i64 = 50;

pub const GET_RECENT_PARAMS: &[ParamSpec] = &[ParamSpec {
    name: "limit",
    rule: ParamRule::Id,
    required: false,
}];

pub fn get_recent_op(
    conn: &Connection,
    p: &ValidatedParams,
    _ctx: &HandlerCtx,
) -> Result<Handled, GantryError> {
    let limit = p.id("limit").unwrap_or(DEFAULT_LIMIT);
    let entries = audit::recent_entries(conn, limit)?;
    Ok(Handled::read(serde_json::to_value(entries)?))
}
