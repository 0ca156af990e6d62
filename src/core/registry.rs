//! Operation registry: the closed catalogue of `(domain, action)` pairs
//! the gateway will dispatch.
//!
//! Domains and actions are sum types, so a typo is unrepresentable once
//! parsing succeeds and the compiler sees every match arm. Wire strings
//! exist only at the envelope boundary. The registry itself is a plain
//! value built once by [`OperationRegistry::standard`] and passed by
//! reference into the gateway; there is no global.

use crate::core::audit::AuditDraft;
use crate::core::error::GantryError;
use crate::core::validate::{self, FieldError, ReasonKind};
use crate::domains::{audit_log, certificates, credentials, equipment, events, pm};
use chrono::NaiveDate;
use rusqlite::Connection;
use rustc_hash::FxHashMap;
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Domain {
    Equipment,
    Inspections,
    LoadTests,
    Calibrations,
    Credentials,
    Certificates,
    AuditLog,
    PmSchedules,
}

impl Domain {
    pub const ALL: &'static [Domain] = &[
        Self::Equipment,
        Self::Inspections,
        Self::LoadTests,
        Self::Calibrations,
        Self::Credentials,
        Self::Certificates,
        Self::AuditLog,
        Self::PmSchedules,
    ];

    pub fn from_wire(raw: &str) -> Option<Self> {
        match raw {
            "equipment" => Some(Self::Equipment),
            "inspections" => Some(Self::Inspections),
            "loadTests" => Some(Self::LoadTests),
            "calibrations" => Some(Self::Calibrations),
            "credentials" => Some(Self::Credentials),
            "certificates" => Some(Self::Certificates),
            "auditLog" => Some(Self::AuditLog),
            "pmSchedules" => Some(Self::PmSchedules),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Equipment => "equipment",
            Self::Inspections => "inspections",
            Self::LoadTests => "loadTests",
            Self::Calibrations => "calibrations",
            Self::Credentials => "credentials",
            Self::Certificates => "certificates",
            Self::AuditLog => "auditLog",
            Self::PmSchedules => "pmSchedules",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Create,
    Update,
    Delete,
    GetAll,
    GetById,
    GetByEquipmentId,
    GetDue,
    GetOverdue,
    GetExpiring,
    GetTotal,
    GetRecent,
}

impl Action {
    pub const ALL: &'static [Action] = &[
        Self::Create,
        Self::Update,
        Self::Delete,
        Self::GetAll,
        Self::GetById,
        Self::GetByEquipmentId,
        Self::GetDue,
        Self::GetOverdue,
        Self::GetExpiring,
        Self::GetTotal,
        Self::GetRecent,
    ];

    pub fn from_wire(raw: &str) -> Option<Self> {
        match raw {
            "create" => Some(Self::Create),
            "update" => Some(Self::Update),
            "delete" => Some(Self::Delete),
            "getAll" => Some(Self::GetAll),
            "getById" => Some(Self::GetById),
            "getByEquipmentId" => Some(Self::GetByEquipmentId),
            "getDue" => Some(Self::GetDue),
            "getOverdue" => Some(Self::GetOverdue),
            "getExpiring" => Some(Self::GetExpiring),
            "getTotal" => Some(Self::GetTotal),
            "getRecent" => Some(Self::GetRecent),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::GetAll => "getAll",
            Self::GetById => "getById",
            Self::GetByEquipmentId => "getByEquipmentId",
            Self::GetDue => "getDue",
            Self::GetOverdue => "getOverdue",
            Self::GetExpiring => "getExpiring",
            Self::GetTotal => "getTotal",
            Self::GetRecent => "getRecent",
        }
    }
}

/// Validation rule for one declared parameter.
#[derive(Debug, Clone, Copy)]
pub enum ParamRule {
    Id,
    Date,
    Text { max: usize },
    RelPath,
    Number,
    Flag,
    OneOf(&'static [&'static str]),
}

impl ParamRule {
    /// Human-readable rule description for the discovery surface.
    pub fn describe(&self) -> String {
        match self {
            Self::Id => "id".to_string(),
            Self::Date => "date".to_string(),
            Self::Text { max } => format!("text(max={})", max),
            Self::RelPath => "path".to_string(),
            Self::Number => "number".to_string(),
            Self::Flag => "flag".to_string(),
            Self::OneOf(allowed) => format!("one-of[{}]", allowed.join("|")),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub name: &'static str,
    pub rule: ParamRule,
    pub required: bool,
}

/// Normalized value produced by a validator.
#[derive(Debug, Clone)]
pub enum ParamValue {
    Id(i64),
    Date(NaiveDate),
    Text(String),
    RelPath(String),
    Number(f64),
    Flag(bool),
    Choice(&'static str),
}

/// Validated, typed view of a request's parameters. Handlers only ever see
/// this; raw JSON stops at the validation gate.
#[derive(Debug, Default)]
pub struct ValidatedParams {
    values: FxHashMap<&'static str, ParamValue>,
}

impl ValidatedParams {
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn id(&self, name: &str) -> Option<i64> {
        match self.values.get(name) {
            Some(ParamValue::Id(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn date(&self, name: &str) -> Option<NaiveDate> {
        match self.values.get(name) {
            Some(ParamValue::Date(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(ParamValue::Text(v)) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn rel_path(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(ParamValue::RelPath(v)) => Some(v.as_str()),
            _ => None,
        }
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        match self.values.get(name) {
            Some(ParamValue::Number(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn flag(&self, name: &str) -> Option<bool> {
        match self.values.get(name) {
            Some(ParamValue::Flag(v)) => Some(*v),
            _ => None,
        }
    }

    pub fn choice(&self, name: &str) -> Option<&'static str> {
        match self.values.get(name) {
            Some(ParamValue::Choice(v)) => Some(v),
            _ => None,
        }
    }
}

/// Context handed to every handler alongside the connection.
#[derive(Debug, Clone)]
pub struct HandlerCtx {
    /// Resolved directory certificate file paths are joined against.
    pub attachments_dir: PathBuf,
}

/// What a handler produced: the response value, plus the audit draft when
/// the operation mutated the store.
#[derive(Debug)]
pub struct Handled {
    pub value: JsonValue,
    pub audit: Option<AuditDraft>,
}

impl Handled {
    pub fn read(value: JsonValue) -> Self {
        Self { value, audit: None }
    }

    pub fn mutated(value: JsonValue, draft: AuditDraft) -> Self {
        Self {
            value,
            audit: Some(draft),
        }
    }
}

pub type Handler = fn(&Connection, &ValidatedParams, &HandlerCtx) -> Result<Handled, GantryError>;

pub struct OperationSpec {
    pub params: &'static [ParamSpec],
    pub mutating: bool,
    pub handler: Handler,
}

pub struct OperationRegistry {
    ops: FxHashMap<(Domain, Action), OperationSpec>,
}

impl OperationRegistry {
    /// The standard catalogue. Every compliance-tracked domain registers
    /// its full action set here; a missing entry is a configuration
    /// defect, which the catalogue tests assert against this table.
    pub fn standard() -> Self {
        let mut reg = Self {
            ops: FxHashMap::default(),
        };

        reg.read(Domain::Equipment, Action::GetAll, equipment::GET_ALL_PARAMS, equipment::get_all_op);
        reg.read(Domain::Equipment, Action::GetById, equipment::GET_BY_ID_PARAMS, equipment::get_by_id_op);
        reg.write(Domain::Equipment, Action::Create, equipment::CREATE_PARAMS, equipment::create_op);
        reg.write(Domain::Equipment, Action::Update, equipment::UPDATE_PARAMS, equipment::update_op);
        reg.write(Domain::Equipment, Action::Delete, equipment::DELETE_PARAMS, equipment::delete_op);

        reg.read(Domain::LoadTests, Action::GetAll, events::GET_ALL_PARAMS, events::load_tests_get_all);
        reg.read(Domain::LoadTests, Action::GetByEquipmentId, events::GET_BY_EQUIPMENT_PARAMS, events::load_tests_get_by_equipment);
        reg.read(Domain::LoadTests, Action::GetDue, events::GET_DUE_PARAMS, events::load_tests_get_due);
        reg.read(Domain::LoadTests, Action::GetOverdue, events::GET_OVERDUE_PARAMS, events::load_tests_get_overdue);
        reg.write(Domain::LoadTests, Action::Create, events::CREATE_PARAMS, events::load_tests_create);

        reg.read(Domain::Calibrations, Action::GetAll, events::GET_ALL_PARAMS, events::calibrations_get_all);
        reg.read(Domain::Calibrations, Action::GetByEquipmentId, events::GET_BY_EQUIPMENT_PARAMS, events::calibrations_get_by_equipment);
        reg.read(Domain::Calibrations, Action::GetDue, events::GET_DUE_PARAMS, events::calibrations_get_due);
        reg.read(Domain::Calibrations, Action::GetOverdue, events::GET_OVERDUE_PARAMS, events::calibrations_get_overdue);
        reg.write(Domain::Calibrations, Action::Create, events::CREATE_PARAMS, events::calibrations_create);

        reg.read(Domain::Inspections, Action::GetAll, events::GET_ALL_PARAMS, events::inspections_get_all);
        reg.read(Domain::Inspections, Action::GetByEquipmentId, events::GET_BY_EQUIPMENT_PARAMS, events::inspections_get_by_equipment);
        reg.read(Domain::Inspections, Action::GetDue, events::GET_DUE_PARAMS, events::inspections_get_due);
        reg.read(Domain::Inspections, Action::GetOverdue, events::GET_OVERDUE_PARAMS, events::inspections_get_overdue);
        reg.write(Domain::Inspections, Action::Create, events::CREATE_PARAMS, events::inspections_create);

        reg.read(Domain::Credentials, Action::GetAll, credentials::GET_ALL_PARAMS, credentials::get_all_op);
        reg.read(Domain::Credentials, Action::GetExpiring, credentials::GET_EXPIRING_PARAMS, credentials::get_expiring_op);
        reg.write(Domain::Credentials, Action::Create, credentials::CREATE_PARAMS, credentials::create_op);

        reg.read(Domain::Certificates, Action::GetByEquipmentId, certificates::GET_BY_EQUIPMENT_PARAMS, certificates::get_by_equipment_op);
        reg.write(Domain::Certificates, Action::Create, certificates::CREATE_PARAMS, certificates::create_op);

        reg.read(Domain::PmSchedules, Action::GetAll, pm::GET_ALL_PARAMS, pm::get_all_op);
        reg.read(Domain::PmSchedules, Action::GetTotal, pm::GET_TOTAL_PARAMS, pm::get_total_op);
        reg.read(Domain::PmSchedules, Action::GetOverdue, pm::GET_OVERDUE_PARAMS, pm::get_overdue_op);
        reg.write(Domain::PmSchedules, Action::Create, pm::CREATE_PARAMS, pm::create_op);

        // The catalogue has no auditLog.create on purpose. The dispatcher
        // is the sole writer of the trail; exposing create here would let
        // the presentation layer forge entries.
        reg.read(Domain::AuditLog, Action::GetRecent, audit_log::GET_RECENT_PARAMS, audit_log::get_recent_op);

        reg
    }

    fn read(&mut self, domain: Domain, action: Action, params: &'static [ParamSpec], handler: Handler) {
        self.ops.insert(
            (domain, action),
            OperationSpec {
                params,
                mutating: false,
                handler,
            },
        );
    }

    fn write(&mut self, domain: Domain, action: Action, params: &'static [ParamSpec], handler: Handler) {
        self.ops.insert(
            (domain, action),
            OperationSpec {
                params,
                mutating: true,
                handler,
            },
        );
    }

    pub fn lookup(&self, domain: Domain, action: Action) -> Option<&OperationSpec> {
        self.ops.get(&(domain, action))
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Stable-order iteration for the discovery surface and tests.
    pub fn operations(&self) -> Vec<(Domain, Action, &OperationSpec)> {
        let mut out = Vec::with_capacity(self.ops.len());
        for domain in Domain::ALL {
            for action in Action::ALL {
                if let Some(spec) = self.ops.get(&(*domain, *action)) {
                    out.push((*domain, *action, spec));
                }
            }
        }
        out
    }
}

/// Validates raw request parameters against an operation's declared specs,
/// collecting every failing field so the caller sees all problems at once.
/// Parameters not declared by the operation are ignored; `null` counts as
/// absent.
pub fn validate_params(
    spec: &OperationSpec,
    raw: &JsonMap<String, JsonValue>,
) -> Result<ValidatedParams, Vec<FieldError>> {
    let mut out = ValidatedParams::default();
    let mut errors = Vec::new();
    for param in spec.params {
        let value = match raw.get(param.name) {
            None | Some(JsonValue::Null) => {
                if param.required {
                    errors.push(FieldError::new(
                        param.name,
                        ReasonKind::Missing,
                        "required parameter is missing",
                    ));
                }
                continue;
            }
            Some(v) => v,
        };
        let checked = match param.rule {
            ParamRule::Id => validate::validate_identifier(param.name, value).map(ParamValue::Id),
            ParamRule::Date => validate::validate_date(param.name, value).map(ParamValue::Date),
            ParamRule::Text { max } => {
                validate::validate_text(param.name, value, max).map(ParamValue::Text)
            }
            ParamRule::RelPath => {
                validate::validate_rel_path(param.name, value).map(ParamValue::RelPath)
            }
            ParamRule::Number => validate::validate_number(param.name, value).map(ParamValue::Number),
            ParamRule::Flag => validate::validate_flag(param.name, value).map(ParamValue::Flag),
            ParamRule::OneOf(allowed) => {
                validate::validate_one_of(param.name, value, allowed).map(ParamValue::Choice)
            }
        };
        match checked {
            Ok(v) => {
                out.values.insert(param.name, v);
            }
            Err(e) => errors.push(e),
        }
    }
    if errors.is_empty() { Ok(out) } else { Err(errors) }
}
