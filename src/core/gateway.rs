//! The secure operation gateway.
//!
//! Single entry point between the untrusted presentation layer and the
//! store: look the operation up in the closed catalogue, validate every
//! parameter, run the handler on a fresh connection, and record exactly
//! one audit entry per successful mutation inside the same transaction.
//! Everything that can go wrong is normalized into the small public
//! [`GatewayError`] taxonomy; raw storage errors never cross this line.

use crate::core::audit::{self, Actor};
use crate::core::config::GantryConfig;
use crate::core::db;
use crate::core::error::GantryError;
use crate::core::registry::{
    self, Action, Domain, HandlerCtx, OperationRegistry, OperationSpec,
};
use crate::core::store::Store;
use crate::core::time;
use crate::core::validate::FieldError;
use rusqlite::TransactionBehavior;
use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};
use std::sync::Mutex;

/// One request envelope from the presentation layer.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Request {
    pub domain: String,
    pub action: String,
    #[serde(default)]
    pub params: JsonValue,
    #[serde(default)]
    pub actor: Option<RequestActor>,
    /// Opaque client metadata (ip, user agent, window id) recorded
    /// alongside audit entries, never interpreted.
    #[serde(default)]
    pub client: Option<JsonValue>,
    /// Correlation id; generated when the caller did not supply one.
    #[serde(default = "default_dispatch_id")]
    pub id: String,
}

pub fn default_dispatch_id() -> String {
    time::new_dispatch_id()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RequestActor {
    #[serde(rename = "userId", default)]
    pub user_id: Option<i64>,
    pub username: String,
}

impl Request {
    pub fn new(domain: &str, action: &str, params: JsonValue) -> Self {
        Self {
            domain: domain.to_string(),
            action: action.to_string(),
            params,
            actor: None,
            client: None,
            id: default_dispatch_id(),
        }
    }

    pub fn with_actor(mut self, user_id: Option<i64>, username: &str) -> Self {
        self.actor = Some(RequestActor {
            user_id,
            username: username.to_string(),
        });
        self
    }
}

/// Public error taxonomy. The `kind` strings are wire-stable; the
/// presentation layer branches on them and nothing else.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayError {
    UnknownOperation { domain: String, action: String },
    ValidationFailed { fields: Vec<FieldError> },
    BackendUnavailable { message: String },
    ConstraintViolation { message: String },
    AuditWriteFailed { message: String },
}

impl GatewayError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::UnknownOperation { .. } => "UnknownOperation",
            Self::ValidationFailed { .. } => "ValidationFailed",
            Self::BackendUnavailable { .. } => "BackendUnavailable",
            Self::ConstraintViolation { .. } => "ConstraintViolation",
            Self::AuditWriteFailed { .. } => "AuditWriteFailed",
        }
    }

    pub fn message(&self) -> String {
        match self {
            Self::UnknownOperation { domain, action } => {
                format!("no operation registered for {}.{}", domain, action)
            }
            Self::ValidationFailed { fields } => {
                format!("{} parameter(s) failed validation", fields.len())
            }
            Self::BackendUnavailable { message } => message.clone(),
            Self::ConstraintViolation { message } => message.clone(),
            Self::AuditWriteFailed { message } => message.clone(),
        }
    }
}

/// Response envelope: `{ok: true, value}` or
/// `{ok: false, errorKind, message, fields?}`, plus the echoed request id.
#[derive(Debug, Clone, Serialize)]
pub struct Response {
    pub id: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<JsonValue>,
    #[serde(rename = "errorKind", skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<JsonValue>>,
}

impl Response {
    pub fn success(id: &str, value: JsonValue) -> Self {
        Self {
            id: id.to_string(),
            ok: true,
            value: Some(value),
            error_kind: None,
            message: None,
            fields: None,
        }
    }

    pub fn failure(id: &str, err: &GatewayError) -> Self {
        let fields = match err {
            GatewayError::ValidationFailed { fields } => {
                Some(fields.iter().map(|f| f.to_json()).collect())
            }
            _ => None,
        };
        Self {
            id: id.to_string(),
            ok: false,
            value: None,
            error_kind: Some(err.kind().to_string()),
            message: Some(err.message()),
            fields,
        }
    }
}

/// The dispatcher. `Send + Sync`; reads run lock-free on their own
/// connections, mutations serialize on the instance write lock.
pub struct Gateway {
    registry: OperationRegistry,
    store: Store,
    config: GantryConfig,
    write_lock: Mutex<()>,
}

impl Gateway {
    pub fn new(registry: OperationRegistry, store: Store, config: GantryConfig) -> Self {
        Self {
            registry,
            store,
            config,
            write_lock: Mutex::new(()),
        }
    }

    /// Standard catalogue plus the workspace's own configuration.
    pub fn open(store: Store) -> Result<Self, GantryError> {
        let config = crate::core::config::load_config(&store)?;
        Ok(Self::new(OperationRegistry::standard(), store, config))
    }

    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn config(&self) -> &GantryConfig {
        &self.config
    }

    /// Dispatches one request. Infallible at the type level: every failure
    /// becomes an error envelope, so the presentation layer always gets a
    /// response it can render.
    pub fn dispatch(&self, request: &Request) -> Response {
        let actor = match &request.actor {
            Some(a) => Actor::named(a.user_id, &a.username),
            None => Actor::system(),
        };
        match self.run(request, &actor) {
            Ok(value) => Response::success(&request.id, value),
            Err(err) => Response::failure(&request.id, &err),
        }
    }

    fn run(&self, request: &Request, actor: &Actor) -> Result<JsonValue, GatewayError> {
        let (domain, action) = match (
            Domain::from_wire(&request.domain),
            Action::from_wire(&request.action),
        ) {
            (Some(d), Some(a)) => (d, a),
            _ => {
                return Err(GatewayError::UnknownOperation {
                    domain: request.domain.clone(),
                    action: request.action.clone(),
                });
            }
        };
        let spec = self
            .registry
            .lookup(domain, action)
            .ok_or_else(|| GatewayError::UnknownOperation {
                domain: request.domain.clone(),
                action: request.action.clone(),
            })?;

        let empty = JsonMap::new();
        let raw_params = match &request.params {
            JsonValue::Object(map) => map,
            JsonValue::Null => &empty,
            _ => {
                return Err(GatewayError::ValidationFailed {
                    fields: vec![FieldError::new(
                        "params",
                        crate::core::validate::ReasonKind::Missing,
                        "params must be a JSON object",
                    )],
                });
            }
        };
        let params = registry::validate_params(spec, raw_params)
            .map_err(|fields| GatewayError::ValidationFailed { fields })?;

        let db_path = self.config.db_path(&self.store);
        if !db_path.exists() {
            return Err(GatewayError::BackendUnavailable {
                message: "compliance store is not initialized".to_string(),
            });
        }
        let ctx = HandlerCtx {
            attachments_dir: self.config.attachments_dir(&self.store),
        };

        if spec.mutating {
            self.run_mutating(spec, &db_path, &params, &ctx, request, actor)
        } else {
            let conn = db::db_connect(&db_path).map_err(normalize)?;
            let handled = (spec.handler)(&conn, &params, &ctx).map_err(normalize)?;
            Ok(handled.value)
        }
    }

    fn run_mutating(
        &self,
        spec: &OperationSpec,
        db_path: &std::path::Path,
        params: &registry::ValidatedParams,
        ctx: &HandlerCtx,
        request: &Request,
        actor: &Actor,
    ) -> Result<JsonValue, GatewayError> {
        let _guard = match self.write_lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut conn = db::db_connect(db_path).map_err(normalize)?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| normalize(GantryError::RusqliteError(e)))?;

        // A handler failure or audit failure drops the transaction here,
        // which rolls back: the data write and the trail entry land
        // together or not at all.
        let handled = (spec.handler)(&tx, params, ctx).map_err(normalize)?;
        if let Some(draft) = &handled.audit {
            audit::append_entry(&tx, &request.id, actor, request.client.as_ref(), draft)
                .map_err(normalize)?;
        }
        tx.commit().map_err(|e| GatewayError::BackendUnavailable {
            message: format!("commit failed: {}", e),
        })?;
        Ok(handled.value)
    }
}

/// The one place internal errors become wire kinds.
fn normalize(err: GantryError) -> GatewayError {
    match err {
        GantryError::AuditWrite(message) => GatewayError::AuditWriteFailed { message },
        GantryError::ValidationError(message) => GatewayError::ConstraintViolation { message },
        GantryError::MissingRelation { detail, .. } => {
            GatewayError::ConstraintViolation { message: detail }
        }
        GantryError::NotFound(message) => GatewayError::ConstraintViolation { message },
        GantryError::RusqliteError(rusqlite::Error::SqliteFailure(e, msg))
            if e.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            GatewayError::ConstraintViolation {
                message: msg.unwrap_or_else(|| "storage constraint violated".to_string()),
            }
        }
        other => GatewayError::BackendUnavailable {
            message: other.to_string(),
        },
    }
}
