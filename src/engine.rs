//! Statement dispatcher
//!
//! [`Engine`] owns the storage, the transaction journal and the permission
//! gate. It parses SQL, checks the statement's permission and routes it to
//! the DDL, DML or query executor.

use crate::auth::{default_users_path, AllowAll, Permission, PermissionGate, UserStore};
use crate::backup;
use crate::error::{Error, Result};
use crate::executor::{DdlExecutor, DmlExecutor, QueryExecutor, QueryResult};
use crate::sql::{self, PrivilegeStatement, Statement};
use crate::storage::Storage;
use crate::transaction::TransactionManager;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default catalog file
pub const DEFAULT_CATALOG: &str = "flatdb.dbf";

/// Engine configuration
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Catalog file; record files live next to it
    pub catalog_path: PathBuf,
    /// User store location, `<dir>/<base>_users.json` when unset
    pub users_path: Option<PathBuf>,
    /// Check permissions before every statement
    pub enforce_permissions: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            catalog_path: PathBuf::from(DEFAULT_CATALOG),
            users_path: None,
            enforce_permissions: true,
        }
    }
}

impl EngineConfig {
    /// Create a config for the given catalog file
    pub fn new(catalog_path: impl Into<PathBuf>) -> Self {
        Self {
            catalog_path: catalog_path.into(),
            ..Self::default()
        }
    }

    /// Set the user store path
    pub fn users_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.users_path = Some(path.into());
        self
    }

    /// Enable or disable permission checks
    pub fn enforce_permissions(mut self, enforce: bool) -> Self {
        self.enforce_permissions = enforce;
        self
    }

    /// The user store path after applying the default
    pub fn resolved_users_path(&self) -> PathBuf {
        self.users_path
            .clone()
            .unwrap_or_else(|| default_users_path(&self.catalog_path))
    }
}

/// The database engine
pub struct Engine {
    config: EngineConfig,
    storage: Storage,
    transactions: TransactionManager,
    gate: Box<dyn PermissionGate>,
}

impl Engine {
    /// Open the catalog and, when permissions are enforced, the user store
    pub fn open(config: EngineConfig) -> Result<Self> {
        let gate: Box<dyn PermissionGate> = if config.enforce_permissions {
            Box::new(UserStore::open(config.resolved_users_path())?)
        } else {
            Box::new(AllowAll::default())
        };
        Self::with_gate(config, gate)
    }

    /// Open the catalog with a caller-supplied permission gate
    pub fn with_gate(config: EngineConfig, gate: Box<dyn PermissionGate>) -> Result<Self> {
        let storage = Storage::open(&config.catalog_path)?;
        info!(
            catalog = %config.catalog_path.display(),
            permissions = config.enforce_permissions,
            "engine opened"
        );

        Ok(Self {
            config,
            storage,
            transactions: TransactionManager::new(),
            gate,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Id of the active transaction
    pub fn transaction_id(&self) -> Option<u64> {
        self.transactions.current_id()
    }

    pub fn current_user(&self) -> Option<&str> {
        self.gate.current_user()
    }

    pub fn login(&mut self, username: &str, password: &str) -> Result<()> {
        self.gate.login(username, password)
    }

    pub fn logout(&mut self) {
        self.gate.logout();
    }

    /// Run a batch of `;`-separated statements. `--` comments are
    /// stripped first. Each statement gets its own result and a failure
    /// does not stop the batch.
    pub fn execute(&mut self, sql: &str) -> Vec<Result<QueryResult>> {
        let cleaned = sql::strip_comments(sql);
        sql::split_statements(&cleaned)
            .iter()
            .map(|stmt| self.execute_one(stmt))
            .collect()
    }

    /// Parse and run a single statement
    pub fn execute_one(&mut self, sql: &str) -> Result<QueryResult> {
        let stmt = sql::parse(sql)?;
        self.execute_statement(&stmt)
    }

    /// Run a parsed statement
    pub fn execute_statement(&mut self, stmt: &Statement) -> Result<QueryResult> {
        if let Some(permission) = required_permission(stmt) {
            self.gate.check(permission)?;
        }
        debug!(kind = statement_kind(stmt), "dispatching statement");

        match stmt {
            Statement::Select(select) => QueryExecutor::new(&self.storage).select(select),

            Statement::Insert(insert) => self.dml().insert(insert),
            Statement::Update(update) => self.dml().update(update),
            Statement::Delete(delete) => self.dml().delete(delete),

            Statement::CreateTable(create) => self.ddl().create_table(create),
            Statement::CreateIndex(create) => self.ddl().create_index(create),
            Statement::AlterTable(alter) => self.ddl().alter_table(alter),
            Statement::DropTable(name) => self.ddl().drop_table(name),
            Statement::RenameTable { old_name, new_name } => {
                self.ddl().rename_table(old_name, new_name)
            }

            Statement::CreateUser(user) => {
                self.gate.create_user(&user.username, &user.password)?;
                Ok(QueryResult::with_message(format!(
                    "User '{}' created successfully",
                    user.username
                )))
            }
            Statement::DropUser(username) => {
                self.gate.drop_user(username)?;
                Ok(QueryResult::with_message(format!(
                    "User '{}' dropped successfully",
                    username
                )))
            }
            Statement::Grant(grant) => {
                self.gate.grant(&grant.username, &permissions(grant)?)?;
                Ok(QueryResult::with_message(format!(
                    "Permissions granted to {} successfully",
                    grant.username
                )))
            }
            Statement::Revoke(revoke) => {
                self.gate.revoke(&revoke.username, &permissions(revoke)?)?;
                Ok(QueryResult::with_message(format!(
                    "Permissions revoked from {} successfully",
                    revoke.username
                )))
            }

            Statement::Begin => {
                let id = self.transactions.begin()?;
                Ok(QueryResult::with_message(format!("Transaction {} started", id)))
            }
            Statement::Commit => {
                self.transactions.commit()?;
                Ok(QueryResult::with_message("Transaction committed successfully"))
            }
            Statement::Rollback => {
                self.transactions.rollback(&mut self.storage)?;
                Ok(QueryResult::with_message("Transaction rolled back successfully"))
            }
        }
    }

    /// Snapshot the catalog and every record file into `backup_dir`
    pub fn backup(&self, backup_dir: impl AsRef<Path>) -> Result<PathBuf> {
        let tables = self.storage.database().table_names();
        backup::create_snapshot(self.storage.catalog_path(), &tables, backup_dir.as_ref())
    }

    /// Restore a snapshot over the current catalog and reload it
    pub fn restore(&mut self, snapshot_dir: impl AsRef<Path>) -> Result<()> {
        if let Some(id) = self.transactions.current_id() {
            return Err(Error::TransactionError(format!(
                "cannot restore while transaction {} is active",
                id
            )));
        }
        backup::restore_snapshot(snapshot_dir.as_ref(), self.storage.catalog_path())?;
        self.storage.reload()
    }

    fn ddl(&mut self) -> DdlExecutor<'_> {
        DdlExecutor::new(&mut self.storage, &mut self.transactions)
    }

    fn dml(&mut self) -> DmlExecutor<'_> {
        DmlExecutor::new(&mut self.storage, &mut self.transactions)
    }
}

/// Permission a statement needs; transaction control needs none
pub fn required_permission(stmt: &Statement) -> Option<Permission> {
    Some(match stmt {
        Statement::CreateTable(_) => Permission::CreateTable,
        Statement::CreateIndex(_) => Permission::CreateIndex,
        Statement::CreateUser(_) => Permission::CreateUser,
        Statement::AlterTable(_) | Statement::RenameTable { .. } => Permission::AlterTable,
        Statement::DropTable(_) => Permission::DropTable,
        Statement::DropUser(_) => Permission::DropUser,
        Statement::Insert(_) => Permission::Insert,
        Statement::Update(_) => Permission::Update,
        Statement::Delete(_) => Permission::Delete,
        Statement::Select(_) => Permission::Select,
        Statement::Grant(_) => Permission::Grant,
        Statement::Revoke(_) => Permission::Revoke,
        Statement::Begin | Statement::Commit | Statement::Rollback => return None,
    })
}

fn permissions(stmt: &PrivilegeStatement) -> Result<Vec<Permission>> {
    stmt.permissions
        .iter()
        .map(|name| Permission::from_name(name))
        .collect()
}

fn statement_kind(stmt: &Statement) -> &'static str {
    match stmt {
        Statement::CreateTable(_) => "CREATE TABLE",
        Statement::CreateIndex(_) => "CREATE INDEX",
        Statement::CreateUser(_) => "CREATE USER",
        Statement::AlterTable(_) => "ALTER TABLE",
        Statement::DropTable(_) => "DROP TABLE",
        Statement::DropUser(_) => "DROP USER",
        Statement::RenameTable { .. } => "RENAME TABLE",
        Statement::Insert(_) => "INSERT",
        Statement::Update(_) => "UPDATE",
        Statement::Delete(_) => "DELETE",
        Statement::Select(_) => "SELECT",
        Statement::Grant(_) => "GRANT",
        Statement::Revoke(_) => "REVOKE",
        Statement::Begin => "BEGIN",
        Statement::Commit => "COMMIT",
        Statement::Rollback => "ROLLBACK",
    }
}
