//! Users and permissions
//!
//! The engine consults a [`PermissionGate`] before running a statement.
//! [`UserStore`] is the default gate: users with plain permission sets,
//! persisted as JSON next to the catalog.

use crate::error::{Error, Result};
use crate::storage::record_path_for;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Statement permissions
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Permission {
    CreateTable,
    CreateIndex,
    CreateUser,
    AlterTable,
    DropTable,
    DropUser,
    Insert,
    Update,
    Delete,
    Select,
    Grant,
    Revoke,
    /// Implies every other permission
    All,
}

impl Permission {
    pub const VALUES: [Permission; 13] = [
        Permission::CreateTable,
        Permission::CreateIndex,
        Permission::CreateUser,
        Permission::AlterTable,
        Permission::DropTable,
        Permission::DropUser,
        Permission::Insert,
        Permission::Update,
        Permission::Delete,
        Permission::Select,
        Permission::Grant,
        Permission::Revoke,
        Permission::All,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Permission::CreateTable => "CREATE_TABLE",
            Permission::CreateIndex => "CREATE_INDEX",
            Permission::CreateUser => "CREATE_USER",
            Permission::AlterTable => "ALTER_TABLE",
            Permission::DropTable => "DROP_TABLE",
            Permission::DropUser => "DROP_USER",
            Permission::Insert => "INSERT",
            Permission::Update => "UPDATE",
            Permission::Delete => "DELETE",
            Permission::Select => "SELECT",
            Permission::Grant => "GRANT",
            Permission::Revoke => "REVOKE",
            Permission::All => "ALL",
        }
    }

    /// Parse a permission name, case-insensitively
    pub fn from_name(name: &str) -> Result<Permission> {
        Self::VALUES
            .iter()
            .copied()
            .find(|p| p.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| Error::ValidationError(format!("unknown permission '{}'", name)))
    }

    /// Granted without anyone logged in
    pub fn is_bootstrap(&self) -> bool {
        matches!(
            self,
            Permission::CreateUser | Permission::Grant | Permission::Revoke
        )
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Credential store and permission predicate used by the engine
pub trait PermissionGate {
    /// Name of the logged-in user
    fn current_user(&self) -> Option<&str>;

    /// True if `user` holds `permission` or ALL
    fn has_permission(&self, user: &str, permission: Permission) -> bool;

    fn login(&mut self, username: &str, password: &str) -> Result<()>;

    fn logout(&mut self);

    fn create_user(&mut self, username: &str, password: &str) -> Result<()>;

    fn drop_user(&mut self, username: &str) -> Result<()>;

    fn grant(&mut self, username: &str, permissions: &[Permission]) -> Result<()>;

    fn revoke(&mut self, username: &str, permissions: &[Permission]) -> Result<()>;

    /// Allow a statement needing `permission`. The logged-in user must
    /// hold it; CREATE USER, GRANT and REVOKE also pass when nobody is
    /// logged in.
    fn check(&self, permission: Permission) -> Result<()> {
        match self.current_user() {
            None if permission.is_bootstrap() => Ok(()),
            None => {
                warn!(%permission, "permission check without a logged-in user");
                Err(Error::PermissionDenied(format!(
                    "login required for {}",
                    permission
                )))
            }
            Some(user) if self.has_permission(user, permission) => Ok(()),
            Some(user) => {
                warn!(user, %permission, "permission denied");
                Err(Error::PermissionDenied(format!(
                    "user '{}' lacks {} permission",
                    user, permission
                )))
            }
        }
    }
}

/// A gate that allows everything, for embedding and tests
#[derive(Debug, Default)]
pub struct AllowAll {
    current: Option<String>,
}

impl PermissionGate for AllowAll {
    fn current_user(&self) -> Option<&str> {
        self.current.as_deref()
    }

    fn has_permission(&self, _user: &str, _permission: Permission) -> bool {
        true
    }

    fn login(&mut self, username: &str, _password: &str) -> Result<()> {
        self.current = Some(username.to_string());
        Ok(())
    }

    fn logout(&mut self) {
        self.current = None;
    }

    fn create_user(&mut self, _username: &str, _password: &str) -> Result<()> {
        Ok(())
    }

    fn drop_user(&mut self, _username: &str) -> Result<()> {
        Ok(())
    }

    fn grant(&mut self, _username: &str, _permissions: &[Permission]) -> Result<()> {
        Ok(())
    }

    fn revoke(&mut self, _username: &str, _permissions: &[Permission]) -> Result<()> {
        Ok(())
    }

    fn check(&self, _permission: Permission) -> Result<()> {
        Ok(())
    }
}

/// A stored user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub username: String,
    pub password: String,
    pub permissions: BTreeSet<Permission>,
}

impl User {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            permissions: BTreeSet::new(),
        }
    }

    pub fn has_permission(&self, permission: Permission) -> bool {
        self.permissions.contains(&permission) || self.permissions.contains(&Permission::All)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct UsersFile {
    users: Vec<User>,
}

/// JSON-backed user store
#[derive(Debug)]
pub struct UserStore {
    path: PathBuf,
    /// Keyed by lower-cased user name
    users: BTreeMap<String, User>,
    current: Option<String>,
}

impl UserStore {
    /// Load users from `path`. A missing or unreadable file is replaced by
    /// one holding only `admin`/`admin` with ALL.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut store = Self {
            path,
            users: BTreeMap::new(),
            current: None,
        };

        match fs::read_to_string(&store.path) {
            Ok(content) => match serde_json::from_str::<UsersFile>(&content) {
                Ok(file) => {
                    store.users = file
                        .users
                        .into_iter()
                        .map(|u| (u.username.to_lowercase(), u))
                        .collect();
                    return Ok(store);
                }
                Err(e) => {
                    warn!(path = %store.path.display(), error = %e, "user file unreadable, reseeding");
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                warn!(path = %store.path.display(), error = %e, "user file unreadable, reseeding");
            }
        }

        store.seed_admin()?;
        Ok(store)
    }

    fn seed_admin(&mut self) -> Result<()> {
        let mut admin = User::new("admin", "admin");
        admin.permissions.insert(Permission::All);
        self.users.clear();
        self.users.insert("admin".to_string(), admin);
        info!(path = %self.path.display(), "seeded default admin user");
        self.save()
    }

    /// Path of the JSON file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Look up a user by name
    pub fn user(&self, username: &str) -> Option<&User> {
        self.users.get(&username.to_lowercase())
    }

    /// All users ordered by name
    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    fn user_mut(&mut self, username: &str) -> Result<&mut User> {
        self.users
            .get_mut(&username.to_lowercase())
            .ok_or_else(|| Error::UserNotFound(username.to_string()))
    }

    fn save(&self) -> Result<()> {
        let file = UsersFile {
            users: self.users.values().cloned().collect(),
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| Error::StorageError(format!("cannot encode users: {}", e)))?;
        fs::write(&self.path, json)?;
        Ok(())
    }
}

impl PermissionGate for UserStore {
    fn current_user(&self) -> Option<&str> {
        self.current
            .as_deref()
            .and_then(|name| self.user(name))
            .map(|u| u.username.as_str())
    }

    fn has_permission(&self, user: &str, permission: Permission) -> bool {
        self.user(user)
            .map(|u| u.has_permission(permission))
            .unwrap_or(false)
    }

    fn login(&mut self, username: &str, password: &str) -> Result<()> {
        match self.user(username) {
            Some(user) if user.password == password => {
                self.current = Some(user.username.clone());
                info!(user = %username, "logged in");
                Ok(())
            }
            _ => {
                warn!(user = %username, "login failed");
                Err(Error::InvalidCredentials(username.to_string()))
            }
        }
    }

    fn logout(&mut self) {
        if let Some(user) = self.current.take() {
            info!(%user, "logged out");
        }
    }

    fn create_user(&mut self, username: &str, password: &str) -> Result<()> {
        crate::catalog::validate::check_identifier(username)?;
        let key = username.to_lowercase();
        if self.users.contains_key(&key) {
            return Err(Error::UserAlreadyExists(username.to_string()));
        }
        self.users.insert(key, User::new(username, password));
        self.save()
    }

    fn drop_user(&mut self, username: &str) -> Result<()> {
        let key = username.to_lowercase();
        if self.users.remove(&key).is_none() {
            return Err(Error::UserNotFound(username.to_string()));
        }
        if self
            .current
            .as_deref()
            .is_some_and(|c| c.eq_ignore_ascii_case(username))
        {
            self.current = None;
        }
        self.save()
    }

    fn grant(&mut self, username: &str, permissions: &[Permission]) -> Result<()> {
        let user = self.user_mut(username)?;
        user.permissions.extend(permissions.iter().copied());
        self.save()
    }

    fn revoke(&mut self, username: &str, permissions: &[Permission]) -> Result<()> {
        let user = self.user_mut(username)?;
        for permission in permissions {
            user.permissions.remove(permission);
        }
        self.save()
    }
}

/// `<dir>/<base>_users.json` for a catalog at `<dir>/<base>.dbf`
pub fn default_users_path(catalog_path: &Path) -> PathBuf {
    record_path_for(catalog_path, "users").with_extension("json")
}
