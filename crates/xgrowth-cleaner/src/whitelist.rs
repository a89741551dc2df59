//! Whitelist guard: resolves operator-supplied identifiers and manages the
//! protected-account registry.

use std::path::Path;

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use xgrowth_core::{AccountIdentifier, AutoWhitelistRule};
use xgrowth_db::{AccountRow, DbError, NewWhitelistEntry, WhitelistRow};
use xgrowth_x::{Gateway, XClient, XError};

use crate::error::CleanerError;

pub const DEFAULT_REASON: &str = "Manual addition";
pub const IMPORT_REASON: &str = "Imported from file";
const SUGGESTION_LIMIT: i64 = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    Added(WhitelistRow),
    /// The identifier is neither a numeric id nor a valid username.
    Invalid,
    /// A well-formed username that neither the store nor the platform knows.
    Unresolved,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveOutcome {
    Removed(WhitelistRow),
    NotMember,
    Invalid,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub added: usize,
    pub invalid: usize,
    pub unresolved: usize,
    pub failed: usize,
}

/// One line or element of an import file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportEntry {
    pub identifier: String,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ResolvedAccount {
    user_id: String,
    username: String,
    display_name: Option<String>,
}

impl From<AccountRow> for ResolvedAccount {
    fn from(row: AccountRow) -> Self {
        Self {
            user_id: row.user_id,
            username: row.username,
            display_name: row.display_name,
        }
    }
}

/// Whitelist operations. Usernames unknown to the store are looked up
/// through the gateway when one is attached.
pub struct WhitelistGuard<'a, G = XClient> {
    pool: &'a PgPool,
    gateway: Option<&'a G>,
}

impl<'a> WhitelistGuard<'a, XClient> {
    /// A guard that resolves identifiers from the store only.
    #[must_use]
    pub fn offline(pool: &'a PgPool) -> Self {
        Self {
            pool,
            gateway: None,
        }
    }
}

impl<'a, G: Gateway> WhitelistGuard<'a, G> {
    #[must_use]
    pub fn new(pool: &'a PgPool, gateway: &'a G) -> Self {
        Self {
            pool,
            gateway: Some(gateway),
        }
    }

    /// Adds (or replaces) the entry for `identifier`.
    ///
    /// # Errors
    ///
    /// Returns [`CleanerError::Db`] on store failures and
    /// [`CleanerError::Gateway`] if a username lookup fails for a reason other
    /// than the user not existing.
    pub async fn add(
        &self,
        identifier: &str,
        reason: Option<&str>,
    ) -> Result<AddOutcome, CleanerError> {
        self.add_as(identifier, reason.unwrap_or(DEFAULT_REASON), "manual")
            .await
    }

    async fn add_as(
        &self,
        identifier: &str,
        reason: &str,
        added_by: &str,
    ) -> Result<AddOutcome, CleanerError> {
        let Some(parsed) = AccountIdentifier::parse(identifier) else {
            tracing::warn!(identifier, "not a user id or username");
            return Ok(AddOutcome::Invalid);
        };
        let Some(account) = self.resolve(&parsed).await? else {
            tracing::warn!(identifier = %parsed, "could not resolve account");
            return Ok(AddOutcome::Unresolved);
        };

        let row = xgrowth_db::add_to_whitelist(
            self.pool,
            &NewWhitelistEntry {
                user_id: &account.user_id,
                username: &account.username,
                display_name: account.display_name.as_deref(),
                reason,
                added_by,
            },
        )
        .await?;
        tracing::info!(user_id = %row.user_id, username = %row.username, reason, "whitelisted");
        Ok(AddOutcome::Added(row))
    }

    /// Removes the entry for `identifier`, restoring the account's real score.
    ///
    /// # Errors
    ///
    /// Returns [`CleanerError::Db`] on store failures.
    pub async fn remove(&self, identifier: &str) -> Result<RemoveOutcome, CleanerError> {
        let Some(parsed) = AccountIdentifier::parse(identifier) else {
            return Ok(RemoveOutcome::Invalid);
        };

        let entry = match &parsed {
            AccountIdentifier::UserId(id) => xgrowth_db::get_whitelist_entry(self.pool, id).await?,
            AccountIdentifier::Username(name) => {
                xgrowth_db::find_whitelist_entry_by_username(self.pool, name).await?
            }
        };
        let Some(entry) = entry else {
            return Ok(RemoveOutcome::NotMember);
        };

        if xgrowth_db::remove_from_whitelist(self.pool, &entry.user_id).await? {
            tracing::info!(user_id = %entry.user_id, username = %entry.username, "removed from whitelist");
            Ok(RemoveOutcome::Removed(entry))
        } else {
            Ok(RemoveOutcome::NotMember)
        }
    }

    /// # Errors
    ///
    /// Returns [`CleanerError::Db`] on store failures.
    pub async fn auto(&self, rule: AutoWhitelistRule) -> Result<u64, CleanerError> {
        let added = xgrowth_db::auto_whitelist(self.pool, rule).await?;
        tracing::info!(?rule, added, "auto-whitelist finished");
        Ok(added)
    }

    /// # Errors
    ///
    /// Returns [`CleanerError::Db`] on store failures.
    pub async fn list(&self) -> Result<Vec<WhitelistRow>, CleanerError> {
        Ok(xgrowth_db::list_whitelist(self.pool).await?)
    }

    /// Up to 20 accounts worth protecting, largest audience first.
    ///
    /// # Errors
    ///
    /// Returns [`CleanerError::Db`] on store failures.
    pub async fn suggest(&self) -> Result<Vec<AccountRow>, CleanerError> {
        Ok(xgrowth_db::suggest_whitelist_candidates(self.pool, SUGGESTION_LIMIT).await?)
    }

    /// Imports identifiers from a JSON array or a plain-text list.
    ///
    /// Per-entry problems are counted in the summary; the import continues.
    ///
    /// # Errors
    ///
    /// Returns [`CleanerError::Io`] if the file cannot be read and
    /// [`CleanerError::InvalidImport`] / [`CleanerError::Json`] if a JSON file
    /// has the wrong shape.
    pub async fn import(&self, path: &Path) -> Result<ImportSummary, CleanerError> {
        let content = tokio::fs::read_to_string(path).await?;
        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let entries = parse_import(&content, is_json)?;

        let mut summary = ImportSummary::default();
        for entry in &entries {
            match self.add_as(&entry.identifier, &entry.reason, "import").await {
                Ok(AddOutcome::Added(_)) => summary.added += 1,
                Ok(AddOutcome::Invalid) => summary.invalid += 1,
                Ok(AddOutcome::Unresolved) => summary.unresolved += 1,
                Err(e) => {
                    tracing::warn!(identifier = %entry.identifier, error = %e, "import entry failed");
                    summary.failed += 1;
                }
            }
        }
        tracing::info!(
            path = %path.display(),
            entries = entries.len(),
            added = summary.added,
            "whitelist import finished"
        );
        Ok(summary)
    }

    /// Writes the whole whitelist to `path` as pretty JSON and returns the
    /// number of entries written.
    ///
    /// # Errors
    ///
    /// Returns [`CleanerError::Db`], [`CleanerError::Json`], or
    /// [`CleanerError::Io`].
    pub async fn export(&self, path: &Path) -> Result<usize, CleanerError> {
        let rows = self.list().await?;
        let json = serde_json::to_string_pretty(&rows)?;
        tokio::fs::write(path, json).await?;
        tracing::info!(path = %path.display(), entries = rows.len(), "whitelist exported");
        Ok(rows.len())
    }

    async fn resolve(
        &self,
        identifier: &AccountIdentifier,
    ) -> Result<Option<ResolvedAccount>, CleanerError> {
        match identifier {
            AccountIdentifier::UserId(id) => match xgrowth_db::get_account(self.pool, id).await {
                Ok(row) => Ok(Some(row.into())),
                // Ids need no lookup; the id stands in for the username
                // until the next sync fills it in.
                Err(DbError::NotFound) => Ok(Some(ResolvedAccount {
                    user_id: id.clone(),
                    username: id.clone(),
                    display_name: None,
                })),
                Err(e) => Err(e.into()),
            },
            AccountIdentifier::Username(name) => {
                if let Some(row) = xgrowth_db::find_account_by_username(self.pool, name).await? {
                    return Ok(Some(row.into()));
                }
                let Some(gateway) = self.gateway else {
                    return Ok(None);
                };
                match gateway.lookup_user(name).await {
                    Ok(user) => Ok(Some(ResolvedAccount {
                        user_id: user.id,
                        username: user.username,
                        display_name: user.name,
                    })),
                    Err(XError::NotFound { .. }) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            }
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum JsonImportItem {
    Handle(String),
    Entry {
        username: Option<String>,
        reason: Option<String>,
    },
}

/// Parses import file content.
///
/// JSON files hold an array of strings or `{ "username", "reason" }` objects.
/// Text files hold one identifier per line; blank lines and lines starting
/// with `#` are skipped.
///
/// # Errors
///
/// Returns [`CleanerError::Json`] for malformed JSON and
/// [`CleanerError::InvalidImport`] when the JSON top level is not an array.
pub fn parse_import(content: &str, is_json: bool) -> Result<Vec<ImportEntry>, CleanerError> {
    if !is_json {
        return Ok(content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(|line| ImportEntry {
                identifier: line.to_string(),
                reason: IMPORT_REASON.to_string(),
            })
            .collect());
    }

    let value: serde_json::Value = serde_json::from_str(content)?;
    if !value.is_array() {
        return Err(CleanerError::InvalidImport(
            "expected a JSON array at the top level".to_string(),
        ));
    }
    let items: Vec<JsonImportItem> = serde_json::from_value(value)?;

    Ok(items
        .into_iter()
        .filter_map(|item| match item {
            JsonImportItem::Handle(handle) => Some((handle, None)),
            JsonImportItem::Entry { username, reason } => username.map(|u| (u, reason)),
        })
        .filter(|(identifier, _)| !identifier.trim().is_empty())
        .map(|(identifier, reason)| ImportEntry {
            identifier: identifier.trim().to_string(),
            reason: reason.unwrap_or_else(|| IMPORT_REASON.to_string()),
        })
        .collect())
}
