use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::alias::AliasGenerator;
use crate::validate::{
    is_blocked_host, is_valid_long_url, long_match_fragment, validate_custom_short,
};
use crate::{Authenticator, Clock, CoreError, Credentials, Mapping, ShortenerConfig, UrlStore};

/// How a successful submission was satisfied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitStatus {
    Created,
    PreExisting,
}

/// Result of a successful submission.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Submission {
    pub status: SubmitStatus,
    pub short: String,
}

impl Submission {
    fn created(short: String) -> Self {
        Self {
            status: SubmitStatus::Created,
            short,
        }
    }

    fn pre_existing(short: String) -> Self {
        Self {
            status: SubmitStatus::PreExisting,
            short,
        }
    }
}

/// Orientation of an admin listing.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ListView {
    /// short -> long
    Short,
    /// long -> short; several shorts for one long collapse to the last one.
    Long,
}

/// A parsed admin API command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AdminCommand {
    List(ListView),
    Delete {
        short: Option<String>,
        long: Option<String>,
    },
}

impl AdminCommand {
    /// Parse the wire command name (`list`, `listshort`, `listlong`, `delete`).
    pub fn parse(
        kind: &str,
        short: Option<String>,
        long: Option<String>,
    ) -> Result<Self, CoreError> {
        match kind {
            "list" | "listshort" => Ok(AdminCommand::List(ListView::Short)),
            "listlong" => Ok(AdminCommand::List(ListView::Long)),
            "delete" => Ok(AdminCommand::Delete { short, long }),
            other => Err(CoreError::UnknownCommand(other.to_string())),
        }
    }
}

/// Result of an admin command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AdminOutcome {
    Listing(BTreeMap<String, String>),
    Deleted(usize),
}

/// Orchestrates submission, resolution and admin operations over a store.
///
/// Stateless between calls apart from the store; uniqueness of aliases is
/// ultimately enforced by the store's key constraint.
pub struct ShortenerService<S: UrlStore, A: Authenticator, C: Clock> {
    store: S,
    auth: A,
    clock: C,
    config: ShortenerConfig,
    generator: AliasGenerator,
}

impl<S: UrlStore, A: Authenticator, C: Clock> ShortenerService<S, A, C> {
    pub fn new(store: S, auth: A, clock: C, config: ShortenerConfig) -> Self {
        let generator = AliasGenerator::new(&config.allowed_chars, config.random_length);
        Self {
            store,
            auth,
            clock,
            config,
            generator,
        }
    }

    pub fn config(&self) -> &ShortenerConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Absolute short link for an alias.
    pub fn short_url(&self, short: &str) -> String {
        self.config.short_url(short)
    }

    /// Create a mapping for `long`, or find the one that already satisfies
    /// the request. An empty custom short counts as absent.
    pub fn submit(&self, long: &str, custom_short: Option<&str>) -> Result<Submission, CoreError> {
        self.submit_with_base(long, custom_short, self.config.base_host())
    }

    /// [`submit`](Self::submit) with the self-link check made against
    /// `base_host`, the host this request was actually served on.
    pub fn submit_with_base(
        &self,
        long: &str,
        custom_short: Option<&str>,
        base_host: &str,
    ) -> Result<Submission, CoreError> {
        if !is_valid_long_url(long) {
            debug!(long, "rejecting invalid long url");
            return Err(CoreError::InvalidLongUrl);
        }
        let custom = custom_short.filter(|s| !s.is_empty());

        let short = match custom {
            Some(custom) => {
                validate_custom_short(custom, &self.config)?;
                match self.store.find_by_short(custom)? {
                    Some(existing) if existing.long == long => {
                        info!(short = custom, "custom short already maps to this url");
                        return Ok(Submission::pre_existing(custom.to_string()));
                    }
                    Some(_) => {
                        debug!(short = custom, "custom short taken");
                        return Err(CoreError::ShortTaken);
                    }
                    None => custom.to_string(),
                }
            }
            None => self.generate_short()?,
        };

        // A concurrent writer may have claimed it since.
        if self.store.find_by_short(&short)?.is_some() {
            return Err(CoreError::ShortTaken);
        }

        if is_blocked_host(
            long,
            &self.config.blocklist,
            self.config.selflinks,
            base_host,
        ) {
            debug!(long, "rejecting blocked host");
            return Err(CoreError::LinkBlocked);
        }

        if custom.is_none() {
            if let Some(existing) = self.find_random_alias(long)? {
                self.advance_latest(long);
                info!(short = %existing, "reusing random alias");
                return Ok(Submission::pre_existing(existing));
            }
        }

        match self.store.insert(&Mapping::new(short.as_str(), long)) {
            Ok(()) => {}
            Err(CoreError::DuplicateKey) => {
                debug!(short = %short, "lost insert race");
                return Err(CoreError::ShortTaken);
            }
            Err(e) => return Err(e),
        }
        self.advance_latest(long);
        info!(short = %short, "created mapping");
        Ok(Submission::created(short))
    }

    /// Resolve a short alias to its long URL.
    pub fn resolve(&self, short: &str) -> Result<String, CoreError> {
        match self.store.find_by_short(short)? {
            Some(mapping) => Ok(mapping.long),
            None => Err(CoreError::NotFound),
        }
    }

    /// Authenticated listing in either orientation.
    pub fn admin_list(
        &self,
        view: ListView,
        credentials: &Credentials,
    ) -> Result<BTreeMap<String, String>, CoreError> {
        self.authorize(credentials)?;
        self.listing(view)
    }

    /// Authenticated delete by exact short and/or long-URL substring.
    pub fn admin_delete(
        &self,
        short: Option<&str>,
        long: Option<&str>,
        credentials: &Credentials,
    ) -> Result<usize, CoreError> {
        self.authorize(credentials)?;
        self.delete(short, long)
    }

    /// Dispatch a wire-level admin command. Authentication happens before the
    /// command name is even looked at.
    pub fn admin_command(
        &self,
        kind: &str,
        short: Option<String>,
        long: Option<String>,
        credentials: &Credentials,
    ) -> Result<AdminOutcome, CoreError> {
        self.authorize(credentials)?;
        match AdminCommand::parse(kind, short, long)? {
            AdminCommand::List(view) => self.listing(view).map(AdminOutcome::Listing),
            AdminCommand::Delete { short, long } => self
                .delete(short.as_deref(), long.as_deref())
                .map(AdminOutcome::Deleted),
        }
    }

    fn authorize(&self, credentials: &Credentials) -> Result<(), CoreError> {
        if self
            .auth
            .authenticate(&credentials.username, &credentials.password)
        {
            Ok(())
        } else {
            warn!(username = %credentials.username, "admin authentication failed");
            Err(CoreError::Unauthorized)
        }
    }

    fn listing(&self, view: ListView) -> Result<BTreeMap<String, String>, CoreError> {
        let rows = self.store.list_all()?;
        Ok(match view {
            ListView::Short => rows.into_iter().map(|m| (m.short, m.long)).collect(),
            ListView::Long => rows.into_iter().map(|m| (m.long, m.short)).collect(),
        })
    }

    fn delete(&self, short: Option<&str>, long: Option<&str>) -> Result<usize, CoreError> {
        if short.is_none() && long.is_none() {
            return Err(CoreError::MissingArgs);
        }
        let mut deleted = 0;
        if let Some(short) = short {
            deleted += self.store.delete(short)?;
        }
        if let Some(long) = long {
            let fragment = long_match_fragment(long);
            // An empty fragment would match every row.
            if !fragment.is_empty() {
                deleted += self.store.delete_matching(fragment)?;
            }
        }
        if deleted == 0 {
            return Err(CoreError::NotFound);
        }
        info!(deleted, "admin delete");
        Ok(deleted)
    }

    fn generate_short(&self) -> Result<String, CoreError> {
        let deadline = self.clock.now() + self.config.random_gen_timeout;
        let mut rng = rand::thread_rng();
        self.generator
            .generate(
                &self.clock,
                deadline,
                &mut rng,
                self.config.latest.as_deref(),
                |candidate| Ok(self.store.find_by_short(candidate)?.is_some()),
            )
            .inspect_err(|e| {
                if matches!(e, CoreError::GenerationTimeout) {
                    warn!(
                        timeout = ?self.config.random_gen_timeout,
                        "no free random alias before deadline"
                    );
                }
            })
    }

    /// A previously generated alias for exactly this long URL, recognised by
    /// having the configured random length.
    fn find_random_alias(&self, long: &str) -> Result<Option<String>, CoreError> {
        Ok(self
            .store
            .find_by_long(long)?
            .into_iter()
            .find(|m| {
                m.short.chars().count() == self.config.random_length
                    && !self.config.is_latest(&m.short)
            })
            .map(|m| m.short))
    }

    /// The mapping is already stored when this runs, so a failed pointer
    /// write is logged and does not fail the submission.
    fn advance_latest(&self, long: &str) {
        if let Err(e) = self.set_latest(long) {
            warn!(err = %e, "failed to update latest alias");
        }
    }

    /// Point the latest alias at `long`, creating it on first use.
    fn set_latest(&self, long: &str) -> Result<(), CoreError> {
        let Some(latest) = self.config.latest.as_deref() else {
            return Ok(());
        };
        if self.store.find_by_short(latest)?.is_some() {
            return self.store.update(latest, long);
        }
        match self.store.insert(&Mapping::new(latest, long)) {
            Err(CoreError::DuplicateKey) => self.store.update(latest, long),
            other => other,
        }
    }
}
