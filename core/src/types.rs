//! Core types and identifiers used throughout the system

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{Error, Result};

/// Separator between owner and local name in the wire form of a center id
pub const CENTER_DELIMITER: &str = "____";

/// Publisher identity (the mail address a key is registered under)
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Create an identity, rejecting empty or blank addresses
    pub fn new(mail: impl Into<String>) -> Result<Self> {
        let mail = mail.into();
        if mail.trim().is_empty() {
            return Err(Error::InvalidIdentity("mail address is empty".to_string()));
        }
        Ok(Self(mail))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({})", self.0)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Notification center identifier, qualified by its owner
///
/// The wire form is `owner____name`. Local names are restricted so that
/// [`CenterId::parse`] can always recover the pair: a name is non-empty,
/// never contains the delimiter and never starts with `_`. Under those rules
/// the last delimiter in the wire form is always the one separating owner
/// from name, whatever the owner looks like.
#[derive(Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub struct CenterId {
    owner: Identity,
    name: String,
}

impl CenterId {
    /// Build a center id for `owner`, validating the local name
    pub fn new(owner: Identity, name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        validate_local_name(&name)?;
        Ok(Self { owner, name })
    }

    /// Parse the wire form `owner____name`
    pub fn parse(qualified: &str) -> Option<Self> {
        let split = qualified.rfind(CENTER_DELIMITER)?;
        let owner = Identity::new(&qualified[..split]).ok()?;
        let name = &qualified[split + CENTER_DELIMITER.len()..];
        Self::new(owner, name).ok()
    }

    pub fn owner(&self) -> &Identity {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for CenterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.owner, CENTER_DELIMITER, self.name)
    }
}

fn validate_local_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidCenterName("name is empty".to_string()));
    }
    if name.contains(CENTER_DELIMITER) {
        return Err(Error::InvalidCenterName(format!(
            "{:?} contains the reserved sequence {:?}",
            name, CENTER_DELIMITER
        )));
    }
    if name.starts_with('_') {
        return Err(Error::InvalidCenterName(format!("{:?} starts with '_'", name)));
    }
    Ok(())
}
