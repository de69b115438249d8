//! Boundary check for mutating operations.
//!
//! Deciding who may do what belongs to the surrounding system. The content
//! services only ask an [`AccessPolicy`] before they change anything and turn
//! a refusal into [`CoreError::Forbidden`].

use crate::error::CoreError;
use crate::types::DbId;

/// Capabilities the content services ask about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    CreatePage,
    EditPage,
    PublishPage,
    RemovePage,
    ManageUrls,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreatePage => "pages.create",
            Self::EditPage => "pages.edit",
            Self::PublishPage => "pages.publish",
            Self::RemovePage => "pages.remove",
            Self::ManageUrls => "urls.manage",
        }
    }
}

pub trait AccessPolicy: Send + Sync {
    fn allows(&self, actor_id: DbId, capability: Capability) -> bool;
}

/// Grants everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl AccessPolicy for AllowAll {
    fn allows(&self, _actor_id: DbId, _capability: Capability) -> bool {
        true
    }
}

/// `Ok(())` if `policy` grants `capability` to `actor_id`.
pub fn require(
    policy: &dyn AccessPolicy,
    actor_id: DbId,
    capability: Capability,
) -> Result<(), CoreError> {
    if policy.allows(actor_id, capability) {
        Ok(())
    } else {
        Err(CoreError::Forbidden(format!(
            "user #{actor_id} lacks {}",
            capability.as_str()
        )))
    }
}
