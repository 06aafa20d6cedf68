use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Lifetime of an invitation before it can no longer be accepted
pub const INVITATION_TTL_DAYS: i64 = 7;

/// Every issued API key secret starts with this
pub const API_KEY_PREFIX: &str = "oak_";

#[derive(Debug, Error, PartialEq)]
pub enum DirectoryError {
    #[error("Organization not found")]
    OrganizationNotFound,

    #[error("Slug '{0}' is already taken")]
    SlugTaken(String),

    #[error("You are not a member of this organization")]
    NotAMember,

    #[error("Only organization {0} can perform this action")]
    InsufficientRole(&'static str),

    #[error("User is already a member of this organization")]
    AlreadyMember,

    #[error("Member not found")]
    MemberNotFound,

    #[error("The organization owner cannot be removed or demoted")]
    OwnerProtected,

    #[error("Invitation not found")]
    InvitationNotFound,

    #[error("Invitation is already {0}")]
    InvitationClosed(&'static str),

    #[error("Invitation has expired")]
    InvitationExpired,

    #[error("Invitation was sent to a different email address")]
    InvitationEmailMismatch,

    #[error("A pending invitation already exists for {0}")]
    InvitationExists(String),

    #[error("API key not found")]
    ApiKeyNotFound,

    #[error("API key is already revoked")]
    ApiKeyRevoked,

    #[error("{0}")]
    Invalid(String),
}

impl DirectoryError {
    pub fn status_code(&self) -> u16 {
        match self {
            DirectoryError::OrganizationNotFound
            | DirectoryError::MemberNotFound
            | DirectoryError::InvitationNotFound
            | DirectoryError::ApiKeyNotFound => 404,
            DirectoryError::SlugTaken(_)
            | DirectoryError::AlreadyMember
            | DirectoryError::InvitationClosed(_)
            | DirectoryError::InvitationExists(_)
            | DirectoryError::ApiKeyRevoked => 409,
            DirectoryError::NotAMember
            | DirectoryError::InsufficientRole(_)
            | DirectoryError::InvitationEmailMismatch => 403,
            DirectoryError::OwnerProtected
            | DirectoryError::InvitationExpired
            | DirectoryError::Invalid(_) => 400,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberRole {
    Member,
    Admin,
    Owner,
}

impl MemberRole {
    /// Owners and admins manage the organization
    pub fn can_manage(&self) -> bool {
        matches!(self, MemberRole::Owner | MemberRole::Admin)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Organization {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub created_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    pub organization_id: String,
    pub user_id: Uuid,
    pub role: MemberRole,
    pub joined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationSummary {
    #[serde(flatten)]
    pub organization: Organization,
    pub role: MemberRole,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationDetail {
    #[serde(flatten)]
    pub organization: Organization,
    pub members: Vec<Membership>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Invitation {
    pub id: String,
    pub organization_id: String,
    pub email: String,
    pub role: MemberRole,
    pub status: InvitationStatus,
    pub invited_by: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKey {
    pub id: String,
    pub name: String,
    pub owner_id: Uuid,
    pub prefix: String,
    #[serde(skip)]
    pub digest: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
}

/// A freshly created key; the secret is shown exactly once
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedApiKey {
    #[serde(flatten)]
    pub key: ApiKey,
    pub secret: String,
}

#[derive(Default)]
struct DirectoryState {
    organizations: HashMap<String, Organization>,
    memberships: HashMap<String, Vec<Membership>>,
    invitations: HashMap<String, Invitation>,
    api_keys: HashMap<String, ApiKey>,
}

impl DirectoryState {
    fn organization(&self, org_id: &str) -> Result<&Organization, DirectoryError> {
        self.organizations
            .get(org_id)
            .ok_or(DirectoryError::OrganizationNotFound)
    }

    fn role_of(&self, org_id: &str, user_id: Uuid) -> Option<MemberRole> {
        self.memberships
            .get(org_id)
            .and_then(|members| members.iter().find(|m| m.user_id == user_id))
            .map(|m| m.role)
    }

    fn require_manager(&self, org_id: &str, actor_id: Uuid) -> Result<MemberRole, DirectoryError> {
        self.organization(org_id)?;
        let role = self.role_of(org_id, actor_id).ok_or(DirectoryError::NotAMember)?;
        if !role.can_manage() {
            return Err(DirectoryError::InsufficientRole("owners and admins"));
        }
        Ok(role)
    }

    fn slug_in_use(&self, slug: &str, except: Option<&str>) -> bool {
        self.organizations
            .values()
            .any(|o| o.slug == slug && Some(o.id.as_str()) != except)
    }
}

fn prefixed_id(prefix: &str) -> String {
    format!("{}_{}", prefix, Uuid::new_v4().simple())
}

fn digest(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Slugs are lowercase ASCII letters, digits and hyphens, 2 to 48 characters
pub fn is_valid_slug(slug: &str) -> bool {
    (2..=48).contains(&slug.len())
        && slug.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        && !slug.starts_with('-')
        && !slug.ends_with('-')
}

/// Organizations, memberships, invitations and API keys
#[derive(Clone, Default)]
pub struct Directory {
    state: Arc<RwLock<DirectoryState>>,
}

impl Directory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create_organization(
        &self,
        actor_id: Uuid,
        name: &str,
        slug: &str,
    ) -> Result<Organization, DirectoryError> {
        if !is_valid_slug(slug) {
            return Err(DirectoryError::Invalid(format!("Invalid slug '{}'", slug)));
        }

        let mut state = self.state.write().await;
        if state.slug_in_use(slug, None) {
            return Err(DirectoryError::SlugTaken(slug.to_string()));
        }

        let now = Utc::now();
        let organization = Organization {
            id: prefixed_id("org"),
            name: name.trim().to_string(),
            slug: slug.to_string(),
            created_by: actor_id,
            created_at: now,
            updated_at: now,
        };

        state.memberships.insert(
            organization.id.clone(),
            vec![Membership {
                organization_id: organization.id.clone(),
                user_id: actor_id,
                role: MemberRole::Owner,
                joined_at: now,
            }],
        );
        state.organizations.insert(organization.id.clone(), organization.clone());
        Ok(organization)
    }

    pub async fn update_organization(
        &self,
        actor_id: Uuid,
        org_id: &str,
        name: Option<&str>,
        slug: Option<&str>,
    ) -> Result<Organization, DirectoryError> {
        let mut state = self.state.write().await;
        state.require_manager(org_id, actor_id)?;

        if let Some(slug) = slug {
            if !is_valid_slug(slug) {
                return Err(DirectoryError::Invalid(format!("Invalid slug '{}'", slug)));
            }
            if state.slug_in_use(slug, Some(org_id)) {
                return Err(DirectoryError::SlugTaken(slug.to_string()));
            }
        }

        let organization = state
            .organizations
            .get_mut(org_id)
            .ok_or(DirectoryError::OrganizationNotFound)?;
        if let Some(name) = name {
            organization.name = name.trim().to_string();
        }
        if let Some(slug) = slug {
            organization.slug = slug.to_string();
        }
        organization.updated_at = Utc::now();
        Ok(organization.clone())
    }

    /// Remove an organization with its memberships and invitations. Owner only.
    pub async fn delete_organization(&self, actor_id: Uuid, org_id: &str) -> Result<Organization, DirectoryError> {
        let mut state = self.state.write().await;
        state.organization(org_id)?;
        match state.role_of(org_id, actor_id) {
            Some(MemberRole::Owner) => {}
            Some(_) => return Err(DirectoryError::InsufficientRole("owners")),
            None => return Err(DirectoryError::NotAMember),
        }

        state.memberships.remove(org_id);
        state.invitations.retain(|_, inv| inv.organization_id != org_id);
        state
            .organizations
            .remove(org_id)
            .ok_or(DirectoryError::OrganizationNotFound)
    }

    /// Organization with its members, visible to members only
    pub async fn organization_detail(&self, actor_id: Uuid, org_id: &str) -> Result<OrganizationDetail, DirectoryError> {
        let state = self.state.read().await;
        let organization = state.organization(org_id)?.clone();
        state.role_of(org_id, actor_id).ok_or(DirectoryError::NotAMember)?;

        Ok(OrganizationDetail {
            organization,
            members: state.memberships.get(org_id).cloned().unwrap_or_default(),
        })
    }

    pub async fn organizations_for(&self, user_id: Uuid) -> Vec<OrganizationSummary> {
        let state = self.state.read().await;
        let mut summaries: Vec<OrganizationSummary> = state
            .organizations
            .values()
            .filter_map(|org| {
                state.role_of(&org.id, user_id).map(|role| OrganizationSummary {
                    organization: org.clone(),
                    role,
                })
            })
            .collect();
        summaries.sort_by(|a, b| a.organization.created_at.cmp(&b.organization.created_at));
        summaries
    }

    pub async fn add_member(
        &self,
        actor_id: Uuid,
        org_id: &str,
        user_id: Uuid,
        role: MemberRole,
    ) -> Result<Membership, DirectoryError> {
        if role == MemberRole::Owner {
            return Err(DirectoryError::Invalid("Members cannot be added as owner".into()));
        }

        let mut state = self.state.write().await;
        state.require_manager(org_id, actor_id)?;
        if state.role_of(org_id, user_id).is_some() {
            return Err(DirectoryError::AlreadyMember);
        }

        let membership = Membership {
            organization_id: org_id.to_string(),
            user_id,
            role,
            joined_at: Utc::now(),
        };
        state
            .memberships
            .entry(org_id.to_string())
            .or_default()
            .push(membership.clone());
        Ok(membership)
    }

    pub async fn update_member_role(
        &self,
        actor_id: Uuid,
        org_id: &str,
        user_id: Uuid,
        role: MemberRole,
    ) -> Result<Membership, DirectoryError> {
        if role == MemberRole::Owner {
            return Err(DirectoryError::Invalid("Ownership cannot be assigned through a role change".into()));
        }

        let mut state = self.state.write().await;
        state.require_manager(org_id, actor_id)?;

        let member = state
            .memberships
            .get_mut(org_id)
            .and_then(|members| members.iter_mut().find(|m| m.user_id == user_id))
            .ok_or(DirectoryError::MemberNotFound)?;
        if member.role == MemberRole::Owner {
            return Err(DirectoryError::OwnerProtected);
        }

        member.role = role;
        Ok(member.clone())
    }

    /// Managers remove others; any non-owner member may remove themselves
    pub async fn remove_member(&self, actor_id: Uuid, org_id: &str, user_id: Uuid) -> Result<Membership, DirectoryError> {
        let mut state = self.state.write().await;
        if actor_id != user_id {
            state.require_manager(org_id, actor_id)?;
        } else {
            state.organization(org_id)?;
        }

        let members = state
            .memberships
            .get_mut(org_id)
            .ok_or(DirectoryError::MemberNotFound)?;
        let index = members
            .iter()
            .position(|m| m.user_id == user_id)
            .ok_or(DirectoryError::MemberNotFound)?;
        if members[index].role == MemberRole::Owner {
            return Err(DirectoryError::OwnerProtected);
        }
        Ok(members.remove(index))
    }

    pub async fn create_invitation(
        &self,
        actor_id: Uuid,
        org_id: &str,
        email: &str,
        role: MemberRole,
    ) -> Result<Invitation, DirectoryError> {
        if role == MemberRole::Owner {
            return Err(DirectoryError::Invalid("Invitations cannot grant ownership".into()));
        }

        let email = email.trim().to_lowercase();
        let now = Utc::now();
        let mut state = self.state.write().await;
        state.require_manager(org_id, actor_id)?;

        let duplicate = state.invitations.values().any(|inv| {
            inv.organization_id == org_id
                && inv.email == email
                && inv.status == InvitationStatus::Pending
                && inv.expires_at > now
        });
        if duplicate {
            return Err(DirectoryError::InvitationExists(email));
        }

        let invitation = Invitation {
            id: prefixed_id("inv"),
            organization_id: org_id.to_string(),
            email,
            role,
            status: InvitationStatus::Pending,
            invited_by: actor_id,
            created_at: now,
            expires_at: now + Duration::days(INVITATION_TTL_DAYS),
        };
        state.invitations.insert(invitation.id.clone(), invitation.clone());
        Ok(invitation)
    }

    pub async fn accept_invitation(
        &self,
        user_id: Uuid,
        user_email: &str,
        invitation_id: &str,
    ) -> Result<Membership, DirectoryError> {
        let now = Utc::now();
        let mut state = self.state.write().await;

        let invitation = state
            .invitations
            .get(invitation_id)
            .cloned()
            .ok_or(DirectoryError::InvitationNotFound)?;
        match invitation.status {
            InvitationStatus::Accepted => return Err(DirectoryError::InvitationClosed("accepted")),
            InvitationStatus::Cancelled => return Err(DirectoryError::InvitationClosed("cancelled")),
            InvitationStatus::Pending => {}
        }
        if invitation.expires_at <= now {
            return Err(DirectoryError::InvitationExpired);
        }
        if !invitation.email.eq_ignore_ascii_case(user_email.trim()) {
            return Err(DirectoryError::InvitationEmailMismatch);
        }
        state.organization(&invitation.organization_id)?;
        if state.role_of(&invitation.organization_id, user_id).is_some() {
            return Err(DirectoryError::AlreadyMember);
        }

        let membership = Membership {
            organization_id: invitation.organization_id.clone(),
            user_id,
            role: invitation.role,
            joined_at: now,
        };
        state
            .memberships
            .entry(invitation.organization_id.clone())
            .or_default()
            .push(membership.clone());
        if let Some(stored) = state.invitations.get_mut(invitation_id) {
            stored.status = InvitationStatus::Accepted;
        }
        Ok(membership)
    }

    pub async fn cancel_invitation(
        &self,
        actor_id: Uuid,
        org_id: &str,
        invitation_id: &str,
    ) -> Result<Invitation, DirectoryError> {
        let mut state = self.state.write().await;
        state.require_manager(org_id, actor_id)?;

        let invitation = state
            .invitations
            .get_mut(invitation_id)
            .filter(|inv| inv.organization_id == org_id)
            .ok_or(DirectoryError::InvitationNotFound)?;
        match invitation.status {
            InvitationStatus::Accepted => return Err(DirectoryError::InvitationClosed("accepted")),
            InvitationStatus::Cancelled => return Err(DirectoryError::InvitationClosed("cancelled")),
            InvitationStatus::Pending => {}
        }

        invitation.status = InvitationStatus::Cancelled;
        Ok(invitation.clone())
    }

    pub async fn invitations_for(&self, org_id: &str) -> Vec<Invitation> {
        let state = self.state.read().await;
        let mut invitations: Vec<Invitation> = state
            .invitations
            .values()
            .filter(|inv| inv.organization_id == org_id)
            .cloned()
            .collect();
        invitations.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        invitations
    }

    pub async fn create_api_key(
        &self,
        owner_id: Uuid,
        name: &str,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<IssuedApiKey, DirectoryError> {
        let secret = format!("{}{}{}", API_KEY_PREFIX, Uuid::new_v4().simple(), Uuid::new_v4().simple());
        let key = ApiKey {
            id: prefixed_id("key"),
            name: name.trim().to_string(),
            owner_id,
            prefix: secret[..12].to_string(),
            digest: digest(&secret),
            created_at: Utc::now(),
            expires_at,
            revoked_at: None,
        };

        let mut state = self.state.write().await;
        state.api_keys.insert(key.id.clone(), key.clone());
        Ok(IssuedApiKey { key, secret })
    }

    /// Keys are only visible to their owner; anything else reads as not found
    pub async fn revoke_api_key(&self, owner_id: Uuid, key_id: &str) -> Result<ApiKey, DirectoryError> {
        let mut state = self.state.write().await;
        let key = state
            .api_keys
            .get_mut(key_id)
            .filter(|k| k.owner_id == owner_id)
            .ok_or(DirectoryError::ApiKeyNotFound)?;
        if key.revoked_at.is_some() {
            return Err(DirectoryError::ApiKeyRevoked);
        }

        key.revoked_at = Some(Utc::now());
        Ok(key.clone())
    }

    pub async fn api_keys_for(&self, owner_id: Uuid) -> Vec<ApiKey> {
        let state = self.state.read().await;
        let mut keys: Vec<ApiKey> = state
            .api_keys
            .values()
            .filter(|k| k.owner_id == owner_id)
            .cloned()
            .collect();
        keys.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        keys
    }

    /// Resolve a presented secret to a live key
    pub async fn verify_api_key(&self, secret: &str) -> Option<ApiKey> {
        let wanted = digest(secret);
        let now = Utc::now();
        let state = self.state.read().await;
        state
            .api_keys
            .values()
            .find(|k| k.digest == wanted)
            .filter(|k| k.revoked_at.is_none() && k.expires_at.map_or(true, |exp| exp > now))
            .cloned()
    }
}
