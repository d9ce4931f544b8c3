use log::{info, warn};

use crate::error::{Error, Result};
use crate::models::tables::USER_PROFILES;
use crate::models::{NewUserProfile, ProfileUpdate, UserProfile};
use crate::queries::decode_row;
use crate::Backend;

const ENTITY: &str = "profile";

/// Access to `user_profiles`, keyed by the auth user id
pub struct ProfileQueries<'a> {
    backend: &'a Backend,
}

impl<'a> ProfileQueries<'a> {
    pub(crate) fn new(backend: &'a Backend) -> Self {
        Self { backend }
    }

    /// Fetch the profile of `user_id`, creating it with the starting
    /// defaults when it does not exist yet.
    ///
    /// Read and insert are separate round trips. When a concurrent caller
    /// wins the insert, the backend's unique constraint on `user_id`
    /// rejects ours and the winner's row is read back.
    pub async fn get_or_create(&self, user_id: &str, email: &str) -> Result<UserProfile> {
        match self.get(user_id).await {
            Ok(profile) => return Ok(profile),
            Err(Error::NotFound { .. }) => {}
            Err(e) => return Err(e),
        }

        let new_profile = NewUserProfile::with_defaults(user_id, email);
        new_profile.validate()?;

        let inserted = self
            .backend
            .from(USER_PROFILES)
            .await?
            .single()
            .insert(&new_profile)
            .await;

        match inserted {
            Ok(value) => {
                let profile: UserProfile = decode_row(value)?;
                profile.validate()?;
                info!(
                    "created profile for {} with {} credits",
                    user_id, profile.credits_balance
                );
                Ok(profile)
            }
            Err(e) if e.is_unique_violation() => {
                warn!("profile for {} was created concurrently, reading it back", user_id);
                self.get(user_id).await
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn get(&self, user_id: &str) -> Result<UserProfile> {
        let profile = self
            .backend
            .from(USER_PROFILES)
            .await?
            .select("*")
            .eq("user_id", user_id)
            .execute_single::<UserProfile>()
            .await
            .map_err(|e| Error::from_lookup(e, ENTITY, user_id))?;

        profile.validate()?;
        Ok(profile)
    }

    pub async fn update(&self, user_id: &str, changes: &ProfileUpdate) -> Result<UserProfile> {
        changes.validate()?;

        let value = self
            .backend
            .from(USER_PROFILES)
            .await?
            .eq("user_id", user_id)
            .single()
            .update(changes)
            .await
            .map_err(|e| Error::from_lookup(e, ENTITY, user_id))?;

        let profile: UserProfile = decode_row(value)?;
        profile.validate()?;
        Ok(profile)
    }
}
