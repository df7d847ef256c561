//! crates/prof_network_core/src/profile.rs
//!
//! Composes what one user may see of another user's profile.

use std::sync::Arc;

use chrono::NaiveDate;

use crate::connections::ConnectionRequestService;
use crate::domain::{EducationDetail, UserId, WorkExperience};
use crate::error::NetworkResult;
use crate::ports::ProfileDirectory;

/// How the viewer relates to the profile's owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Own,
    Connection,
    Other,
}

#[derive(Debug, Clone)]
pub struct ProfileView {
    pub user_id: UserId,
    pub relation: Relation,
    pub name: Option<String>,
    /// Only shown to the owner.
    pub email: Option<String>,
    /// Shown to the owner and direct connections.
    pub date_of_birth: Option<NaiveDate>,
    pub education: Vec<EducationDetail>,
    pub work_experience: Vec<WorkExperience>,
}

#[derive(Clone)]
pub struct ProfileService {
    directory: Arc<dyn ProfileDirectory>,
    connections: ConnectionRequestService,
}

impl ProfileService {
    pub fn new(directory: Arc<dyn ProfileDirectory>, connections: ConnectionRequestService) -> Self {
        Self {
            directory,
            connections,
        }
    }

    pub async fn view(&self, viewer_id: &str, subject_id: &str) -> NetworkResult<ProfileView> {
        let user = self.directory.get_user(subject_id).await?;

        let relation = if viewer_id == subject_id {
            Relation::Own
        } else if self.connections.are_connected(viewer_id, subject_id).await? {
            Relation::Connection
        } else {
            Relation::Other
        };

        let education = self.directory.list_education(subject_id).await?;
        let work_experience = self.directory.list_work_experience(subject_id).await?;

        Ok(ProfileView {
            user_id: user.user_id,
            relation,
            name: user.name,
            email: (relation == Relation::Own).then_some(user.email),
            date_of_birth: user.date_of_birth.filter(|_| relation != Relation::Other),
            education,
            work_experience,
        })
    }
}
