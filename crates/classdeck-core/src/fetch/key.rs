//! Logical operations and their resource keys.
//!
//! Both sides of the mapping are closed enums, so the table is exhaustive
//! at definition time: adding an operation without deciding its key is a
//! compile error. No string matching is involved anywhere.

use serde::{Deserialize, Serialize};
use strum::Display;

/// A fetch-triggering operation the UI can issue.
///
/// Operations are identified by what the caller *wants*, not by the
/// transport call shape, so different code paths asking for the same data
/// coalesce onto the same resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum FetchOperation {
    LoadStudents,
    RefreshStudents,
    LoadTeachers,
    LoadCourses,
    LoadEnrollments,
    LoadDashboard,
    ResolveIdentity,
    ExportReports,
}

/// A logical resource the coalescer tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ResourceKey {
    Students,
    Teachers,
    Courses,
    Enrollments,
    Dashboard,
    AuthCheck,
}

impl FetchOperation {
    /// The resource this operation fetches, or `None` for operations that
    /// are never coalesced (always admitted).
    pub fn resource_key(self) -> Option<ResourceKey> {
        match self {
            Self::LoadStudents | Self::RefreshStudents => Some(ResourceKey::Students),
            Self::LoadTeachers => Some(ResourceKey::Teachers),
            Self::LoadCourses => Some(ResourceKey::Courses),
            Self::LoadEnrollments => Some(ResourceKey::Enrollments),
            Self::LoadDashboard => Some(ResourceKey::Dashboard),
            Self::ResolveIdentity => Some(ResourceKey::AuthCheck),
            // Exports are user-initiated one-offs; deduplicating them would
            // swallow an explicit request.
            Self::ExportReports => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_resource_maps_to_same_key() {
        assert_eq!(
            FetchOperation::LoadStudents.resource_key(),
            FetchOperation::RefreshStudents.resource_key(),
        );
    }

    #[test]
    fn test_exports_are_uncoalesced() {
        assert_eq!(FetchOperation::ExportReports.resource_key(), None);
    }

    #[test]
    fn test_display_is_snake_case() {
        // Log fields render these names; they must match the serde form.
        assert_eq!(FetchOperation::LoadStudents.to_string(), "load_students");
        assert_eq!(ResourceKey::AuthCheck.to_string(), "auth_check");
    }

    #[test]
    fn test_identity_resolution_uses_the_fixed_auth_key() {
        assert_eq!(
            FetchOperation::ResolveIdentity.resource_key(),
            Some(ResourceKey::AuthCheck),
        );
    }
}
