//! Selection filter narrowing the builds offered for resolution.

use crate::descriptor::BuildDescriptor;

/// Build value meaning "whichever build is newest".
pub const LATEST_BUILD: &str = "latest";

/// Narrows the universe of builds before naming and sorting
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildFilter {
    /// Only builds that have not finished yet
    pub pending: bool,
    /// Case-insensitive substring of the display name
    pub filter: String,
    pub owner: String,
    pub repository: String,
    pub branch: String,
    /// Empty, `latest`, or a build number
    pub build: String,
}

impl BuildFilter {
    /// Requested build number, or 0 when unspecified or `latest`.
    pub fn build_number(&self) -> u64 {
        self.build.trim().parse().unwrap_or(0)
    }

    pub fn matches(&self, build: &BuildDescriptor) -> bool {
        if !self.owner.is_empty() && self.owner != build.owner() {
            return false;
        }
        if !self.repository.is_empty() && self.repository != build.repository() {
            return false;
        }
        if !self.branch.is_empty() && self.branch != build.branch() {
            return false;
        }
        if !self.build.is_empty() && self.build != LATEST_BUILD && self.build != build.build() {
            return false;
        }
        if !self.filter.is_empty()
            && !build
                .display_name()
                .to_lowercase()
                .contains(&self.filter.to_lowercase())
        {
            return false;
        }
        !self.pending || build.status().is_pending()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{BuildMeta, LegacyBuild};
    use crate::pod::{PodPhase, PodSnapshot};

    fn build(owner: &str, repo: &str, branch: &str, number: &str, phase: PodPhase) -> BuildDescriptor {
        BuildDescriptor::Legacy(LegacyBuild {
            meta: BuildMeta {
                owner: owner.to_string(),
                repository: repo.to_string(),
                branch: branch.to_string(),
                build: number.to_string(),
                ..Default::default()
            },
            pod: PodSnapshot {
                name: format!("{repo}-{number}"),
                phase,
                ..Default::default()
            },
        })
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let filter = BuildFilter::default();
        assert!(filter.matches(&build("acme", "api", "master", "1", PodPhase::Succeeded)));
    }

    #[test]
    fn test_fields_are_conjunctive() {
        let filter = BuildFilter {
            owner: "acme".to_string(),
            repository: "api".to_string(),
            branch: "PR-12".to_string(),
            ..Default::default()
        };
        assert!(filter.matches(&build("acme", "api", "PR-12", "4", PodPhase::Running)));
        assert!(!filter.matches(&build("acme", "api", "master", "4", PodPhase::Running)));
        assert!(!filter.matches(&build("other", "api", "PR-12", "4", PodPhase::Running)));
        assert!(!filter.matches(&build("acme", "web", "PR-12", "4", PodPhase::Running)));
    }

    #[test]
    fn test_build_number() {
        let b = build("acme", "api", "master", "12", PodPhase::Succeeded);

        let exact = BuildFilter {
            build: "12".to_string(),
            ..Default::default()
        };
        assert!(exact.matches(&b));
        assert_eq!(exact.build_number(), 12);

        let other = BuildFilter {
            build: "13".to_string(),
            ..Default::default()
        };
        assert!(!other.matches(&b));

        let latest = BuildFilter {
            build: LATEST_BUILD.to_string(),
            ..Default::default()
        };
        assert!(latest.matches(&b));
        assert_eq!(latest.build_number(), 0);
    }

    #[test]
    fn test_text_filter_is_case_insensitive() {
        let filter = BuildFilter {
            filter: "API/MAST".to_string(),
            ..Default::default()
        };
        assert!(filter.matches(&build("acme", "api", "master", "1", PodPhase::Succeeded)));
        assert!(!filter.matches(&build("acme", "web", "master", "1", PodPhase::Succeeded)));
    }

    #[test]
    fn test_pending_only() {
        let filter = BuildFilter {
            pending: true,
            ..Default::default()
        };
        assert!(filter.matches(&build("acme", "api", "master", "1", PodPhase::Pending)));
        assert!(filter.matches(&build("acme", "api", "master", "1", PodPhase::Running)));
        assert!(!filter.matches(&build("acme", "api", "master", "1", PodPhase::Succeeded)));
        assert!(!filter.matches(&build("acme", "api", "master", "1", PodPhase::Failed)));
    }
}
