use filterdns_domain::{BlockedServiceId, FilterListId, WeeklySchedule};

/// The filtering configuration carried by either a client profile or a
/// filtering group (spec §4.10 "engines chosen per profile settings or per
/// filtering-group settings"). Both shapes are identical; only which one
/// wins differs per request.
#[derive(Debug, Clone, Default)]
pub struct FilterSettings {
    pub rule_list_ids: Vec<FilterListId>,
    pub custom_rules: Vec<String>,
    /// Last-modified timestamp of `custom_rules`, used as the Custom Filter
    /// LRU's cache-invalidation key (spec §4.8).
    pub custom_rules_updated_at: i64,
    pub blocked_service_ids: Vec<BlockedServiceId>,
    pub safe_browsing_enabled: bool,
    pub adult_blocking_enabled: bool,
    pub newly_registered_domains_enabled: bool,
    pub safe_search_general_enabled: bool,
    pub safe_search_youtube_enabled: bool,
    pub parental_control_schedule: Option<WeeklySchedule>,
}

/// Identifies which profile/group a `CompositeFilter` should be built for.
/// The profile's settings win wholesale when present; otherwise the
/// filtering group's settings apply (spec §4.10).
pub struct FilterContextInput {
    pub profile_id: Option<String>,
    pub profile: Option<FilterSettings>,
    pub group: FilterSettings,
}

impl FilterContextInput {
    /// The settings this request should be filtered under.
    pub fn effective_settings(&self) -> &FilterSettings {
        self.profile.as_ref().unwrap_or(&self.group)
    }

    /// Parental control is paused when the effective settings carry a
    /// schedule and `now` falls inside one of its windows (spec §6).
    pub fn parental_control_paused(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        self.effective_settings()
            .parental_control_schedule
            .as_ref()
            .is_some_and(|schedule| schedule.is_paused(now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_settings_win_over_group() {
        let group = FilterSettings {
            safe_browsing_enabled: false,
            ..Default::default()
        };
        let profile = FilterSettings {
            safe_browsing_enabled: true,
            ..Default::default()
        };
        let input = FilterContextInput {
            profile_id: Some("p1".into()),
            profile: Some(profile),
            group,
        };
        assert!(input.effective_settings().safe_browsing_enabled);
    }

    #[test]
    fn falls_back_to_group_without_profile() {
        let group = FilterSettings {
            safe_browsing_enabled: true,
            ..Default::default()
        };
        let input = FilterContextInput {
            profile_id: None,
            profile: None,
            group,
        };
        assert!(input.effective_settings().safe_browsing_enabled);
    }
}
