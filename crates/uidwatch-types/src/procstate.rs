//! Process-state labels printed by `am watch-uids --oom`.

pub const PERSISTENT: &str = "PER";
pub const PERSISTENT_UI: &str = "PERU";
pub const TOP: &str = "TOP";
pub const BOUND_FG_SERVICE: &str = "BFGS";
pub const BOUND_TOP: &str = "BTOP";
pub const FG_SERVICE_LOCATION: &str = "FGSL";
pub const FG_SERVICE: &str = "FGS";
pub const TOP_SLEEPING: &str = "TPSL";
pub const IMPORTANT_FG: &str = "IMPF";
pub const IMPORTANT_BG: &str = "IMPB";
pub const TRANSIENT_BG: &str = "TRNB";
pub const BACKUP: &str = "BKUP";
pub const HEAVY_WEIGHT: &str = "HVY";
pub const SERVICE: &str = "SVC";
pub const RECEIVER: &str = "RCVR";
pub const HOME: &str = "HOME";
pub const LAST: &str = "LAST";
pub const CACHED_ACTIVITY: &str = "CAC";
pub const CACHED_ACTIVITY_CLIENT: &str = "CACC";
pub const CACHED_RECENT: &str = "CRE";
pub const CACHED_EMPTY: &str = "CEM";
pub const NONEXISTENT: &str = "NONE";

/// Every label, most important first.
pub const ALL: &[&str] = &[
    PERSISTENT,
    PERSISTENT_UI,
    TOP,
    BOUND_FG_SERVICE,
    BOUND_TOP,
    FG_SERVICE_LOCATION,
    FG_SERVICE,
    TOP_SLEEPING,
    IMPORTANT_FG,
    IMPORTANT_BG,
    TRANSIENT_BG,
    BACKUP,
    HEAVY_WEIGHT,
    SERVICE,
    RECEIVER,
    HOME,
    LAST,
    CACHED_ACTIVITY,
    CACHED_ACTIVITY_CLIENT,
    CACHED_RECENT,
    CACHED_EMPTY,
    NONEXISTENT,
];

pub fn is_known(label: &str) -> bool {
    ALL.contains(&label)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_labels() {
        assert!(is_known("TOP"));
        assert!(is_known("CEM"));
        assert!(!is_known("top"));
        assert!(!is_known(""));
        assert_eq!(ALL.len(), 22);
    }
}
