use super::{DetailedMod, ModVersion, TargetPlatform};

/// Versions of `detailed` that run on `platform`, newest first.
///
/// This is a stable filter over the already sorted version list; there is no
/// further tie-break between artifacts with equal timestamps.
pub fn matching_versions<'a>(
    detailed: &'a DetailedMod,
    platform: &TargetPlatform,
) -> Vec<&'a ModVersion> {
    detailed
        .versions()
        .iter()
        .filter(|v| v.supports(platform))
        .collect()
}

/// The version install and upgrade pick, if any is compatible.
pub fn best_version<'a>(
    detailed: &'a DetailedMod,
    platform: &TargetPlatform,
) -> Option<&'a ModVersion> {
    detailed.versions().iter().find(|v| v.supports(platform))
}
