use crate::inventory::{normalize_identity, Volume};
use crate::placement::DestinationError;
use crate::rules::{normalize_type, RuleResolver};

pub(crate) fn same_cluster(source: &Volume, candidate: &Volume) -> bool {
    normalize_identity(&source.cluster) == normalize_identity(&candidate.cluster)
}

fn same_environment(source: &Volume, candidate: &Volume) -> bool {
    source
        .environment
        .trim()
        .eq_ignore_ascii_case(candidate.environment.trim())
}

fn has_room(candidate: &Volume, required_gb: f64) -> bool {
    candidate.free_space_gb() > required_gb
}

pub fn is_excluded(candidate: &Volume, exclusions: &[String]) -> bool {
    let name = candidate.name.to_lowercase();
    exclusions
        .iter()
        .map(|k| k.trim().to_lowercase())
        .any(|k| !k.is_empty() && name.contains(&k))
}

/// Largest free space wins; on ties the first candidate seen is kept.
fn largest_free_space<'p>(candidates: impl IntoIterator<Item = &'p Volume>) -> Option<&'p Volume> {
    let mut best: Option<&Volume> = None;
    for candidate in candidates {
        match best {
            Some(current) if candidate.free_space_gb() <= current.free_space_gb() => {}
            _ => best = Some(candidate),
        }
    }
    best
}

/// Picks the destination for `required_gb` moved off `source`.
///
/// A candidate must share the source's cluster and environment, be a different volume, have
/// strictly more than `required_gb` free, and not match an exclusion keyword. Among those, the
/// source type's migration rule decides: the first preferred type with any candidate wins. A
/// rule whose types match nothing fails instead of falling back; with no rule at all the
/// candidate with the most free space is taken.
pub fn select_destination<'p>(
    source: &Volume,
    required_gb: f64,
    pool: &'p [Volume],
    resolver: &RuleResolver,
    exclusions: &[String],
) -> Result<&'p Volume, DestinationError> {
    let others = pool
        .iter()
        .filter(|v| v.name != source.name)
        .collect::<Vec<_>>();
    let candidates = others
        .iter()
        .copied()
        .filter(|v| {
            same_cluster(source, v)
                && same_environment(source, v)
                && has_room(v, required_gb)
                && !is_excluded(v, exclusions)
        })
        .collect::<Vec<_>>();

    if candidates.is_empty() {
        return Err(classify_empty(source, required_gb, &others));
    }

    let preferred = resolver.preferred_destinations(&source.volume_type);
    if preferred.is_empty() {
        return largest_free_space(candidates.iter().copied())
            .ok_or_else(|| classify_empty(source, required_gb, &others));
    }
    for wanted in preferred.iter().map(|t| normalize_type(t)) {
        if wanted.is_empty() {
            continue;
        }
        let of_type = candidates
            .iter()
            .copied()
            .filter(|v| normalize_type(&v.volume_type) == wanted);
        if let Some(best) = largest_free_space(of_type) {
            return Ok(best);
        }
    }
    Err(DestinationError::NoRuleMatch {
        cluster: source.cluster.clone(),
        source_type: source.volume_type.clone(),
        preferred: preferred.to_vec(),
    })
}

/// Names the first single constraint that on its own already rules out every other volume.
fn classify_empty(source: &Volume, required_gb: f64, others: &[&Volume]) -> DestinationError {
    if !others.iter().any(|v| same_cluster(source, v)) {
        return DestinationError::NoCandidateInCluster {
            cluster: source.cluster.clone(),
        };
    }
    if !others.iter().any(|v| same_environment(source, v)) {
        return DestinationError::NoCandidateInEnvironment {
            cluster: source.cluster.clone(),
            environment: source.environment.clone(),
        };
    }
    if !others.iter().any(|v| has_room(v, required_gb)) {
        return DestinationError::InsufficientFreeSpace {
            cluster: source.cluster.clone(),
            required_gb,
        };
    }
    DestinationError::ExcludedByPolicy {
        cluster: source.cluster.clone(),
    }
}
