use anyhow::{Context, Result, bail, ensure};
use std::collections::BTreeSet;

const DEFAULT_SEED: u64 = 1337;
const MAX_RANGE_LEN: u64 = 100_000;

/// Resolve a list of CLI seed arguments into concrete seeds.
///
/// Supports literal integers (negative values use their magnitude) and
/// inclusive ranges written `start..end`. Duplicates are dropped while the
/// first occurrence keeps its position.
pub fn resolve_seed_inputs(tokens: &[String]) -> Result<Vec<u64>> {
    let mut seeds = Vec::new();
    let mut seen = BTreeSet::new();
    let mut push = |seed: u64| {
        if seen.insert(seed) {
            seeds.push(seed);
        }
    };

    for token in tokens {
        if token.is_empty() {
            continue;
        }

        if let Some((start, end)) = token.split_once("..") {
            let start: u64 = start
                .parse()
                .with_context(|| format!("invalid range start in {token}"))?;
            let end: u64 = end
                .parse()
                .with_context(|| format!("invalid range end in {token}"))?;
            ensure!(start <= end, "empty seed range {token}");
            ensure!(
                end - start < MAX_RANGE_LEN,
                "seed range {token} exceeds {MAX_RANGE_LEN} seeds"
            );
            (start..=end).for_each(&mut push);
            continue;
        }

        if let Ok(value) = token.parse::<i64>() {
            push(value.unsigned_abs());
            continue;
        }

        if let Ok(value) = token.parse::<u64>() {
            push(value);
            continue;
        }

        bail!("Unrecognized seed token: {token}");
    }

    if seeds.is_empty() {
        seeds.push(DEFAULT_SEED);
    }

    Ok(seeds)
}
