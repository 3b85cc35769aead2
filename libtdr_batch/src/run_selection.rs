use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// The set of runs a batch should convert.
///
/// In YAML a list is written as a plain sequence (`[18, 19, 20]`) and a range as a
/// map with inclusive bounds (`{ first: 84, last: 130 }`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RunSelection {
    List(Vec<i32>),
    Range { first: i32, last: i32 },
}

impl Default for RunSelection {
    fn default() -> Self {
        Self::Range { first: 0, last: 0 }
    }
}

impl RunSelection {
    /// Get the run numbers in processing order
    ///
    /// Lists keep their configured order. A run listed more than once is only returned
    /// at its first position so that it is converted a single time.
    pub fn runs(&self) -> Vec<i32> {
        match self {
            Self::List(list) => {
                let mut seen: HashSet<i32> = HashSet::with_capacity(list.len());
                list.iter().copied().filter(|run| seen.insert(*run)).collect()
            }
            Self::Range { first, last } => (*first..=*last).collect(),
        }
    }

    /// Runs that appear more than once in a list, each reported once
    pub fn duplicates(&self) -> Vec<i32> {
        match self {
            Self::List(list) => {
                let mut seen: HashSet<i32> = HashSet::with_capacity(list.len());
                let mut repeated: Vec<i32> = Vec::new();
                for run in list {
                    if !seen.insert(*run) && !repeated.contains(run) {
                        repeated.push(*run);
                    }
                }
                repeated
            }
            Self::Range { .. } => Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.runs().len()
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::List(list) => list.is_empty(),
            Self::Range { first, last } => first > last,
        }
    }
}

/// Divide the runs into a set of subsets (one per worker)
///
/// Runs are dealt round-robin, so every run lands in exactly one subset. Subsets may be
/// empty when there are fewer runs than workers.
pub fn create_subsets(runs: &[i32], n_workers: usize) -> Vec<Vec<i32>> {
    let mut subsets: Vec<Vec<i32>> = vec![Vec::new(); n_workers.max(1)];
    let n_subsets = subsets.len();

    for (idx, run) in runs.iter().enumerate() {
        subsets[idx % n_subsets].push(*run)
    }

    subsets
}
