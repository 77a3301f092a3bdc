use crate::oracle::Oracle;
use crate::progress::{NoProgress, Progress};
use crate::split::{complement, split_into_chunks};
use crate::types::{Reduction, Stats};
use std::hash::Hash;

pub fn reduce<I, O>(initial: Vec<I>, oracle: &mut O) -> Result<Reduction<I>, O::Error>
where
    I: Clone + Eq + Hash,
    O: Oracle<I>,
{
    reduce_with_progress(initial, oracle, &mut NoProgress)
}

pub fn reduce_with_progress<I, O, P>(
    initial: Vec<I>,
    oracle: &mut O,
    progress: &mut P,
) -> Result<Reduction<I>, O::Error>
where
    I: Clone + Eq + Hash,
    O: Oracle<I>,
    P: Progress<I>,
{
    let mut current = initial;
    let mut splits = 2;
    let mut stats = Stats::default();

    'search: loop {
        progress.on_round(&current, splits);

        // Once every chunk would hold at most one item, this granularity is
        // exhausted and the working set is a local fixed point.
        if splits > current.len() {
            return Ok(Reduction {
                items: current,
                stats,
            });
        }
        stats.rounds += 1;

        for chunk in split_into_chunks(&current, splits) {
            stats.queries += 1;
            if oracle.evaluate(&chunk)? {
                current = chunk;
                splits = 2;
                stats.reductions += 1;
                progress.on_reduction(&current);
                continue 'search;
            }

            let rest = complement(&current, &chunk);
            stats.queries += 1;
            if oracle.evaluate(&rest)? {
                current = rest;
                splits = 2;
                stats.reductions += 1;
                progress.on_reduction(&current);
                continue 'search;
            }
        }

        splits += 1;
    }
}
