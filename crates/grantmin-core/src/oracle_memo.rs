use crate::oracle::Oracle;
use std::collections::HashMap;
use std::hash::Hash;

#[derive(Debug)]
pub struct MemoOracle<I, O> {
    inner: O,
    cache: HashMap<Vec<I>, bool>,
    evaluations: u64,
    cache_hits: u64,
}

impl<I, O> MemoOracle<I, O>
where
    I: Clone + Eq + Hash + Ord,
{
    pub fn new(inner: O) -> Self {
        Self {
            inner,
            cache: HashMap::new(),
            evaluations: 0,
            cache_hits: 0,
        }
    }

    pub fn evaluations(&self) -> u64 {
        self.evaluations
    }

    pub fn cache_hits(&self) -> u64 {
        self.cache_hits
    }

    pub fn into_inner(self) -> O {
        self.inner
    }
}

impl<I, O> Oracle<I> for MemoOracle<I, O>
where
    I: Clone + Eq + Hash + Ord,
    O: Oracle<I>,
{
    type Error = O::Error;

    fn evaluate(&mut self, subset: &[I]) -> Result<bool, Self::Error> {
        // Subsets carry no duplicates, so a sorted copy is a canonical content key.
        let mut key = subset.to_vec();
        key.sort_unstable();

        if let Some(&answer) = self.cache.get(&key) {
            self.cache_hits += 1;
            return Ok(answer);
        }

        self.evaluations += 1;
        let answer = self.inner.evaluate(subset)?;
        self.cache.insert(key, answer);
        Ok(answer)
    }
}
