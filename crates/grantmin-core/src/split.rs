use std::collections::HashSet;
use std::hash::Hash;

pub fn split_into_chunks<I: Clone>(items: &[I], count: usize) -> Vec<Vec<I>> {
    let mut chunks = Vec::with_capacity(count);
    let mut start = 0;

    for i in 0..count {
        let size = (items.len() - start) / (count - i);
        chunks.push(items[start..start + size].to_vec());
        start += size;
    }

    chunks
}

pub fn complement<I>(full: &[I], part: &[I]) -> Vec<I>
where
    I: Clone + Eq + Hash,
{
    let removed: HashSet<&I> = part.iter().collect();

    full.iter()
        .filter(|item| !removed.contains(*item))
        .cloned()
        .collect()
}
