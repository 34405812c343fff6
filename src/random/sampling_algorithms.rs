//! Uniform sampling from iterators whose length is known up front, so no container has to be
//! randomly indexable.

use crate::rand::seq::index::sample as choose_range;
use crate::rand::Rng;

/// Picks one element uniformly, or `None` from an empty iterator.
pub fn sample_single_from_known_length<I, R, T>(rng: &mut R, mut iter: I) -> Option<T>
where
    R: Rng,
    I: ExactSizeIterator<Item = T>,
{
    match iter.len() {
        0 => None,
        len => iter.nth(rng.random_range(0..len)),
    }
}

/// Picks `requested` distinct elements uniformly, without replacement. The picks keep the order
/// in which `iter` yields them, and iteration stops at the last pick.
///
/// Panics if `requested` exceeds `iter.len()`; callers clamp first.
pub fn sample_multiple_from_known_length<I, R, T>(rng: &mut R, iter: I, requested: usize) -> Vec<T>
where
    R: Rng,
    I: ExactSizeIterator<Item = T>,
{
    let mut picks = choose_range(rng, iter.len(), requested).into_vec();
    picks.sort_unstable();
    let mut picks = picks.into_iter().peekable();

    let mut selected = Vec::with_capacity(requested);
    for (position, item) in iter.enumerate() {
        let Some(&next) = picks.peek() else {
            break;
        };
        if position == next {
            selected.push(item);
            picks.next();
        }
    }
    selected
}
