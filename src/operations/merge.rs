// Merge Join
// Lockstep walk of two sorted sequences, pairing items with equal keys

use std::cmp::Ordering;

/// Iterator over `left`, yielding each item with its equal-keyed partner in `right`
///
/// Both slices must be sorted ascending by their key. The cursor into `right`
/// only moves forward, so the whole join is linear in the combined length.
pub struct MergeJoin<'a, L, R, FL, FR> {
    left: std::slice::Iter<'a, L>,
    right: &'a [R],
    cursor: usize,
    left_key: FL,
    right_key: FR,
}

/// Join two sorted slices by key; see [`MergeJoin`]
pub fn merge_join<'a, L, R, K, FL, FR>(
    left: &'a [L],
    right: &'a [R],
    left_key: FL,
    right_key: FR,
) -> MergeJoin<'a, L, R, FL, FR>
where
    K: Ord + ?Sized + 'a,
    FL: Fn(&'a L) -> &'a K,
    FR: Fn(&'a R) -> &'a K,
{
    MergeJoin {
        left: left.iter(),
        right,
        cursor: 0,
        left_key,
        right_key,
    }
}

impl<'a, L, R, K, FL, FR> Iterator for MergeJoin<'a, L, R, FL, FR>
where
    K: Ord + ?Sized + 'a,
    FL: Fn(&'a L) -> &'a K,
    FR: Fn(&'a R) -> &'a K,
{
    type Item = (&'a L, Option<&'a R>);

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.left.next()?;
        let key = (self.left_key)(item);

        while let Some(candidate) = self.right.get(self.cursor) {
            match (self.right_key)(candidate).cmp(key) {
                Ordering::Less => self.cursor += 1,
                Ordering::Equal => return Some((item, Some(candidate))),
                Ordering::Greater => break,
            }
        }

        Some((item, None))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.left.size_hint()
    }
}
