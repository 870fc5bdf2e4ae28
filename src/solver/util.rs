/// Removes the first element matching the predicate by swapping the last element into its place.
/// Returns whether an element was removed.
pub fn swap_remove_by<T, F>(v: &mut Vec<T>, pred: F) -> bool
where
    F: Fn(&T) -> bool,
{
    if let Some(i) = v.iter().position(pred) {
        v.swap_remove(i);
        true
    } else {
        false
    }
}

/// Finite subsequences of the Luby sequence, scaled by powers of y:
/// 1, 1, y, 1, 1, y, y^2, 1, 1, y, 1, 1, y, y^2, y^3, ...
pub fn luby(y: f64, mut x: u64) -> f64 {
    // Find the finite subsequence that contains index 'x', and its size.
    let mut size = 1;
    let mut seq = 0;
    while size < x + 1 {
        seq += 1;
        size = 2 * size + 1;
    }

    while size - 1 != x {
        size = (size - 1) >> 1;
        seq -= 1;
        x %= size;
    }

    y.powi(seq)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn luby_prefix() {
        let seq = (0..15).map(|i| luby(2.0, i) as u64).collect::<Vec<_>>();
        assert_eq!(seq, vec![1, 1, 2, 1, 1, 2, 4, 1, 1, 2, 1, 1, 2, 4, 8]);
    }

    #[test]
    fn swap_remove_moves_last() {
        let mut v = vec![1, 2, 3, 4];
        assert!(swap_remove_by(&mut v, |x| *x == 2));
        assert_eq!(v, vec![1, 4, 3]);
        assert!(!swap_remove_by(&mut v, |x| *x == 7));
    }
}
