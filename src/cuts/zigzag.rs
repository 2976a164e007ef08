/// Ordering applied to the cuts left over after the last complete block of four.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ZigzagTail {
    /// Apply the block pattern and drop positions past the end.
    #[default]
    Truncate,
    /// Emit the tail in source order.
    Identity,
}

/// Zigzag order for `n` cuts with the default tail policy.
pub fn zigzag(n: usize) -> Vec<usize> {
    zigzag_with(n, ZigzagTail::Truncate)
}

/// Zigzag order for `n` cuts.
///
/// Cuts are taken in blocks of four source positions. Even blocks emit
/// `[b, b+2, b+1, b+3]` and odd blocks emit `[b+1, b, b+3, b+2]`, so eight cuts come out as
/// `0,2,1,3,5,4,7,6`. The result is always a permutation of `0..n`.
pub fn zigzag_with(n: usize, tail: ZigzagTail) -> Vec<usize> {
    let mut out = Vec::with_capacity(n);
    let full_blocks = n / 4;

    for block in 0..=full_blocks {
        let b = block * 4;
        if b >= n {
            break;
        }
        let complete = b + 4 <= n;
        if !complete && tail == ZigzagTail::Identity {
            out.extend(b..n);
            break;
        }
        let pattern = if block % 2 == 0 {
            [b, b + 2, b + 1, b + 3]
        } else {
            [b + 1, b, b + 3, b + 2]
        };
        out.extend(pattern.into_iter().filter(|&i| i < n));
    }

    out
}

#[cfg(test)]
#[path = "../../tests/unit/cuts/zigzag.rs"]
mod tests;
