//! Myers diff.
//!
//! Eugene Myers' O(ND) shortest-edit-script algorithm ("An O(ND)
//! Difference Algorithm and Its Variations", 1986) over line sequences.
//! The forward search keeps one furthest-reaching row per edit distance;
//! the script is then recovered by replaying those rows backwards from
//! the goal, so no separate backtracking state is maintained during the
//! search. Memory is O(D·(N+M)), which stays small whenever the inputs
//! are similar.

use crate::{Edit, EditOp};

/// Compute a line-level diff between two line sequences.
pub fn diff(old: &[&[u8]], new: &[&[u8]]) -> Vec<Edit> {
    // One empty side needs no search at all.
    if old.is_empty() {
        return new
            .iter()
            .enumerate()
            .map(|(i, _)| Edit {
                op: EditOp::Insert,
                old_index: 0,
                new_index: i,
            })
            .collect();
    }
    if new.is_empty() {
        return old
            .iter()
            .enumerate()
            .map(|(i, _)| Edit {
                op: EditOp::Delete,
                old_index: i,
                new_index: 0,
            })
            .collect();
    }

    shortest_edit_script(old, new)
}

/// Was diagonal `k` reached by a downward move (an insertion) at edit
/// distance `d`, given the furthest-reaching row of distance `d - 1`?
///
/// At the lower boundary only a downward move exists; at the upper
/// boundary only a rightward one; in between, the move extending the
/// further-reaching neighbor wins.
fn moved_down(row: &[usize], offset: usize, k: isize, d: isize) -> bool {
    let idx = (k + offset as isize) as usize;
    k == -d || (k != d && row[idx - 1] < row[idx + 1])
}

/// The full Myers run: forward search, then backward replay, in one place.
fn shortest_edit_script(old: &[&[u8]], new: &[&[u8]]) -> Vec<Edit> {
    let n = old.len();
    let m = new.len();
    let bound = n + m;
    let at = |k: isize| (k + bound as isize) as usize;

    // row[at(k)] is the furthest x reached on diagonal k = x - y. One
    // snapshot per distance is kept for the replay; the snapshot taken
    // before round d is exactly what round d's decisions read, because a
    // round only consults diagonals of the opposite parity.
    let mut row = vec![0usize; 2 * bound + 1];
    let mut snapshots: Vec<Vec<usize>> = Vec::new();

    let mut distance = None;
    let mut d: isize = 0;
    while distance.is_none() {
        debug_assert!(d as usize <= bound, "edit distance is bounded by n + m");
        snapshots.push(row.clone());

        let mut k = -d;
        while k <= d {
            let mut x = if moved_down(&row, bound, k, d) {
                row[at(k + 1)]
            } else {
                row[at(k - 1)] + 1
            };
            let mut y = (x as isize - k) as usize;

            // Ride the diagonal while lines match.
            while x < n && y < m && old[x] == new[y] {
                x += 1;
                y += 1;
            }
            row[at(k)] = x;

            if x >= n && y >= m {
                distance = Some(d);
                break;
            }
            k += 2;
        }
        d += 1;
    }
    let distance = distance.expect("search sets the distance before exiting");

    // Replay: walk from (n, m) back to the origin, one distance at a
    // time, emitting the snake and then the single non-diagonal move
    // that round contributed. Edits come out reversed.
    let mut script = Vec::with_capacity(bound);
    let (mut x, mut y) = (n, m);

    for d in (1..=distance).rev() {
        let snapshot = &snapshots[d as usize];
        let k = x as isize - y as isize;
        let down = moved_down(snapshot, bound, k, d);
        let prev_k = if down { k + 1 } else { k - 1 };

        // Where the previous round ended, and where this round's move
        // landed before its snake.
        let px = snapshot[at(prev_k)];
        let py = (px as isize - prev_k) as usize;
        let (move_x, move_y) = if down { (px, py + 1) } else { (px + 1, py) };

        while x > move_x && y > move_y {
            x -= 1;
            y -= 1;
            script.push(Edit {
                op: EditOp::Equal,
                old_index: x,
                new_index: y,
            });
        }

        script.push(Edit {
            op: if down { EditOp::Insert } else { EditOp::Delete },
            old_index: px,
            new_index: py,
        });
        x = px;
        y = py;
    }

    // Whatever remains is the leading snake along the zero diagonal.
    while x > 0 && y > 0 {
        x -= 1;
        y -= 1;
        script.push(Edit {
            op: EditOp::Equal,
            old_index: x,
            new_index: y,
        });
    }

    script.reverse();
    script
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines(data: &[u8]) -> Vec<&[u8]> {
        crate::split_lines(data)
    }

    fn apply(edits: &[Edit], old: &[&[u8]], new: &[&[u8]]) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        for edit in edits {
            match edit.op {
                EditOp::Equal => out.push(old[edit.old_index].to_vec()),
                EditOp::Insert => out.push(new[edit.new_index].to_vec()),
                EditOp::Delete => {}
            }
        }
        out
    }

    #[test]
    fn edit_script_reconstructs_new() {
        let old_data = b"one\ntwo\nthree\nfour\n";
        let new_data = b"one\nTWO\nthree\nextra\nfour\n";
        let old = lines(old_data);
        let new = lines(new_data);
        let edits = diff(&old, &new);
        let rebuilt = apply(&edits, &old, &new);
        let expected: Vec<Vec<u8>> = new.iter().map(|l| l.to_vec()).collect();
        assert_eq!(rebuilt, expected);
    }

    #[test]
    fn identical_sequences_are_all_equal() {
        let old = lines(b"a\nb\nc\n");
        let new = lines(b"a\nb\nc\n");
        let edits = diff(&old, &new);
        assert_eq!(edits.len(), 3);
        assert!(edits.iter().all(|e| e.op == EditOp::Equal));
        assert_eq!(edits[0].old_index, 0);
        assert_eq!(edits[2].new_index, 2);
    }

    #[test]
    fn delete_everything() {
        let old = lines(b"a\nb\n");
        let new = lines(b"");
        let edits = diff(&old, &new);
        assert_eq!(edits.len(), 2);
        assert!(edits.iter().all(|e| e.op == EditOp::Delete));
    }

    #[test]
    fn insert_into_empty() {
        let old = lines(b"");
        let new = lines(b"a\nb\n");
        let edits = diff(&old, &new);
        assert_eq!(edits.len(), 2);
        assert!(edits.iter().all(|e| e.op == EditOp::Insert));
    }

    #[test]
    fn disjoint_sequences() {
        let old = lines(b"a\nb\n");
        let new = lines(b"c\nd\n");
        let edits = diff(&old, &new);
        let rebuilt = apply(&edits, &old, &new);
        let expected: Vec<Vec<u8>> = new.iter().map(|l| l.to_vec()).collect();
        assert_eq!(rebuilt, expected);
    }

    #[test]
    fn minimal_for_single_change() {
        let old = lines(b"a\nb\nc\n");
        let new = lines(b"a\nx\nc\n");
        let edits = diff(&old, &new);
        let changes = edits.iter().filter(|e| e.op != EditOp::Equal).count();
        assert_eq!(changes, 2); // one delete + one insert
    }

    #[test]
    fn shared_prefix_and_suffix_survive() {
        let old = lines(b"same\nsame\nold\nsame\n");
        let new = lines(b"same\nsame\nnew1\nnew2\nsame\n");
        let edits = diff(&old, &new);
        let rebuilt = apply(&edits, &old, &new);
        let expected: Vec<Vec<u8>> = new.iter().map(|l| l.to_vec()).collect();
        assert_eq!(rebuilt, expected);

        // The untouched lines really come through as Equal edits.
        let equals = edits.iter().filter(|e| e.op == EditOp::Equal).count();
        assert_eq!(equals, 3);
    }

    #[test]
    fn indices_stay_in_step() {
        // Every edit's indices must be valid for its operation, in order.
        let old = lines(b"p\nq\nr\ns\n");
        let new = lines(b"q\nr\nx\ns\n");
        let edits = diff(&old, &new);

        let (mut o, mut n) = (0usize, 0usize);
        for edit in &edits {
            match edit.op {
                EditOp::Equal => {
                    assert_eq!((edit.old_index, edit.new_index), (o, n));
                    o += 1;
                    n += 1;
                }
                EditOp::Delete => {
                    assert_eq!(edit.old_index, o);
                    o += 1;
                }
                EditOp::Insert => {
                    assert_eq!(edit.new_index, n);
                    n += 1;
                }
            }
        }
        assert_eq!((o, n), (old.len(), new.len()));
    }
}
