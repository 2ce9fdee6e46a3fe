//! Bingo line accounting for check-in progress summaries.
//!
//! The app has no "win" state; line counts only feed the human-readable
//! progress sentence in check-in emails.

/// Enumerate every line on an N×N grid as position lists: all rows, all
/// columns, then both diagonals (2N+2 lines total).
pub fn line_positions(grid_size: usize) -> Vec<Vec<usize>> {
    let n = grid_size;
    let mut lines = Vec::with_capacity(2 * n + 2);
    for row in 0..n {
        lines.push((0..n).map(|col| row * n + col).collect());
    }
    for col in 0..n {
        lines.push((0..n).map(|row| row * n + col).collect());
    }
    lines.push((0..n).map(|i| i * n + i).collect());
    lines.push((0..n).map(|i| i * n + (n - 1 - i)).collect());
    lines
}

/// Progress over one card's grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridProgress {
    pub completed_squares: usize,
    pub total_squares: usize,
    pub complete_lines: usize,
}

/// Count completed squares and complete lines. The free space (if any)
/// always counts as filled.
pub fn count_lines(
    grid_size: usize,
    completed_positions: &[usize],
    free_space_position: Option<usize>,
) -> GridProgress {
    let n = grid_size;
    let total = n * n;
    let mut filled = vec![false; total];
    for &pos in completed_positions {
        if pos < total {
            filled[pos] = true;
        }
    }
    if let Some(free) = free_space_position {
        if free < total {
            filled[free] = true;
        }
    }

    let complete_lines = line_positions(n)
        .iter()
        .filter(|line| line.iter().all(|&pos| filled[pos]))
        .count();

    GridProgress {
        completed_squares: filled.iter().filter(|&&f| f).count(),
        total_squares: total,
        complete_lines,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_count_3x3() {
        let lines = line_positions(3);
        assert_eq!(lines.len(), 8);
        assert!(lines.contains(&vec![0, 1, 2]));
        assert!(lines.contains(&vec![0, 3, 6]));
        assert!(lines.contains(&vec![0, 4, 8]));
        assert!(lines.contains(&vec![2, 4, 6]));
    }

    #[test]
    fn test_empty_grid_no_lines() {
        let p = count_lines(5, &[], None);
        assert_eq!(p.complete_lines, 0);
        assert_eq!(p.completed_squares, 0);
        assert_eq!(p.total_squares, 25);
    }

    #[test]
    fn test_free_space_counts_as_filled() {
        // Middle row of a 3x3 minus the center, free space at center.
        let p = count_lines(3, &[3, 5], Some(4));
        assert_eq!(p.complete_lines, 1);
        assert_eq!(p.completed_squares, 3);
    }

    #[test]
    fn test_full_grid_counts_all_lines() {
        let all: Vec<usize> = (0..9).collect();
        let p = count_lines(3, &all, None);
        assert_eq!(p.complete_lines, 8);
    }

    #[test]
    fn test_diagonal_line() {
        let p = count_lines(3, &[0, 4, 8], None);
        assert_eq!(p.complete_lines, 1);
    }

    #[test]
    fn test_out_of_range_positions_ignored() {
        let p = count_lines(3, &[0, 40], None);
        assert_eq!(p.completed_squares, 1);
    }
}
