//! Evaluation of top-level moves, sequentially or on a scoped thread pool.

use scoped_threadpool::Pool;

/// Evaluate every move and return the results in move order. `evaluate` gets the move's index and
/// may return `None` to skip it (used when the time budget runs out).
///
/// With one thread the moves are evaluated in order on the calling thread, so a deadline check
/// inside `evaluate` cuts the remaining moves. With more threads every move is handed to the pool.
pub(crate) fn map_moves<M, T, F>(moves: &[M], threads: usize, evaluate: F) -> Vec<Option<T>>
where
    M: Sync,
    T: Send,
    F: Fn(usize, &M) -> Option<T> + Sync,
{
    if threads <= 1 || moves.len() <= 1 {
        return moves
            .iter()
            .enumerate()
            .map(|(i, move_)| evaluate(i, move_))
            .collect();
    }

    let mut results: Vec<Option<T>> = moves.iter().map(|_| None).collect();
    let mut pool = Pool::new(threads.min(moves.len()) as u32);
    let evaluate = &evaluate;
    pool.scoped(|scoped| {
        for (i, (slot, move_)) in results.iter_mut().zip(moves).enumerate() {
            scoped.execute(move || {
                *slot = evaluate(i, move_);
            });
        }
    });
    results
}

#[test]
fn test_results_keep_move_order() {
    let moves: Vec<usize> = (0..17).collect();
    let sequential = map_moves(&moves, 1, |i, &m| Some(i * 100 + m));
    let pooled = map_moves(&moves, 4, |i, &m| Some(i * 100 + m));
    assert_eq!(sequential, pooled);
    assert_eq!(pooled[3], Some(303));
}

#[test]
fn test_skipped_moves_are_none() {
    let moves = ['a', 'b', 'c'];
    let results = map_moves(&moves, 2, |i, &m| if i == 1 { None } else { Some(m) });
    assert_eq!(results, vec![Some('a'), None, Some('c')]);
}
