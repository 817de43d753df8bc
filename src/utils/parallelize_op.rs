/// `parallelize_op!` macro for repeating an operation across
/// chunks of an array's slow axis, in parallel.
///
/// - `parallelize_op!(array, chunk_size, items, op)`
///
///     Divides `array` into chunks of `chunk_size` along its 0th
///     axis and calls `op` on each chunk together with the
///     matching slice of `items` (`items[k]` corresponds to
///     `array[k, ...]`). The operation should have the signature
///     `op(items : &[Item], chunk : &mut ArrayViewMut) -> Result<R, FramesError>`.
///
///     Evaluates to `Result<Vec<R>, FramesError>` with one entry
///     per chunk, in chunk order, so results can be flattened back
///     into `items` order. The first error aborts the whole
///     operation.
///
///     <br>
///
/// - `parallelize_op!(chunk_size, items, op)`
///
///     The same, but without an array: `op(items : &[Item])` is
///     called on consecutive chunks of `items`.
///
/// Requires `rayon::prelude::*`, `ndarray::Axis` and
/// `FramesError` to be in scope at the call site.
macro_rules! parallelize_op {

    (   $array : ident,
        $chunk_size : expr,
        $items : expr,
        $op : expr
    ) => {{
        let chunk_size : usize = ($chunk_size).max(1);
        let items = &$items[..];

        // Create an array of chunks to parallelize
        let array_chunks : Vec<_> = $array.axis_chunks_iter_mut(Axis(0), chunk_size).collect();

        array_chunks.into_par_iter().enumerate().map(
            |(chunk_idx, mut chunk)| {
            // Get the items corresponding to the chunk
            let start = chunk_idx * chunk_size;
            let end = ((chunk_idx + 1) * chunk_size).min(items.len());

            $op(&items[start..end], &mut chunk)
            }
        ).collect::<Result<Vec<_>, FramesError>>()
    }};

    (   $chunk_size : expr,
        $items : expr,
        $op : expr
    ) => {{
        let chunk_size : usize = ($chunk_size).max(1);
        let items = &$items[..];

        items.par_chunks(chunk_size).map(
            |chunk| $op(chunk)
        ).collect::<Result<Vec<_>, FramesError>>()
    }};
}

pub (crate) use parallelize_op;
