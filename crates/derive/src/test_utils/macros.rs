//! Macros used across test utilities.

/// A shorthand syntax for constructing [Frame]s.
///
/// [Frame]: crate::types::Frame
#[macro_export]
macro_rules! frame {
    ($id:expr, $number:expr, $data:expr, $is_last:expr) => {
        $crate::types::Frame { id: [$id; 16], number: $number, data: $data, is_last: $is_last }
    };
}

/// A shorthand syntax for constructing a list of [Frame]s of one channel, the last one closing it.
///
/// [Frame]: crate::types::Frame
#[macro_export]
macro_rules! frames {
    ($id:expr, $number:expr, $data:expr, $count:expr) => {{
        let mut frames = vec![$crate::frame!($id, $number, $data, false); $count];
        for (i, frame) in frames.iter_mut().enumerate() {
            frame.number = $number + i as u16;
        }
        frames[$count - 1].is_last = true;
        frames
    }};
}
