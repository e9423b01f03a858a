//! Internal macros.
//!
//! `le_getters!` expands to `#[inline]` getters over
//! `zerocopy::little_endian` wrapper fields. The checker never mutates a
//! page, so no setters are generated.
//!
//! `bail_corrupted!` and `ensure_sound!` raise the structural-corruption
//! error kind with the index name and on-disk location attached, keeping
//! raise sites as terse as `eyre::bail!`/`ensure!`.

/// Generates getter methods for zerocopy little-endian fields.
#[macro_export]
macro_rules! le_getters {
    ($($field:ident : $native_ty:ty),* $(,)?) => {
        $(
            #[inline]
            pub fn $field(&self) -> $native_ty {
                self.$field.get()
            }
        )*
    };
}

/// Returns a structural-corruption error for `$loc` in `$index`.
#[macro_export]
macro_rules! bail_corrupted {
    ($index:expr, $loc:expr, $($fmt:tt)*) => {
        return Err($crate::error::CheckError::corrupted(
            $index,
            $loc,
            format!($($fmt)*),
        )
        .into())
    };
}

/// Like `eyre::ensure!`, but failing the condition raises structural
/// corruption at `$loc`.
#[macro_export]
macro_rules! ensure_sound {
    ($cond:expr, $index:expr, $loc:expr, $($fmt:tt)*) => {
        if !$cond {
            $crate::bail_corrupted!($index, $loc, $($fmt)*);
        }
    };
}
