// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Declarative macros for reducing boilerplate.

/// Map unit enum variants to fixed wire names.
///
/// Generates an inherent `as_str()` and a `Display` impl that writes it, so the
/// same literal is used in metadata file names, jobinfo documents and logs.
///
/// ```ignore
/// crate::simple_display! {
///     Phase {
///         Split => "split",
///         Main => "main",
///     }
/// }
/// ```
#[macro_export]
macro_rules! simple_display {
    ($enum:ty { $( $variant:ident => $str:expr ),+ $(,)? }) => {
        impl $enum {
            /// Wire name of this variant.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( Self::$variant => $str, )+
                }
            }
        }

        impl std::fmt::Display for $enum {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}
