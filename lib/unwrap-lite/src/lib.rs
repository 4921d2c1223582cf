// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `unwrap` without the formatting machinery.
//!
//! `Result::unwrap` drags in `Debug` formatting for the error type, which
//! is real flash on this MCU. [`UnwrapLite::unwrap_lite`] panics with no
//! message instead; the panic location (kept via `#[track_caller]`) is all
//! the post-mortem needs. Use it only where failure is ruled out by
//! construction — anything that can actually fail propagates a `Result`.

#![cfg_attr(target_os = "none", no_std)]

pub trait UnwrapLite {
    type Output;

    /// Unwraps `self`, panicking without any message on the failure arm.
    fn unwrap_lite(self) -> Self::Output;
}

impl<T, E> UnwrapLite for Result<T, E> {
    type Output = T;

    #[track_caller]
    #[inline(always)]
    fn unwrap_lite(self) -> Self::Output {
        match self {
            Ok(v) => v,
            Err(_) => panic!(),
        }
    }
}

impl<T> UnwrapLite for Option<T> {
    type Output = T;

    #[track_caller]
    #[inline(always)]
    fn unwrap_lite(self) -> Self::Output {
        match self {
            Some(v) => v,
            None => panic!(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Error type with no `Debug` impl; `unwrap()` would not compile here.
    struct Opaque;

    #[test]
    fn unwraps_ok_values() {
        let r: Result<u32, Opaque> = Ok(5);
        assert_eq!(r.unwrap_lite(), 5);
        assert_eq!(Some(7).unwrap_lite(), 7);
    }

    #[test]
    #[should_panic]
    fn panics_on_err() {
        let r: Result<u32, Opaque> = Err(Opaque);
        r.unwrap_lite();
    }

    #[test]
    #[should_panic]
    fn panics_on_none() {
        Option::<u32>::None.unwrap_lite();
    }
}
