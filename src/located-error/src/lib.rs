use std::{fmt::Display, panic::Location};

use anyhow::{Context, Result};

/// Public prelude for LocatedError.
///
/// Note that this re-exports anyhow and thiserror
pub mod prelude {
    extern crate anyhow;
    pub use anyhow::{anyhow, bail, Context, Result};

    extern crate thiserror;
    pub use thiserror::Error;

    pub use super::{loc, LocatedError, LocatedOption};
}

macro_rules! loc_caller {
    ($caller:expr) => {
        format!("[{}:{}:{}]", $caller.file(), $caller.line(), $caller.column())
    }
}

#[macro_export]
macro_rules! loc {
    ($e: expr) => {
        Err(anyhow::anyhow!(format!("[{}:{}:{}] {}", file!(), line!(), column!(), $e)))
    }
}

/// Trait extending [`anyhow::Result<T>`] with additional information regarding the location of the error (e.g. file, line and column)
///
/// # Example
/// ```should_panic
/// use anyhow::{anyhow, Result};
/// use crate::located_error::LocatedError;
///
/// // ---- Main runner
/// fn load_database(path: &str) -> Result<()> {
///     let path: &str = "/nonexistent-db.gz";
///     let file = std::fs::File::open(path)
///         .with_loc(|| format!("Failed to open database {path}") )?;
///     /* ---- decoding ensues ---- */
///     Ok(())
/// }
///
/// // ---- Main
/// fn main() -> Result<()> {
///     let path: &str = "/nonexistent-db.gz";
///     let db = load_database(path).loc("While preparing the kmer index.")?;
///     Ok(())
/// }
/// ```
/// ## This should output the following lines
/// ```Text
/// > Error: [src/lib.rs:14:26] While preparing the kmer index.
/// >
/// > Caused by:
/// >     0: [src/lib.rs:8:10] Failed to open database /nonexistent-db.gz
/// >     1: No such file or directory (os error 2)
/// ```
pub trait LocatedError<T, E> {
    /// Wrap the error value with additional context + the location at which it was called.
    fn loc<C>(self, context: C) -> Result<T, anyhow::Error>
    where
        C: Display + Send + Sync + 'static;

    /// Wrap the error value with additional context that is evaluated lazily
    /// only once an error does occur + the location at which it was called.
    fn with_loc<C, F>(self, f: F) -> Result<T, anyhow::Error>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C;
}


impl<T, E> LocatedError<T, E> for Result<T, E>
where
    E: Display + Send + Sync + 'static,
    Result<T, E>: Context<T, E>,
{
    /// Implement [`LocatedError`] for any [`Result<T, std::error::Error>`]
    ///
    /// Note that this will will inevitably convert your error into  an `anyhow::Result<T>`
    ///
    /// Furthermore, note that [`LocatedError::loc()`] is eagerly evaluated.
    /// For a lazy implementation, see [`LocatedError::with_loc()`]
    #[track_caller]
    fn loc<C>(self, context: C) -> Result<T, anyhow::Error>
    where
        C: Display + Send + Sync + 'static
    {
        match self {
            Ok(ok) => Ok(ok),
            Err(_) => {
                let loc = loc_caller!(Location::caller());
                self.context(format!("{loc} {context}"))
            }
        }
    }

    /// Implement [`LocatedError`] for any [`Result<T, std::error::Error>`]
    ///
    /// Note that this will will inevitably convert your error into  an `anyhow::Result<T>`
    ///
    /// Furthermore, note that [`LocatedError::with_loc()`] is lazily evaluated.
    /// For an eager implementation, see [`LocatedError::loc()`]
    #[track_caller]
    fn with_loc<C, F>(self, f: F) -> Result<T, anyhow::Error>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C
    {
        match self {
            Ok(ok) => Ok(ok),
            Err(_) => {
                let caller = std::panic::Location::caller();
                let loc = format!("[{}:{}:{}]", caller.file(), caller.line(), caller.column());
                self.with_context( || format!("{loc} {}", f()))
            }
        }

    }
}


/// Trait extending [`Option<T>`] with additional information regarding the location of the error (e.g. file, line and column)
///
/// # Example
/// ```should_panic
/// use anyhow::{anyhow, Result};
/// use crate::located_error::{LocatedOption, LocatedError};
///
/// // ---- Main runner
/// fn maybe_reads(n: usize) -> impl Iterator<Item=u8> + 'static {
///     vec![0; n].into_iter() // This is dumb and could fail at any time...
/// }
///
/// fn compute(n: usize) -> Result<()> {
///     let vec = maybe_reads(n).next() // Oh, that's dangerous.
///         .loc("Unexpected empty read batch")?;
///     /* ---- expensive computation ensues ---- */
///     Ok(())
/// }
///
/// // ---- Main
/// fn main() -> Result<()> {
///     let n = 0;
///     let file = compute(n)
///         .with_loc(||format!("While attempting to run computations with n={n}"))?;
///     Ok(())
/// }
/// ```
/// ## This should output the following lines
/// ```Text
/// > Error: [src/lib.rs:21:10] While attempting to run computations with n=0
///
/// > Caused by:
/// >     [src/lib.rs:12:17] Unexpected empty read batch
/// ```
pub trait LocatedOption<T> {
    /// Wrap the error value with additional context + the location at which it was called.
    fn loc<C>(self, context: C) -> Result<T, anyhow::Error>
    where
        C: Display + Send + Sync + 'static;

    /// Wrap the error value with additional context that is evaluated lazily
    /// only once an error does occur + the location at which it was called.
    fn with_loc<C, F>(self, f: F) -> Result<T, anyhow::Error>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C;
}


impl<T> LocatedOption<T> for Option<T>
{
    #[track_caller]
    fn loc<C>(self, context: C) -> Result<T, anyhow::Error>
    where
        C: Display + Send + Sync + 'static
    {
        match self {
            Some(ok) => Ok(ok),
            None     => {
                let loc = loc_caller!(Location::caller());
                self.context(format!("{loc} {context}"))
            }
        }
    }

    #[track_caller]
    fn with_loc<C, F>(self, f: F) -> Result<T, anyhow::Error>
    where
        C: Display + Send + Sync + 'static,
        F: FnOnce() -> C
    {
        match self {
            Some(ok) => Ok(ok),
            None     => {
                let caller = std::panic::Location::caller();
                let loc = format!("[{}:{}:{}]", caller.file(), caller.line(), caller.column());
                self.with_context( || format!("{loc} {}", f()))
            }
        }

    }
}
