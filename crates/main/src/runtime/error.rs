////////////////////////////////////////////////////////////////////////////////
// This file is part of "Ad Astra", an embeddable scripting programming       //
// language platform.                                                         //
//                                                                            //
// This work is proprietary software with source-available code.              //
//                                                                            //
// To copy, use, distribute, or contribute to this work, you must agree to    //
// the terms of the General License Agreement:                                //
//                                                                            //
// https://github.com/Eliah-Lakhin/ad-astra/blob/master/EULA.md               //
//                                                                            //
// The agreement grants a Basic Commercial License, allowing you to use       //
// this work in non-commercial and limited commercial products with a total   //
// gross revenue cap. To remove this commercial limit for one of your         //
// products, you must acquire a Full Commercial License.                      //
//                                                                            //
// If you contribute to the source code, documentation, or related materials, //
// you must grant me an exclusive license to these contributions.             //
// Contributions are governed by the "Contributions" section of the General   //
// License Agreement.                                                         //
//                                                                            //
// Copying the work in parts is strictly forbidden, except as permitted       //
// under the General License Agreement.                                       //
//                                                                            //
// If you do not or cannot agree to the terms of this Agreement,              //
// do not use this work.                                                      //
//                                                                            //
// This work is provided "as is", without any warranties, express or implied, //
// except where such disclaimers are legally invalid.                         //
//                                                                            //
// Copyright (c) 2024 Ilya Lakhin (Илья Александрович Лахин).                 //
// All rights reserved.                                                       //
////////////////////////////////////////////////////////////////////////////////

use std::{
    borrow::Cow,
    error::Error as StdError,
    ffi::c_int,
    fmt::{Debug, Display, Formatter},
    result::Result as StdResult,
    str::Utf8Error,
};

use mlua_sys as ffi;

use crate::runtime::ValueKind;

/// A result of a runtime API call, which can either be a normal value or a
/// [RuntimeError].
pub type RuntimeResult<T> = StdResult<T, RuntimeError>;

/// Represents any error that may occur while exchanging values with the Lua
/// engine.
///
/// Every operation that returns this error restores the height of the stack
/// frame it was working with before the error is returned, so the caller can
/// keep using the frame.
#[derive(Clone, Debug, PartialEq)]
#[non_exhaustive]
pub enum RuntimeError {
    /// A stack slot does not hold a value of the requested shape.
    TypeMismatch {
        /// A name of the expected shape.
        expected: Cow<'static, str>,

        /// The kind of value actually found in the slot.
        found: ValueKind,
    },

    /// A [TypeMismatch](Self::TypeMismatch) that occurred while converting
    /// an argument of a host function called from Lua.
    ArgumentTypeMismatch {
        /// A name of the expected shape.
        expected: Cow<'static, str>,

        /// The kind of value actually passed.
        found: ValueKind,

        /// 1-based position of the argument.
        argument: usize,
    },

    /// An attempt to resolve a released or never initialized
    /// [Reference](crate::runtime::Reference).
    InvalidReference,

    /// The engine cannot grow the stack by the requested number of slots.
    StackCapacityExceeded {
        /// The number of extra slots requested.
        requested: usize,
    },

    /// An attempt to pop more values than the stack frame holds.
    StackUnderflow {
        /// The number of values requested to pop.
        requested: i32,

        /// The number of values available in the frame.
        available: i32,
    },

    /// A raw host function reports more results than its frame holds, or a
    /// negative number of results.
    InvalidResultCount {
        /// The number of results reported by the function.
        returned: i32,

        /// The number of values in the function's frame.
        available: i32,
    },

    /// A stack index does not address a slot of the current frame.
    InvalidIndex {
        /// The index as it was provided.
        index: i32,
    },

    /// The storage buffer allocated for a foreign object cannot hold the
    /// object with its alignment requirements.
    AlignmentFailure {
        /// Rust name of the object's type.
        type_name: &'static str,
    },

    /// A host function called from Lua failed or panicked.
    ForeignCall {
        /// A message of the failure.
        message: String,
    },

    /// An attempt to register a user type that has already been registered
    /// in this engine.
    DuplicateUserType {
        /// The name of the type.
        type_name: String,
    },

    /// An attempt to override a meta-method the bridge reserves for itself.
    ReservedMetaMethod {
        /// The meta-method key.
        key: &'static str,
    },

    /// A value conversion pushed a number of slots other than one in a
    /// context that expects exactly one value.
    MultipleValues {
        /// The number of slots actually pushed.
        pushed: i32,
    },

    /// An attempt to push a value that belongs to another stack frame of
    /// the same thread.
    ForeignFrame,

    /// An attempt to move a value between two different engine instances.
    ForeignEngine,

    /// A numeric value cannot be represented by the requested Rust numeric
    /// type.
    NumberCast {
        /// Rust name of the source type.
        from: &'static str,

        /// Rust name of the destination type.
        to: &'static str,

        /// The reason of the failure.
        cause: NumberCastCause,

        /// The source value.
        value: String,
    },

    /// A Lua string is not a valid UTF-8 sequence.
    Utf8 {
        /// The decoding error.
        cause: Utf8Error,
    },

    /// A Lua error raised while running Lua code or a meta-method.
    Script {
        /// The error message produced by the engine.
        message: String,
    },

    /// The engine failed to compile a chunk of Lua source code.
    Syntax {
        /// The error message produced by the compiler.
        message: String,
    },

    /// The engine ran out of memory.
    OutOfMemory,

    /// An error occurred inside the error handler of a protected call.
    ErrorHandler,

    /// None of the functions of an
    /// [Overload](crate::runtime::Overload) accepts the provided arguments.
    NoMatchingOverload,

    /// A foreign object is accessed after its finalizer has run.
    ObjectDestroyed {
        /// Rust name of the object's type.
        type_name: &'static str,
    },

    /// An attempt to mutably borrow a foreign object that is currently
    /// borrowed for reading by a running host function.
    ReadToWrite {
        /// Rust name of the object's type.
        type_name: &'static str,
    },

    /// An attempt to borrow a foreign object for reading while a running
    /// host function borrows it mutably.
    WriteToRead {
        /// Rust name of the object's type.
        type_name: &'static str,
    },

    /// An attempt to mutably borrow a foreign object twice.
    WriteToWrite {
        /// Rust name of the object's type.
        type_name: &'static str,
    },

    /// Too many simultaneous borrows of a single foreign object.
    BorrowLimit {
        /// Rust name of the object's type.
        type_name: &'static str,
    },

    /// Lua code assigns a field of a user type that has no such field and
    /// no `__newindex` hook.
    UnknownField {
        /// The field key as formatted by Lua.
        field: String,

        /// The registered name of the user type.
        type_name: String,
    },

    /// Lua code assigns a field that only has a getter.
    ReadOnlyField {
        /// The field name.
        field: String,

        /// The registered name of the user type.
        type_name: String,
    },

    /// Lua code reads a field that only has a setter.
    WriteOnlyField {
        /// The field name.
        field: String,

        /// The registered name of the user type.
        type_name: String,
    },
}

impl Display for RuntimeError {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TypeMismatch { expected, found } => {
                formatter.write_fmt(format_args!("{expected} expected, got {found}"))
            }

            Self::ArgumentTypeMismatch {
                expected,
                found,
                argument,
            } => formatter.write_fmt(format_args!(
                "bad argument #{argument} ({expected} expected, got {found})"
            )),

            Self::InvalidReference => formatter.write_str("invalid reference"),

            Self::StackCapacityExceeded { requested } => formatter.write_fmt(format_args!(
                "exceeded maximum stack size while reserving {requested} slots"
            )),

            Self::StackUnderflow {
                requested,
                available,
            } => formatter.write_fmt(format_args!(
                "cannot pop {requested} values from a stack frame of {available} values"
            )),

            Self::InvalidResultCount {
                returned,
                available,
            } => formatter.write_fmt(format_args!(
                "host function returned {returned} results from a stack frame of {available} values"
            )),

            Self::InvalidIndex { index } => {
                formatter.write_fmt(format_args!("invalid stack index {index}"))
            }

            Self::AlignmentFailure { type_name } => {
                formatter.write_fmt(format_args!("failed to align object of type {type_name}"))
            }

            Self::ForeignCall { message } => formatter.write_str(message),

            Self::DuplicateUserType { type_name } => formatter.write_fmt(format_args!(
                "user type {type_name} has already been registered"
            )),

            Self::ReservedMetaMethod { key } => formatter.write_fmt(format_args!(
                "meta-method {key} is reserved and cannot be overridden"
            )),

            Self::MultipleValues { pushed } => formatter.write_fmt(format_args!(
                "expected a single value to be pushed, got {pushed}"
            )),

            Self::ForeignFrame => formatter.write_str("both stacks must be active"),

            Self::ForeignEngine => {
                formatter.write_str("cannot move values between different Lua engines")
            }

            Self::NumberCast {
                from,
                to,
                cause,
                value,
            } => {
                use NumberCastCause::*;

                match cause {
                    Infinite => formatter.write_fmt(format_args!(
                        "cannot cast infinity value of {from} type to {to}"
                    )),

                    NAN => formatter
                        .write_fmt(format_args!("cannot cast NAN value of {from} type to {to}")),

                    Overflow => formatter.write_fmt(format_args!(
                        "cannot cast {value} of {from} type to {to}, the value is too large"
                    )),

                    Underflow => formatter.write_fmt(format_args!(
                        "cannot cast {value} of {from} type to {to}, the value is too small"
                    )),
                }
            }

            Self::Utf8 { .. } => formatter.write_str("invalid utf-8 encoding"),

            Self::Script { message } => formatter.write_str(message),

            Self::Syntax { message } => formatter.write_str(message),

            Self::OutOfMemory => formatter.write_str("out of memory"),

            Self::ErrorHandler => formatter.write_str("error handler failed"),

            Self::NoMatchingOverload => formatter.write_str("no matching overload found"),

            Self::ObjectDestroyed { type_name } => formatter.write_fmt(format_args!(
                "object of type {type_name} has been destroyed"
            )),

            Self::ReadToWrite { type_name } => formatter.write_fmt(format_args!(
                "cannot borrow object of type {type_name} mutably, it is borrowed for reading"
            )),

            Self::WriteToRead { type_name } => formatter.write_fmt(format_args!(
                "cannot borrow object of type {type_name}, it is borrowed mutably"
            )),

            Self::WriteToWrite { type_name } => formatter.write_fmt(format_args!(
                "cannot borrow object of type {type_name} mutably more than once"
            )),

            Self::BorrowLimit { type_name } => formatter.write_fmt(format_args!(
                "too many active borrows of object of type {type_name}"
            )),

            Self::UnknownField { field, type_name } => formatter.write_fmt(format_args!(
                "cannot assign field '{field}' of user type '{type_name}'"
            )),

            Self::ReadOnlyField { field, type_name } => formatter.write_fmt(format_args!(
                "field '{field}' of user type '{type_name}' is read-only"
            )),

            Self::WriteOnlyField { field, type_name } => formatter.write_fmt(format_args!(
                "field '{field}' of user type '{type_name}' is write-only"
            )),
        }
    }
}

impl StdError for RuntimeError {
    #[inline(always)]
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Utf8 { cause } => Some(cause),
            _ => None,
        }
    }
}

impl RuntimeError {
    /// Turns a [TypeMismatch](Self::TypeMismatch) error into the
    /// [ArgumentTypeMismatch](Self::ArgumentTypeMismatch) error of the
    /// specified 1-based argument. Other errors are returned as is.
    #[inline]
    pub fn at_argument(self, argument: usize) -> Self {
        match self {
            Self::TypeMismatch { expected, found } => Self::ArgumentTypeMismatch {
                expected,
                found,
                argument,
            },

            other => other,
        }
    }

    /// Returns true if this error describes a value of unexpected shape.
    #[inline(always)]
    pub fn is_type_mismatch(&self) -> bool {
        match self {
            Self::TypeMismatch { .. } | Self::ArgumentTypeMismatch { .. } => true,
            _ => false,
        }
    }

    // Maps the status code of a protected engine call.
    pub(crate) fn from_status(status: c_int, message: String) -> Self {
        match status {
            ffi::LUA_ERRSYNTAX => Self::Syntax { message },
            ffi::LUA_ERRMEM => Self::OutOfMemory,
            ffi::LUA_ERRERR => Self::ErrorHandler,
            _ => Self::Script { message },
        }
    }
}

/// A type of the [RuntimeError::NumberCast] error.
///
/// This object describes the reason why the source numeric value cannot be
/// converted into the destination numeric value.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum NumberCastCause {
    /// The target type does not support representation of infinite numbers.
    Infinite,

    /// The target type does not support representation of NaN numbers.
    NAN,

    /// The source numeric value is too large for the range of the target type.
    Overflow,

    /// The source numeric value is too small for the range of the target type.
    Underflow,
}

#[cfg(test)]
mod tests {
    use crate::runtime::{RuntimeError, ValueKind};

    #[test]
    fn test_argument_mismatch_message() {
        let error = RuntimeError::TypeMismatch {
            expected: "string".into(),
            found: ValueKind::Number,
        };

        assert_eq!(error.to_string(), "string expected, got number");

        let error = error.at_argument(2);

        assert_eq!(
            error.to_string(),
            "bad argument #2 (string expected, got number)",
        );

        assert!(error.is_type_mismatch());
    }

    #[test]
    fn test_non_mismatch_is_kept() {
        let error = RuntimeError::InvalidReference.at_argument(3);

        assert_eq!(error, RuntimeError::InvalidReference);
        assert!(!error.is_type_mismatch());
    }
}
