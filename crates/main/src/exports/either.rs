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
    fmt::{Debug, Display, Formatter},
};

use crate::runtime::{coercion::mismatch, FromObject, IntoStack, ObjectView, RuntimeResult, Stack};

/// A value of one of two alternative types.
///
/// When converting a Lua value, the `L` alternative is tried first, and the
/// `R` alternative is used only if the value does not match `L`.
///
/// ```
/// use ad_astra_lua::{runtime::State, Either};
///
/// let state = State::new().unwrap();
///
/// state.with_stack(|stack| {
///     let value = stack.push(10).unwrap();
///
///     assert_eq!(
///         value.get::<Either<String, i64>>().unwrap(),
///         Either::Right(10),
///     );
/// });
/// ```
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum Either<L, R> {
    Left(L),
    Right(R),
}

impl<L: Debug, R: Debug> Debug for Either<L, R> {
    #[inline]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Left(value) => Debug::fmt(value, formatter),
            Self::Right(value) => Debug::fmt(value, formatter),
        }
    }
}

impl<L: Display, R: Display> Display for Either<L, R> {
    #[inline]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Left(value) => Display::fmt(value, formatter),
            Self::Right(value) => Display::fmt(value, formatter),
        }
    }
}

impl<L, R> Either<L, R> {
    /// Returns the left alternative, if any.
    #[inline(always)]
    pub fn left(self) -> Option<L> {
        match self {
            Self::Left(value) => Some(value),
            Self::Right(_) => None,
        }
    }

    /// Returns the right alternative, if any.
    #[inline(always)]
    pub fn right(self) -> Option<R> {
        match self {
            Self::Left(_) => None,
            Self::Right(value) => Some(value),
        }
    }

    #[inline(always)]
    pub fn is_left(&self) -> bool {
        match self {
            Self::Left(_) => true,
            Self::Right(_) => false,
        }
    }

    #[inline(always)]
    pub fn is_right(&self) -> bool {
        !self.is_left()
    }
}

impl<L: IntoStack, R: IntoStack> IntoStack for Either<L, R> {
    #[inline]
    fn push_into(self, stack: &Stack) -> RuntimeResult<()> {
        match self {
            Self::Left(value) => value.push_into(stack),
            Self::Right(value) => value.push_into(stack),
        }
    }
}

impl<'s, L: FromObject<'s>, R: FromObject<'s>> FromObject<'s> for Either<L, R> {
    const RETAINS_SLOT: bool = L::RETAINS_SLOT || R::RETAINS_SLOT;

    #[inline(always)]
    fn hint() -> Cow<'static, str> {
        Cow::Owned(format!("{} or {}", L::hint(), R::hint()))
    }

    #[inline]
    fn probe(object: &ObjectView<'s>) -> bool {
        L::probe(object) || R::probe(object)
    }

    fn from_object(object: ObjectView<'s>) -> RuntimeResult<Self> {
        if L::probe(&object) {
            return Ok(Self::Left(L::from_object(object)?));
        }

        if R::probe(&object) {
            return Ok(Self::Right(R::from_object(object)?));
        }

        Err(mismatch::<Self>(&object))
    }

    #[inline]
    fn from_nothing() -> Option<Self> {
        if let Some(left) = L::from_nothing() {
            return Some(Self::Left(left));
        }

        R::from_nothing().map(Self::Right)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        runtime::{RuntimeError, State, ValueKind},
        Either,
    };

    #[test]
    fn test_either_order() {
        let state = State::new().unwrap();

        state.with_stack(|stack| {
            let integer = stack.push(7).unwrap();

            assert!(!integer.is::<String>());
            assert!(integer.is::<i64>());
            assert_eq!(
                integer.get::<Either<String, i64>>().unwrap(),
                Either::Right(7)
            );

            let float = stack.push(2.5).unwrap();

            assert_eq!(
                float.get::<Either<f64, f32>>().unwrap(),
                Either::Left(2.5)
            );
        });
    }

    #[test]
    fn test_either_mismatch() {
        let state = State::new().unwrap();

        state.with_stack(|stack| {
            let flag = stack.push(true).unwrap();

            let error = flag.get::<Either<String, i64>>().unwrap_err();

            assert_eq!(
                error,
                RuntimeError::TypeMismatch {
                    expected: "string or integer".into(),
                    found: ValueKind::Boolean,
                }
            );

            assert_eq!(error.to_string(), "string or integer expected, got boolean");
        });
    }
}
