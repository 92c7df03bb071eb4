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

use crate::runtime::{
    coercion::mismatch,
    FromObject,
    IntoStack,
    ObjectView,
    PullMulti,
    PushMulti,
    RuntimeResult,
    Stack,
};

/// The Lua `nil` value.
///
/// Pushing `Nil` pushes `nil`. Converting into `Nil` accepts `nil` or a
/// missing value, and rejects anything else.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Nil;

impl Debug for Nil {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str("nil")
    }
}

impl Display for Nil {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str("nil")
    }
}

impl IntoStack for Nil {
    #[inline(always)]
    fn push_into(self, stack: &Stack) -> RuntimeResult<()> {
        stack.push_nil().map(|_| ())
    }
}

impl<'s> FromObject<'s> for Nil {
    #[inline(always)]
    fn hint() -> Cow<'static, str> {
        Cow::Borrowed("nil")
    }

    #[inline(always)]
    fn probe(object: &ObjectView<'s>) -> bool {
        object.is_nil()
    }

    #[inline]
    fn from_object(object: ObjectView<'s>) -> RuntimeResult<Self> {
        match object.is_nil() {
            true => Ok(Self),
            false => Err(mismatch::<Self>(&object)),
        }
    }

    #[inline(always)]
    fn from_nothing() -> Option<Self> {
        Some(Self)
    }
}

impl PushMulti for () {
    #[inline(always)]
    fn push_multi(self, _stack: &Stack) -> RuntimeResult<i32> {
        Ok(0)
    }
}

impl<'s> PullMulti<'s> for () {
    #[inline(always)]
    fn result_count() -> Option<i32> {
        Some(0)
    }

    #[inline(always)]
    fn probe_multi(_stack: &'s Stack, _position: &mut i32) -> bool {
        true
    }

    #[inline(always)]
    fn pull_multi(_stack: &'s Stack, _position: &mut i32) -> RuntimeResult<Self> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{runtime::State, Nil};

    #[test]
    fn test_nil() {
        let state = State::new().unwrap();

        state.with_stack(|stack| {
            let nil = stack.push(Nil).unwrap();

            assert!(nil.is_nil());
            assert_eq!(nil.get::<Nil>().unwrap(), Nil);
            assert_eq!(nil.to_string(), "nil");

            let number = stack.push(1).unwrap();

            assert!(!number.is::<Nil>());
            assert!(number.get::<Nil>().is_err());

            assert_eq!(stack.push_multi(()).unwrap(), 0);
            assert_eq!(stack.top(), 2);
        });
    }
}
