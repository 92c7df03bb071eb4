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

use std::borrow::Cow;

use crate::runtime::{FromObject, IntoStack, ObjectView, RuntimeResult, Stack};

impl<T: IntoStack> IntoStack for Option<T> {
    #[inline]
    fn push_into(self, stack: &Stack) -> RuntimeResult<()> {
        match self {
            Some(value) => value.push_into(stack),
            None => stack.push_nil().map(|_| ()),
        }
    }
}

impl<'s, T: FromObject<'s>> FromObject<'s> for Option<T> {
    const RETAINS_SLOT: bool = T::RETAINS_SLOT;

    #[inline(always)]
    fn hint() -> Cow<'static, str> {
        Cow::Owned(format!("{} or nil", T::hint()))
    }

    #[inline]
    fn probe(object: &ObjectView<'s>) -> bool {
        object.is_nil() || T::probe(object)
    }

    #[inline]
    fn from_object(object: ObjectView<'s>) -> RuntimeResult<Self> {
        if object.is_nil() {
            return Ok(None);
        }

        Ok(Some(T::from_object(object)?))
    }

    #[inline(always)]
    fn from_nothing() -> Option<Self> {
        Some(None)
    }
}
