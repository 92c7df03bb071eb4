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

use std::{borrow::Cow, ffi::c_int};

use mlua_sys as ffi;

use crate::runtime::{FromObject, IntoStack, ObjectView, RuntimeResult, Stack};

impl IntoStack for bool {
    #[inline(always)]
    fn push_into(self, stack: &Stack) -> RuntimeResult<()> {
        stack.ensure(1)?;

        // Safety: Capacity reserved.
        unsafe { ffi::lua_pushboolean(stack.raw(), self as c_int) };

        Ok(())
    }
}

impl<'s> FromObject<'s> for bool {
    #[inline(always)]
    fn hint() -> Cow<'static, str> {
        Cow::Borrowed("boolean")
    }

    #[inline(always)]
    fn probe(object: &ObjectView<'s>) -> bool {
        object.is_boolean()
    }

    #[inline(always)]
    fn from_object(object: ObjectView<'s>) -> RuntimeResult<Self> {
        object.as_boolean()
    }
}

#[cfg(test)]
mod tests {
    use crate::runtime::State;

    #[test]
    fn test_boolean_is_strict() {
        let state = State::new().unwrap();

        state.with_stack(|stack| {
            let flag = stack.push(true).unwrap();
            let number = stack.push(1).unwrap();

            assert!(flag.is::<bool>());
            assert!(flag.get::<bool>().unwrap());
            assert!(!number.is::<bool>());
            assert!(number.get::<bool>().is_err());
        });
    }
}
