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

use compact_str::CompactString;
use mlua_sys as ffi;

use crate::runtime::{FromObject, IntoStack, ObjectView, RuntimeError, RuntimeResult, Stack};

impl<'a> IntoStack for &'a str {
    #[inline(always)]
    fn push_into(self, stack: &Stack) -> RuntimeResult<()> {
        push_bytes(stack, self.as_bytes())
    }
}

impl<'a> IntoStack for &'a String {
    #[inline(always)]
    fn push_into(self, stack: &Stack) -> RuntimeResult<()> {
        push_bytes(stack, self.as_bytes())
    }
}

impl IntoStack for String {
    #[inline(always)]
    fn push_into(self, stack: &Stack) -> RuntimeResult<()> {
        push_bytes(stack, self.as_bytes())
    }
}

impl IntoStack for CompactString {
    #[inline(always)]
    fn push_into(self, stack: &Stack) -> RuntimeResult<()> {
        push_bytes(stack, self.as_bytes())
    }
}

impl<'a> IntoStack for Cow<'a, str> {
    #[inline(always)]
    fn push_into(self, stack: &Stack) -> RuntimeResult<()> {
        push_bytes(stack, self.as_bytes())
    }
}

impl<'s> FromObject<'s> for String {
    #[inline(always)]
    fn hint() -> Cow<'static, str> {
        Cow::Borrowed("string")
    }

    #[inline(always)]
    fn probe(object: &ObjectView<'s>) -> bool {
        object.is_string()
    }

    #[inline(always)]
    fn from_object(object: ObjectView<'s>) -> RuntimeResult<Self> {
        object.as_string()
    }
}

impl<'s> FromObject<'s> for CompactString {
    #[inline(always)]
    fn hint() -> Cow<'static, str> {
        Cow::Borrowed("string")
    }

    #[inline(always)]
    fn probe(object: &ObjectView<'s>) -> bool {
        object.is_string()
    }

    fn from_object(object: ObjectView<'s>) -> RuntimeResult<Self> {
        object.with_bytes(|bytes| match std::str::from_utf8(bytes) {
            Ok(string) => Ok(CompactString::from(string)),
            Err(cause) => Err(RuntimeError::Utf8 { cause }),
        })?
    }
}

fn push_bytes(stack: &Stack, bytes: &[u8]) -> RuntimeResult<()> {
    stack.ensure(1)?;

    // Safety: Capacity reserved, the engine copies the bytes.
    let _ = unsafe { ffi::lua_pushlstring(stack.raw(), bytes.as_ptr() as *const _, bytes.len()) };

    Ok(())
}
