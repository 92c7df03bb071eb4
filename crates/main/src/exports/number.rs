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
    any::{type_name, TypeId},
    borrow::Cow,
    fmt::Display,
    mem::transmute_copy,
    result::Result as StdResult,
};

use mlua_sys as ffi;

use crate::{
    report::system_panic,
    runtime::{
        FromObject,
        IntoStack,
        NumberCastCause,
        ObjectView,
        RuntimeError,
        RuntimeResult,
        Stack,
    },
};

// Integers that always fit into the Lua integer.
macro_rules! impl_lossless_int {
    ($($ty:ty),+ $(,)?) => {
        $(
        impl IntoStack for $ty {
            #[inline(always)]
            fn push_into(self, stack: &Stack) -> RuntimeResult<()> {
                push_integer(stack, ffi::lua_Integer::from(self))
            }
        }
        )+
    };
}

// Integers that may exceed the range of the Lua integer.
macro_rules! impl_wide_int {
    ($($ty:ty),+ $(,)?) => {
        $(
        impl IntoStack for $ty {
            #[inline(always)]
            fn push_into(self, stack: &Stack) -> RuntimeResult<()> {
                push_integer(stack, CastTo::<i64>::cast_to(self)?)
            }
        }
        )+
    };
}

// Integers narrower than the Lua integer, or of different signedness.
macro_rules! impl_from_int {
    ($($ty:ty),+ $(,)?) => {
        $(
        impl<'s> FromObject<'s> for $ty {
            #[inline(always)]
            fn hint() -> Cow<'static, str> {
                Cow::Borrowed("integer")
            }

            #[inline(always)]
            fn probe(object: &ObjectView<'s>) -> bool {
                object.is_number()
            }

            fn from_object(object: ObjectView<'s>) -> RuntimeResult<Self> {
                match object.is_integer() {
                    true => CastTo::<$ty>::cast_to(object.as_integer()?),
                    false => CastTo::<$ty>::cast_to(object.as_number()?),
                }
            }
        }
        )+
    };
}

impl_lossless_int!(i8, i16, i32, i64, u8, u16, u32);

impl_wide_int!(u64, isize, usize);

impl_from_int!(i8, i16, i32, u8, u16, u32, u64, isize, usize);

impl<'s> FromObject<'s> for i64 {
    #[inline(always)]
    fn hint() -> Cow<'static, str> {
        Cow::Borrowed("integer")
    }

    #[inline(always)]
    fn probe(object: &ObjectView<'s>) -> bool {
        object.is_number()
    }

    fn from_object(object: ObjectView<'s>) -> RuntimeResult<Self> {
        match object.is_integer() {
            true => object.as_integer(),
            false => CastTo::<i64>::cast_to(object.as_number()?),
        }
    }
}

impl IntoStack for f64 {
    #[inline(always)]
    fn push_into(self, stack: &Stack) -> RuntimeResult<()> {
        push_number(stack, self)
    }
}

impl IntoStack for f32 {
    #[inline(always)]
    fn push_into(self, stack: &Stack) -> RuntimeResult<()> {
        push_number(stack, f64::from(self))
    }
}

impl<'s> FromObject<'s> for f64 {
    #[inline(always)]
    fn hint() -> Cow<'static, str> {
        Cow::Borrowed("number")
    }

    #[inline(always)]
    fn probe(object: &ObjectView<'s>) -> bool {
        object.is_number()
    }

    #[inline(always)]
    fn from_object(object: ObjectView<'s>) -> RuntimeResult<Self> {
        object.as_number()
    }
}

impl<'s> FromObject<'s> for f32 {
    #[inline(always)]
    fn hint() -> Cow<'static, str> {
        Cow::Borrowed("number")
    }

    #[inline(always)]
    fn probe(object: &ObjectView<'s>) -> bool {
        object.is_number()
    }

    #[inline(always)]
    fn from_object(object: ObjectView<'s>) -> RuntimeResult<Self> {
        CastTo::<f32>::cast_to(object.as_number()?)
    }
}

#[inline(always)]
fn push_integer(stack: &Stack, value: ffi::lua_Integer) -> RuntimeResult<()> {
    stack.ensure(1)?;

    // Safety: Capacity reserved.
    unsafe { ffi::lua_pushinteger(stack.raw(), value) };

    Ok(())
}

#[inline(always)]
fn push_number(stack: &Stack, value: f64) -> RuntimeResult<()> {
    stack.ensure(1)?;

    // Safety: Capacity reserved.
    unsafe { ffi::lua_pushnumber(stack.raw(), value as ffi::lua_Number) };

    Ok(())
}

trait CastTo<To> {
    fn cast_to(self) -> RuntimeResult<To>;
}

impl<From, To> CastTo<To> for From
where
    From: Display + Copy + 'static,
    To: cast::From<From> + 'static,
    <To as cast::From<From>>::Output: 'static,
{
    fn cast_to(self) -> RuntimeResult<To> {
        let to = <To as cast::From<From>>::cast(self);

        let to_id = TypeId::of::<To>();
        let to_result_id = TypeId::of::<StdResult<To, cast::Error>>();

        return match TypeId::of::<<To as cast::From<From>>::Output>() {
            id if id == to_id => {
                // Safety: TypeId is checked.
                Ok(unsafe { transmute_copy::<<To as cast::From<From>>::Output, To>(&to) })
            }

            id if id == to_result_id => {
                // Safety: TypeId is checked.
                let result = unsafe {
                    transmute_copy::<<To as cast::From<From>>::Output, StdResult<To, cast::Error>>(
                        &to,
                    )
                };

                match result {
                    Ok(to) => Ok(to),
                    Err(cause) => {
                        let cause = match cause {
                            cast::Error::Infinite => NumberCastCause::Infinite,
                            cast::Error::NaN => NumberCastCause::NAN,
                            cast::Error::Overflow => NumberCastCause::Overflow,
                            cast::Error::Underflow => NumberCastCause::Underflow,
                        };

                        Err(RuntimeError::NumberCast {
                            from: type_name::<From>(),
                            to: type_name::<To>(),
                            cause,
                            value: self.to_string(),
                        })
                    }
                }
            }

            _ => {
                system_panic!("Cast Output format has been changed.")
            }
        };
    }
}

#[cfg(test)]
mod tests {
    use crate::runtime::{NumberCastCause, RuntimeError, State};

    #[test]
    fn test_integer_round_trip() {
        let state = State::new().unwrap();

        state.with_stack(|stack| {
            for value in [i64::MIN, -1, 0, 1, i64::MAX] {
                assert_eq!(stack.push(value).unwrap().get::<i64>().unwrap(), value);
            }

            assert_eq!(stack.push(200u8).unwrap().get::<u8>().unwrap(), 200);
            assert_eq!(stack.push(-7i16).unwrap().get::<i16>().unwrap(), -7);
            assert_eq!(
                stack.push(usize::MAX >> 1).unwrap().get::<usize>().unwrap(),
                usize::MAX >> 1,
            );
        });
    }

    #[test]
    fn test_integer_range_is_checked() {
        let state = State::new().unwrap();

        state.with_stack(|stack| {
            let large = stack.push(300).unwrap();

            assert!(large.is::<u8>());

            match large.get::<u8>() {
                Err(RuntimeError::NumberCast { cause, .. }) => {
                    assert_eq!(cause, NumberCastCause::Overflow)
                }
                other => panic!("unexpected result {other:?}"),
            }

            let negative = stack.push(-1).unwrap();

            assert!(negative.get::<u32>().is_err());

            let top = stack.top();

            assert!(stack.push(u64::MAX).is_err());
            assert_eq!(stack.top(), top);
        });
    }

    #[test]
    fn test_float_to_integer() {
        let state = State::new().unwrap();

        state.with_stack(|stack| {
            let float = stack.push(1.2).unwrap();

            assert!(float.is::<i32>());
            assert_eq!(float.get::<i32>().unwrap(), 1);
            assert_eq!(float.get::<f32>().unwrap(), 1.2f32);
            assert_eq!(float.get::<f64>().unwrap(), 1.2);

            let nan = stack.push(f64::NAN).unwrap();

            assert!(nan.get::<i32>().is_err());
            assert!(nan.get::<f64>().unwrap().is_nan());
        });
    }

    #[test]
    fn test_float_round_trip() {
        let state = State::new().unwrap();

        state.with_stack(|stack| {
            for value in [0.0f32, -1.5, 1.2, f32::MAX, f32::MIN_POSITIVE] {
                let pulled = stack.push(value).unwrap().get::<f32>().unwrap();

                assert_eq!(pulled.to_bits(), value.to_bits());
            }

            let integer = stack.push(3).unwrap();

            assert_eq!(integer.get::<f64>().unwrap(), 3.0);
            assert!(!stack.push("3").unwrap().is::<f64>());
        });
    }
}
