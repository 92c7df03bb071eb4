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

use crate::runtime::{
    FromObject,
    FunctionRef,
    IntoStack,
    ObjectView,
    Reference,
    RuntimeResult,
    Stack,
    TableRef,
};

macro_rules! impl_reference_push {
    ($($ty:ty),*) => {
        $(
        impl IntoStack for $ty {
            #[inline(always)]
            fn push_into(self, stack: &Stack) -> RuntimeResult<()> {
                let _ = self.push_to(stack)?;

                Ok(())
            }
        }

        impl<'a> IntoStack for &'a $ty {
            #[inline(always)]
            fn push_into(self, stack: &Stack) -> RuntimeResult<()> {
                let _ = self.push_to(stack)?;

                Ok(())
            }
        }
        )*
    };
}

impl_reference_push!(Reference, TableRef, FunctionRef);

impl<'s> FromObject<'s> for Reference {
    #[inline(always)]
    fn hint() -> Cow<'static, str> {
        Cow::Borrowed("value")
    }

    #[inline(always)]
    fn probe(_object: &ObjectView<'s>) -> bool {
        true
    }

    #[inline(always)]
    fn from_object(object: ObjectView<'s>) -> RuntimeResult<Self> {
        Reference::store(&object)
    }

    #[inline(always)]
    fn from_nothing() -> Option<Self> {
        Some(Reference::default())
    }
}

impl<'s> FromObject<'s> for TableRef {
    #[inline(always)]
    fn hint() -> Cow<'static, str> {
        Cow::Borrowed("table")
    }

    #[inline(always)]
    fn probe(object: &ObjectView<'s>) -> bool {
        object.is_table()
    }

    #[inline(always)]
    fn from_object(object: ObjectView<'s>) -> RuntimeResult<Self> {
        TableRef::from_object(&object)
    }
}

impl<'s> FromObject<'s> for FunctionRef {
    #[inline(always)]
    fn hint() -> Cow<'static, str> {
        Cow::Borrowed("function")
    }

    #[inline(always)]
    fn probe(object: &ObjectView<'s>) -> bool {
        object.is_function()
    }

    #[inline(always)]
    fn from_object(object: ObjectView<'s>) -> RuntimeResult<Self> {
        FunctionRef::from_object(&object)
    }
}

#[cfg(test)]
mod tests {
    use crate::runtime::{FunctionRef, Reference, State, TableRef};

    #[test]
    fn test_references_as_arguments() {
        let state = State::new().unwrap();

        let saved = state.with_stack(|stack| {
            let keep = stack
                .push_function(|callback: FunctionRef| callback)
                .unwrap();

            stack.global("keep").set(keep).unwrap();

            stack
                .execute::<FunctionRef>("return keep(function(x) return x + 1 end)")
                .unwrap()
        });

        assert_eq!(saved.invoke::<i64>(1).unwrap(), 2);

        state.with_stack(|stack| {
            let number = stack.push(10).unwrap();

            assert!(number.get::<TableRef>().is_err());

            let reference = number.get::<Reference>().unwrap();

            assert!(reference.is_valid());

            let copy = stack.push(&reference).unwrap();

            assert_eq!(copy.as_integer().unwrap(), 10);
        });
    }

    #[test]
    fn test_missing_argument_is_nil_reference() {
        let state = State::new().unwrap();

        state.with_stack(|stack| {
            let count = stack
                .push_function(|value: Reference| value.is_valid())
                .unwrap();

            assert!(count.invoke::<bool>(1).unwrap());
            assert!(!count.invoke::<bool>(()).unwrap());
        });
    }
}
