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
    FunctionView,
    IntoStack,
    ObjectView,
    RuntimeResult,
    Stack,
    TableView,
};

impl<'a> IntoStack for ObjectView<'a> {
    #[inline(always)]
    fn push_into(self, stack: &Stack) -> RuntimeResult<()> {
        self.push_to(stack).map(|_| ())
    }
}

impl<'a, 'b> IntoStack for &'b ObjectView<'a> {
    #[inline(always)]
    fn push_into(self, stack: &Stack) -> RuntimeResult<()> {
        self.push_to(stack).map(|_| ())
    }
}

impl<'a> IntoStack for TableView<'a> {
    #[inline(always)]
    fn push_into(self, stack: &Stack) -> RuntimeResult<()> {
        self.push_to(stack).map(|_| ())
    }
}

impl<'a> IntoStack for FunctionView<'a> {
    #[inline(always)]
    fn push_into(self, stack: &Stack) -> RuntimeResult<()> {
        self.push_to(stack).map(|_| ())
    }
}

impl<'s> FromObject<'s> for ObjectView<'s> {
    const RETAINS_SLOT: bool = true;

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
        Ok(object)
    }
}

impl<'s> FromObject<'s> for TableView<'s> {
    const RETAINS_SLOT: bool = true;

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
        object.as_table()
    }
}

impl<'s> FromObject<'s> for FunctionView<'s> {
    const RETAINS_SLOT: bool = true;

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
        object.as_function()
    }
}

#[cfg(test)]
mod tests {
    use crate::runtime::{FunctionView, ObjectView, State, TableView};

    #[test]
    fn test_views_keep_slots() {
        let state = State::new().unwrap();

        state.with_stack(|stack| {
            let _ = stack.push_table().unwrap();
            let _ = stack.execute::<FunctionView>("return function() end").unwrap();

            let mut position = 1;

            let (table, function) = stack
                .pull::<(TableView, FunctionView)>(&mut position)
                .unwrap();

            assert_eq!(position, 3);
            assert_eq!(stack.top(), 2);
            assert_eq!(table.index(), 1);
            assert_eq!(function.index(), 2);

            assert!(!stack.probe::<TableView>(2));
            assert!(stack.probe::<ObjectView>(2));
        });
    }

    #[test]
    fn test_view_push_copies() {
        let state = State::new().unwrap();

        state.with_stack(|stack| {
            let table = stack.push_table().unwrap();
            let copy = stack.push(table).unwrap();

            assert_eq!(copy.index(), 2);
            assert!(copy.raw_equal(&table));
        });
    }
}
