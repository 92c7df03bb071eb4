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
    fmt::{Debug, Formatter},
    ops::Deref,
};

use mlua_sys as ffi;

use crate::runtime::{
    FunctionRef,
    ObjectView,
    PullMulti,
    PushMulti,
    RuntimeResult,
    Stack,
    StackGuard,
};

/// A typed view of a stack slot holding a Lua function.
///
/// The view dereferences to the underlying [ObjectView].
///
/// ```
/// use ad_astra_lua::runtime::{FunctionView, State};
///
/// let state = State::new().unwrap();
///
/// state.with_stack(|stack| {
///     let function = stack
///         .execute::<FunctionView>("return function(a, b) return b, a end")
///         .unwrap();
///
///     let (first, second) = function.invoke::<(String, i64)>((1, "one")).unwrap();
///
///     assert_eq!(first, "one");
///     assert_eq!(second, 1);
///     assert_eq!(stack.top(), 1);
/// });
/// ```
#[derive(Clone, Copy)]
pub struct FunctionView<'s>(ObjectView<'s>);

impl<'s> Debug for FunctionView<'s> {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_tuple("FunctionView")
            .field(&self.0.index())
            .finish()
    }
}

impl<'s> Deref for FunctionView<'s> {
    type Target = ObjectView<'s>;

    #[inline(always)]
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl<'s> FunctionView<'s> {
    #[inline(always)]
    pub(crate) fn new_unchecked(object: ObjectView<'s>) -> Self {
        Self(object)
    }

    /// Returns the untyped view of the function slot.
    #[inline(always)]
    pub fn as_object(&self) -> &ObjectView<'s> {
        &self.0
    }

    /// Stores the function as a persistent [FunctionRef].
    #[inline(always)]
    pub fn store_function(&self) -> RuntimeResult<FunctionRef> {
        FunctionRef::store(self)
    }

    /// Calls the function in protected mode and converts its results into
    /// `R`.
    ///
    /// The number of requested results follows `R`: a single value for
    /// plain types, the arity for tuples, and all results for
    /// [Variadic](crate::Variadic). Extra results are discarded, missing
    /// ones are `nil`.
    ///
    /// On failure, the frame height is restored. On success, the frame
    /// keeps only the slots retained by the views within `R`.
    pub fn invoke<R: PullMulti<'s>>(&self, arguments: impl PushMulti) -> RuntimeResult<R> {
        let stack = self.0.stack();
        let guard = StackGuard::new(stack);

        let function = self.0.push_to(stack)?.index();
        let count = stack.push_multi(arguments)?;
        let result = finish_call::<R>(stack, function, count)?;

        guard.release();

        Ok(result)
    }

    /// Calls the function in protected mode, discarding its results.
    #[inline(always)]
    pub fn call(&self, arguments: impl PushMulti) -> RuntimeResult<()> {
        self.invoke::<()>(arguments)
    }
}

// Calls the function at `function`, followed by `arguments` values, and
// converts the results. The caller restores the stack on failure.
pub(crate) fn finish_call<'s, R: PullMulti<'s>>(
    stack: &'s Stack,
    function: i32,
    arguments: i32,
) -> RuntimeResult<R> {
    let results = R::result_count().unwrap_or(ffi::LUA_MULTRET);

    stack.protected_call(arguments, results)?;

    let mut position = function;
    let result = R::pull_multi(stack, &mut position)?;

    stack.set_top(position - 1)?;

    Ok(result)
}
