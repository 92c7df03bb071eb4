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
    any::Any,
    ffi::c_int,
    fmt::{Debug, Formatter},
    panic::{catch_unwind, AssertUnwindSafe},
};

use log::warn;
use mlua_sys as ffi;

use crate::{
    report::STATE_LOG,
    runtime::{
        memory::live_pointer,
        FunctionView,
        IntoStack,
        ObjectView,
        PullMulti,
        PushMulti,
        RuntimeError,
        RuntimeResult,
        Stack,
        StackGuard,
        UserType,
    },
};

pub(crate) type RawCallback = Box<dyn Fn(&Stack) -> RuntimeResult<i32>>;

// The foreign object a host function closure keeps in its first upvalue.
pub(crate) struct HostCallback(RawCallback);

impl UserType for HostCallback {
    #[inline(always)]
    fn type_name() -> &'static str {
        "host function"
    }
}

/// A Rust function that can be called from Lua.
///
/// The trait is implemented for any `Fn(A1, ..., An) -> R` closure with up
/// to 7 arguments, where each argument type implements [PullMulti] for any
/// stack lifetime (owned values, [Option], [Either](crate::Either),
/// [Reference](crate::runtime::Reference), [UserPtr](crate::UserPtr), and
/// similar), and the result type implements [PushMulti]. A result of type
/// [Result] raises a Lua error when it is [Err].
///
/// Argument conversion failures raise `bad argument #N` Lua errors.
pub trait HostFunction<Args>: 'static {
    /// Tests whether the arguments on the `stack` match the signature of
    /// this function, including the number of arguments.
    fn probe(stack: &Stack) -> bool;

    /// Converts the arguments on the `stack`, calls the function, and
    /// pushes its results. Returns the number of pushed results.
    fn call(&self, stack: &Stack) -> RuntimeResult<i32>;
}

macro_rules! impl_host_function {
    ($($arg:ident),*) => {
        impl<Fun, Ret, $($arg),*> HostFunction<($($arg,)*)> for Fun
        where
            Fun: Fn($($arg),*) -> Ret + 'static,
            Ret: PushMulti,
            $($arg: for<'s> PullMulti<'s>,)*
        {
            #[allow(unused_mut)]
            fn probe(stack: &Stack) -> bool {
                let mut position = 1;

                $(
                if !<$arg as PullMulti<'_>>::probe_multi(stack, &mut position) {
                    return false;
                }
                )*

                position > stack.top()
            }

            #[allow(non_snake_case, unused_mut, unused_variables, unused_assignments)]
            fn call(&self, stack: &Stack) -> RuntimeResult<i32> {
                let mut position = 1;
                let mut argument = 0;

                $(
                argument += 1;

                let $arg = <$arg as PullMulti<'_>>::pull_multi(stack, &mut position)
                    .map_err(|error| error.at_argument(argument))?;
                )*

                stack.push_multi((self)($($arg),*))
            }
        }
    };
}

impl_host_function!();
impl_host_function!(A1);
impl_host_function!(A1, A2);
impl_host_function!(A1, A2, A3);
impl_host_function!(A1, A2, A3, A4);
impl_host_function!(A1, A2, A3, A4, A5);
impl_host_function!(A1, A2, A3, A4, A5, A6);
impl_host_function!(A1, A2, A3, A4, A5, A6, A7);

/// A type-erased host function that can be pushed as a Lua function.
///
/// ```
/// use ad_astra_lua::runtime::{Callback, State};
///
/// let state = State::new().unwrap();
///
/// state.with_stack(|stack| {
///     stack
///         .global("greet")
///         .set(Callback::new(|name: String| format!("Hello, {name}!")))
///         .unwrap();
///
///     assert_eq!(
///         stack.execute::<String>("return greet('Lua')").unwrap(),
///         "Hello, Lua!",
///     );
/// });
/// ```
pub struct Callback {
    pub(crate) probe: fn(&Stack) -> bool,
    pub(crate) call: RawCallback,
}

impl Debug for Callback {
    #[inline(always)]
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str("Callback")
    }
}

impl IntoStack for Callback {
    #[inline(always)]
    fn push_into(self, stack: &Stack) -> RuntimeResult<()> {
        push_callback(stack, self.call).map(|_| ())
    }
}

impl Callback {
    /// Wraps a typed host function.
    pub fn new<Args: 'static, F: HostFunction<Args>>(function: F) -> Self {
        Self {
            probe: <F as HostFunction<Args>>::probe,
            call: Box::new(move |stack| function.call(stack)),
        }
    }

    /// Wraps a function that works with the call frame directly.
    ///
    /// The frame holds the arguments at indices `1..=top`. The function
    /// pushes its results and returns their number.
    pub fn raw(function: impl Fn(&Stack) -> RuntimeResult<i32> + 'static) -> Self {
        Self {
            probe: accept_any,
            call: Box::new(function),
        }
    }
}

#[inline(always)]
fn accept_any(_stack: &Stack) -> bool {
    true
}

impl Stack {
    /// Pushes a Rust function as a Lua function.
    ///
    /// ```
    /// use ad_astra_lua::runtime::State;
    ///
    /// let state = State::new().unwrap();
    ///
    /// state.with_stack(|stack| {
    ///     let function = stack
    ///         .push_function(|a: i64, b: Option<i64>| a + b.unwrap_or(1))
    ///         .unwrap();
    ///
    ///     assert_eq!(function.invoke::<i64>(5).unwrap(), 6);
    ///     assert_eq!(function.invoke::<i64>((5, 5)).unwrap(), 10);
    /// });
    /// ```
    #[inline(always)]
    pub fn push_function<Args: 'static, F: HostFunction<Args>>(
        &self,
        function: F,
    ) -> RuntimeResult<FunctionView<'_>> {
        push_callback(self, Callback::new(function).call)
    }

    /// Pushes a Rust function that works with the call frame directly.
    ///
    /// The frame holds the arguments at indices `1..=top`. The function
    /// pushes its results and returns their number.
    #[inline(always)]
    pub fn push_raw_function(
        &self,
        function: impl Fn(&Stack) -> RuntimeResult<i32> + 'static,
    ) -> RuntimeResult<FunctionView<'_>> {
        push_callback(self, Box::new(function))
    }
}

pub(crate) fn push_callback(stack: &Stack, call: RawCallback) -> RuntimeResult<FunctionView<'_>> {
    let guard = StackGuard::new(stack);

    let _ = stack.push_value(HostCallback(call))?;

    stack.ensure(1)?;

    // Safety: The callback object is on top.
    unsafe { ffi::lua_pushcclosure(stack.raw(), invoke_host_function, 1) };

    guard.release();

    Ok(FunctionView::new_unchecked(ObjectView::new(stack, stack.top())))
}

unsafe extern "C-unwind" fn invoke_host_function(state: *mut ffi::lua_State) -> c_int {
    protect(state, |stack| {
        // Safety: The upvalue is a HostCallback storage.
        let callback =
            unsafe { live_pointer(stack.raw(), ffi::lua_upvalueindex(1)) } as *const HostCallback;

        match callback.is_null() {
            true => Err(RuntimeError::ObjectDestroyed {
                type_name: HostCallback::type_name(),
            }),

            // Safety: The upvalue keeps the callback alive during the call.
            false => (unsafe { &(*callback).0 })(stack),
        }
    })
}

// Runs `f` as the body of a C function called by the engine.
//
// Failures and panics of `f` are raised as Lua errors after every Rust value
// of the call is dropped.
//
// Safety: `state` is the thread running the C function.
pub(crate) unsafe fn protect(
    state: *mut ffi::lua_State,
    f: impl FnOnce(&Stack) -> RuntimeResult<c_int>,
) -> c_int {
    let outcome = {
        let stack = Stack::from_raw(state, 0);

        catch_unwind(AssertUnwindSafe(|| f(&stack)))
    };

    let error = match outcome {
        Ok(Ok(count)) => {
            let available = ffi::lua_gettop(state);

            match count >= 0 && count <= available {
                true => return count,

                false => RuntimeError::InvalidResultCount {
                    returned: count,
                    available,
                },
            }
        }

        Ok(Err(error)) => error,

        Err(payload) => {
            let message = panic_message(payload);

            warn!(target: STATE_LOG, "Host function panicked: {message}");

            RuntimeError::ForeignCall { message }
        }
    };

    raise(state, error)
}

// Safety: `state` is the thread running a C function.
unsafe fn raise(state: *mut ffi::lua_State, error: RuntimeError) -> c_int {
    let (message, located) = match error {
        RuntimeError::Script { message } => (message, true),
        other => (other.to_string(), false),
    };

    ffi::lua_settop(state, 0);

    if !located {
        ffi::luaL_where(state, 1);
    }

    let _ = ffi::lua_pushlstring(state, message.as_ptr() as *const _, message.len());

    drop(message);

    if !located {
        ffi::lua_concat(state, 2);
    }

    ffi::lua_error(state)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        return String::from(*message);
    }

    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }

    String::from("host function panicked")
}

#[cfg(test)]
mod tests {
    use crate::runtime::{Callback, RuntimeError, State};

    #[test]
    fn test_host_function_call() {
        let state = State::new().unwrap();

        state.with_stack(|stack| {
            let function = stack
                .push_function(|a: i64, b: i64| (a + b, a * b))
                .unwrap();

            assert_eq!(function.invoke::<(i64, i64)>((3, 4)).unwrap(), (7, 12));

            stack.global("sum").set(function).unwrap();

            assert_eq!(stack.execute::<i64>("return sum(1, 2)").unwrap(), 3);
        });
    }

    #[test]
    fn test_bad_argument_message() {
        let state = State::new().unwrap();

        state.with_stack(|stack| {
            stack
                .global("twice")
                .set(Callback::new(|value: i64| value * 2))
                .unwrap();

            let error = stack.execute::<i64>("return twice('x')").unwrap_err();

            assert_eq!(
                error,
                RuntimeError::Script {
                    message: String::from(
                        "chunk:1: bad argument #1 (integer expected, got string)"
                    ),
                }
            );

            assert_eq!(stack.top(), 0);
        });
    }

    #[test]
    fn test_errors_and_panics() {
        let state = State::new().unwrap();

        state.with_stack(|stack| {
            stack
                .global("fail")
                .set(Callback::new(|| -> Result<(), RuntimeError> {
                    Err(RuntimeError::ForeignCall {
                        message: String::from("failure"),
                    })
                }))
                .unwrap();

            stack
                .global("explode")
                .set(Callback::new(|| -> i64 { panic!("boom") }))
                .unwrap();

            let caught = stack
                .execute::<(bool, String)>("return pcall(fail)")
                .unwrap();

            assert_eq!(caught, (false, String::from("failure")));

            let error = stack.execute::<()>("explode()").unwrap_err();

            assert_eq!(error.to_string(), "chunk:1: boom");
        });
    }

    #[test]
    fn test_raw_function() {
        let state = State::new().unwrap();

        state.with_stack(|stack| {
            let count = stack
                .push_raw_function(|stack| {
                    let top = stack.top();

                    let _ = stack.push(top)?;

                    Ok(1)
                })
                .unwrap();

            assert_eq!(count.invoke::<i64>((1, 2, 3)).unwrap(), 3);
            assert_eq!(count.invoke::<i64>(()).unwrap(), 0);
        });
    }

    #[test]
    fn test_raw_function_result_count() {
        let state = State::new().unwrap();

        state.with_stack(|stack| {
            let _ = stack.push("marker").unwrap();

            let excessive = stack.push_raw_function(|_| Ok(1000)).unwrap();

            let error = excessive.invoke::<()>((1, 2)).unwrap_err();

            assert!(error
                .to_string()
                .contains("host function returned 1000 results from a stack frame of 2 values"));

            let negative = stack.push_raw_function(|_| Ok(-1)).unwrap();

            let error = negative.invoke::<()>(()).unwrap_err();

            assert!(error
                .to_string()
                .contains("host function returned -1 results from a stack frame of 0 values"));

            assert_eq!(stack.top(), 3);
            assert_eq!(stack.object(1).unwrap().get::<String>().unwrap(), "marker");

            let exact = stack
                .push_raw_function(|stack| Ok(stack.top()))
                .unwrap();

            assert_eq!(exact.invoke::<(i64, i64)>((5, 6)).unwrap(), (5, 6));
        });
    }

    #[test]
    fn test_host_function_reentrance() {
        let state = State::new().unwrap();

        state.with_stack(|stack| {
            stack
                .global("apply")
                .set(Callback::raw(|stack| {
                    let function = stack.object(1)?.as_function()?;
                    let value = stack.object(2)?.get::<i64>()?;
                    let result = function.invoke::<i64>(value)?;

                    let _ = stack.push(result + 1)?;

                    Ok(1)
                }))
                .unwrap();

            assert_eq!(
                stack
                    .execute::<i64>("return apply(function(x) return x * 10 end, 4)")
                    .unwrap(),
                41
            );
        });
    }
}
