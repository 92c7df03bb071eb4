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

use std::{cell::Cell, fmt::Display, rc::Rc};

use ad_astra_lua::{
    runtime::{Callback, FunctionRef, Overload, RuntimeError, State},
    Variadic,
};

#[derive(Debug)]
struct Rejected(i64);

impl Display for Rejected {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter.write_fmt(format_args!("value {} rejected", self.0))
    }
}

impl std::error::Error for Rejected {}

#[test]
fn test_lua_functions() {
    let state = State::new().unwrap();

    state.with_stack(|stack| {
        let function = stack
            .execute::<ad_astra_lua::runtime::FunctionView>(
                "return function(a, b) return a + b, a - b end",
            )
            .unwrap();

        assert_eq!(function.invoke::<(i64, i64)>((5, 3)).unwrap(), (8, 2));
        assert_eq!(function.invoke::<i64>((5, 3)).unwrap(), 8);

        assert!(matches!(
            function.invoke::<i64>(("a", 1)),
            Err(RuntimeError::Script { .. }),
        ));

        assert_eq!(stack.top(), 1);

        let loaded = stack.load("return ...", "echo").unwrap();

        let values = loaded.invoke::<Variadic>((1, 2, 3)).unwrap();

        assert_eq!(values.len(), 3);

        let error = stack.load("return +", "broken").unwrap_err();

        assert!(matches!(
            error,
            RuntimeError::Syntax { message } if message.starts_with("broken:")
        ));
    });
}

#[test]
fn test_host_functions() {
    let state = State::new().unwrap();

    state.with_stack(|stack| {
        stack
            .global("greet")
            .set(stack.push_function(|name: String| format!("Hello, {name}!")).unwrap())
            .unwrap();

        stack
            .global("divide")
            .set(stack.push_function(|a: i64, b: i64| (a / b, a % b)).unwrap())
            .unwrap();

        stack
            .global("count")
            .set(
                stack
                    .push_raw_function(|stack| {
                        let mut position = 1;
                        let values = stack.pull::<Variadic>(&mut position)?;

                        let _ = stack.push(values.len())?;

                        Ok(1)
                    })
                    .unwrap(),
            )
            .unwrap();

        stack.set_top(0).unwrap();

        assert_eq!(stack.execute::<String>("return greet('Lua')").unwrap(), "Hello, Lua!");
        assert_eq!(stack.execute::<(i64, i64)>("return divide(7, 2)").unwrap(), (3, 1));
        assert_eq!(stack.execute::<i64>("return count(1, nil, 'x')").unwrap(), 3);
        assert_eq!(stack.execute::<i64>("return count()").unwrap(), 0);

        assert_eq!(
            stack.execute::<()>("greet(1)").unwrap_err().to_string(),
            "chunk:1: bad argument #1 (string expected, got number)",
        );

        assert_eq!(
            stack.execute::<()>("divide(1, 'x')").unwrap_err().to_string(),
            "chunk:1: bad argument #2 (integer expected, got string)",
        );

        assert_eq!(
            stack.execute::<(bool, String)>("return pcall(greet)").unwrap(),
            (
                false,
                String::from("bad argument #1 (string expected, got no value)"),
            ),
        );

        assert_eq!(stack.top(), 0);
    });
}

#[test]
fn test_failing_host_functions() {
    let state = State::new().unwrap();

    state.with_stack(|stack| {
        stack
            .global("check")
            .set(
                stack
                    .push_function(|value: i64| match value > 0 {
                        true => Ok(value),
                        false => Err(Rejected(value)),
                    })
                    .unwrap(),
            )
            .unwrap();

        stack
            .global("explode")
            .set(stack.push_function(|| -> i64 { panic!("boom") }).unwrap())
            .unwrap();

        assert_eq!(stack.execute::<i64>("return check(5)").unwrap(), 5);

        assert_eq!(
            stack.execute::<()>("check(-1)").unwrap_err().to_string(),
            "chunk:1: value -1 rejected",
        );

        assert_eq!(
            stack.execute::<()>("explode()").unwrap_err().to_string(),
            "chunk:1: boom",
        );

        assert_eq!(
            stack.execute::<(bool, String)>("return pcall(explode)").unwrap(),
            (false, String::from("boom")),
        );

        assert_eq!(stack.execute::<i64>("return check(7)").unwrap(), 7);
        assert_eq!(stack.top(), 0);
    });
}

#[test]
fn test_raw_functions() {
    let state = State::new().unwrap();

    state.with_stack(|stack| {
        let sum = stack
            .push_raw_function(|stack| {
                let mut total = 0;

                for index in 1..=stack.top() {
                    total += stack.object(index)?.as_integer()?;
                }

                let _ = stack.push(total)?;
                let _ = stack.push(stack.top() - 1)?;

                Ok(2)
            })
            .unwrap();

        assert_eq!(sum.invoke::<(i64, i64)>((1, 2, 3)).unwrap(), (6, 3));
        assert!(sum.invoke::<i64>("x").is_err());
    });
}

#[test]
fn test_overloads() {
    let state = State::new().unwrap();

    state.with_stack(|stack| {
        let mut overload = Overload::new()
            .with(|value: i64| format!("integer {value}"))
            .with(|value: bool| format!("boolean {value}"))
            .with(|a: String, b: String| format!("strings {a} {b}"));

        overload.add(Callback::raw(|stack| {
            let _ = stack.push(format!("{} values", stack.top()))?;

            Ok(1)
        }));

        assert_eq!(overload.len(), 4);

        stack.global("describe").set(overload).unwrap();

        assert_eq!(stack.execute::<String>("return describe(2)").unwrap(), "integer 2");
        assert_eq!(stack.execute::<String>("return describe(true)").unwrap(), "boolean true");
        assert_eq!(
            stack.execute::<String>("return describe('a', 'b')").unwrap(),
            "strings a b",
        );
        assert_eq!(stack.execute::<String>("return describe({}, 1, 2)").unwrap(), "3 values");

        stack
            .global("strict")
            .set(Overload::new().with(|value: bool| value))
            .unwrap();

        assert_eq!(
            stack.execute::<()>("strict(1)").unwrap_err().to_string(),
            "chunk:1: no matching overload found",
        );

        assert!(stack.execute::<bool>("return strict(true)").unwrap());
        assert!(Overload::new().is_empty());
    });
}

#[test]
fn test_reentrance() {
    let state = State::new().unwrap();

    state.with_stack(|stack| {
        let calls = Rc::new(Cell::new(0));
        let counter = calls.clone();

        stack
            .global("apply")
            .set(
                stack
                    .push_function(move |callback: FunctionRef, value: i64| {
                        counter.set(counter.get() + 1);

                        callback.invoke::<i64>(value)
                    })
                    .unwrap(),
            )
            .unwrap();

        assert_eq!(
            stack
                .execute::<i64>(
                    "return apply(function(x) \
                     return apply(function(y) return y * 2 end, x + 1) end, 1)",
                )
                .unwrap(),
            4,
        );

        assert_eq!(calls.get(), 2);
        assert_eq!(stack.top(), 0);
    });
}
