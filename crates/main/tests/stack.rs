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

use ad_astra_lua::runtime::{RuntimeError, State, StateConfig, ValueKind};

#[test]
fn test_slot_manipulation() {
    let state = State::new().unwrap();

    state.with_stack(|stack| {
        let _ = stack.push(1).unwrap();
        let _ = stack.push("two").unwrap();
        let _ = stack.push(3.5).unwrap();

        assert_eq!(stack.top(), 3);
        assert_eq!(stack.kind(1), ValueKind::Number);
        assert_eq!(stack.kind(-2), ValueKind::String);
        assert_eq!(stack.kind(4), ValueKind::None);
        assert_eq!(stack.absolute(-1).unwrap(), 3);

        stack.insert(1).unwrap();

        assert_eq!(stack.object(1).unwrap().as_number().unwrap(), 3.5);
        assert_eq!(stack.object(2).unwrap().as_integer().unwrap(), 1);

        stack.remove(2).unwrap();

        assert_eq!(stack.top(), 2);
        assert_eq!(stack.object(2).unwrap().as_string().unwrap(), "two");

        let _ = stack.push(true).unwrap();

        stack.replace(1).unwrap();

        assert_eq!(stack.top(), 2);
        assert!(stack.object(1).unwrap().as_boolean().unwrap());

        stack.pop(2).unwrap();

        assert_eq!(stack.top(), 0);
    });
}

#[test]
fn test_index_errors() {
    let state = State::new().unwrap();

    state.with_stack(|stack| {
        let _ = stack.push(1).unwrap();

        assert_eq!(stack.absolute(0), Err(RuntimeError::InvalidIndex { index: 0 }));
        assert_eq!(stack.absolute(2), Err(RuntimeError::InvalidIndex { index: 2 }));
        assert_eq!(stack.absolute(-2), Err(RuntimeError::InvalidIndex { index: -2 }));
        assert!(stack.object(5).is_err());

        assert_eq!(
            stack.pop(2),
            Err(RuntimeError::StackUnderflow {
                requested: 2,
                available: 1,
            }),
        );

        assert!(matches!(
            stack.ensure(10_000_000),
            Err(RuntimeError::StackCapacityExceeded { requested: 10_000_000 }),
        ));

        assert_eq!(stack.top(), 1);
    });
}

#[test]
fn test_nested_frames() {
    let state = State::new().unwrap();

    state.with_stack(|outer| {
        let value = outer.push("outer").unwrap();

        outer.with_stack(|inner| {
            assert_eq!(inner.top(), 0);

            let _ = inner.push(1).unwrap();
            let _ = inner.push(2).unwrap();

            assert_eq!(inner.top(), 2);
            assert_eq!(inner.object(1).unwrap().as_integer().unwrap(), 1);

            assert!(matches!(
                value.push_to(inner),
                Err(RuntimeError::ForeignFrame),
            ));
        });

        assert_eq!(outer.top(), 1);
        assert_eq!(value.as_string().unwrap(), "outer");
    });
}

#[test]
fn test_foreign_engine() {
    let first = State::new().unwrap();
    let second = State::new().unwrap();

    first.with_stack(|first| {
        let value = first.push(10).unwrap();

        second.with_stack(|second| {
            assert_eq!(value.push_to(second).unwrap_err(), RuntimeError::ForeignEngine);
            assert_eq!(second.top(), 0);
        });
    });
}

#[test]
fn test_frame_restored_after_errors() {
    let state = State::new().unwrap();

    state.with_stack(|stack| {
        let _ = stack.push(1).unwrap();

        assert!(matches!(
            stack.execute::<()>("error('failure')"),
            Err(RuntimeError::Script { .. }),
        ));

        assert!(matches!(
            stack.execute::<()>("return +"),
            Err(RuntimeError::Syntax { .. }),
        ));

        assert!(stack.execute::<i64>("return 'text'").is_err());
        assert!(stack.global("missing").at("field").get::<i64>().is_err());

        assert_eq!(stack.top(), 1);
    });
}

#[test]
fn test_threads() {
    let state = State::new().unwrap();

    state.with_stack(|stack| {
        let thread = stack.push_thread().unwrap();

        assert!(thread.is_thread());

        let sum = thread
            .with_thread(|coroutine| {
                let _ = coroutine.push(20).unwrap();
                let _ = coroutine.push(22).unwrap();

                coroutine.execute::<i64>("return 0").unwrap()
                    + coroutine.object(1).unwrap().as_integer().unwrap()
                    + coroutine.object(2).unwrap().as_integer().unwrap()
            })
            .unwrap();

        assert_eq!(sum, 42);
        assert_eq!(stack.top(), 1);
    });
}

#[test]
fn test_configuration() {
    let state = State::with_config(StateConfig::new().with_standard_libraries(false)).unwrap();

    state.with_stack(|stack| {
        assert_eq!(stack.execute::<Option<i64>>("return string").unwrap(), None);
        assert!(stack.execute::<()>("print(1)").is_err());
    });

    let state = State::new().unwrap();

    assert!(state.config().standard_libraries);

    state.with_stack(|stack| {
        assert_eq!(stack.execute::<i64>("return string.len('abc')").unwrap(), 3);
    });
}
