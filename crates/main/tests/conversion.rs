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

use ad_astra_lua::{
    runtime::{NumberCastCause, ObjectView, RuntimeError, State, TableView, ValueKind},
    Either,
    Nil,
    Variadic,
};
use compact_str::CompactString;

#[test]
fn test_numbers() {
    let state = State::new().unwrap();

    state.with_stack(|stack| {
        assert_eq!(stack.execute::<i64>("return 7").unwrap(), 7);
        assert_eq!(stack.execute::<i64>("return 7.0").unwrap(), 7);
        assert_eq!(stack.execute::<f64>("return 7").unwrap(), 7.0);
        assert_eq!(stack.execute::<f32>("return 0.5").unwrap(), 0.5);
        assert_eq!(stack.execute::<u8>("return 255").unwrap(), 255);

        assert!(matches!(
            stack.execute::<u8>("return 300"),
            Err(RuntimeError::NumberCast {
                cause: NumberCastCause::Overflow,
                ..
            }),
        ));

        assert!(matches!(
            stack.execute::<u32>("return -1"),
            Err(RuntimeError::NumberCast {
                cause: NumberCastCause::Underflow,
                ..
            }),
        ));

        assert!(matches!(
            stack.execute::<i64>("return 0/0"),
            Err(RuntimeError::NumberCast {
                cause: NumberCastCause::NAN,
                ..
            }),
        ));

        assert!(matches!(
            stack.push(u64::MAX),
            Err(RuntimeError::NumberCast {
                cause: NumberCastCause::Overflow,
                ..
            }),
        ));

        assert_eq!(
            stack.execute::<i64>("return '7'"),
            Err(RuntimeError::TypeMismatch {
                expected: "integer".into(),
                found: ValueKind::String,
            }),
        );

        assert_eq!(stack.top(), 0);
    });
}

#[test]
fn test_integer_subtype() {
    let state = State::new().unwrap();

    state.with_stack(|stack| {
        let integer = stack.push(3).unwrap();
        let float = stack.push(3.0).unwrap();

        assert!(integer.is_integer());
        assert!(!float.is_integer());
        assert!(float.is_number());

        stack.global("value").set(float).unwrap();

        assert_eq!(stack.execute::<String>("return math.type(value)").unwrap(), "float");
        assert_eq!(stack.top(), 2);
    });
}

#[test]
fn test_strings() {
    let state = State::new().unwrap();

    state.with_stack(|stack| {
        assert_eq!(stack.execute::<String>("return 'hello'").unwrap(), "hello");
        assert_eq!(
            stack.execute::<CompactString>("return 'compact'").unwrap(),
            "compact",
        );

        assert_eq!(
            stack.execute::<String>("return 10"),
            Err(RuntimeError::TypeMismatch {
                expected: "string".into(),
                found: ValueKind::Number,
            }),
        );

        assert!(matches!(
            stack.execute::<String>("return '\\xff\\xfe'"),
            Err(RuntimeError::Utf8 { .. }),
        ));

        let bytes = stack.push("a\0b").unwrap();

        assert_eq!(bytes.with_bytes(|bytes| bytes.to_vec()).unwrap(), b"a\0b");
        assert_eq!(bytes.as_string().unwrap(), "a\0b");

        stack.global("name").set(String::from("owned")).unwrap();

        assert_eq!(stack.execute::<String>("return name .. '!'").unwrap(), "owned!");
    });
}

#[test]
fn test_booleans_and_nil() {
    let state = State::new().unwrap();

    state.with_stack(|stack| {
        assert!(stack.execute::<bool>("return true").unwrap());
        assert!(!stack.execute::<bool>("return false").unwrap());

        assert_eq!(
            stack.execute::<bool>("return 1"),
            Err(RuntimeError::TypeMismatch {
                expected: "boolean".into(),
                found: ValueKind::Number,
            }),
        );

        assert_eq!(stack.execute::<Nil>("return nil").unwrap(), Nil);
        assert_eq!(stack.execute::<Nil>("return").unwrap(), Nil);
        assert!(stack.execute::<Nil>("return false").is_err());

        assert_eq!(stack.execute::<Option<bool>>("return").unwrap(), None);
        assert_eq!(stack.execute::<Option<bool>>("return true").unwrap(), Some(true));
    });
}

#[test]
fn test_either() {
    let state = State::new().unwrap();

    state.with_stack(|stack| {
        assert_eq!(
            stack.execute::<Either<i64, String>>("return 5").unwrap(),
            Either::Left(5),
        );

        assert_eq!(
            stack.execute::<Either<i64, String>>("return 'five'").unwrap(),
            Either::Right(String::from("five")),
        );

        assert_eq!(
            stack.execute::<Either<i64, String>>("return {}"),
            Err(RuntimeError::TypeMismatch {
                expected: "integer or string".into(),
                found: ValueKind::Table,
            }),
        );

        stack.global("value").set(Either::<i64, &str>::Right("right")).unwrap();

        assert_eq!(stack.execute::<String>("return value").unwrap(), "right");
    });
}

#[test]
fn test_multiple_values() {
    let state = State::new().unwrap();

    state.with_stack(|stack| {
        let (a, b, c) = stack
            .execute::<(i64, String, Option<bool>)>("return 1, 'two'")
            .unwrap();

        assert_eq!(a, 1);
        assert_eq!(b, "two");
        assert_eq!(c, None);

        assert_eq!(stack.push_multi((1, 2.5, "three", true)).unwrap(), 4);

        let mut position = 1;

        let (first, second) = stack.pull::<(i64, f64)>(&mut position).unwrap();

        assert_eq!((first, second), (1, 2.5));
        assert_eq!(position, 3);
        assert!(stack.probe::<(String, bool)>(position));
        assert!(!stack.probe::<(bool, String)>(position));

        stack.set_top(0).unwrap();

        let rest = stack.execute::<Variadic>("return 1, 2, 3").unwrap();

        assert_eq!(rest.len(), 3);
        assert_eq!(rest[2].get::<i64>().unwrap(), 3);
    });
}

#[test]
fn test_views() {
    let state = State::new().unwrap();

    state.with_stack(|stack| {
        let table = stack.execute::<TableView>("return { 10, 20 }").unwrap();

        assert_eq!(table.raw_len().unwrap(), 2);

        let object = stack.execute::<ObjectView>("return 'view'").unwrap();

        assert_eq!(object.kind(), ValueKind::String);
        assert_eq!(stack.top(), 2);

        assert_eq!(
            stack.execute::<TableView>("return 1").unwrap_err(),
            RuntimeError::TypeMismatch {
                expected: "table".into(),
                found: ValueKind::Number,
            },
        );

        assert_eq!(stack.top(), 2);

        let copy = stack.push(object).unwrap();

        assert!(copy.raw_equal(&object));
        assert!(copy.equals(&object).unwrap());
        assert!(!copy.raw_equal(&table));
    });
}
