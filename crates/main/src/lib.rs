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

#![allow(clippy::missing_safety_doc)]

//! # Ad Astra Lua Bridge
//!
//! This crate connects Rust host code to an embedded Lua 5.4 engine.
//!
//! The engine exposes a stack-based, index-addressed API: values are pushed
//! onto a shared evaluation stack and read back by index. The crate wraps that
//! model in a set of typed handles:
//!
//! - [Stack](runtime::Stack) is a call frame on the evaluation stack.
//!   Indices are resolved relative to the frame, and the frame restores its
//!   height when it ends.
//! - [ObjectView](runtime::ObjectView) is a non-owning handle to one slot of
//!   a frame. [TableView](runtime::TableView) and
//!   [FunctionView](runtime::FunctionView) are its typed variants.
//! - [IntoStack](runtime::IntoStack) and [FromObject](runtime::FromObject)
//!   convert Rust values to stack slots and back, including optional values,
//!   sum types ([Either]), tuples, and variadic tails ([Variadic]).
//! - [Reference](runtime::Reference) keeps a Lua value alive beyond the frame
//!   that produced it.
//! - [UserType](runtime::UserType) types can be pushed into Lua as foreign
//!   objects with properties, methods, meta-methods, a finalizer, and declared
//!   base types.
//!
//! ```
//! use ad_astra_lua::runtime::State;
//!
//! let state = State::new().unwrap();
//!
//! state.with_stack(|stack| {
//!     let sum = stack
//!         .push_function(|a: i64, b: i64| a + b)
//!         .unwrap();
//!
//!     assert_eq!(sum.invoke::<i64>((10, 20)).unwrap(), 30);
//! });
//! ```
//!
//! ## Copyright
//!
//! This work is proprietary software with source-available code.
//!
//! To copy, use, distribute, or contribute to this work, you must agree to the
//! terms and conditions of the
//! [General License Agreement](https://github.com/Eliah-Lakhin/ad-astra/blob/master/EULA.md).
//!
//! Copyright (c) 2024 Ilya Lakhin (Илья Александрович Лахин). All rights reserved.

extern crate self as ad_astra_lua;

mod exports;
mod report;
pub mod runtime;

pub use ad_astra_lua_export::{ScriptEnum, UserType};

pub use crate::exports::{Either, Nil, UserPtr, UserValue, Variadic};
