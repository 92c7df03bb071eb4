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

//! The core of the bridge between Rust and the embedded Lua engine.
//!
//! An engine instance is created with [State]. All value exchange happens
//! inside the call frames ([Stack]) that the State opens: Rust values are
//! pushed with [Stack::push] and the slots of the frame are read through
//! [ObjectView] handles.
//!
//! ```
//! use ad_astra_lua::runtime::State;
//!
//! let state = State::new().unwrap();
//!
//! state.with_stack(|stack| {
//!     let table = stack.execute::<ad_astra_lua::runtime::TableView>("return { x = 10 }").unwrap();
//!
//!     assert_eq!(table.at("x").get::<i64>().unwrap(), 10);
//!
//!     // The table stays on the frame until the frame ends.
//!     assert_eq!(stack.top(), 1);
//! });
//! ```
//!
//! The views are bound to the frame they were created in. To keep a Lua
//! value beyond the frame, store it as a [Reference].

mod borrow;
pub(crate) mod coercion;
mod error;
mod function;
mod invoke;
mod memory;
mod object;
mod overload;
mod reference;
mod stack;
mod state;
mod table;
pub(crate) mod ty;
mod user;

// This module is hidden.
//
// You should never use it directly, as its API is not part of the official
// public API of the crate.
#[doc(hidden)]
pub mod __intrinsics;

pub mod ops;

pub(crate) use crate::runtime::stack::StackGuard;
pub use crate::runtime::{
    coercion::{FromObject, IntoStack, PullMulti, PushMulti},
    error::{NumberCastCause, RuntimeError, RuntimeResult},
    function::FunctionView,
    invoke::{Callback, HostFunction},
    memory::{pointer_storage_size, value_storage_size},
    object::ObjectView,
    overload::Overload,
    reference::{FunctionRef, Reference, TableRef},
    stack::{Stack, ValueKind},
    state::{State, StateConfig},
    table::{PathKey, TableIndexPath, TableView},
    ty::{BaseList, UserType},
    user::{ByMut, ByRef, UserMethod, UserTypeBuilder},
};
