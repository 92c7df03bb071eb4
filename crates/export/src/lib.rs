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

//! # Ad Astra Lua Bridge Macros Crate
//!
//! This is a helper crate for the [main crate](https://docs.rs/ad-astra-lua)
//! of the Ad Astra Lua Bridge.
//!
//! The derive macros of this crate implement the conversion interfaces that
//! let Rust types travel into the embedded Lua engine: the [UserType] derive
//! turns a type into a foreign object type with declared base types, and the
//! [ScriptEnum] derive exposes a fieldless enum as Lua integers.
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

mod derive;
mod utils;

use proc_macro::TokenStream;
use syn::parse_macro_input;

use crate::derive::{ScriptEnumDerive, UserTypeDerive};

/// Implements the `UserType` trait and the by-value push conversion for a
/// struct or an enum.
///
/// The name of the type visible to Lua defaults to the Rust identifier of
/// the type, and can be changed with the `#[user_type(name = "...")]`
/// attribute.
///
/// A struct field marked with the `#[base]` attribute declares the field's
/// type as a base type. Foreign objects of the derived type are then
/// accepted wherever a pointer to the base type is expected, and the pointer
/// is adjusted to the field. The bases of the base types are inherited
/// transitively.
///
/// ```ignore
/// use ad_astra_lua::UserType;
///
/// #[derive(UserType)]
/// struct Shape {
///     sides: usize,
/// }
///
/// #[derive(UserType)]
/// #[user_type(name = "Square")]
/// struct Square {
///     #[base]
///     shape: Shape,
///     size: f64,
/// }
/// ```
///
/// The type must not have lifetime parameters. Type parameters receive the
/// `'static` bound.
#[proc_macro_derive(UserType, attributes(user_type, base))]
pub fn user_type(input: TokenStream) -> TokenStream {
    let output = parse_macro_input!(input as UserTypeDerive);
    output.into()
}

/// Implements the push and pull conversions of a fieldless enum.
///
/// Enum values are represented in Lua by the integer values of their
/// discriminants. Pulling an integer that does not match any variant fails
/// with a type mismatch error. The expected type name in error messages
/// defaults to the Rust identifier of the enum, and can be changed with the
/// `#[script_enum(name = "...")]` attribute.
///
/// ```ignore
/// use ad_astra_lua::ScriptEnum;
///
/// #[derive(Clone, Copy, ScriptEnum)]
/// enum Direction {
///     North = 1,
///     South = 2,
/// }
/// ```
#[proc_macro_derive(ScriptEnum, attributes(script_enum))]
pub fn script_enum(input: TokenStream) -> TokenStream {
    let output = parse_macro_input!(input as ScriptEnumDerive);
    output.into()
}
